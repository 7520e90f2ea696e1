//! The CLI wrapper (§6): a single command, not a subcommand tree. Parses
//! `--patch <path>` or a positional path, drives the engine, and renders a
//! per-file (or, with `--verbose`, per-modification) summary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::commit;
use crate::engine::{ModificationOutcome, Transaction, TransactionReport};
use crate::error::DriftPatchError;
use crate::patch;

#[derive(Debug, Parser)]
#[command(
    name = "driftpatch",
    about = "Applies a declarative, snippet-addressed patch to a text-file tree",
    disable_version_flag = true
)]
pub struct Cli {
    /// Patch document path, given positionally.
    pub file: Option<PathBuf>,

    /// Patch document path, given as a flag. Equivalent to the positional form.
    #[arg(long = "patch")]
    pub patch: Option<PathBuf>,

    /// Resolve and report the transaction exactly as a real apply would, without writing to disk.
    #[arg(long)]
    pub dry_run: bool,

    /// Summary rendering: a human-readable default, or JSON for scripted callers.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Include per-modification detail in the summary instead of only per-file totals.
    #[arg(long)]
    pub verbose: bool,

    /// Print the crate version and exit.
    #[arg(short = 'v', long = "version")]
    pub version: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl Cli {
    fn patch_path(&self) -> Option<&Path> {
        self.patch.as_deref().or(self.file.as_deref())
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Version,
    Summary(String),
}

/// Runs the whole CLI flow against a target tree rooted at `root` (the
/// current directory in `main`, an arbitrary tempdir in tests).
pub fn run(cli: &Cli, root: &Path) -> Result<RunOutcome, DriftPatchError> {
    if cli.version {
        return Ok(RunOutcome::Version);
    }

    let path = cli.patch_path().ok_or_else(|| {
        DriftPatchError::malformed(
            "a patch file path is required (positional argument or --patch <path>)",
        )
    })?;

    let text = std::fs::read_to_string(path).map_err(|error| DriftPatchError::io(path, error))?;
    let document = patch::parse(&text)?;

    let transaction = Transaction::new(root);
    let (sessions, report) = transaction.resolve(&document)?;

    if !cli.dry_run {
        commit::commit_sessions(&sessions)?;
    }

    Ok(RunOutcome::Summary(render_summary(&report, cli.format, cli.verbose)))
}

#[derive(Debug, Serialize)]
struct FileSummary {
    file: String,
    created: bool,
    applied: usize,
    skipped: usize,
}

#[derive(Debug, Serialize)]
struct ModificationSummary {
    file: String,
    index: usize,
    action: String,
    outcome: String,
}

#[derive(Debug, Serialize)]
struct JsonSummary {
    files: Vec<FileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modifications: Option<Vec<ModificationSummary>>,
}

fn outcome_label(outcome: ModificationOutcome) -> &'static str {
    match outcome {
        ModificationOutcome::Applied => "applied",
        ModificationOutcome::Skipped => "skipped",
    }
}

fn file_summaries(report: &TransactionReport) -> Vec<FileSummary> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for modification in &report.modifications {
        let key = modification.file.display().to_string();
        let entry = counts.entry(key).or_default();
        match modification.outcome {
            ModificationOutcome::Applied => entry.0 += 1,
            ModificationOutcome::Skipped => entry.1 += 1,
        }
    }

    report
        .files
        .iter()
        .map(|file| {
            let key = file.file.display().to_string();
            let (applied, skipped) = counts.get(&key).copied().unwrap_or((0, 0));
            FileSummary {
                file: key,
                created: file.created,
                applied,
                skipped,
            }
        })
        .collect()
}

fn render_summary(report: &TransactionReport, format: OutputFormat, verbose: bool) -> String {
    match format {
        OutputFormat::Json => render_json_summary(report, verbose),
        OutputFormat::Text => render_text_summary(report, verbose),
    }
}

fn render_json_summary(report: &TransactionReport, verbose: bool) -> String {
    let modifications = verbose.then(|| {
        report
            .modifications
            .iter()
            .map(|modification| ModificationSummary {
                file: modification.file.display().to_string(),
                index: modification.index,
                action: modification.action.to_string(),
                outcome: outcome_label(modification.outcome).to_string(),
            })
            .collect()
    });

    let summary = JsonSummary {
        files: file_summaries(report),
        modifications,
    };

    serde_json::to_string_pretty(&summary)
        .unwrap_or_else(|_| "{\"files\":[]}".to_string())
}

fn render_text_summary(report: &TransactionReport, verbose: bool) -> String {
    let mut lines = Vec::new();

    for file in file_summaries(report) {
        let mut line = format!("{}: {} applied, {} skipped", file.file, file.applied, file.skipped);
        if file.created {
            line.push_str(" (created)");
        }
        lines.push(line);
    }

    if verbose {
        lines.push(String::new());
        for modification in &report.modifications {
            lines.push(format!(
                "  [{}#{}] {} -> {}",
                modification.file.display(),
                modification.index,
                modification.action,
                outcome_label(modification.outcome)
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_patch(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn dry_run_resolves_without_writing_to_disk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("g.py"), "def f():\n    print(\"a\")\n").unwrap();
        let patch_path = write_patch(
            dir.path(),
            "patch.yaml",
            r#"
version: "2.0"
changes:
  - file_path: g.py
    modifications:
      - action: REPLACE
        snippet: "print(\"a\")"
        content: "print(\"b\")"
"#,
        );

        let cli = Cli {
            file: Some(patch_path),
            patch: None,
            dry_run: true,
            format: OutputFormat::Text,
            verbose: false,
            version: false,
        };

        let outcome = run(&cli, dir.path()).unwrap();
        match outcome {
            RunOutcome::Summary(summary) => assert!(summary.contains("1 applied")),
            RunOutcome::Version => panic!("expected a summary"),
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("g.py")).unwrap(),
            "def f():\n    print(\"a\")\n"
        );
    }

    #[test]
    fn real_run_writes_the_patched_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("g.py"), "def f():\n    print(\"a\")\n").unwrap();
        let patch_path = write_patch(
            dir.path(),
            "patch.yaml",
            r#"
version: "2.0"
changes:
  - file_path: g.py
    modifications:
      - action: REPLACE
        snippet: "print(\"a\")"
        content: "print(\"b\")"
"#,
        );

        let cli = Cli {
            file: Some(patch_path),
            patch: None,
            dry_run: false,
            format: OutputFormat::Json,
            verbose: true,
            version: false,
        };

        let outcome = run(&cli, dir.path()).unwrap();
        match outcome {
            RunOutcome::Summary(summary) => {
                assert!(summary.contains("\"applied\": 1"));
                assert!(summary.contains("\"modifications\""));
            }
            RunOutcome::Version => panic!("expected a summary"),
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("g.py")).unwrap(),
            "def f():\n    print(\"b\")\n"
        );
    }

    #[test]
    fn missing_patch_path_is_a_malformed_patch_error() {
        let dir = tempdir().unwrap();
        let cli = Cli {
            file: None,
            patch: None,
            dry_run: false,
            format: OutputFormat::Text,
            verbose: false,
            version: false,
        };
        let error = run(&cli, dir.path()).unwrap_err();
        assert!(matches!(error, DriftPatchError::MalformedPatch { .. }));
    }
}
