//! The YAML patch dialect (§4.9, §6): the canonical, fully-attributed
//! surface syntax. Accepts both the v1.0 nested `target: {...}` locator
//! shape and the v2.0 flat-field shape; both lower to the same
//! [`PatchDocument`].

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::DriftPatchError;
use crate::patch::document::{
    Action, FileChange, Modification, NewlineStyle, PatchDocument, SnippetLocator,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatchDocumentWire {
    version: String,
    #[serde(default)]
    changes: Vec<FileChangeWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileChangeWire {
    file_path: String,
    #[serde(default)]
    newline: Option<String>,
    #[serde(default)]
    modifications: Vec<ModificationWire>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum ActionKind {
    Replace,
    InsertAfter,
    InsertBefore,
    Delete,
    CreateFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetWire {
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    start_snippet: Option<String>,
    #[serde(default)]
    end_snippet: Option<String>,
    #[serde(default)]
    anchor: Option<String>,
    #[serde(default)]
    include_leading_blank_lines: Option<usize>,
    #[serde(default)]
    include_trailing_blank_lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModificationWire {
    action: ActionKind,
    #[serde(default)]
    target: Option<TargetWire>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    start_snippet: Option<String>,
    #[serde(default)]
    end_snippet: Option<String>,
    #[serde(default)]
    anchor: Option<String>,
    #[serde(default)]
    include_leading_blank_lines: Option<usize>,
    #[serde(default)]
    include_trailing_blank_lines: Option<usize>,
    #[serde(default)]
    content: Option<String>,
}

struct LocatorFields {
    snippet: Option<String>,
    start_snippet: Option<String>,
    end_snippet: Option<String>,
    anchor: Option<String>,
    leading: usize,
    trailing: usize,
}

/// Merges the v1.0 nested `target` shape and the v2.0 flat-field shape.
/// The two are mutually exclusive per modification.
fn resolve_locator_fields(wire: &ModificationWire) -> Result<LocatorFields, DriftPatchError> {
    let flat_present = wire.snippet.is_some()
        || wire.start_snippet.is_some()
        || wire.end_snippet.is_some()
        || wire.anchor.is_some()
        || wire.include_leading_blank_lines.is_some()
        || wire.include_trailing_blank_lines.is_some();

    if wire.target.is_some() && flat_present {
        return Err(DriftPatchError::malformed(
            "modification carries both a v1.0 `target` block and v2.0 flat locator fields",
        ));
    }

    if let Some(target) = &wire.target {
        return Ok(LocatorFields {
            snippet: target.snippet.clone(),
            start_snippet: target.start_snippet.clone(),
            end_snippet: target.end_snippet.clone(),
            anchor: target.anchor.clone(),
            leading: target.include_leading_blank_lines.unwrap_or(0),
            trailing: target.include_trailing_blank_lines.unwrap_or(0),
        });
    }

    Ok(LocatorFields {
        snippet: wire.snippet.clone(),
        start_snippet: wire.start_snippet.clone(),
        end_snippet: wire.end_snippet.clone(),
        anchor: wire.anchor.clone(),
        leading: wire.include_leading_blank_lines.unwrap_or(0),
        trailing: wire.include_trailing_blank_lines.unwrap_or(0),
    })
}

fn resolve_point_or_range(fields: &LocatorFields) -> Result<SnippetLocator, DriftPatchError> {
    match (&fields.snippet, &fields.start_snippet, &fields.end_snippet) {
        (Some(snippet), None, None) => Ok(SnippetLocator::Point(snippet.clone())),
        (None, Some(start), Some(end)) => Ok(SnippetLocator::Range {
            start: start.clone(),
            end: end.clone(),
        }),
        (None, None, None) => Err(DriftPatchError::malformed(
            "modification requires either `snippet` or `start_snippet`+`end_snippet`",
        )),
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(DriftPatchError::malformed(
            "`snippet` and `start_snippet`/`end_snippet` are mutually exclusive",
        )),
        (None, Some(_), None) => Err(DriftPatchError::malformed(
            "`start_snippet` requires a matching `end_snippet`",
        )),
        (None, None, Some(_)) => Err(DriftPatchError::malformed(
            "`end_snippet` requires a matching `start_snippet`",
        )),
    }
}

fn require_content(wire: &ModificationWire, action_name: &str) -> Result<String, DriftPatchError> {
    wire.content.clone().ok_or_else(|| {
        DriftPatchError::malformed(format!("{action_name} requires `content`"))
    })
}

fn reject_content(wire: &ModificationWire, action_name: &str) -> Result<(), DriftPatchError> {
    if wire.content.is_some() {
        return Err(DriftPatchError::malformed(format!(
            "{action_name} does not accept `content`"
        )));
    }
    Ok(())
}

fn build_modification(wire: ModificationWire) -> Result<Modification, DriftPatchError> {
    let fields = resolve_locator_fields(&wire)?;

    let action = match wire.action {
        ActionKind::Replace => {
            let locator = resolve_point_or_range(&fields)?;
            let content = require_content(&wire, "REPLACE")?;
            Action::Replace { locator, content }
        }
        ActionKind::Delete => {
            let locator = resolve_point_or_range(&fields)?;
            reject_content(&wire, "DELETE")?;
            Action::Delete { locator }
        }
        ActionKind::InsertAfter | ActionKind::InsertBefore => {
            if fields.start_snippet.is_some() || fields.end_snippet.is_some() {
                return Err(DriftPatchError::malformed(
                    "INSERT_AFTER/INSERT_BEFORE accept only a point `snippet`, not a range",
                ));
            }
            let snippet = fields.snippet.clone().ok_or_else(|| {
                DriftPatchError::malformed("INSERT_AFTER/INSERT_BEFORE require `snippet`")
            })?;
            let content = require_content(
                &wire,
                if matches!(wire.action, ActionKind::InsertAfter) {
                    "INSERT_AFTER"
                } else {
                    "INSERT_BEFORE"
                },
            )?;
            if matches!(wire.action, ActionKind::InsertAfter) {
                Action::InsertAfter { snippet, content }
            } else {
                Action::InsertBefore { snippet, content }
            }
        }
        ActionKind::CreateFile => {
            if fields.snippet.is_some()
                || fields.start_snippet.is_some()
                || fields.end_snippet.is_some()
                || fields.anchor.is_some()
            {
                return Err(DriftPatchError::malformed(
                    "CREATE_FILE does not accept a snippet, range, or anchor",
                ));
            }
            let content = require_content(&wire, "CREATE_FILE")?;
            Action::CreateFile { content }
        }
    };

    Ok(Modification {
        action,
        anchor: fields.anchor,
        include_leading_blank_lines: fields.leading,
        include_trailing_blank_lines: fields.trailing,
    })
}

fn build_file_change(wire: FileChangeWire) -> Result<FileChange, DriftPatchError> {
    let newline = match wire.newline {
        Some(value) => Some(NewlineStyle::parse(&value).ok_or_else(|| {
            DriftPatchError::malformed(format!(
                "'{value}' is not a recognized newline style (expected LF, CRLF, or CR)"
            ))
        })?),
        None => None,
    };

    let modifications = wire
        .modifications
        .into_iter()
        .map(build_modification)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FileChange {
        file_path: PathBuf::from(wire.file_path),
        modifications,
        newline,
    })
}

pub fn parse(text: &str) -> Result<PatchDocument, DriftPatchError> {
    let wire: PatchDocumentWire = serde_yaml::from_str(text)
        .map_err(|error| DriftPatchError::malformed(error.to_string()))?;

    let changes = wire
        .changes
        .into_iter()
        .map(build_file_change)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PatchDocument {
        version: wire.version,
        changes,
    })
}
