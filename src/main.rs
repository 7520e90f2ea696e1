use std::process::ExitCode;

use clap::Parser;
use driftpatch::cli::{self, Cli, RunOutcome};
use driftpatch::error::DriftPatchError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.format;

    match cli::run(&cli, &std::env::current_dir().unwrap_or_default()) {
        Ok(RunOutcome::Version) => {
            println!("driftpatch {}", driftpatch::version());
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Summary(summary)) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", render_error(&error, format));
            ExitCode::FAILURE
        }
    }
}

fn render_error(error: &DriftPatchError, format: cli::OutputFormat) -> String {
    match format {
        cli::OutputFormat::Json => serde_json::to_string_pretty(&error.to_error_response())
            .unwrap_or_else(|_| {
                "{\"error\":{\"type\":\"serialization_error\",\"message\":\"failed to serialize error response\"}}"
                    .to_string()
            }),
        cli::OutputFormat::Text => format!("error: {error}"),
    }
}
