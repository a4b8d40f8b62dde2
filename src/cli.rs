//! Command-line interface.
//!
//! ```bash
//! # Analyze a recording captured with a 5 V step
//! transient-analysis analyze data/step.csv --input-voltage 5
//!
//! # Show a request and the latest result of its document
//! transient-analysis status 6f1c0f9e-8d4e-4d8e-9a43-2b0b8f3c1d11
//!
//! # Re-run pending and failed requests
//! transient-analysis retry
//! ```

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::app::{AnalysisSubmission, App};
use crate::executor::RunOutcome;

/// Step-response analysis of recorded transients
#[derive(Parser, Debug)]
#[command(name = "transient-analysis")]
#[command(author, version, about = "Analyze recorded step responses of dynamic systems")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a recording, analyze it and print the result
    Analyze(AnalyzeArgs),

    /// Show an analysis request and the latest result of its document
    Status {
        request_id: Uuid,
    },

    /// List every result version of a document, newest first
    Results {
        document_id: Uuid,
    },

    /// Re-run all pending and failed requests
    Retry,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Local path or http(s):// URL of the CSV recording
    pub file: String,

    /// Amplitude of the applied step, in volts
    #[arg(long, allow_negative_numbers = true)]
    pub input_voltage: f64,

    /// Name to store the recording under (defaults to the file name)
    #[arg(long)]
    pub filename: Option<String>,

    #[arg(long)]
    pub comment: Option<String>,
}

/// Execute `command` and print its JSON view to stdout.
pub async fn run(command: Commands, app: &App) -> Result<()> {
    match command {
        Commands::Analyze(args) => {
            let (outcome, view) = app
                .analyze(AnalysisSubmission {
                    location: args.file,
                    input_voltage: args.input_voltage,
                    filename: args.filename,
                    comment: args.comment,
                })
                .await?;
            print_json(&view)?;
            if let RunOutcome::Failed { error } = outcome {
                bail!("analysis failed: {error}");
            }
        }
        Commands::Status { request_id } => print_json(&app.status(request_id).await?)?,
        Commands::Results { document_id } => print_json(&app.history(document_id).await?)?,
        Commands::Retry => print_json(&app.retry().await?)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_with_negative_voltage() {
        let cli = Cli::try_parse_from([
            "transient-analysis",
            "analyze",
            "step.csv",
            "--input-voltage",
            "-2.5",
            "--comment",
            "reverse step",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.file, "step.csv");
                assert_eq!(args.input_voltage, -2.5);
                assert_eq!(args.filename, None);
                assert_eq!(args.comment.as_deref(), Some("reverse step"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn analyze_requires_input_voltage() {
        assert!(Cli::try_parse_from(["transient-analysis", "analyze", "step.csv"]).is_err());
    }

    #[test]
    fn status_requires_a_uuid() {
        assert!(Cli::try_parse_from(["transient-analysis", "status", "not-a-uuid"]).is_err());
    }

    #[test]
    fn verifies_command_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
