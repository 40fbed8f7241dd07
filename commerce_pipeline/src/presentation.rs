// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Surface
//!
//! Non-interactive entry points and the exit-code mapping. Exit codes:
//! `0` success, `1` validation failure, `2` processor failure,
//! `3` cancellation, `4` internal error.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commerce_pipeline_bootstrap::ExitCode;
use commerce_pipeline_domain::PipelineError;

/// Video commerce pipeline.
#[derive(Debug, Parser)]
#[command(name = "commerce_pipeline", version, about)]
pub struct Cli {
    /// Path to a configuration file (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Verbose logging.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a stack directly, without the queue.
    Run {
        /// Stack template id, e.g. `quick_test`.
        #[arg(long)]
        stack: String,
        /// Video URL or local path.
        #[arg(long)]
        video: String,
        /// JSON file with job/stack option overrides.
        #[arg(long)]
        options: Option<PathBuf>,
        /// Root directory for the run's sandbox.
        #[arg(long, default_value = "./work")]
        work_root: PathBuf,
        /// Provider set to register: `staging` or `production`.
        #[arg(long, default_value = "staging")]
        providers: String,
    },
    /// Start the queue worker.
    Worker,
    /// Admit a job: reserve credits, create the row, enqueue.
    Submit {
        #[arg(long)]
        user: String,
        /// Video URL or local path.
        #[arg(long)]
        video: String,
        /// Stack template id.
        #[arg(long, default_value = "full_staging")]
        stack: String,
        /// Callback URL for terminal notifications.
        #[arg(long)]
        callback_url: Option<String>,
    },
    /// Cancel a pending job.
    Cancel {
        #[arg(long)]
        job: String,
    },
    /// Show a job's status and progress.
    Status {
        #[arg(long)]
        job: String,
    },
    /// Grant credits to a user account (administrative).
    GrantCredits {
        #[arg(long)]
        user: String,
        #[arg(long)]
        amount: i64,
    },
    /// List the built-in stack templates.
    ListStacks,
    /// Statically validate a stack template.
    ValidateStack {
        #[arg(long)]
        stack: String,
    },
}

/// Maps the error taxonomy onto the CLI exit-code vocabulary.
pub fn exit_code_for(error: &PipelineError) -> ExitCode {
    match error {
        PipelineError::Validation(_)
        | PipelineError::StackNotFound(_)
        | PipelineError::ProcessorNotFound(_)
        | PipelineError::ProviderNotFound(_)
        | PipelineError::JobNotFound(_)
        | PipelineError::InsufficientCredits(_) => ExitCode::ValidationFailure,
        PipelineError::Precondition(_)
        | PipelineError::ProcessingFailed(_)
        | PipelineError::ProviderTransient(_)
        | PipelineError::ProviderPermanent(_)
        | PipelineError::Timeout(_) => ExitCode::ProcessorFailure,
        PipelineError::Cancelled(_) => ExitCode::Cancelled,
        PipelineError::Resource(_)
        | PipelineError::Io(_)
        | PipelineError::Database(_)
        | PipelineError::Serialization(_)
        | PipelineError::Internal(_) => ExitCode::InternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(
            exit_code_for(&PipelineError::validation("bad stack")),
            ExitCode::ValidationFailure
        );
        assert_eq!(
            exit_code_for(&PipelineError::processing_failed("no frames")),
            ExitCode::ProcessorFailure
        );
        assert_eq!(
            exit_code_for(&PipelineError::cancelled("signal")),
            ExitCode::Cancelled
        );
        assert_eq!(
            exit_code_for(&PipelineError::internal("bug")),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::parse_from([
            "commerce_pipeline",
            "run",
            "--stack",
            "quick_test",
            "--video",
            "https://host/x.mp4",
        ]);
        match cli.command {
            Command::Run { stack, video, .. } => {
                assert_eq!(stack, "quick_test");
                assert_eq!(video, "https://host/x.mp4");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
