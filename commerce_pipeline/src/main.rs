// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Binary Entry Point
//!
//! Wires bootstrap (signals, shutdown, exit codes) to the application
//! commands. Each subcommand builds only the collaborators it needs; the
//! worker command assembles the full runtime.

use clap::Parser;
use std::collections::BTreeSet;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use commerce_pipeline::application::services::{JobService, SubmitJobRequest, WorkerService};
use commerce_pipeline::application::use_cases::{run_stack, RunStackRequest};
use commerce_pipeline::infrastructure::config::AppConfig;
use commerce_pipeline::infrastructure::logging::init_tracing;
use commerce_pipeline::infrastructure::metrics::MetricsService;
use commerce_pipeline::infrastructure::notification::HttpCallbackTransport;
use commerce_pipeline::infrastructure::processors::register_builtin_processors;
use commerce_pipeline::infrastructure::providers::{register_providers, ProviderMode};
use commerce_pipeline::infrastructure::queue::SqliteJobQueue;
use commerce_pipeline::infrastructure::repositories::schema::initialize_database;
use commerce_pipeline::infrastructure::repositories::{SqliteCreditLedger, SqliteJobRepository};
use commerce_pipeline::infrastructure::runtime::StackExecutor;
use commerce_pipeline::infrastructure::templates;
use commerce_pipeline::presentation::{exit_code_for, Cli, Command};
use commerce_pipeline::{
    CancellationToken, DataPath, JobConfig, JobId, PipelineError, ProcessorRegistry,
    ProviderRegistry,
};
use commerce_pipeline_bootstrap::{ExitCode, ShutdownCoordinator};
use commerce_pipeline_domain::services::stack_validator::validate_stack;

#[tokio::main]
async fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let coordinator = ShutdownCoordinator::default();
    coordinator.listen_for_signals();

    match dispatch(cli, &coordinator).await {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            eprintln!("error: {}", error);
            exit_code_for(&error).into()
        }
    }
}

async fn dispatch(cli: Cli, coordinator: &ShutdownCoordinator) -> Result<(), PipelineError> {
    match cli.command {
        Command::Run {
            stack,
            video,
            options,
            work_root,
            providers,
        } => {
            let provider_mode: ProviderMode = providers.parse()?;
            let cancel = CancellationToken::new();
            let shutdown = coordinator.token();
            let cancel_for_signal = cancel.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                cancel_for_signal.cancel();
            });

            let outcome = run_stack(
                RunStackRequest {
                    stack_id: stack,
                    video,
                    options_file: options,
                    work_root,
                    provider_mode,
                },
                cancel,
            )
            .await?;

            println!(
                "completed: steps={} early_termination={} frames={} timing: {}",
                outcome.executed_steps,
                outcome.terminated_early,
                outcome.data.metadata.frames.len(),
                outcome.timer
            );
            Ok(())
        }

        Command::Worker => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let pool = initialize_database(&config.database_url)
                .await
                .map_err(|e| PipelineError::database_error(e.to_string()))?;

            let store = Arc::new(SqliteJobRepository::new(pool.clone()));
            let queue = Arc::new(SqliteJobQueue::new(pool.clone()));
            let credits = Arc::new(SqliteCreditLedger::new(pool));
            let webhook = Arc::new(
                commerce_pipeline::application::services::WebhookService::new(
                    Arc::new(HttpCallbackTransport::new()?),
                    config.webhook.secret.clone(),
                ),
            );

            let processors = Arc::new(ProcessorRegistry::new());
            register_builtin_processors(&processors)?;
            processors.seal();
            let providers = Arc::new(ProviderRegistry::new());
            register_providers(&providers, config.provider_mode)?;

            let jobs = Arc::new(JobService::new(
                store.clone(),
                queue.clone(),
                credits,
                webhook,
            ));
            let worker = WorkerService::new(
                store,
                queue,
                jobs,
                Arc::new(StackExecutor::new(processors)),
                providers,
                Arc::new(MetricsService::new()?),
                config,
            );
            worker.run(coordinator.token()).await
        }

        Command::Submit {
            user,
            video,
            stack,
            callback_url,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let pool = initialize_database(&config.database_url)
                .await
                .map_err(|e| PipelineError::database_error(e.to_string()))?;
            let store = Arc::new(SqliteJobRepository::new(pool.clone()));
            let queue = Arc::new(SqliteJobQueue::new(pool.clone()));
            let credits = Arc::new(SqliteCreditLedger::new(pool));
            let webhook = Arc::new(
                commerce_pipeline::application::services::WebhookService::new(
                    Arc::new(HttpCallbackTransport::new()?),
                    config.webhook.secret.clone(),
                ),
            );
            let jobs = JobService::new(store, queue, credits, webhook);

            let job = jobs
                .submit(SubmitJobRequest {
                    user_id: user,
                    video_url: video,
                    stack_id: stack,
                    config: JobConfig::default(),
                    callback_url,
                    api_key_id: None,
                })
                .await?;
            println!("{}", job.id());
            Ok(())
        }

        Command::Cancel { job } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let pool = initialize_database(&config.database_url)
                .await
                .map_err(|e| PipelineError::database_error(e.to_string()))?;
            let store = Arc::new(SqliteJobRepository::new(pool.clone()));
            let queue = Arc::new(SqliteJobQueue::new(pool.clone()));
            let credits = Arc::new(SqliteCreditLedger::new(pool));
            let webhook = Arc::new(
                commerce_pipeline::application::services::WebhookService::new(
                    Arc::new(HttpCallbackTransport::new()?),
                    config.webhook.secret.clone(),
                ),
            );
            let jobs = JobService::new(store, queue, credits, webhook);
            let cancelled = jobs.cancel(&JobId::parse(&job)?).await?;
            println!("{} {}", cancelled.id(), cancelled.status().as_str());
            Ok(())
        }

        Command::Status { job } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let pool = initialize_database(&config.database_url)
                .await
                .map_err(|e| PipelineError::database_error(e.to_string()))?;
            let store = SqliteJobRepository::new(pool);
            let job = commerce_pipeline_domain::JobStore::load(&store, &JobId::parse(&job)?).await?;
            println!(
                "{} status={} step={} progress={:.1}%{}",
                job.id(),
                job.status().as_str(),
                job.progress().step,
                job.progress().percentage,
                job.error().map(|e| format!(" error={}", e)).unwrap_or_default()
            );
            Ok(())
        }

        Command::GrantCredits { user, amount } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let pool = initialize_database(&config.database_url)
                .await
                .map_err(|e| PipelineError::database_error(e.to_string()))?;
            let ledger = SqliteCreditLedger::new(pool);
            ledger.grant(&user, amount).await?;
            println!("{} balance={}", user, ledger.balance(&user).await?);
            Ok(())
        }

        Command::ListStacks => {
            let processors = ProcessorRegistry::new();
            register_builtin_processors(&processors)?;
            let io_cache = commerce_pipeline_domain::services::stack_validator::IoSetCache::new();

            for template in templates::builtin_templates() {
                let steps: Vec<&str> =
                    template.steps.iter().map(|s| s.processor.as_str()).collect();
                let (required, produced) = io_cache.io_sets(&template, &processors);
                let required: Vec<&str> = required.iter().map(|p| p.as_str()).collect();
                let produced: Vec<&str> = produced.iter().map(|p| p.as_str()).collect();
                println!(
                    "{:<24} {:<32} [{}] requires=[{}] produces=[{}]",
                    template.id,
                    template.name,
                    steps.join(" -> "),
                    required.join(", "),
                    produced.join(", ")
                );
            }
            Ok(())
        }

        Command::ValidateStack { stack } => {
            let template = templates::template_by_id(&stack)
                .ok_or_else(|| PipelineError::StackNotFound(stack.clone()))?;

            let processors = ProcessorRegistry::new();
            register_builtin_processors(&processors)?;

            let initial = BTreeSet::from([DataPath::Video]);
            let report = validate_stack(&template, &processors, &initial);
            if report.valid {
                let outputs: Vec<&str> =
                    report.available_outputs.iter().map(|p| p.as_str()).collect();
                println!("{} valid; outputs: [{}]", stack, outputs.join(", "));
                Ok(())
            } else {
                Err(PipelineError::validation(report.errors.join("; ")))
            }
        }
    }
}
