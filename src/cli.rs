//! CLI module for taskbeat
//!
//! Provides the scheduler loop plus task management commands:
//! - `run`: start the scheduler loop (ctrl-c to stop)
//! - `add` / `list` / `toggle` / `remove`: manage the task table
//! - `trigger`: execute a task immediately
//! - `records` / `stats`: inspect execution history

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use taskbeat_core::{
    ScheduledTask, SchedulerConfig, SchedulerEngine, SimulatedExecutor, TaskService, TaskStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Taskbeat scheduler CLI
#[derive(Parser, Debug)]
#[command(name = "taskbeat")]
#[command(about = "Recurring task scheduler with dependency gating and retry backoff")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scheduler loop
    Run,
    /// Create a new task
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Cron expression, 5-field (minute hour day month weekday)
        #[arg(long)]
        cron: String,
        /// Category tag
        #[arg(long, default_value = "default")]
        task_type: String,
        /// Id of a task that must succeed before this one runs
        #[arg(long)]
        depends_on: Option<Uuid>,
        /// Retry budget per schedule slot
        #[arg(long, default_value_t = 3)]
        max_retries: i32,
    },
    /// List all tasks
    List,
    /// Execute a task immediately
    Trigger {
        /// Task id
        id: Uuid,
    },
    /// Show recent execution records
    Records {
        /// Maximum number of records to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show aggregate statistics
    Stats,
    /// Enable or disable a task
    Toggle {
        /// Task id
        id: Uuid,
    },
    /// Delete a task and its execution history
    Remove {
        /// Task id
        id: Uuid,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let config = crate::loader::load_config()?;

    let store = Arc::new(
        TaskStore::from_path(Path::new(&config.database.path))
            .await
            .with_context(|| format!("Failed to open task store at {}", config.database.path))?,
    );
    let scheduler_config = SchedulerConfig::new()
        .with_tick_interval(config.scheduler.tick_interval_secs)
        .with_execution_timeout(config.scheduler.execution_timeout_secs);
    let engine = Arc::new(SchedulerEngine::new(
        store.clone(),
        Arc::new(SimulatedExecutor::new()),
        scheduler_config,
    ));
    let service = TaskService::new(store, engine.clone());

    match command {
        Commands::Run => run_scheduler(engine).await,
        Commands::Add {
            name,
            cron,
            task_type,
            depends_on,
            max_retries,
        } => {
            let mut task = ScheduledTask::new(name, cron)
                .with_task_type(task_type)
                .with_max_retries(max_retries);
            if let Some(dependency_id) = depends_on {
                task = task.with_dependency(dependency_id);
            }

            let task = service.create_task(task).await?;
            println!("Created task '{}' ({})", task.name, task.id);
            if let Some(next) = task.next_run_time {
                println!("First run at {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            Ok(())
        }
        Commands::List => {
            let tasks = service.list_tasks().await?;
            if tasks.is_empty() {
                println!("No tasks defined");
                return Ok(());
            }
            for task in tasks {
                let next = task
                    .next_run_time
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "unscheduled".to_string());
                let state = if task.enabled { "enabled" } else { "disabled" };
                println!(
                    "{}  {:<24} {:<9} {:<9} next: {}  [{}]",
                    task.id,
                    task.name,
                    task.status.to_string(),
                    state,
                    next,
                    task.cron_expression,
                );
            }
            Ok(())
        }
        Commands::Trigger { id } => {
            let outcome = service.trigger_task(id).await?;
            println!("Task '{}' finished: {}", outcome.name, outcome.status);
            println!("  {}", outcome.message);
            if let Some(next) = outcome.next_run_time {
                println!("  next run at {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            Ok(())
        }
        Commands::Records { limit } => {
            let entries = service.records(limit).await?;
            if entries.is_empty() {
                println!("No execution records");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "{}  {:<24} {:<9} {:>8.2}s  {}",
                    entry.record.started_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.task_name,
                    entry.record.status.to_string(),
                    entry.record.duration_secs,
                    entry.record.message,
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let stats = service.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Toggle { id } => {
            let task = service.toggle_task(id).await?;
            println!(
                "Task '{}' is now {}",
                task.name,
                if task.enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        Commands::Remove { id } => {
            service.delete_task(id).await?;
            println!("Removed task {}", id);
            Ok(())
        }
    }
}

/// Run the scheduler loop until interrupted
async fn run_scheduler(engine: Arc<SchedulerEngine>) -> Result<()> {
    info!("Starting taskbeat v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let loop_token = shutdown.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = engine.run(loop_token).await {
            error!("Scheduler error: {}", e);
        }
    });

    wait_for_shutdown_signal().await;
    shutdown.cancel();
    handle.await.context("Scheduler loop panicked")?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
