//! `queuectl` — CLI front end for the persistent, multi-worker job queue.
//!
//! Subcommands mirror the original Typer app one-for-one (`worker`, `dlq`,
//! `config` sub-apps); `__worker-run` is a hidden subcommand that lets the
//! supervisor spawn workers by re-exec'ing this same binary rather than
//! shipping a second executable (spec.md §4.6).

mod commands;
mod logging;
mod output;
mod paths;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use queuectl_core::{ConfigStore, JobRepository, WorkerRepository};
use queuectl_sqlite::{SqliteConfigStore, SqliteJobRepository, SqliteWorkerRepository};
use queuectl_supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "queuectl")]
#[command(about = "CLI-based background job queue with retries, DLQ, and scheduling")]
struct Cli {
    /// Override the store location (defaults to $QUEUECTL_DB_PATH or ~/.queuectl/queue.db)
    #[arg(long, global = true, env = "QUEUECTL_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and seed default config if absent
    Init,

    /// Enqueue one or more jobs from inline JSON or --file
    Enqueue {
        job_data: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Report job-state counts, worker counts, oldest-pending age, average duration, config
    Status {
        #[arg(long = "json")]
        json: bool,
    },

    /// List jobs
    #[command(name = "list")]
    ListJobs {
        #[arg(short, long = "state")]
        state: Option<String>,
        #[arg(short, long)]
        limit: Option<i64>,
        #[arg(long)]
        pending_ready_only: bool,
        #[arg(long = "json")]
        json: bool,
    },

    /// Show stored stdout/stderr, exit code, duration for a job
    Logs { id: String },

    /// Manage worker processes
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },

    /// Manage the dead letter queue
    Dlq {
        #[command(subcommand)]
        command: DlqCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Hidden re-exec target: run a single worker loop in this process
    #[command(name = "__worker-run", hide = true)]
    WorkerRun {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Start N worker processes
    Start {
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Stop all running workers gracefully
    Stop,
}

#[derive(Subcommand)]
enum DlqCommands {
    /// List dead jobs
    List {
        #[arg(short, long)]
        limit: Option<i64>,
        #[arg(long = "json")]
        json: bool,
    },
    /// Transition a dead job back to pending
    Retry { id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Get configuration value(s), or all if key omitted
    Get { key: Option<String> },
    /// Set a configuration value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let db_path = cli.db_path.clone().unwrap_or_else(paths::db_path);

    let is_worker_run = matches!(cli.command, Commands::WorkerRun { .. });
    let log_dir = paths::log_dir();
    let _guard = if is_worker_run {
        let Commands::WorkerRun { ref id } = cli.command else {
            unreachable!()
        };
        logging::init(&log_dir, &format!("worker-{id}"))?
    } else {
        logging::init(&log_dir, "queuectl")?
    };

    let pool = queuectl_sqlite::connect(&db_path).await?;
    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let workers: Arc<dyn WorkerRepository> = Arc::new(SqliteWorkerRepository::new(pool.clone()));
    let config: Arc<dyn ConfigStore> = Arc::new(SqliteConfigStore::new(pool.clone()));
    let supervisor = Supervisor::new(paths::pid_file_path(), workers.clone());

    match cli.command {
        Commands::Init => commands::init::run(&db_path, &pool).await,

        Commands::Enqueue { job_data, file } => commands::enqueue::run(jobs, job_data, file).await,

        Commands::Status { json } => {
            commands::status::run(&db_path.to_string_lossy(), jobs, workers, config, &supervisor, json)
                .await
        }

        Commands::ListJobs {
            state,
            limit,
            pending_ready_only,
            json,
        } => commands::list::run(jobs, state, limit, pending_ready_only, json).await,

        Commands::Logs { id } => commands::logs::run(jobs, &id).await,

        Commands::Worker { command } => match command {
            WorkerCommands::Start { count } => commands::worker::start(&supervisor, count, &db_path).await,
            WorkerCommands::Stop => commands::worker::stop(&supervisor),
        },

        Commands::Dlq { command } => match command {
            DlqCommands::List { limit, json } => commands::dlq::list(jobs, limit, json).await,
            DlqCommands::Retry { id } => commands::dlq::retry(jobs, &id).await,
        },

        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => commands::config::get(config, key).await,
            ConfigCommands::Set { key, value } => commands::config::set(config, key, value).await,
        },

        Commands::WorkerRun { id } => commands::worker::run_worker(id, jobs, workers, config).await,
    }
}
