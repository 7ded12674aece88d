//! CLI definitions for dscheduler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// dscheduler CLI.
#[derive(Parser)]
#[command(name = "dscheduler")]
#[command(about = "Manage recurring cron jobs over a durable job store")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: config/default.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the trigger runner in foreground (default)
    Run {
        /// Seed demo jobs before starting
        #[arg(long)]
        seed: bool,
    },

    /// List jobs
    List(ListArgs),

    /// Schedule a job, replacing any job with the same name and group
    Schedule {
        /// Job name
        #[arg(long)]
        name: String,

        /// Job group
        #[arg(long)]
        group: String,

        /// Registered executable key
        #[arg(long, default_value = "SampleJob")]
        executable: String,

        /// Cron expression (seconds minutes hours day-of-month month day-of-week)
        #[arg(long)]
        cron: String,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,
    },

    /// Pause a job's trigger
    Pause(JobArgs),

    /// Resume a paused job
    Resume(JobArgs),

    /// Delete a job and its trigger
    Delete(JobArgs),

    /// Pause every trigger in a group
    PauseGroup {
        /// Job group
        #[arg(long)]
        group: String,
    },

    /// Resume every trigger in a group
    ResumeGroup {
        /// Job group
        #[arg(long)]
        group: String,
    },

    /// Create the configured demo jobs
    Seed,

    /// List registered executables
    Executables,
}

#[derive(Args)]
pub(crate) struct JobArgs {
    /// Job name
    #[arg(long)]
    pub name: String,

    /// Job group
    #[arg(long)]
    pub group: String,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Page size (0 uses the configured default)
    #[arg(long, default_value_t = 0)]
    pub size: usize,

    /// Sort field (name, group, state)
    #[arg(long, default_value = "name")]
    pub sort: String,

    /// Sort order (asc, desc)
    #[arg(long, default_value = "asc")]
    pub order: String,

    /// Case-insensitive search term
    #[arg(long)]
    pub search: Option<String>,

    /// Field the search term applies to (name, group, cron, state)
    #[arg(long, default_value = "name")]
    pub search_field: String,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    pub format: String,
}
