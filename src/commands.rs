//! Command handlers for dscheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use dscheduler_config::{Config, ConfigLoader, ConfigValidator, StoreBackend};
use dscheduler_core::{
    EventBus, ExecutableRegistry, FileJobStore, JobIdentity, JobQuery, JobRecord, JobRunner,
    JobService, JobSpec, JobStore, MemoryJobStore, Page, SearchField, SortField, SortOrder,
    seed_demo_jobs,
};

use crate::cli::{Commands, JobArgs, ListArgs};
use crate::listener::spawn_event_logger;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load and validate the configuration.
///
/// A missing file at the default path yields the built-in defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ConfigLoader::load(path)?,
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                ConfigLoader::load(&path)?
            } else {
                warn!("No config file at {}, using defaults", path.display());
                Config::default()
            }
        }
    };

    let result = ConfigValidator::validate(&config);
    for warning in &result.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        let reasons: Vec<String> = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        return Err(format!("invalid configuration: {}", reasons.join("; ")).into());
    }
    Ok(config)
}

/// Wire the store, registry and service from configuration.
async fn build_service(config: &Config) -> Result<JobService, Box<dyn std::error::Error>> {
    let store: Arc<dyn JobStore> = match config.store.backend {
        StoreBackend::File => {
            let path = config.store.resolved_path();
            Arc::new(FileJobStore::open(path).await?)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, jobs will not survive a restart");
            Arc::new(MemoryJobStore::new())
        }
    };
    let registry = Arc::new(ExecutableRegistry::with_builtin());

    Ok(JobService::new(
        store,
        registry,
        &config.cache,
        config.query.clone(),
    ))
}

/// Dispatch a parsed command.
pub(crate) async fn handle_command(command: Commands, config: Config) -> CmdResult {
    let service = build_service(&config).await?;

    match command {
        Commands::Run { seed } => run(service, &config, seed).await,
        Commands::List(args) => list(&service, args).await,
        Commands::Schedule {
            name,
            group,
            executable,
            cron,
            description,
        } => {
            let mut spec = JobSpec::new(name, group, executable, cron);
            if let Some(description) = description {
                spec = spec.with_description(description);
            }
            let identity = spec.identity();
            service.schedule_job(spec).await?;
            println!("Scheduled job {}", identity);
            Ok(())
        }
        Commands::Pause(args) => {
            let identity = identity(args);
            service.pause_job(&identity).await?;
            println!("Paused job {}", identity);
            Ok(())
        }
        Commands::Resume(args) => {
            let identity = identity(args);
            service.resume_job(&identity).await?;
            println!("Resumed job {}", identity);
            Ok(())
        }
        Commands::Delete(args) => {
            let identity = identity(args);
            service.delete_job(&identity).await?;
            println!("Deleted job {}", identity);
            Ok(())
        }
        Commands::PauseGroup { group } => {
            let count = service.pause_group(&group).await?;
            println!("Paused {} trigger(s) in group {}", count, group);
            Ok(())
        }
        Commands::ResumeGroup { group } => {
            let count = service.resume_group(&group).await?;
            println!("Resumed {} trigger(s) in group {}", count, group);
            Ok(())
        }
        Commands::Seed => {
            let report = seed_demo_jobs(&service, &config.seed).await?;
            println!(
                "Seeded demo jobs: {} created, {} skipped, {} failed",
                report.created, report.skipped, report.failed
            );
            Ok(())
        }
        Commands::Executables => {
            let keys = service.registry().list_keys();
            if keys.is_empty() {
                println!("No executables registered.");
            }
            for key in keys {
                println!("{}", key);
            }
            Ok(())
        }
    }
}

fn identity(args: JobArgs) -> JobIdentity {
    JobIdentity::new(args.name, args.group)
}

/// Run the trigger runner until Ctrl-C.
async fn run(service: JobService, config: &Config, seed: bool) -> CmdResult {
    info!("Starting dscheduler v{}", env!("CARGO_PKG_VERSION"));

    if seed || config.seed.on_startup {
        seed_demo_jobs(&service, &config.seed).await?;
    }

    if !config.runner.enabled {
        warn!("Runner disabled in configuration, nothing to run");
        return Ok(());
    }

    let events = EventBus::default();
    let logger = spawn_event_logger(&events);
    let runner = Arc::new(JobRunner::from_config(&service, events, &config.runner));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner_task = tokio::spawn(runner.run(cancel_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = cancel_tx.send(true);
    runner_task.await?;
    logger.abort();
    Ok(())
}

async fn list(service: &JobService, args: ListArgs) -> CmdResult {
    let mut query = JobQuery::new()
        .page(args.page)
        .size(args.size)
        .sort(SortField::parse(&args.sort), SortOrder::parse(&args.order));
    if let Some(term) = args.search {
        query = query.search(term, SearchField::parse(&args.search_field));
    }

    let page = service.list_jobs(&query).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&page)?),
        _ => print_table(&page),
    }
    Ok(())
}

fn print_table(page: &Page<JobRecord>) {
    if page.content.is_empty() {
        println!("No jobs found.");
    } else {
        println!(
            "{:<24} {:<16} {:<10} {:<20} {}",
            "NAME", "GROUP", "STATE", "CRON", "NEXT FIRE"
        );
        println!("{}", "-".repeat(96));
        for record in &page.content {
            let next = record
                .next_fire_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<24} {:<16} {:<10} {:<20} {}",
                record.job_name,
                record.job_group,
                record.trigger_state.as_str(),
                record.cron_expression.as_deref().unwrap_or("-"),
                next
            );
        }
    }
    println!(
        "\nPage {} of {} ({} jobs, {} per page)",
        page.current_page, page.total_pages, page.total_items, page.page_size
    );
}
