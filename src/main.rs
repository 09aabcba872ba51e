use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use common::Database;
use common::cli::{CommonArgs, CommonCommands, utils};
use common::config::Configuration;
use common::storage::{PublicUrlBase, create_file_store};
use janitor::{CleanupJob, CleanupOptions, DailySchedule, run_guarded, spawn_scheduler};
use router::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "socio")]
#[command(about = "SOCIO backend: event platform API and nightly cleanup job")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<SocioCommands>,
}

#[derive(Subcommand)]
enum SocioCommands {
    /// Start the HTTP API and the cleanup scheduler (default)
    Serve,
    /// Run the cleanup job once and exit
    Cleanup {
        /// Day to clean up; yesterday in the configured offset when omitted
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        /// Log what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
    #[command(flatten)]
    Common(CommonCommands),
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT"),
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::info!("Received Ctrl+C");
    }

    Ok(())
}

/// Database and storage handles shared by the job and the HTTP handlers
async fn build_job(
    config: &Configuration,
    options: CleanupOptions,
) -> Result<(Database, Arc<CleanupJob>)> {
    let database = Database::from_config(&config.database)
        .await
        .context("Failed to connect to database")?;
    let files = create_file_store(config).context("Failed to initialize file storage")?;
    let public_base =
        PublicUrlBase::parse(&config.supabase.url).context("Invalid Supabase project URL")?;

    let job = Arc::new(CleanupJob::new(
        Arc::new(database.clone()),
        files,
        public_base,
        options,
    ));
    Ok((database, job))
}

async fn serve(config: Configuration) -> Result<()> {
    let schedule =
        DailySchedule::from_config(&config.cleanup).context("Invalid cleanup schedule")?;
    let (database, job) = build_job(&config, CleanupOptions::from(&config.cleanup)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.cleanup.enabled {
        log::info!(
            "Cleanup scheduled daily at {} ({}), match mode {}{}",
            schedule.time().format("%H:%M"),
            schedule.offset(),
            config.cleanup.match_mode,
            if config.cleanup.dry_run { ", dry-run" } else { "" }
        );
        Some(spawn_scheduler(job.clone(), schedule, shutdown_rx))
    } else {
        log::info!("Cleanup scheduler is disabled (cleanup.enabled = false)");
        None
    };

    let state = AppState::new(database, job, schedule, &config);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.http.bind, config.http.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid HTTP bind address {}:{}",
                config.http.bind, config.http.port
            )
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;

    log::info!("Server is running on port {}", config.http.port);
    log::info!("Health check available at: http://{addr}/api/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = wait_for_shutdown_signal().await {
                log::error!("Failed to wait for shutdown signal: {e}");
            }
            log::info!("Shutting down HTTP server");
        })
        .await
        .context("HTTP server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            log::error!("Cleanup scheduler task failed: {e}");
        }
    }

    log::info!("SOCIO backend stopped");
    Ok(())
}

async fn run_cleanup_once(
    config: Configuration,
    date: Option<NaiveDate>,
    dry_run: bool,
) -> Result<()> {
    let schedule =
        DailySchedule::from_config(&config.cleanup).context("Invalid cleanup schedule")?;
    let reference_date = date.unwrap_or_else(|| schedule.reference_date(Utc::now()));

    let mut options = CleanupOptions::from(&config.cleanup);
    options.dry_run |= dry_run;
    let (_database, job) = build_job(&config, options).await?;

    match run_guarded(job.clone(), reference_date).await {
        Some(report) => {
            job.metrics().summary().log();
            for error in &report.errors {
                log::warn!("{error}");
            }
            Ok(())
        }
        None => anyhow::bail!("Cleanup run for {reference_date} failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    // Load application configuration
    let config = utils::load_config(cli.common.config.as_ref())?;

    let command = cli.command.unwrap_or(SocioCommands::Serve);
    if let SocioCommands::Common(common_cmd) = &command {
        return utils::handle_common_command(common_cmd, &config);
    }

    utils::validate_config(&config)?;

    match command {
        SocioCommands::Cleanup { date, dry_run } => run_cleanup_once(config, date, dry_run).await,
        _ => serve(config).await,
    }
}
