use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared across the SOCIO binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands that never start the service
#[derive(Subcommand, Debug, Clone)]
pub enum CommonCommands {
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::{Configuration, DEFAULT_CONFIG_FILE, redact_dsn};
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Initialize logging based on CLI arguments; `RUST_LOG` wins when set
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => {
                log::debug!("Loading configuration from {DEFAULT_CONFIG_FILE} and environment");
                Configuration::load().context("Failed to load configuration")
            }
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let mut redacted = config.clone();
            redacted.database.dsn = redact_dsn(&redacted.database.dsn);
            if !redacted.supabase.service_role_key.is_empty() {
                redacted.supabase.service_role_key = "<redacted>".to_string();
            }
            if redacted.auth.admin_key.is_some() {
                redacted.auth.admin_key = Some("<redacted>".to_string());
            }
            let json = serde_json::to_string_pretty(&redacted)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("SOCIO Configuration:");
            println!("====================");
            println!("Database DSN: {}", redact_dsn(&config.database.dsn));
            println!("Supabase URL: {}", config.supabase.url);
            println!("Storage backend: {:?}", config.storage.backend);
            println!(
                "Cleanup: enabled={} at {:02}:{:02} {} (match={}, dry_run={})",
                config.cleanup.enabled,
                config.cleanup.hour,
                config.cleanup.minute,
                config.cleanup.utc_offset,
                config.cleanup.match_mode,
                config.cleanup.dry_run
            );
            println!("HTTP: {}:{}", config.http.bind, config.http.port);
            println!("Allowed sign-in domain: {}", config.auth.allowed_domain);
            println!(
                "Admin API: {}",
                if config.auth.admin_key.is_some() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");
        config.validate().context("Configuration validation failed")?;
        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't require starting services
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<()> {
        match command {
            CommonCommands::Config { json } => display_config(config, *json),
            CommonCommands::Validate => validate_config(config),
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(())
            }
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
