use anyhow::{Context, Result};
use cfgsnap::config::{self, Config};
use cfgsnap::managers::backup::BackupEngine;
use cfgsnap::managers::logging;
use cfgsnap::managers::scheduler::Scheduler;
use cfgsnap::registry::PluginRegistry;
use cfgsnap::sinks::StorageSink;
use cfgsnap::store::{DeviceCache, JsonDeviceCache};
use cfgsnap::transport::ssh::SshTransport;
use cfgsnap::transport::Timeouts;
use cfgsnap::utils::expand_tilde;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cfgsnap")]
#[command(about = "Network device configuration backup", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cfgsnap.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backup for the whole fleet or a single device
    Run {
        /// Back up only this device (must already be in the cache)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Refresh the device cache from inventory sources without backing up
    Sync,

    /// Show scheduler and fleet status
    Status,

    /// List cached devices
    Devices,

    /// Show stored snapshots for a device
    Snapshots {
        /// Device name
        #[arg(short, long)]
        device: String,
    },

    /// Print a stored configuration snapshot
    Show {
        /// Device name
        #[arg(short, long)]
        device: String,

        /// Snapshot identifier (defaults to the most recent)
        #[arg(short, long)]
        snapshot: Option<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Run in the foreground, firing backups on the cron schedule
    Daemon,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Validate never needs file logging; report problems on the console
    if matches!(cli.command, Some(Commands::Validate)) {
        logging::init_console_logging();
        return handle_validate(&cli.config);
    }

    let config = config::load_config(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let _log_guard = logging::init_logging(&config.global)?;

    let command = cli.command.unwrap_or(Commands::Status);

    match command {
        Commands::Run { device } => {
            let mut lock = data_dir_lock(&config)?;
            let _guard = acquire_or_exit(&mut lock);
            let scheduler = build_scheduler(config)?;
            if let Some(name) = device {
                println!("Backing up device: {}", name);
                scheduler.backup_single(&name)?;
                println!("✓ Backup completed");
            } else {
                println!("Running backup for all devices...");
                match scheduler.run_backup() {
                    Some(summary) => {
                        println!(
                            "✓ Run finished: {} succeeded ({} degraded), {} failed, {} total",
                            summary.success, summary.degraded, summary.failed, summary.total
                        );
                        if summary.failed > 0 {
                            std::process::exit(1);
                        }
                    }
                    None => {
                        eprintln!("✗ Another run is already in flight");
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Sync => {
            let mut lock = data_dir_lock(&config)?;
            let _guard = acquire_or_exit(&mut lock);
            let scheduler = build_scheduler(config)?;
            let seen = scheduler.sync_devices();
            println!("✓ Synced {} devices", seen);
        }

        Commands::Status => {
            let cache = open_cache(&config)?;
            let scheduler = build_scheduler(config)?;
            let status = scheduler.status();

            println!("=== cfgsnap status ===\n");
            println!(
                "Scheduler: {}",
                if status.is_active { "armed" } else { "disabled" }
            );
            if let Some(cron) = &status.cron {
                println!("Schedule: {}", cron);
            }
            if let Some(next) = status.next_run {
                println!("Next run: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
            }

            let devices = cache.all()?;
            println!("\nDevices cached: {}", devices.len());
            let now = Utc::now();
            for device in &devices {
                let age = match device.last_backup {
                    Some(t) => {
                        let hours = now.signed_duration_since(t).num_hours();
                        format!("last backup {}h ago", hours)
                    }
                    None => "never backed up".to_string(),
                };
                println!("  {} ({}) - {}", device.name, device.host, age);
            }
        }

        Commands::Devices => {
            let cache = open_cache(&config)?;
            let devices = cache.all()?;
            if devices.is_empty() {
                println!("No devices cached. Run 'cfgsnap sync' first.");
            } else {
                println!("{:<24} {:<20} {:<16} {}", "NAME", "HOST", "TYPE", "LAST BACKUP");
                for device in &devices {
                    let last = device
                        .last_backup
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<24} {:<20} {:<16} {}",
                        device.name, device.host, device.device_type, last
                    );
                }
            }
        }

        Commands::Snapshots { device } => {
            let sinks = resolve_sinks(&config)?;
            let now = Utc::now();
            for sink in &sinks {
                let snapshots = sink.history(&device)?;
                println!("Sink: {}", sink.name());
                if snapshots.is_empty() {
                    println!("  No snapshots found.\n");
                    continue;
                }
                println!("  {:<44} {:<22} {}", "ID", "DATE", "AGE");
                for snap in &snapshots {
                    println!(
                        "  {:<44} {:<22} {}",
                        snap.id,
                        snap.creation_time.format("%Y-%m-%d %H:%M:%S"),
                        snap.age_label(now)
                    );
                }
                println!("\n  Total: {} snapshots\n", snapshots.len());
            }
        }

        Commands::Show { device, snapshot } => {
            let sinks = resolve_sinks(&config)?;
            let sink = sinks
                .first()
                .context("no storage sinks configured")?;
            let content = match snapshot {
                Some(id) => sink.read(&device, &id)?,
                None => sink.read_latest(&device)?,
            };
            print!("{}", content);
        }

        Commands::Daemon => {
            let mut lock = data_dir_lock(&config)?;
            let guard = acquire_or_exit(&mut lock);

            let scheduler = build_scheduler(config)?;
            scheduler.run_loop();
            drop(guard);
        }

        Commands::Validate => unreachable!("handled before config loading"),
    }

    Ok(())
}

fn build_scheduler(config: Config) -> Result<Arc<Scheduler>> {
    let cache = open_cache(&config)?;
    let registry = Arc::new(PluginRegistry::with_builtins());

    let timeouts = Timeouts {
        connect: Duration::from_secs(config.global.connect_timeout_seconds),
        command: Duration::from_secs(config.global.command_timeout_seconds),
    };
    let engine = BackupEngine::new(Arc::new(SshTransport::new()), timeouts);

    Ok(Arc::new(Scheduler::new(config, registry, engine, cache)?))
}

/// Cross-process guard on the data directory. The daemon, manual runs and
/// syncs all take it, so two processes can never interleave device-cache
/// writes or backup runs.
fn data_dir_lock(config: &Config) -> Result<fd_lock::RwLock<fs::File>> {
    let data_dir = expand_tilde(&config.global.data_dir);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {:?}", data_dir))?;

    let lock_path = data_dir.join("cfgsnap.lock");
    let lock_file = fs::File::create(&lock_path)
        .with_context(|| format!("failed to create lock file {:?}", lock_path))?;
    Ok(fd_lock::RwLock::new(lock_file))
}

fn acquire_or_exit(lock: &mut fd_lock::RwLock<fs::File>) -> fd_lock::RwLockWriteGuard<'_, fs::File> {
    match lock.try_write() {
        Ok(guard) => guard,
        Err(_) => {
            eprintln!("✗ Another cfgsnap process is using the data directory");
            std::process::exit(1);
        }
    }
}

fn open_cache(config: &Config) -> Result<Arc<JsonDeviceCache>> {
    let data_dir = expand_tilde(&config.global.data_dir);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {:?}", data_dir))?;
    Ok(Arc::new(JsonDeviceCache::open(data_dir.join("devices.json"))?))
}

fn resolve_sinks(config: &Config) -> Result<Vec<Arc<dyn StorageSink>>> {
    let registry = PluginRegistry::with_builtins();
    let mut sinks = Vec::new();
    for spec in &config.sinks {
        sinks.push(registry.resolve_sink(&spec.type_name, &spec.config)?);
    }
    Ok(sinks)
}

fn handle_validate(path: &PathBuf) -> Result<()> {
    let config = config::load_config(path)
        .with_context(|| format!("failed to load config from {:?}", path))?;

    println!("Configuration is valid!");
    println!("Sources: {}", config.sources.len());
    println!("Sinks: {}", config.sinks.len());
    match &config.scheduler.cron {
        Some(cron) => println!("Schedule: {}", cron),
        None => println!("Schedule: none (manual runs only)"),
    }
    Ok(())
}
