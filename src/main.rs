use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use sandy_tap::config::{CliConfig, StorageBackend};
use sandy_tap::core::{Engine, EngineRules, ManualClock};
use sandy_tap::store::{FileStore, KeyValueStore, MemoryStore, Snapshot};
use sandy_tap::ui::Display;
use sandy_tap::{Config, TapInterface, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const SIMULATED_TAP_SPACING_MS: i64 = 100;
const MAX_SIMULATED_IDLE_SECS: i64 = 7 * 86_400;

#[derive(Parser)]
#[command(name = "sandy")]
#[command(about = "Tap for points, spend energy, fire boosters")]
#[command(version = VERSION)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Key-value store file
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Keep everything in memory for this run
    #[arg(long, global = true)]
    memory: bool,

    /// UI theme
    #[arg(long, global = true)]
    theme: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Interactive session (default)
    Play,
    /// Register taps and report the points earned
    Tap {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
    /// Spend one of today's boosters
    Boost,
    /// Show points, energy, rank and boosters
    Status,
    /// Clear stored progress
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Replay a session on a simulated clock without touching storage
    Simulate {
        #[arg(long)]
        taps: u32,
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..=MAX_SIMULATED_IDLE_SECS))]
        idle_secs: i64,
        #[arg(long)]
        boost: bool,
    },
    /// Write a snapshot of the current progress
    Export { path: PathBuf },
    /// Restore progress from a snapshot
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_layered(cli.config.as_deref()).context("Failed to load configuration")?;
    config.merge_with_cli(CliConfig {
        store_path: cli.store.clone(),
        in_memory: cli.memory,
        log_level: None,
        debug: cli.debug,
        theme: cli.theme.clone(),
    });
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("sandy_tap={},warn", config.logging.level))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Sandy Tap v{}", VERSION);

    let display = Display::from_config(&config.ui)?;
    let rules = config.rules();

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            let engine = Engine::with_system_clock(open_store(&config)?, rules)?;
            let shared = Arc::new(tokio::sync::Mutex::new(engine));
            let mut interface = TapInterface::new(shared, config).await?;

            if let Err(e) = interface.run().await {
                error!("Session error: {}", e);
                eprintln!("An error occurred: {}", e);
                std::process::exit(1);
            }
        }
        Command::Tap { count } => {
            let mut engine = Engine::with_system_clock(open_store(&config)?, rules)?;
            let mut total = 0u64;
            let mut landed = 0;
            for _ in 0..count {
                let result = engine.register_tap();
                if let Some(reason) = result.rejection {
                    display.show_warning(&reason.to_string())?;
                    break;
                }
                total = total.saturating_add(result.granted);
                landed += 1;
            }
            display.show_success(&format!("{} tap(s), +{} points", landed, total))?;
            display.show_status(&engine.state(), rules.energy_max, config.ui.show_rank)?;
        }
        Command::Boost => {
            let mut engine = Engine::with_system_clock(open_store(&config)?, rules)?;
            let result = engine.activate_booster();
            match result.rejection {
                None => display.show_success(&format!(
                    "Booster activated, {} left today",
                    engine.state().boosts_remaining
                ))?,
                Some(reason) => display.show_warning(&reason.to_string())?,
            }
        }
        Command::Status => {
            let engine = Engine::with_system_clock(open_store(&config)?, rules)?;
            display.show_status(&engine.state(), rules.energy_max, config.ui.show_rank)?;
        }
        Command::Reset { yes } => {
            let confirmed = yes
                || dialoguer::Confirm::new()
                    .with_prompt("Reset all points, combo and boosters?")
                    .default(false)
                    .interact()?;
            if confirmed {
                let mut engine = Engine::with_system_clock(open_store(&config)?, rules)?;
                engine.reset_progress()?;
                display.show_success("Progress reset")?;
            } else {
                display.show_message("Reset cancelled.", "info")?;
            }
        }
        Command::Simulate { taps, idle_secs, boost } => {
            let engine = simulate(rules, taps, idle_secs, boost)?;
            for event in engine.get_event_history() {
                display.show_event(event)?;
            }
            display.show_status(&engine.state(), rules.energy_max, config.ui.show_rank)?;
            println!("{}", serde_json::to_string_pretty(&engine.state())?);
        }
        Command::Export { path } => {
            let engine = Engine::with_system_clock(open_store(&config)?, rules)?;
            engine.snapshot().export_to(&path)?;
            display.show_success(&format!("Exported to {}", path.display()))?;
        }
        Command::Import { path } => {
            let snapshot = Snapshot::import_from(&path)?;
            let mut engine = Engine::with_system_clock(open_store(&config)?, rules)?;
            engine.restore_snapshot(&snapshot)?;
            display.show_success(&format!("Imported {} points", engine.state().points))?;
        }
    }

    info!("Session ended");
    Ok(())
}

fn open_store(config: &Config) -> Result<Box<dyn KeyValueStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StorageBackend::File => {
            let path = config.get_store_path();
            let store = FileStore::open(path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Box::new(store))
        }
    }
}

/// Runs taps spaced 100ms apart on a manual clock, then idles.
fn simulate(rules: EngineRules, taps: u32, idle_secs: i64, boost: bool) -> Result<Engine> {
    if !(0..=MAX_SIMULATED_IDLE_SECS).contains(&idle_secs) {
        bail!("Idle time must be between 0 and {} seconds", MAX_SIMULATED_IDLE_SECS);
    }

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut engine = Engine::new(MemoryStore::new(), clock.clone(), rules)?;

    if boost {
        engine.activate_booster();
    }

    for _ in 0..taps {
        clock.advance_ms(SIMULATED_TAP_SPACING_MS);
        if !engine.register_tap().success {
            break;
        }
    }

    clock.advance(Duration::seconds(idle_secs));
    engine.run_due_timers();
    Ok(engine)
}
