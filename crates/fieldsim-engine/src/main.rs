//! Engine binary for the fieldsim field-device simulator.
//!
//! Wires the tag store, the device scheduler and the Lua script bridge
//! together and runs them until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load settings from `fieldsim.yaml` (path overridable with
//!    `FIELDSIM_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load and validate the device definitions
//! 4. Build the tag store and every device model
//! 5. Initialize the script bridge (a failure disables scripting only)
//! 6. Start the scheduler and the bridge
//! 7. On Ctrl-C, stop both and log the totals

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use fieldsim_core::config::{LoggingConfig, ScriptSettings};
use fieldsim_core::{
    LogFormat, Simulation, SimulationScheduler, SimulatorConfig, build_simulation,
    load_definitions,
};
use fieldsim_devices::ModelCatalog;
use fieldsim_script::{ScriptBridge, write_template_if_missing};
use fieldsim_tags::TagStore;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming the settings file.
const CONFIG_ENV: &str = "FIELDSIM_CONFIG";

/// Settings file used when `FIELDSIM_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "fieldsim.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the shutdown signal
/// cannot be awaited.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var(CONFIG_ENV).map_or_else(
        |_| PathBuf::from(DEFAULT_CONFIG_PATH),
        PathBuf::from,
    );
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_logging(&config.logging);
    info!(
        config = %config_path.display(),
        devices = %config.devices.path.display(),
        tick_interval_ms = config.simulation.tick_interval_ms,
        seed = ?config.simulation.seed,
        script_enabled = config.script.enabled,
        script = %config.script.path.display(),
        scan_interval_ms = config.script.scan_interval_ms,
        "fieldsim-engine starting"
    );

    run(config).await.context("fieldsim-engine failed")?;
    Ok(())
}

/// Read the settings file, or fall back to defaults when it does not exist.
/// Environment overrides apply either way.
fn load_config(path: &Path) -> Result<SimulatorConfig, EngineError> {
    if path.exists() {
        Ok(SimulatorConfig::from_file(path)?)
    } else {
        Ok(SimulatorConfig::parse("")?)
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(config: SimulatorConfig) -> Result<(), EngineError> {
    let defs = load_definitions(&config.devices.path)?;
    let catalog = ModelCatalog::builtin();
    let Simulation { store, models } =
        build_simulation(&defs, &catalog, config.simulation.seed)?;
    let store = Arc::new(store);

    info!(summary = %store.summary(), "tag store ready");
    for tag in store.iter() {
        debug!(
            tag = tag.name(),
            address = tag.address(),
            kind = %tag.kind(),
            description = tag.description(),
            "tag"
        );
    }

    let scheduler =
        SimulationScheduler::from_settings(Arc::clone(&store), models, &config.simulation);
    info!(devices = scheduler.device_count(), "device models ready");

    let bridge = init_script(&config.script, &store).await;

    scheduler.start();
    if let Some(bridge) = &bridge {
        bridge.start()?;
    }
    info!("fieldsim-engine running, press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    info!("shutdown requested");

    if let Some(bridge) = &bridge {
        bridge.stop().await;
    }
    scheduler.stop().await;
    info!(
        ticks = scheduler.tick_count(),
        scans = bridge.as_ref().map_or(0, ScriptBridge::scan_count),
        "fieldsim-engine stopped"
    );

    signal.map_err(|source| EngineError::Signal { source })
}

/// Build and initialize the script bridge. Any failure is logged and leaves
/// the simulation running without scripting.
async fn init_script(settings: &ScriptSettings, store: &Arc<TagStore>) -> Option<ScriptBridge> {
    if !settings.enabled {
        info!("scripting disabled by configuration");
        return None;
    }

    if settings.write_template_if_missing {
        if let Err(e) = write_template_if_missing(&settings.path, store, &settings.table_name) {
            warn!(path = %settings.path.display(), error = %e, "failed to write script template");
        }
    }

    let bridge = ScriptBridge::from_settings(Arc::clone(store), settings);
    match bridge.initialize().await {
        Ok(()) => Some(bridge),
        Err(e) => {
            warn!(
                path = %settings.path.display(),
                error = %e,
                "script bridge disabled, simulation continues without logic"
            );
            None
        }
    }
}
