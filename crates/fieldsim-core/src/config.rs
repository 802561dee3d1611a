//! Simulator settings and device definition loading.
//!
//! Two files drive a run:
//!
//! - `fieldsim.yaml` -- [`SimulatorConfig`]: tick interval, seed, script
//!   settings, logging. Every field has a default, so an empty file is valid.
//! - the device definitions file (`sensors.json` by default) -- a list of
//!   [`DeviceDefinition`]s under a top-level `devices` key (`sensors` is
//!   accepted too). JSON or YAML, chosen by file extension.
//!
//! Definitions are validated up front and any problem is fatal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fieldsim_devices::{DeviceError, DeviceModel, ModelCatalog};
use fieldsim_tags::{TagError, TagStore};
use fieldsim_types::DeviceDefinition;
use serde::Deserialize;
use tracing::info;

/// Overrides `devices.path`.
pub const ENV_DEVICES: &str = "FIELDSIM_DEVICES";

/// Overrides `script.path`.
pub const ENV_SCRIPT: &str = "FIELDSIM_SCRIPT";

/// Overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "FIELDSIM_LOG_LEVEL";

/// Minimum length of a device address, prefix included.
const MIN_ADDRESS_LEN: usize = 4;

/// Errors that can occur when loading configuration or definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// The definitions file extension is neither JSON nor YAML.
    #[error("unsupported definitions format: {}", path.display())]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },

    /// The definitions are structurally invalid.
    #[error("invalid device definitions: {0}")]
    Validation(#[from] ValidationError),

    /// A device model could not be built.
    #[error("device model error: {0}")]
    Device(#[from] DeviceError),

    /// The tag store could not be populated.
    #[error("tag store error: {0}")]
    Tag(#[from] TagError),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Structural problems in a definitions list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The list is empty.
    #[error("no devices defined")]
    Empty,

    /// A required string field is empty.
    #[error("device at index {index} has an empty {field}")]
    EmptyField {
        /// Position in the list.
        index: usize,
        /// Which field.
        field: &'static str,
    },

    /// `updateIntervalMs` is zero or negative.
    #[error("device {device} has invalid updateIntervalMs: {value}")]
    InvalidInterval {
        /// The device.
        device: String,
        /// The configured value.
        value: i64,
    },

    /// Two devices share a name.
    #[error("duplicate device name: {0}")]
    DuplicateName(String),

    /// Two devices share an address.
    #[error("duplicate device address {address} (used by {device})")]
    DuplicateAddress {
        /// The shared address.
        address: String,
        /// The second device using it.
        device: String,
    },

    /// An address does not look like `%XXn`.
    #[error("device {device} has invalid address {address} (expected e.g. %DF100 or %DW10)")]
    InvalidAddress {
        /// The device.
        device: String,
        /// The offending address.
        address: String,
    },
}

/// Top-level simulator settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    /// Scheduler timing and seeding.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Where the device definitions live.
    #[serde(default)]
    pub devices: DevicesConfig,

    /// Script bridge settings.
    #[serde(default)]
    pub script: ScriptSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulatorConfig {
    /// Load settings from a YAML file, then apply environment overrides:
    /// - `FIELDSIM_DEVICES` overrides `devices.path`
    /// - `FIELDSIM_SCRIPT` overrides `script.path`
    /// - `FIELDSIM_LOG_LEVEL` overrides `logging.level`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse settings from a YAML string, then apply environment overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse settings from a YAML string, ignoring the environment.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from `lookup`, which maps an environment variable name
    /// to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ENV_DEVICES) {
            self.devices.path = PathBuf::from(val);
        }
        if let Some(val) = lookup(ENV_SCRIPT) {
            self.script.path = PathBuf::from(val);
        }
        if let Some(val) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = val;
        }
    }
}

/// Scheduler timing and seeding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSettings {
    /// Milliseconds between scheduler ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Run-wide seed; absent means every device seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Log every device's value once per this many ticks (0 disables).
    #[serde(default = "default_log_every_ticks")]
    pub log_every_ticks: u64,
}

impl SimulationSettings {
    /// The tick interval as a [`Duration`], never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            seed: None,
            log_every_ticks: default_log_every_ticks(),
        }
    }
}

/// Where the device definitions live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DevicesConfig {
    /// Path to the definitions file.
    #[serde(default = "default_devices_path")]
    pub path: PathBuf,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            path: default_devices_path(),
        }
    }
}

/// Script bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptSettings {
    /// Whether to run the script bridge at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the Lua logic file.
    #[serde(default = "default_script_path")]
    pub path: PathBuf,

    /// Milliseconds between script scans.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Name of the global table mirroring the tags.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Write a starter script listing every tag when `path` does not exist.
    #[serde(default)]
    pub write_template_if_missing: bool,
}

impl ScriptSettings {
    /// The scan interval as a [`Duration`], never zero.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_script_path(),
            scan_interval_ms: default_scan_interval_ms(),
            table_name: default_table_name(),
            write_template_if_missing: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_log_every_ticks() -> u64 {
    20
}

const fn default_scan_interval_ms() -> u64 {
    100
}

const fn default_true() -> bool {
    true
}

fn default_devices_path() -> PathBuf {
    PathBuf::from("sensors.json")
}

fn default_script_path() -> PathBuf {
    PathBuf::from("plc_logic.lua")
}

fn default_table_name() -> String {
    String::from("Data")
}

fn default_log_level() -> String {
    String::from("info")
}

/// On-disk layout of the definitions file.
#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    #[serde(alias = "sensors")]
    devices: Vec<DeviceDefinition>,
}

/// Serialization format of a definitions file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl DefinitionFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Read and validate the definitions file at `path`.
pub fn load_definitions(path: &Path) -> Result<Vec<DeviceDefinition>, ConfigError> {
    let format = DefinitionFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let contents = std::fs::read_to_string(path)?;
    let defs = parse_definitions(&contents, format)?;
    info!(path = %path.display(), devices = defs.len(), "device definitions loaded");
    Ok(defs)
}

/// Parse and validate definitions from a string.
pub fn parse_definitions(
    contents: &str,
    format: DefinitionFormat,
) -> Result<Vec<DeviceDefinition>, ConfigError> {
    let file: DefinitionsFile = match format {
        DefinitionFormat::Json => serde_json::from_str(contents)?,
        DefinitionFormat::Yaml => serde_yml::from_str(contents)?,
    };
    validate_definitions(&file.devices)?;
    Ok(file.devices)
}

/// Check a definitions list for structural problems, stopping at the first.
pub fn validate_definitions(defs: &[DeviceDefinition]) -> Result<(), ValidationError> {
    if defs.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut names = HashSet::new();
    let mut addresses = HashSet::new();

    for (index, def) in defs.iter().enumerate() {
        for (field, value) in [
            ("name", &def.name),
            ("type", &def.device_type),
            ("address", &def.address),
        ] {
            if value.is_empty() {
                return Err(ValidationError::EmptyField { index, field });
            }
        }

        if def.update_interval_ms <= 0 {
            return Err(ValidationError::InvalidInterval {
                device: def.name.clone(),
                value: def.update_interval_ms,
            });
        }

        if !names.insert(def.name.as_str()) {
            return Err(ValidationError::DuplicateName(def.name.clone()));
        }

        if !addresses.insert(def.address.as_str()) {
            return Err(ValidationError::DuplicateAddress {
                address: def.address.clone(),
                device: def.name.clone(),
            });
        }

        if def.address.chars().count() < MIN_ADDRESS_LEN || !def.address.starts_with('%') {
            return Err(ValidationError::InvalidAddress {
                device: def.name.clone(),
                address: def.address.clone(),
            });
        }
    }

    Ok(())
}

/// A populated tag store and its device models, ready for the scheduler.
#[derive(Debug)]
pub struct Simulation {
    /// One tag per device.
    pub store: TagStore,
    /// One model per device, in definition order.
    pub models: Vec<Box<dyn DeviceModel>>,
}

/// Validate `defs` against `catalog`, then build the tag store and every
/// model. Nothing is partially built on failure.
pub fn build_simulation(
    defs: &[DeviceDefinition],
    catalog: &ModelCatalog,
    seed: Option<u64>,
) -> Result<Simulation, ConfigError> {
    validate_definitions(defs)?;
    catalog.validate(defs)?;
    let store = TagStore::from_definitions(defs)?;
    let models = catalog.build_all(defs, seed)?;
    info!(summary = %store.summary(), devices = models.len(), "simulation built");
    Ok(Simulation { store, models })
}
