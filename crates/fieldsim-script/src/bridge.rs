//! The script bridge: runs Lua control logic against the tag store.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Initialized --start--> Running --stop--> Stopped
//!                                                         ^                  |
//!                                                         +------start-------+
//! ```
//!
//! Initialization registers the host functions, mirrors every tag into a
//! global table, executes the script chunk, runs the optional `init()` hook,
//! and checks that `run_logic()` exists.
//!
//! # Scans
//!
//! Every scan refreshes the table from the store, calls `run_logic()`, then
//! writes every table entry that names a tag back through the store's
//! coercing `set`. A script error skips the write-back for that scan only.
//!
//! The interpreter is single-threaded. Each scan moves it onto the blocking
//! pool and back, so scans never overlap and a slow script never stalls the
//! async runtime.
//!
//! # Host functions
//!
//! | Lua                    | Returns                                  |
//! |------------------------|------------------------------------------|
//! | `get_tag(name)`        | `value, nil` or `nil, err`               |
//! | `set_tag(name, value)` | `true, nil` or `false, err`              |
//! | `log(message)`         | nothing; logs at info                    |
//! | `now()`                | seconds since the Unix epoch (float)     |
//! | `sleep(ms)`            | nothing; blocks the scan                 |
//!
//! `plc_log` and `get_time` are kept as aliases of `log` and `now`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fieldsim_core::TaskControl;
use fieldsim_core::config::ScriptSettings;
use fieldsim_tags::TagStore;
use fieldsim_types::TagValue;
use mlua::{AppDataRef, Lua, Table, Value};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ScriptError;

/// Name of the required per-scan entry point.
const ENTRY_POINT: &str = "run_logic";

/// Name of the optional one-time hook.
const INIT_HOOK: &str = "init";

/// An info line is logged once per this many scans.
const SCAN_LOG_EVERY: u64 = 100;

/// Where the script code comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A Lua file on disk, read at initialization.
    File(PathBuf),
    /// Code held in memory.
    Inline {
        /// Name used in error messages.
        name: String,
        /// The Lua source.
        code: String,
    },
}

impl ScriptSource {
    /// Inline source with a display name.
    pub fn inline(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Inline {
            name: name.into(),
            code: code.into(),
        }
    }

    /// Display name of the source.
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Inline { name, .. } => name.clone(),
        }
    }

    /// Chunk name handed to the interpreter. `@` marks a file and `=` a
    /// literal name in Lua error messages.
    fn chunk_name(&self) -> String {
        match self {
            Self::File(path) => format!("@{}", path.display()),
            Self::Inline { name, .. } => format!("={name}"),
        }
    }

    fn read(&self) -> Result<String, ScriptError> {
        match self {
            Self::File(path) => std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
                path: path.clone(),
                source,
            }),
            Self::Inline { code, .. } => Ok(code.clone()),
        }
    }
}

/// Lifecycle state of a [`ScriptBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No interpreter yet.
    Uninitialized,
    /// Script loaded; scans may be run by hand.
    Initialized,
    /// The periodic scan loop is running.
    Running,
    /// The scan loop was stopped; it may be started again.
    Stopped,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// State visible to host functions, stored in the interpreter's app data.
#[derive(Debug)]
pub struct BridgeContext {
    /// The shared tag store.
    pub store: Arc<TagStore>,
    /// Name of the global tag table.
    pub table_name: String,
    /// Display name of the running script.
    pub script_name: String,
}

/// Outcome of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Scan number, starting at 1.
    pub scan: u64,
    /// Tags written back from the table.
    pub written: usize,
    /// Table entries that were nil or not a scalar.
    pub skipped: usize,
    /// Tags whose write-back was rejected by the store.
    pub failed: usize,
    /// Set when the script raised an error; nothing was written back.
    pub error: Option<ScriptError>,
}

impl ScanReport {
    /// Whether `run_logic` completed without error.
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
struct Inner {
    store: Arc<TagStore>,
    source: ScriptSource,
    table_name: String,
    scan_interval: Duration,
    state: Mutex<BridgeState>,
    interpreter: tokio::sync::Mutex<Option<Lua>>,
    scans: AtomicU64,
    control: TaskControl,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Runs a Lua script against a shared tag store.
///
/// Cloning is cheap and every clone drives the same bridge.
#[derive(Debug, Clone)]
pub struct ScriptBridge {
    inner: Arc<Inner>,
}

impl ScriptBridge {
    /// An uninitialized bridge.
    pub fn new(
        store: Arc<TagStore>,
        source: ScriptSource,
        table_name: impl Into<String>,
        scan_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                table_name: table_name.into(),
                scan_interval: scan_interval.max(Duration::from_millis(1)),
                state: Mutex::new(BridgeState::Uninitialized),
                interpreter: tokio::sync::Mutex::new(None),
                scans: AtomicU64::new(0),
                control: TaskControl::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// An uninitialized bridge for the script file named in `settings`.
    pub fn from_settings(store: Arc<TagStore>, settings: &ScriptSettings) -> Self {
        Self::new(
            store,
            ScriptSource::File(settings.path.clone()),
            settings.table_name.clone(),
            settings.scan_interval(),
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        *self.inner.state.lock()
    }

    /// Name of the global tag table.
    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    /// Number of scans run so far.
    pub fn scan_count(&self) -> u64 {
        self.inner.scans.load(Ordering::Acquire)
    }

    /// Load the script and prepare the interpreter.
    ///
    /// On failure the bridge stays uninitialized.
    pub async fn initialize(&self) -> Result<(), ScriptError> {
        let mut slot = self.inner.interpreter.lock().await;
        let state = self.state();
        if state != BridgeState::Uninitialized {
            return Err(ScriptError::InvalidState {
                operation: "initialize",
                state,
            });
        }

        let context = BridgeContext {
            store: Arc::clone(&self.inner.store),
            table_name: self.inner.table_name.clone(),
            script_name: self.inner.source.name(),
        };
        let source = self.inner.source.clone();
        let lua = tokio::task::spawn_blocking(move || load_interpreter(&source, context))
            .await
            .map_err(|e| ScriptError::Runtime {
                source: mlua::Error::runtime(format!("initialization task failed: {e}")),
            })??;

        *slot = Some(lua);
        *self.inner.state.lock() = BridgeState::Initialized;
        info!(
            script = %self.inner.source.name(),
            table = %self.inner.table_name,
            tags = self.inner.store.len(),
            "script bridge initialized"
        );
        Ok(())
    }

    /// Run one scan now.
    ///
    /// Waits for any scan in progress. Script errors are reported in the
    /// returned [`ScanReport`]; `Err` means no scan could run.
    pub async fn scan(&self) -> Result<ScanReport, ScriptError> {
        self.inner.scan().await
    }

    /// Start the periodic scan loop. Returns `Ok(false)` if it was already
    /// running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<bool, ScriptError> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                BridgeState::Running => return Ok(false),
                BridgeState::Uninitialized => {
                    return Err(ScriptError::InvalidState {
                        operation: "start",
                        state: *state,
                    });
                }
                BridgeState::Initialized | BridgeState::Stopped => {
                    if !self.inner.control.mark_running() {
                        // The previous loop has not finished winding down.
                        return Ok(false);
                    }
                    *state = BridgeState::Running;
                }
            }
        }

        self.inner.control.clear_stop();
        info!(
            interval_ms = self.inner.scan_interval.as_millis(),
            "script scan loop started"
        );
        let handle = tokio::spawn(Arc::clone(&self.inner).run());
        *self.inner.task.lock() = Some(handle);
        Ok(true)
    }

    /// Stop the scan loop and wait for it to finish. A scan in progress
    /// completes first. Does nothing unless the loop is running.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != BridgeState::Running {
                return;
            }
            *state = BridgeState::Stopped;
        }

        self.inner.control.request_stop();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "script task ended abnormally");
            }
        }
        info!(scans = self.scan_count(), "script scan loop stopped");
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                () = self.control.stopped() => break,
                _ = interval.tick() => {}
            }
            if self.control.is_stop_requested() {
                break;
            }
            match self.scan().await {
                Ok(report) if report.scan.checked_rem(SCAN_LOG_EVERY) == Some(0) => {
                    info!(scans = report.scan, "script scans completed");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "script scan could not run"),
            }
        }

        self.control.mark_stopped();
    }

    async fn scan(&self) -> Result<ScanReport, ScriptError> {
        let mut slot = self.interpreter.lock().await;
        let Some(lua) = slot.take() else {
            return Err(ScriptError::InvalidState {
                operation: "scan",
                state: *self.state.lock(),
            });
        };

        let scan = self.scans.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let store = Arc::clone(&self.store);
        let table_name = self.table_name.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let report = run_scan(&lua, &store, &table_name, scan);
            (lua, report)
        })
        .await;

        match joined {
            Ok((lua, report)) => {
                *slot = Some(lua);
                Ok(report)
            }
            Err(e) => {
                // The interpreter went down with the task; later scans will
                // report an invalid state.
                warn!(scan, error = %e, "script scan task failed");
                Err(ScriptError::Runtime {
                    source: mlua::Error::runtime(format!("scan task failed: {e}")),
                })
            }
        }
    }
}

/// Build an interpreter with the host functions and tag table installed,
/// then execute the script.
fn load_interpreter(source: &ScriptSource, context: BridgeContext) -> Result<Lua, ScriptError> {
    let name = source.name();
    let code = source.read()?;
    let load_err = |source| ScriptError::Load {
        name: name.clone(),
        source,
    };

    let lua = Lua::new();
    let table_name = context.table_name.clone();
    let store = Arc::clone(&context.store);
    lua.set_app_data(context);
    register_host_functions(&lua).map_err(load_err)?;
    refresh_table(&lua, &store, &table_name).map_err(load_err)?;

    lua.load(code.as_str())
        .set_name(source.chunk_name())
        .exec()
        .map_err(load_err)?;

    match lua.globals().get::<Value>(INIT_HOOK).map_err(load_err)? {
        Value::Function(init) => match init.call::<()>(()) {
            Ok(()) => debug!(script = %name, "init() completed"),
            Err(e) => warn!(script = %name, error = %e, "init() failed"),
        },
        Value::Nil => {}
        other => warn!(script = %name, found = other.type_name(), "init is not a function"),
    }

    if !matches!(
        lua.globals().get::<Value>(ENTRY_POINT).map_err(load_err)?,
        Value::Function(_)
    ) {
        return Err(ScriptError::MissingEntryPoint { name });
    }

    Ok(lua)
}

fn register_host_functions(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    globals.set("get_tag", lua.create_function(get_tag)?)?;
    globals.set("set_tag", lua.create_function(set_tag)?)?;
    globals.set("log", lua.create_function(log)?)?;
    globals.set("plc_log", lua.create_function(log)?)?;
    globals.set("now", lua.create_function(now)?)?;
    globals.set("get_time", lua.create_function(now)?)?;
    globals.set("sleep", lua.create_function(sleep)?)?;
    Ok(())
}

fn context(lua: &Lua) -> mlua::Result<AppDataRef<'_, BridgeContext>> {
    lua.app_data_ref::<BridgeContext>()
        .ok_or_else(|| mlua::Error::runtime("bridge context is not installed"))
}

fn error_value(lua: &Lua, message: impl AsRef<str>) -> mlua::Result<Value> {
    Ok(Value::String(lua.create_string(message.as_ref())?))
}

// Host functions receive owned arguments from mlua.
#[allow(clippy::needless_pass_by_value)]
fn get_tag(lua: &Lua, name: String) -> mlua::Result<(Value, Value)> {
    let ctx = context(lua)?;
    match ctx.store.get(&name) {
        Ok(value) => Ok((to_lua(lua, &value)?, Value::Nil)),
        Err(e) => Ok((Value::Nil, error_value(lua, e.to_string())?)),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn set_tag(lua: &Lua, (name, value): (String, Value)) -> mlua::Result<(bool, Value)> {
    let ctx = context(lua)?;
    let Some(value) = from_lua(&value) else {
        return Ok((false, error_value(lua, "unsupported value type")?));
    };
    match ctx.store.set(&name, value) {
        Ok(stored) => {
            // Keep the table in step so this scan's write-back does not
            // overwrite the new value with the stale one.
            if let Value::Table(table) = lua.globals().raw_get::<Value>(ctx.table_name.as_str())? {
                table.raw_set(name.as_str(), to_lua(lua, &stored)?)?;
            }
            Ok((true, Value::Nil))
        }
        Err(e) => Ok((false, error_value(lua, e.to_string())?)),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn log(lua: &Lua, message: String) -> mlua::Result<()> {
    let ctx = context(lua)?;
    info!(script = %ctx.script_name, "{message}");
    Ok(())
}

// Microseconds since the epoch fit well inside f64's mantissa.
#[allow(clippy::cast_precision_loss)]
fn now(_: &Lua, (): ()) -> mlua::Result<f64> {
    Ok(chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0)
}

fn sleep(_: &Lua, ms: i64) -> mlua::Result<()> {
    let ms = u64::try_from(ms).unwrap_or(0);
    std::thread::sleep(Duration::from_millis(ms));
    Ok(())
}

/// Convert a tag value into a Lua value.
fn to_lua(lua: &Lua, value: &TagValue) -> mlua::Result<Value> {
    Ok(match value {
        TagValue::Float(v) => Value::Number(*v),
        TagValue::Integer(v) => Value::Integer(i64::from(*v)),
        TagValue::Boolean(v) => Value::Boolean(*v),
        TagValue::Text(v) => Value::String(lua.create_string(v)?),
    })
}

/// Convert a scalar Lua value into a tag value. `None` for nil, tables,
/// functions and other non-scalars.
#[allow(clippy::cast_precision_loss)]
fn from_lua(value: &Value) -> Option<TagValue> {
    match value {
        Value::Boolean(v) => Some(TagValue::Boolean(*v)),
        Value::Integer(v) => Some(
            i32::try_from(*v).map_or_else(|_| TagValue::Float(*v as f64), TagValue::Integer),
        ),
        Value::Number(v) => Some(TagValue::Float(*v)),
        Value::String(s) => s.to_str().ok().map(|text| TagValue::Text(text.to_string())),
        _ => None,
    }
}

/// Mirror every tag into the global table, creating it if the script
/// removed or replaced it.
fn refresh_table(lua: &Lua, store: &TagStore, table_name: &str) -> mlua::Result<Table> {
    let globals = lua.globals();
    let table = if let Value::Table(table) = globals.raw_get::<Value>(table_name)? {
        table
    } else {
        let table = lua.create_table()?;
        globals.raw_set(table_name, table.clone())?;
        table
    };
    for tag in store.iter() {
        table.raw_set(tag.name(), to_lua(lua, &tag.value())?)?;
    }
    Ok(table)
}

fn run_scan(lua: &Lua, store: &TagStore, table_name: &str, scan: u64) -> ScanReport {
    let mut report = ScanReport {
        scan,
        ..ScanReport::default()
    };

    if let Err(source) = refresh_table(lua, store, table_name) {
        warn!(scan, error = %source, "tag table refresh failed");
        report.error = Some(ScriptError::Runtime { source });
        return report;
    }

    let logic = match lua.globals().get::<Value>(ENTRY_POINT) {
        Ok(Value::Function(logic)) => logic,
        Ok(_) => {
            warn!(scan, "run_logic() is no longer defined");
            report.error = Some(ScriptError::Runtime {
                source: mlua::Error::runtime("run_logic is not a function"),
            });
            return report;
        }
        Err(source) => {
            report.error = Some(ScriptError::Runtime { source });
            return report;
        }
    };

    if let Err(source) = logic.call::<()>(()) {
        warn!(scan, error = %source, "run_logic() failed");
        report.error = Some(ScriptError::Runtime { source });
        return report;
    }

    let table = match lua.globals().raw_get::<Value>(table_name) {
        Ok(Value::Table(table)) => table,
        Ok(_) | Err(_) => {
            warn!(scan, table = table_name, "tag table missing after run_logic()");
            return report;
        }
    };

    for tag in store.iter() {
        let value = match table.raw_get::<Value>(tag.name()) {
            Ok(value) => value,
            Err(e) => {
                warn!(scan, tag = tag.name(), error = %e, "tag table read failed");
                report.failed = report.failed.saturating_add(1);
                continue;
            }
        };
        let Some(value) = from_lua(&value) else {
            report.skipped = report.skipped.saturating_add(1);
            continue;
        };
        match store.set(tag.name(), value) {
            Ok(_) => report.written = report.written.saturating_add(1),
            Err(e) => {
                warn!(scan, tag = tag.name(), error = %e, "tag write-back failed");
                report.failed = report.failed.saturating_add(1);
            }
        }
    }

    report
}
