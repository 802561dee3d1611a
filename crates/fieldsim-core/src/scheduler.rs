//! The simulation scheduler: drives every device model on a fixed interval.
//!
//! Each tick runs in three phases:
//!
//! 1. **Command pickup** -- for models that follow tag commands, a tag value
//!    that differs from what the scheduler last committed was written by
//!    someone else (the script bridge, a protocol adaptor) and is forwarded
//!    to [`DeviceModel::command`].
//! 2. **Update** -- every model's `update(dt)` runs in its own tokio task;
//!    the tick waits for all of them.
//! 3. **Commit** -- results are written to the [`TagStore`] in definition
//!    order. A failed write is logged and counted, never fatal.
//!
//! The periodic loop checks for a stop before every tick, so no tick begins
//! once a stop was requested and a tick that has started always commits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fieldsim_devices::DeviceModel;
use fieldsim_tags::TagStore;
use fieldsim_types::TagValue;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SimulationSettings;
use crate::control::TaskControl;

/// Errors returned by scheduler device operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// No device with this name is scheduled.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Enabled devices whose new value was committed.
    pub updated: usize,
    /// Disabled devices whose quiescent value was committed.
    pub quiescent: usize,
    /// Devices whose update task or tag write failed.
    pub failed: usize,
}

/// One scheduled model and the last value committed for it.
#[derive(Debug)]
struct DeviceSlot {
    name: String,
    model: Arc<Mutex<Box<dyn DeviceModel>>>,
    last_committed: Mutex<Option<TagValue>>,
}

impl DeviceSlot {
    /// Forward an externally written tag value to the model, if it follows
    /// tag commands and the value changed since the last commit.
    fn pick_up_command(&self, store: &TagStore) {
        let mut model = self.model.lock();
        if !model.follows_tag_commands() {
            return;
        }
        let Ok(current) = store.get(&self.name) else {
            return;
        };
        let mut last = self.last_committed.lock();
        if last.as_ref() == Some(&current) {
            return;
        }
        if let Some(value) = current.as_f64() {
            let accepted = model.command(value);
            debug!(device = %self.name, value, accepted, "tag command picked up");
        }
        *last = Some(current);
    }
}

#[derive(Debug)]
struct Inner {
    store: Arc<TagStore>,
    slots: Vec<DeviceSlot>,
    ticks: AtomicU64,
    control: TaskControl,
    tick_interval: Duration,
    log_every_ticks: u64,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Runs device models against a shared tag store.
///
/// Cloning is cheap and every clone drives the same scheduler.
#[derive(Debug, Clone)]
pub struct SimulationScheduler {
    inner: Arc<Inner>,
}

impl SimulationScheduler {
    /// A stopped scheduler over `models`, ticking every `tick_interval`.
    ///
    /// Each model commits to the tag named after its device.
    pub fn new(
        store: Arc<TagStore>,
        models: Vec<Box<dyn DeviceModel>>,
        tick_interval: Duration,
    ) -> Self {
        Self::build(store, models, tick_interval, 0)
    }

    /// A stopped scheduler configured from the `simulation` settings.
    pub fn from_settings(
        store: Arc<TagStore>,
        models: Vec<Box<dyn DeviceModel>>,
        settings: &SimulationSettings,
    ) -> Self {
        Self::build(
            store,
            models,
            settings.tick_interval(),
            settings.log_every_ticks,
        )
    }

    fn build(
        store: Arc<TagStore>,
        models: Vec<Box<dyn DeviceModel>>,
        tick_interval: Duration,
        log_every_ticks: u64,
    ) -> Self {
        let slots = models
            .into_iter()
            .map(|model| {
                let name = model.name().to_owned();
                let last_committed = store.get(&name).ok();
                DeviceSlot {
                    name,
                    model: Arc::new(Mutex::new(model)),
                    last_committed: Mutex::new(last_committed),
                }
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                store,
                slots,
                ticks: AtomicU64::new(0),
                control: TaskControl::new(),
                tick_interval: tick_interval.max(Duration::from_millis(1)),
                log_every_ticks,
                task: Mutex::new(None),
            }),
        }
    }

    /// The shared tag store.
    pub fn store(&self) -> &Arc<TagStore> {
        &self.inner.store
    }

    /// Interval between ticks of the periodic loop.
    pub fn tick_interval(&self) -> Duration {
        self.inner.tick_interval
    }

    /// Start the periodic loop. Returns `false` if it was already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        if !self.inner.control.mark_running() {
            return false;
        }
        self.inner.control.clear_stop();
        info!(
            devices = self.inner.slots.len(),
            interval_ms = self.inner.tick_interval.as_millis(),
            "scheduler started"
        );
        let handle = tokio::spawn(Arc::clone(&self.inner).run());
        *self.inner.task.lock() = Some(handle);
        true
    }

    /// Stop the periodic loop and wait for it to finish. A tick in progress
    /// completes first. Does nothing if the loop is not running.
    pub async fn stop(&self) {
        self.inner.control.request_stop();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
            info!(ticks = self.tick_count(), "scheduler stopped");
        }
    }

    /// Whether the periodic loop is running.
    pub fn is_running(&self) -> bool {
        self.inner.control.is_running()
    }

    /// Number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.load(Ordering::Acquire)
    }

    /// Run one tick with step `dt`.
    ///
    /// Every value is committed to the store before this returns.
    pub async fn tick(&self, dt: Duration) -> TickReport {
        self.inner.tick(dt).await
    }

    /// Scheduled device names in definition order.
    pub fn device_names(&self) -> Vec<String> {
        self.inner.slots.iter().map(|s| s.name.clone()).collect()
    }

    /// Number of scheduled devices.
    pub fn device_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// Reset one model to its freshly constructed state.
    pub fn reset_device(&self, name: &str) -> Result<(), SchedulerError> {
        self.inner.slot(name)?.model.lock().reset();
        info!(device = name, "device reset");
        Ok(())
    }

    /// Enable or disable one model.
    pub fn set_device_enabled(&self, name: &str, enabled: bool) -> Result<(), SchedulerError> {
        self.inner.slot(name)?.model.lock().set_enabled(enabled);
        info!(device = name, enabled, "device enabled state changed");
        Ok(())
    }

    /// Send a command directly to one model. Returns whether the model
    /// accepted it.
    pub fn command_device(&self, name: &str, value: f64) -> Result<bool, SchedulerError> {
        Ok(self.inner.slot(name)?.model.lock().command(value))
    }
}

impl Inner {
    fn slot(&self, name: &str) -> Result<&DeviceSlot, SchedulerError> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SchedulerError::UnknownDevice(name.to_owned()))
    }

    async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        let mut last = Instant::now();

        loop {
            tokio::select! {
                biased;
                () = self.control.stopped() => break,
                _ = interval.tick() => {}
            }
            if self.control.is_stop_requested() {
                break;
            }
            let now = Instant::now();
            let dt = now.duration_since(last);
            last = now;
            let report = self.tick(dt).await;
            if report.failed > 0 {
                warn!(tick = report.tick, failed = report.failed, "tick had failures");
            }
        }

        self.control.mark_stopped();
    }

    async fn tick(&self, dt: Duration) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::AcqRel).saturating_add(1);

        for slot in &self.slots {
            slot.pick_up_command(&self.store);
        }

        let mut updates = JoinSet::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let model = Arc::clone(&slot.model);
            updates.spawn(async move {
                let mut model = model.lock();
                let enabled = model.is_enabled();
                (index, model.update(dt), enabled)
            });
        }

        let mut results: Vec<Option<(f64, bool)>> = vec![None; self.slots.len()];
        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((index, value, enabled)) => {
                    if let Some(result) = results.get_mut(index) {
                        *result = Some((value, enabled));
                    }
                }
                Err(e) => warn!(tick, error = %e, "device update task failed"),
            }
        }

        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };
        for (slot, result) in self.slots.iter().zip(results) {
            let Some((value, enabled)) = result else {
                report.failed = report.failed.saturating_add(1);
                continue;
            };
            match self.store.set(&slot.name, value) {
                Ok(stored) => {
                    *slot.last_committed.lock() = Some(stored);
                    if enabled {
                        report.updated = report.updated.saturating_add(1);
                    } else {
                        report.quiescent = report.quiescent.saturating_add(1);
                    }
                }
                Err(e) => {
                    warn!(tick, tag = %slot.name, error = %e, "tag write failed");
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }

        if tick.checked_rem(self.log_every_ticks) == Some(0) {
            self.log_values(tick);
        }

        report
    }

    fn log_values(&self, tick: u64) {
        for slot in &self.slots {
            match self.store.get(&slot.name) {
                Ok(value) => debug!(tick, device = %slot.name, %value, "device value"),
                Err(e) => debug!(tick, device = %slot.name, error = %e, "device value unavailable"),
            }
        }
    }
}
