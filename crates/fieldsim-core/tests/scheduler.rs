//! Integration tests for the scheduler driving models into a shared store.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use fieldsim_core::{SimulationScheduler, build_simulation};
use fieldsim_devices::{DeviceCore, DeviceModel, ModelCatalog};
use fieldsim_tags::TagStore;
use fieldsim_types::{DeviceDefinition, TagKind, TagValue};

fn plant() -> Vec<DeviceDefinition> {
    vec![
        DeviceDefinition::new("Boiler", "temperature", "%DF100")
            .with_parameter("baseTemp", 60.0)
            .with_parameter("noiseStdDev", 0.0),
        DeviceDefinition::new("Header", "pressure", "%DF101"),
        DeviceDefinition::new("Feed", "integer", "%DW1")
            .with_parameter("autoMode", true)
            .with_parameter("autoPattern", "ramp")
            .with_parameter("rampRate", 10.0),
        DeviceDefinition::new("Spare", "temperature", "%DF102")
            .with_parameter("baseTemp", 18.5)
            .with_enabled(false),
    ]
}

/// Model whose `step` blocks until its release channel closes, so a test
/// can hold a tick open.
#[derive(Debug)]
struct GatedModel {
    core: DeviceCore,
    entries: Arc<AtomicUsize>,
    release: mpsc::Receiver<()>,
}

impl DeviceModel for GatedModel {
    fn type_name(&self) -> &'static str {
        "gated"
    }

    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn step(&mut self, t: f64, _dt: f64) -> f64 {
        self.entries.fetch_add(1, Ordering::SeqCst);
        let _ = self.release.recv();
        t
    }

    fn quiescent_value(&self) -> f64 {
        0.0
    }

    fn reset_state(&mut self) {}
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
}

fn scheduler(defs: &[DeviceDefinition]) -> SimulationScheduler {
    let sim = build_simulation(defs, &ModelCatalog::builtin(), Some(11)).unwrap();
    SimulationScheduler::new(Arc::new(sim.store), sim.models, Duration::from_millis(10))
}

#[tokio::test]
async fn one_tick_commits_every_device() {
    let sched = scheduler(&plant());
    let store = Arc::clone(sched.store());
    let before = store.snapshot("Boiler").unwrap().timestamp;

    let report = sched.tick(Duration::from_secs(5)).await;

    assert_eq!(report.tick, 1);
    assert_eq!(report.updated, 3);
    assert_eq!(report.quiescent, 1);
    assert_eq!(report.failed, 0);

    // Committed before `tick` returned.
    assert!(store.snapshot("Boiler").unwrap().timestamp >= before);
    assert_eq!(store.get("Feed").unwrap(), TagValue::Integer(50));
    assert_eq!(store.get("Spare").unwrap(), TagValue::Float(18.5));
}

#[tokio::test]
async fn disabled_device_can_be_enabled_at_runtime() {
    let sched = scheduler(&plant());
    sched.set_device_enabled("Spare", true).unwrap();
    let report = sched.tick(Duration::from_millis(100)).await;
    assert_eq!(report.updated, 4);
    assert_eq!(report.quiescent, 0);
}

#[tokio::test]
async fn reset_restarts_the_ramp() {
    let sched = scheduler(&plant());
    sched.tick(Duration::from_secs(5)).await;
    assert_eq!(sched.store().get("Feed").unwrap(), TagValue::Integer(50));

    sched.reset_device("Feed").unwrap();
    sched.tick(Duration::from_secs(2)).await;
    assert_eq!(sched.store().get("Feed").unwrap(), TagValue::Integer(20));
}

#[tokio::test]
async fn external_writes_command_following_models() {
    let defs = vec![
        DeviceDefinition::new("Valve", "relay", "%MW1"),
        DeviceDefinition::new("Setpoint", "integer", "%DW2").with_parameter("maxValue", 200),
    ];
    let sched = scheduler(&defs);
    let store = Arc::clone(sched.store());

    sched.tick(Duration::from_millis(100)).await;
    assert_eq!(store.get("Valve").unwrap(), TagValue::Boolean(false));

    // Another writer (script, protocol client) changes the tags.
    store.set("Valve", true).unwrap();
    store.set("Setpoint", 150).unwrap();

    sched.tick(Duration::from_millis(100)).await;
    assert_eq!(store.get("Valve").unwrap(), TagValue::Boolean(true));
    assert_eq!(store.get("Setpoint").unwrap(), TagValue::Integer(150));

    // The model now holds the commanded state on its own.
    sched.tick(Duration::from_millis(100)).await;
    assert_eq!(store.get("Valve").unwrap(), TagValue::Boolean(true));

    // Out of range commands are clamped.
    store.set("Setpoint", 999).unwrap();
    sched.tick(Duration::from_millis(100)).await;
    assert_eq!(store.get("Setpoint").unwrap(), TagValue::Integer(200));
}

#[tokio::test]
async fn auto_models_ignore_external_writes() {
    let defs = vec![
        DeviceDefinition::new("Blinker", "relay", "%MW1")
            .with_parameter("autoToggle", true)
            .with_parameter("togglePeriod", 100.0),
    ];
    let sched = scheduler(&defs);
    let store = Arc::clone(sched.store());

    store.set("Blinker", true).unwrap();
    sched.tick(Duration::from_millis(100)).await;
    assert_eq!(store.get("Blinker").unwrap(), TagValue::Boolean(false));
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let sched = scheduler(&plant());
    assert!(!sched.is_running());

    assert!(sched.start());
    assert!(!sched.start());
    assert!(sched.is_running());

    tokio::time::sleep(Duration::from_millis(105)).await;
    sched.stop().await;
    assert!(!sched.is_running());

    let ticks = sched.tick_count();
    assert!(ticks >= 5, "ticks = {ticks}");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sched.tick_count(), ticks);

    sched.stop().await;
    assert!(!sched.is_running());

    // Can be started again after a stop.
    assert!(sched.start());
    tokio::time::sleep(Duration::from_millis(25)).await;
    sched.stop().await;
    assert!(sched.tick_count() > ticks);
}

#[tokio::test]
async fn scheduler_without_devices_ticks_cleanly() {
    let sched = SimulationScheduler::new(
        Arc::new(TagStore::new()),
        Vec::new(),
        Duration::from_millis(10),
    );
    let report = sched.tick(Duration::from_millis(10)).await;
    assert_eq!((report.updated, report.quiescent, report.failed), (0, 0, 0));
}

#[tokio::test]
async fn one_failed_write_still_commits_the_other_devices() {
    let defs = [
        DeviceDefinition::new("Boiler", "temperature", "%DF100")
            .with_parameter("baseTemp", 60.0)
            .with_parameter("noiseStdDev", 0.0),
        // No tag is created for this one.
        DeviceDefinition::new("Ghost", "pressure", "%DF101"),
        DeviceDefinition::new("Feed", "integer", "%DW1")
            .with_parameter("autoMode", true)
            .with_parameter("autoPattern", "ramp")
            .with_parameter("rampRate", 10.0),
    ];
    let models = ModelCatalog::builtin().build_all(&defs, Some(11)).unwrap();

    let mut store = TagStore::new();
    store.create("Boiler", TagKind::Float, "%DF100", "").unwrap();
    store.create("Feed", TagKind::Integer, "%DW1", "").unwrap();
    let store = Arc::new(store);
    let before = store.snapshot("Boiler").unwrap().timestamp;

    let sched = SimulationScheduler::new(Arc::clone(&store), models, Duration::from_millis(10));
    let report = sched.tick(Duration::from_secs(5)).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.updated, 2);
    assert_eq!(report.quiescent, 0);
    assert_eq!(store.get("Feed").unwrap(), TagValue::Integer(50));
    assert!(store.snapshot("Boiler").unwrap().timestamp >= before);
    assert_ne!(store.get("Boiler").unwrap(), TagValue::Float(0.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_during_a_tick_lets_it_finish_and_starts_no_other() {
    let def = DeviceDefinition::new("Gate", "gated", "%DF1");
    let entries = Arc::new(AtomicUsize::new(0));
    let (release, gate) = mpsc::channel::<()>();
    let model = GatedModel {
        core: DeviceCore::new(&def, 1),
        entries: Arc::clone(&entries),
        release: gate,
    };

    let mut store = TagStore::new();
    store.create("Gate", TagKind::Float, "%DF1", "").unwrap();
    let sched = SimulationScheduler::new(
        Arc::new(store),
        vec![Box::new(model) as Box<dyn DeviceModel>],
        Duration::from_millis(1),
    );

    assert!(sched.start());
    wait_for(|| entries.load(Ordering::SeqCst) >= 1).await;
    assert_eq!(sched.tick_count(), 1);

    // First poll records the stop request; the tick is still held open.
    let stop = sched.stop();
    tokio::pin!(stop);
    assert!(tokio::time::timeout(Duration::ZERO, &mut stop).await.is_err());

    drop(release);
    tokio::time::timeout(Duration::from_secs(5), stop).await.unwrap();

    assert!(!sched.is_running());
    assert_eq!(sched.tick_count(), 1);
    assert_eq!(entries.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn no_tick_runs_after_stop_returns() {
    let sched = scheduler(&plant());
    assert!(sched.start());
    tokio::time::sleep(Duration::from_millis(35)).await;
    sched.stop().await;

    let ticks = sched.tick_count();
    let feed = sched.store().get("Feed").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(sched.tick_count(), ticks);
    assert_eq!(sched.store().get("Feed").unwrap(), feed);
}
