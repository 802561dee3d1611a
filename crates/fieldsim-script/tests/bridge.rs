//! Integration tests for the script bridge running against a tag store.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use fieldsim_script::{BridgeState, ScriptBridge, ScriptError, ScriptSource};
use fieldsim_tags::TagStore;
use fieldsim_types::{TagKind, TagValue};

fn store() -> Arc<TagStore> {
    let mut store = TagStore::new();
    store.create("Tank_Temp", TagKind::Float, "%DF100", "").unwrap();
    store.create("Heater", TagKind::Boolean, "%MW1", "").unwrap();
    store.create("Pump_Speed", TagKind::Integer, "%DW1", "").unwrap();
    store.create("Mode", TagKind::Text, "%ST1", "").unwrap();
    Arc::new(store)
}

fn bridge(store: &Arc<TagStore>, code: &str) -> ScriptBridge {
    ScriptBridge::new(
        Arc::clone(store),
        ScriptSource::inline("test", code),
        "Data",
        Duration::from_millis(10),
    )
}

const THERMOSTAT: &str = r#"
function run_logic()
    if Data.Tank_Temp > 50 then
        Data.Heater = false
    else
        Data.Heater = true
    end
    Data.Pump_Speed = 1200
end
"#;

#[tokio::test]
async fn scan_writes_table_back_to_store() {
    let store = store();
    let bridge = bridge(&store, THERMOSTAT);
    bridge.initialize().await.unwrap();
    assert_eq!(bridge.state(), BridgeState::Initialized);

    store.set("Tank_Temp", 20.0).unwrap();
    let report = bridge.scan().await.unwrap();
    assert!(report.succeeded());
    assert_eq!(report.scan, 1);
    assert_eq!(report.written, 4);
    assert_eq!(store.get("Heater").unwrap(), TagValue::Boolean(true));
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(1200));

    store.set("Tank_Temp", 75.0).unwrap();
    bridge.scan().await.unwrap();
    assert_eq!(store.get("Heater").unwrap(), TagValue::Boolean(false));
    assert_eq!(bridge.scan_count(), 2);
}

#[tokio::test]
async fn missing_run_logic_is_rejected() {
    let store = store();
    let bridge = bridge(&store, "function init() end");
    let err = bridge.initialize().await.unwrap_err();
    assert!(matches!(err, ScriptError::MissingEntryPoint { .. }));
    assert_eq!(bridge.state(), BridgeState::Uninitialized);
}

#[tokio::test]
async fn syntax_errors_fail_to_load() {
    let store = store();
    let bridge = bridge(&store, "function run_logic( end");
    let err = bridge.initialize().await.unwrap_err();
    assert!(matches!(err, ScriptError::Load { .. }));
}

#[tokio::test]
async fn missing_file_fails_to_load() {
    let bridge = ScriptBridge::new(
        store(),
        ScriptSource::File("/nonexistent/fieldsim/plc_logic.lua".into()),
        "Data",
        Duration::from_millis(10),
    );
    let err = bridge.initialize().await.unwrap_err();
    assert!(matches!(err, ScriptError::Read { .. }));
}

#[tokio::test]
async fn init_hook_runs_once_and_its_errors_are_not_fatal() {
    let store = store();
    let code = r#"
init_calls = 0
function init()
    init_calls = init_calls + 1
    set_tag("Pump_Speed", 10)
    error("boom")
end
function run_logic()
    Data.Pump_Speed = Data.Pump_Speed + init_calls
end
"#;
    let bridge = bridge(&store, code);
    bridge.initialize().await.unwrap();
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(10));

    bridge.scan().await.unwrap();
    bridge.scan().await.unwrap();
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(12));
}

#[tokio::test]
async fn runtime_error_skips_write_back() {
    let store = store();
    let code = r#"
function run_logic()
    Data.Pump_Speed = 99
    error("sensor fault")
end
"#;
    let bridge = bridge(&store, code);
    bridge.initialize().await.unwrap();

    let report = bridge.scan().await.unwrap();
    assert!(matches!(report.error, Some(ScriptError::Runtime { .. })));
    assert_eq!(report.written, 0);
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(0));

    // The bridge keeps scanning.
    let report = bridge.scan().await.unwrap();
    assert_eq!(report.scan, 2);
}

#[tokio::test]
async fn host_functions_read_and_write_tags() {
    let store = store();
    let code = r#"
function run_logic()
    local temp, err = get_tag("Tank_Temp")
    assert(err == nil)
    local ok, set_err = set_tag("Mode", "auto")
    assert(ok and set_err == nil)

    local missing, missing_err = get_tag("Nope")
    assert(missing == nil and missing_err ~= nil)

    local rejected, reject_err = set_tag("Heater", "maybe")
    assert(not rejected and reject_err ~= nil)

    local bad, type_err = set_tag("Heater", {})
    assert(not bad and type_err == "unsupported value type")

    set_tag("Pump_Speed", temp * 2)
    log("scan done")
    assert(now() > 1000000000)
    sleep(1)
end
"#;
    let bridge = bridge(&store, code);
    bridge.initialize().await.unwrap();
    store.set("Tank_Temp", 21.5).unwrap();

    let report = bridge.scan().await.unwrap();
    assert!(report.succeeded(), "{:?}", report.error);
    assert_eq!(store.get("Mode").unwrap(), TagValue::Text("auto".to_owned()));
    // set_tag refreshed the table, so write-back kept the new value.
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(43));
    assert_eq!(store.get("Heater").unwrap(), TagValue::Boolean(false));
}

#[tokio::test]
async fn nil_and_non_scalar_entries_are_skipped() {
    let store = store();
    let code = r#"
function run_logic()
    Data.Mode = nil
    Data.Heater = { on = true }
end
"#;
    let bridge = bridge(&store, code);
    bridge.initialize().await.unwrap();
    store.set("Mode", "manual").unwrap();

    let report = bridge.scan().await.unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.written, 2);
    assert_eq!(store.get("Mode").unwrap(), TagValue::Text("manual".to_owned()));
}

#[tokio::test]
async fn incompatible_write_back_is_counted_not_fatal() {
    let store = store();
    let code = r#"
function run_logic()
    Data.Pump_Speed = "fast"
    Data.Heater = true
end
"#;
    let bridge = bridge(&store, code);
    bridge.initialize().await.unwrap();

    let report = bridge.scan().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(0));
    assert_eq!(store.get("Heater").unwrap(), TagValue::Boolean(true));
}

#[tokio::test]
async fn replaced_table_is_rebuilt() {
    let store = store();
    let code = r#"
function run_logic()
    if Data.Pump_Speed == 0 then
        Data = 5
    else
        Data.Mode = "rebuilt"
    end
end
"#;
    let bridge = bridge(&store, code);
    bridge.initialize().await.unwrap();
    bridge.scan().await.unwrap();

    store.set("Pump_Speed", 1).unwrap();
    let report = bridge.scan().await.unwrap();
    assert!(report.succeeded());
    assert_eq!(store.get("Mode").unwrap(), TagValue::Text("rebuilt".to_owned()));
}

#[tokio::test]
async fn custom_table_name() {
    let store = store();
    let bridge = ScriptBridge::new(
        Arc::clone(&store),
        ScriptSource::inline("plant", "function run_logic() Plant.Heater = true end"),
        "Plant",
        Duration::from_millis(10),
    );
    bridge.initialize().await.unwrap();
    assert_eq!(bridge.table_name(), "Plant");
    bridge.scan().await.unwrap();
    assert_eq!(store.get("Heater").unwrap(), TagValue::Boolean(true));
}

#[tokio::test]
async fn lifecycle_rules() {
    let store = store();
    let bridge = bridge(&store, THERMOSTAT);

    assert!(matches!(
        bridge.scan().await,
        Err(ScriptError::InvalidState { .. })
    ));
    assert!(matches!(
        bridge.start(),
        Err(ScriptError::InvalidState { .. })
    ));

    bridge.initialize().await.unwrap();
    assert!(matches!(
        bridge.initialize().await,
        Err(ScriptError::InvalidState { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_scans_until_stopped() {
    let store = store();
    let bridge = bridge(&store, THERMOSTAT);
    bridge.initialize().await.unwrap();

    assert!(bridge.start().unwrap());
    assert!(!bridge.start().unwrap());
    assert_eq!(bridge.state(), BridgeState::Running);

    tokio::time::sleep(Duration::from_millis(120)).await;
    bridge.stop().await;
    assert_eq!(bridge.state(), BridgeState::Stopped);

    let scans = bridge.scan_count();
    assert!(scans >= 2, "scans = {scans}");
    assert_eq!(store.get("Pump_Speed").unwrap(), TagValue::Integer(1200));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bridge.scan_count(), scans);

    // Manual scans still work after the loop stops.
    bridge.scan().await.unwrap();
    assert_eq!(bridge.scan_count(), scans + 1);
}

const WAIT_FOR_GO: &str = r#"
function run_logic()
    for _ = 1, 5000 do
        if get_tag("Mode") == "go" then break end
        sleep(1)
    end
    Data.Mode = "done"
end
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_during_a_scan_lets_it_finish_and_starts_no_other() {
    let store = store();
    let bridge = bridge(&store, WAIT_FOR_GO);
    bridge.initialize().await.unwrap();
    assert!(bridge.start().unwrap());

    tokio::time::timeout(Duration::from_secs(5), async {
        while bridge.scan_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    // First poll records the stop request; the scan is still running.
    let stop = bridge.stop();
    tokio::pin!(stop);
    assert!(tokio::time::timeout(Duration::ZERO, &mut stop).await.is_err());
    assert_eq!(bridge.state(), BridgeState::Stopped);

    store.set("Mode", "go").unwrap();
    tokio::time::timeout(Duration::from_secs(5), stop).await.unwrap();

    assert_eq!(bridge.scan_count(), 1);
    assert_eq!(store.get("Mode").unwrap(), TagValue::Text("done".into()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bridge.scan_count(), 1);
}
