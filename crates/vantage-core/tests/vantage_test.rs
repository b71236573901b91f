#![allow(clippy::unwrap_used)]
// End-to-end tests for the `Vantage` facade against a stateful fake
// controller: population, state fetch, writes, and pushed status.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_test::assert_err;

use common::{FakeController, RecordingDiscovery, eventually};
use vantage_core::{
    BlinkRate, ButtonState, ControllerState, CoreError, Discovery, EventKind, ObjectEvent,
    ObjectRecord, Rgb, StatusMode, StatusType, Vantage, Vid,
};

const KITCHEN: u32 = 447;
const HALL: u32 = 448;
const PENDANT: u32 = 12;
const RACK: u32 = 9;

fn records() -> Vec<ObjectRecord> {
    vec![
        ObjectRecord::new(KITCHEN, "Button").with_name("Kitchen").with_parent(442_u32),
        ObjectRecord::new(HALL, "Button").with_name("Hall"),
        ObjectRecord::new(PENDANT, "Load").with_name("Pendant"),
        ObjectRecord::new(RACK, "Enclosure").with_name("Rack"),
    ]
}

async fn client(fake: &FakeController, mode: StatusMode) -> Vantage {
    let vantage = Vantage::new(fake.config(mode), RecordingDiscovery::new(records()));
    vantage.initialize(false, false).await.unwrap();
    vantage
}

type Changes = Arc<Mutex<Vec<(Vid, &'static str)>>>;

fn record_changes(vantage: &Vantage) -> Changes {
    let changes: Changes = Arc::default();
    let sink = Arc::clone(&changes);
    let _sub = vantage.subscribe(EventKind::PropertyChanged, move |event| {
        if let ObjectEvent::PropertyChanged { vid, property, .. } = event {
            sink.lock().unwrap().push((*vid, *property));
        }
    });
    changes
}

fn count(changes: &Changes, vid: u32, property: &str) -> usize {
    changes
        .lock()
        .unwrap()
        .iter()
        .filter(|(v, p)| *v == Vid::new(vid) && *p == property)
        .count()
}

// ── Population ──────────────────────────────────────────────────────

#[tokio::test]
async fn initialize_populates_every_controller() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;

    assert_eq!(vantage.buttons().len(), 2);
    assert_eq!(vantage.loads().len(), 1);
    assert_eq!(vantage.enclosures().len(), 1);
    assert_eq!(vantage.objects().len(), 4);

    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();
    assert_eq!(kitchen.object().name(), "Kitchen");
    assert_eq!(kitchen.object().parent(), Some(Vid::new(442)));
    assert_eq!(kitchen.state(), None);

    assert!(vantage.load(Vid::new(KITCHEN)).is_none());
    for controller in vantage.controllers() {
        assert_eq!(controller.state(), ControllerState::Populated);
    }
}

#[tokio::test]
async fn one_failing_controller_does_not_block_the_others() {
    let fake = FakeController::start(false).await;
    let discovery = RecordingDiscovery::failing(records(), vec!["Load"]);
    let vantage = Vantage::new(fake.config(StatusMode::Category), discovery);

    let err = assert_err!(vantage.initialize(false, false).await);
    assert!(matches!(err, CoreError::Discovery { .. }));
    assert_eq!(vantage.buttons().len(), 2);
    assert_eq!(vantage.enclosures().len(), 1);
    assert!(vantage.loads().is_empty());
}

#[tokio::test]
async fn injected_types_skip_discovery() {
    let fake = FakeController::start(false).await;
    let discovery = RecordingDiscovery::new(records());
    let vantage = Vantage::new(
        fake.config(StatusMode::Category),
        Arc::clone(&discovery) as Arc<dyn Discovery>,
    );

    let buttons = vantage.controller("buttons").unwrap();
    assert!(buttons.inject(ObjectRecord::new(900_u32, "Button")).unwrap());
    assert_eq!(buttons.state(), ControllerState::Populated);
    vantage.initialize(false, false).await.unwrap();

    assert_eq!(discovery.requested_types(), vec!["Enclosure", "Load"]);
    assert_eq!(vantage.buttons().len(), 1);
    assert!(vantage.button(Vid::new(KITCHEN)).is_none());
    assert_eq!(vantage.loads().len(), 1);
}

#[tokio::test]
async fn inject_rejects_foreign_types() {
    let fake = FakeController::start(false).await;
    let vantage = Vantage::new(fake.config(StatusMode::Category), RecordingDiscovery::new(vec![]));
    let loads = vantage.controller("loads").unwrap();

    let err = loads.inject(ObjectRecord::new(1_u32, "Button")).unwrap_err();
    assert!(matches!(err, CoreError::Discovery { .. }));
    assert!(loads.is_empty());
}

#[tokio::test]
async fn snapshot_file_populates_before_discovery() {
    const BACKUP: &str = r#"<Project>
  <Objects>
    <Object><Button VID="447"><Name>Kitchen</Name></Button></Object>
    <Object><Enclosure VID="9"><Name>Rack</Name></Enclosure></Object>
    <Object><WireLink VID="3"/></Object>
  </Objects>
</Project>"#;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.xml");
    std::fs::write(&path, BACKUP).unwrap();

    let fake = FakeController::start(false).await;
    let mut config = fake.config(StatusMode::Category);
    config.local_config_file = Some(path);
    let discovery = RecordingDiscovery::new(records());
    let vantage = Vantage::new(config, Arc::clone(&discovery) as Arc<dyn Discovery>);

    let added = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&added);
    let _sub = vantage.subscribe(EventKind::ObjectAdded, move |event| {
        if let ObjectEvent::ObjectAdded { vid, type_name } = event {
            sink.lock().unwrap().push((vid.get(), type_name.clone()));
        }
    });

    vantage.initialize(false, false).await.unwrap();

    assert_eq!(discovery.requested_types(), vec!["Load"]);
    assert_eq!(vantage.buttons().len(), 1);
    assert_eq!(vantage.button(Vid::new(KITCHEN)).unwrap().object().name(), "Kitchen");
    let mut added = added.lock().unwrap().clone();
    added.sort();
    assert_eq!(
        added,
        vec![
            (RACK, "Enclosure".to_owned()),
            (PENDANT, "Load".to_owned()),
            (KITCHEN, "Button".to_owned()),
        ]
    );
}

#[tokio::test]
async fn missing_snapshot_file_falls_back_to_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeController::start(false).await;
    let mut config = fake.config(StatusMode::Category);
    config.local_config_file = Some(dir.path().join("absent.xml"));
    let vantage = Vantage::new(config, RecordingDiscovery::new(records()));

    vantage.initialize(false, false).await.unwrap();
    assert_eq!(vantage.objects().len(), 4);
}

// ── State fetch and writes ──────────────────────────────────────────

#[tokio::test]
async fn fetch_reports_only_changed_properties() {
    let fake = FakeController::start(false).await;
    fake.fail("Button.GetState");
    fake.set_led(KITCHEN, "1 255 0 0 0 0 255 FAST");
    let vantage = Vantage::new(
        fake.config(StatusMode::Category),
        RecordingDiscovery::new(vec![ObjectRecord::new(KITCHEN, "Button")]),
    );
    vantage.initialize(false, false).await.unwrap();
    let buttons = vantage.controller("buttons").unwrap();

    assert_eq!(buttons.fetch_state().await, 3);
    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();
    assert_eq!(kitchen.state(), None);
    assert_eq!(kitchen.led_active_color(), Some(Rgb::new(255, 0, 0)));
    assert_eq!(kitchen.led_inactive_color(), Some(Rgb::new(0, 0, 255)));
    assert_eq!(kitchen.led_blink_rate(), Some(BlinkRate::Fast));
    assert_eq!(fake.count("GETLED 447"), 1);

    assert_eq!(buttons.fetch_state().await, 0);
}

#[tokio::test]
async fn initialize_with_fetch_fills_caches() {
    let fake = FakeController::start(false).await;
    fake.set_button(KITCHEN, "1");
    fake.set_level(PENDANT, "42.500");
    let vantage = Vantage::new(fake.config(StatusMode::Category), RecordingDiscovery::new(records()));

    vantage.initialize(true, false).await.unwrap();

    assert!(vantage.button(Vid::new(KITCHEN)).unwrap().is_down());
    assert_eq!(vantage.button(Vid::new(HALL)).unwrap().state(), Some(ButtonState::Up));
    assert_eq!(vantage.load(Vid::new(PENDANT)).unwrap().level(), Some(42.5));
    assert_eq!(fake.count("INVOKE 447 Button.GetState"), 1);
}

#[tokio::test]
async fn set_state_updates_cache_without_a_read_back() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    let changes = record_changes(&vantage);
    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();

    kitchen.set_state(ButtonState::Down, false).await.unwrap();

    assert_eq!(kitchen.state(), Some(ButtonState::Down));
    assert_eq!(fake.button(KITCHEN).as_deref(), Some("1"));
    assert_eq!(fake.count_prefix("INVOKE 447"), 1);
    assert_eq!(fake.count("INVOKE 447 Button.SetState 1"), 1);
    assert_eq!(count(&changes, KITCHEN, "state"), 1);

    kitchen.set_state(ButtonState::Down, true).await.unwrap();
    assert_eq!(fake.count("INVOKE 447 Button.SetStateSW 1"), 1);
    assert_eq!(count(&changes, KITCHEN, "state"), 1);
}

#[tokio::test]
async fn hardware_getter_uses_hardware_verb() {
    let fake = FakeController::start(false).await;
    fake.set_button(HALL, "1");
    let vantage = client(&fake, StatusMode::Category).await;
    let hall = vantage.button(Vid::new(HALL)).unwrap();

    assert_eq!(hall.get_state(true).await.unwrap(), ButtonState::Down);
    assert_eq!(fake.count("INVOKE 448 Button.GetStateHW"), 1);
    assert!(hall.is_down());
}

#[tokio::test]
async fn controller_error_leaves_cache_untouched() {
    let fake = FakeController::start(false).await;
    fake.fail("Button.SetState");
    let vantage = client(&fake, StatusMode::Category).await;
    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();

    let err = assert_err!(kitchen.set_state(ButtonState::Down, false).await);
    assert!(matches!(err, CoreError::Command { code: 4, .. }), "got {err:?}");
    assert_eq!(kitchen.state(), None);
}

#[tokio::test]
async fn undecodable_reply_is_a_conversion_error() {
    let fake = FakeController::start(false).await;
    fake.set_button(KITCHEN, "Sideways");
    fake.set_led(KITCHEN, "1 255 0 0 0 0 0 OFF");
    let vantage = Vantage::new(
        fake.config(StatusMode::Category),
        RecordingDiscovery::new(vec![ObjectRecord::new(KITCHEN, "Button")]),
    );
    vantage.initialize(false, false).await.unwrap();
    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();

    let err = assert_err!(kitchen.get_state(false).await);
    assert!(matches!(err, CoreError::Conversion { .. }), "got {err:?}");
    assert_eq!(kitchen.state(), None);

    let buttons = vantage.controller("buttons").unwrap();
    assert_eq!(buttons.fetch_state().await, 3);
    assert_eq!(kitchen.state(), None);
    assert_eq!(kitchen.led_active_color(), Some(Rgb::new(255, 0, 0)));
}

#[tokio::test]
async fn set_led_writes_and_caches() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();

    kitchen
        .set_led(Rgb::new(10, 20, 30), Rgb::BLACK, BlinkRate::Slow)
        .await
        .unwrap();

    assert_eq!(fake.count("LED 447 10 20 30 0 0 0 SLOW"), 1);
    assert_eq!(kitchen.led_active_color(), Some(Rgb::new(10, 20, 30)));
    assert_eq!(kitchen.led_blink_rate(), Some(BlinkRate::Slow));
}

#[tokio::test]
async fn load_level_round_trip() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    let pendant = vantage.load(Vid::new(PENDANT)).unwrap();

    pendant.set_level(150.0, false).await.unwrap();
    assert_eq!(fake.count("INVOKE 12 Load.SetLevel 100.000"), 1);
    assert_eq!(pendant.level(), Some(100.0));
    assert!(pendant.is_on());

    pendant.turn_off().await.unwrap();
    assert!(!pendant.is_on());
    assert_eq!(pendant.get_level(false).await.unwrap(), 0.0);
}

// ── Monitoring ──────────────────────────────────────────────────────

#[tokio::test]
async fn category_pushes_update_caches_once() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    let changes = record_changes(&vantage);
    vantage.enable_state_monitoring().await;
    eventually("BTN armed", || fake.count("STATUS BTN") == 1).await;

    fake.push("S:BTN 447 PRESS");
    eventually("button press", || count(&changes, KITCHEN, "state") == 1).await;
    fake.push("S:BTN 447 PRESS");
    fake.push("S:BTN 999 PRESS");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(count(&changes, KITCHEN, "state"), 1);
    assert!(vantage.button(Vid::new(KITCHEN)).unwrap().is_down());
    assert_eq!(vantage.button(Vid::new(HALL)).unwrap().state(), None);
}

#[tokio::test]
async fn load_pushes_update_level() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    vantage.enable_state_monitoring().await;
    eventually("LOAD armed", || fake.count("STATUS LOAD") == 1).await;

    let pendant = vantage.load(Vid::new(PENDANT)).unwrap();
    fake.push("S:LOAD 12 75.000");
    eventually("load level", || pendant.level() == Some(75.0)).await;
}

#[tokio::test]
async fn fixed_category_mode_never_enables_the_log() {
    let fake = FakeController::start(true).await;
    let vantage = client(&fake, StatusMode::Category).await;
    vantage.enable_state_monitoring().await;
    eventually("categories armed", || {
        fake.count("STATUS BTN") == 1 && fake.count("STATUS LED") == 1
    })
    .await;

    assert_eq!(fake.count_prefix("ELENABLE"), 0);
    let buttons = vantage.controller("buttons").unwrap();
    assert_eq!(buttons.status_type().await, Some(StatusType::Category));
}

#[tokio::test]
async fn auto_mode_prefers_the_enhanced_log() {
    let fake = FakeController::start(true).await;
    let vantage = client(&fake, StatusMode::Auto).await;
    vantage.enable_state_monitoring().await;
    eventually("LED armed", || fake.count("STATUS LED") == 1).await;

    assert_eq!(fake.count("ELENABLE STATUSEX ON"), 1);
    assert_eq!(fake.count("ELLOG STATUSEX ON"), 1);
    assert_eq!(fake.count("STATUS BTN"), 0);
    assert_eq!(fake.count("STATUS LOAD"), 0);
    let buttons = vantage.controller("buttons").unwrap();
    assert_eq!(buttons.status_type().await, Some(StatusType::EnhancedLog));
    assert_eq!(buttons.state(), ControllerState::Monitoring);

    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();
    fake.push("EL: 447 Button.GetState 1");
    eventually("enhanced log state", || kitchen.is_down()).await;

    fake.push("S:STATUS 447 Button.GetStateHW 0");
    eventually("object status", || kitchen.state() == Some(ButtonState::Up)).await;

    fake.push("S:LED 447 1 0 255 0 0 0 0 MEDIUM");
    eventually("led status", || kitchen.led_blink_rate() == Some(BlinkRate::Medium)).await;
    assert_eq!(kitchen.led_active_color(), Some(Rgb::new(0, 255, 0)));

    let pendant = vantage.load(Vid::new(PENDANT)).unwrap();
    fake.push("EL: 12 Load.GetLevel 33.000");
    eventually("load via log", || pendant.level() == Some(33.0)).await;
}

#[tokio::test]
async fn auto_mode_falls_back_to_categories() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Auto).await;
    vantage.enable_state_monitoring().await;
    eventually("categories armed", || {
        ["STATUS BTN", "STATUS LED", "STATUS LOAD"]
            .iter()
            .all(|line| fake.count(line) == 1)
    })
    .await;

    assert_eq!(fake.count("ELENABLE STATUSEX ON"), 1);
    for name in ["buttons", "loads"] {
        let controller = vantage.controller(name).unwrap();
        assert_eq!(controller.status_type().await, Some(StatusType::Category));
    }
    assert_eq!(vantage.controller("enclosures").unwrap().status_type().await, None);
}

#[tokio::test]
async fn enabling_twice_keeps_one_set_of_subscriptions() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;

    vantage.enable_state_monitoring().await;
    let subscribers = vantage.event_stream().subscriber_count();
    vantage.enable_state_monitoring().await;
    eventually("BTN armed", || fake.count("STATUS BTN") == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(vantage.event_stream().subscriber_count(), subscribers);
    assert_eq!(fake.count("STATUS BTN"), 1);
}

#[tokio::test]
async fn disabling_stops_updates_and_keeps_cache() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    vantage.enable_state_monitoring().await;
    eventually("BTN armed", || fake.count("STATUS BTN") == 1).await;

    let kitchen = vantage.button(Vid::new(KITCHEN)).unwrap();
    fake.push("S:BTN 447 PRESS");
    eventually("press", || kitchen.is_down()).await;

    vantage.disable_state_monitoring().await;
    assert_eq!(vantage.event_stream().subscriber_count(), 0);
    fake.push("S:BTN 447 RELEASE");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(kitchen.is_down());
    for controller in vantage.controllers() {
        assert_eq!(controller.state(), ControllerState::Disabled);
    }
}

#[tokio::test]
async fn subscriptions_survive_event_reconnect() {
    let fake = FakeController::start(false).await;
    let vantage = client(&fake, StatusMode::Category).await;
    vantage.enable_state_monitoring().await;
    eventually("BTN armed", || fake.count("STATUS BTN") == 1).await;

    fake.drop_connections();
    eventually("BTN re-armed", || fake.count("STATUS BTN") == 2).await;

    let hall = vantage.button(Vid::new(HALL)).unwrap();
    fake.push("S:BTN 448 PRESS");
    eventually("press after reconnect", || hall.is_down()).await;
    assert!(fake.accepted() >= 3);

    vantage.close().await;
}
