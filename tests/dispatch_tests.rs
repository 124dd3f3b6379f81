//! Control-protocol tests against the shared registry.
//!
//! Requests go in as raw bytes, the way the socket server hands them over,
//! and responses are compared as parsed JSON.

use std::sync::Arc;

use serde_json::{json, Value};

use top_ams::hal::{MockDevice, MockPrinterLink, MockStore};
use top_ams::services::SharedRegistry;
use top_ams::traits::{LinkError, PrinterLink};
use top_ams::{
    DispatchOutcome, Dispatcher, FilamentRegistry, LightNode, PostAction, PrinterCommand,
    RegistryAccess, SettingKey, SpeedLevel,
};

type TestDispatcher<P = Arc<MockPrinterLink>> =
    Dispatcher<Arc<SharedRegistry<MockStore>>, Arc<MockDevice>, P>;

struct Harness {
    dispatcher: TestDispatcher,
    registry: Arc<SharedRegistry<MockStore>>,
    device: Arc<MockDevice>,
    printer: Arc<MockPrinterLink>,
}

impl Harness {
    fn new() -> Self {
        let mut registry = FilamentRegistry::new(MockStore::new(), "filaments");
        registry.init();
        let registry = Arc::new(SharedRegistry::new(registry));
        let device = Arc::new(MockDevice::new());
        let printer = Arc::new(MockPrinterLink::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&device),
            Arc::clone(&printer),
        );
        Self {
            dispatcher,
            registry,
            device,
            printer,
        }
    }

    fn send(&self, request: Value) -> Value {
        parse(&self.dispatcher.dispatch(request.to_string().as_bytes()))
    }
}

fn parse(outcome: &DispatchOutcome) -> Value {
    serde_json::from_str(&outcome.response).unwrap()
}

fn error(message: &str) -> Value {
    json!({ "error": message })
}

// ============================================================================
// Framing and Routing
// ============================================================================

#[test]
fn unknown_type() {
    let h = Harness::new();
    assert_eq!(h.send(json!({"type": "bogus"})), error("Unknown type"));
}

#[test]
fn malformed_frames() {
    let h = Harness::new();
    assert_eq!(parse(&h.dispatcher.dispatch(b"")), error("Invalid JSON"));
    assert_eq!(
        parse(&h.dispatcher.dispatch(b"{\"type\":")),
        error("Invalid JSON")
    );
    assert_eq!(
        parse(&h.dispatcher.dispatch(b"\"filament\"")),
        error("Missing or invalid action")
    );
    assert_eq!(
        h.send(json!({"action": "add"})),
        error("Missing or invalid action")
    );
}

#[test]
fn missing_action_per_type() {
    let h = Harness::new();
    for kind in ["system", "filament", "printer"] {
        assert_eq!(
            h.send(json!({"type": kind})),
            error("Missing or invalid action"),
            "type {}",
            kind
        );
        assert_eq!(
            h.send(json!({"type": kind, "action": 7})),
            error("Missing or invalid action"),
            "type {}",
            kind
        );
    }
}

#[test]
fn unknown_action_per_type() {
    let h = Harness::new();
    for kind in ["system", "filament", "printer"] {
        assert_eq!(
            h.send(json!({"type": kind, "action": "explode"})),
            error("Unknown action"),
            "type {}",
            kind
        );
    }
}

// ============================================================================
// Filament Requests
// ============================================================================

#[test]
fn add_then_list_returns_the_record() {
    let h = Harness::new();
    let added = h.send(json!({
        "type": "filament",
        "action": "add",
        "motor_id": 5,
        "metadata": "{\"color\":\"red\"}",
    }));
    assert_eq!(added["success"], json!(true));
    let id = added["id"].as_i64().unwrap();

    let listed = h.send(json!({"type": "filament", "action": "list", "id": id}));
    assert_eq!(
        listed,
        json!({"id": id, "motor_id": 5, "metadata": "{\"color\":\"red\"}"})
    );

    // `get` is the same lookup
    let got = h.send(json!({"type": "filament", "action": "get", "id": id}));
    assert_eq!(got, listed);
}

#[test]
fn find_after_add() {
    let h = Harness::new();
    h.send(json!({
        "type": "filament",
        "action": "add",
        "motor_id": 5,
        "metadata": "{\"color\":\"red\"}",
    }));

    let red = h.registry.with_registry(|r| {
        r.find_by_metadata_field("color", "red")
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
    });
    assert_eq!(red.len(), 1);
    assert_eq!(red[0].motor_id, 5);

    let blue = h.send(json!({"type": "filament", "action": "find", "key": "color", "value": "blue"}));
    assert_eq!(blue, json!({"success": true, "filaments": []}));

    let found = h.send(json!({"type": "filament", "action": "find", "key": "color", "value": "red"}));
    assert_eq!(found["filaments"].as_array().unwrap().len(), 1);
}

#[test]
fn add_duplicate_motor() {
    let h = Harness::new();
    let add = json!({"type": "filament", "action": "add", "motor_id": 3, "metadata": "{}"});
    assert_eq!(h.send(add.clone()), json!({"success": true, "id": 1}));
    assert_eq!(h.send(add), error("Motor ID already in use"));
}

#[test]
fn add_with_bad_parameters() {
    let h = Harness::new();
    for request in [
        json!({"type": "filament", "action": "add", "metadata": "{}"}),
        json!({"type": "filament", "action": "add", "motor_id": 1}),
        json!({"type": "filament", "action": "add", "motor_id": "1", "metadata": "{}"}),
        json!({"type": "filament", "action": "add", "motor_id": 1.5, "metadata": "{}"}),
        json!({"type": "filament", "action": "add", "motor_id": 1, "metadata": {"color": "red"}}),
    ] {
        assert_eq!(h.send(request.clone()), error("Invalid parameters"), "{}", request);
    }
    assert!(h.registry.records().is_empty());
}

#[test]
fn remove_and_missing_ids() {
    let h = Harness::new();
    h.send(json!({"type": "filament", "action": "add", "motor_id": 1, "metadata": "{}"}));

    assert_eq!(
        h.send(json!({"type": "filament", "action": "remove", "id": 1})),
        json!({"success": true})
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "remove", "id": 1})),
        error("ID not found")
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "list", "id": 1})),
        error("ID not found")
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "remove"})),
        error("Invalid parameters")
    );
}

#[test]
fn update_fields_independently() {
    let h = Harness::new();
    h.send(json!({"type": "filament", "action": "add", "motor_id": 1, "metadata": "{\"color\":\"red\"}"}));
    h.send(json!({"type": "filament", "action": "add", "motor_id": 2, "metadata": "{}"}));

    // -1 leaves the motor alone
    assert_eq!(
        h.send(json!({"type": "filament", "action": "update", "id": 1, "motor_id": -1, "metadata": "{\"color\":\"blue\"}"})),
        json!({"success": true})
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "list", "id": 1})),
        json!({"id": 1, "motor_id": 1, "metadata": "{\"color\":\"blue\"}"})
    );

    // Motor collision changes nothing, metadata included
    assert_eq!(
        h.send(json!({"type": "filament", "action": "update", "id": 1, "motor_id": 2, "metadata": "{}"})),
        error("Update failed")
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "list", "id": 1})),
        json!({"id": 1, "motor_id": 1, "metadata": "{\"color\":\"blue\"}"})
    );

    assert_eq!(
        h.send(json!({"type": "filament", "action": "update", "id": 9, "motor_id": 4})),
        error("Update failed")
    );
}

#[test]
fn update_rejects_unusable_motor_numbers() {
    let h = Harness::new();
    h.send(json!({"type": "filament", "action": "add", "motor_id": 1, "metadata": "{}"}));

    for motor_id in [json!(2.5), json!(1e12), json!(-3_000_000_000i64)] {
        let request = json!({"type": "filament", "action": "update", "id": 1, "motor_id": motor_id});
        assert_eq!(h.send(request.clone()), error("Invalid parameters"), "{}", request);
    }
    assert_eq!(
        h.send(json!({"type": "filament", "action": "list", "id": 1})),
        json!({"id": 1, "motor_id": 1, "metadata": "{}"})
    );

    // Whole floats behave like integers, non-numbers mean no change
    assert_eq!(
        h.send(json!({"type": "filament", "action": "update", "id": 1, "motor_id": 2.0})),
        json!({"success": true})
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "update", "id": 1, "motor_id": "7"})),
        json!({"success": true})
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "list", "id": 1})),
        json!({"id": 1, "motor_id": 2, "metadata": "{}"})
    );
}

#[test]
fn list_all_and_count() {
    let h = Harness::new();
    assert_eq!(
        h.send(json!({"type": "filament", "action": "count"})),
        json!({"success": true, "count": 0})
    );
    h.send(json!({"type": "filament", "action": "add", "motor_id": 4, "metadata": "a"}));
    h.send(json!({"type": "filament", "action": "add", "motor_id": 8, "metadata": "b"}));

    assert_eq!(
        h.send(json!({"type": "filament", "action": "list_all"})),
        json!({
            "success": true,
            "filaments": [
                {"id": 1, "motor_id": 4, "metadata": "a"},
                {"id": 2, "motor_id": 8, "metadata": "b"},
            ],
        })
    );
    assert_eq!(
        h.send(json!({"type": "filament", "action": "count"})),
        json!({"success": true, "count": 2})
    );
}

#[test]
fn mutations_reach_storage() {
    let h = Harness::new();
    h.send(json!({"type": "filament", "action": "add", "motor_id": 4, "metadata": "{}"}));

    let durable = h.registry.with_registry(|r| r.store().durable());
    let mut reloaded = FilamentRegistry::new(durable, "filaments");
    reloaded.init();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get_by_motor(4).map(|r| r.id), Some(1));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn setting_is_passed_to_device() {
    let h = Harness::new();
    assert_eq!(
        h.send(json!({"type": "setting", "key": "wifi_ssid", "value": "workshop"})),
        json!({"success": true})
    );
    assert_eq!(
        h.device.settings(),
        vec![(SettingKey::WifiSsid, "workshop".to_string())]
    );
}

#[test]
fn setting_errors() {
    let h = Harness::new();
    assert_eq!(
        h.send(json!({"type": "setting", "value": "x"})),
        error("Missing or invalid key")
    );
    assert_eq!(
        h.send(json!({"type": "setting", "key": "volume", "value": "11"})),
        error("Unknown setting key")
    );
    assert_eq!(
        h.send(json!({"type": "setting", "key": "wifi_password", "value": 1234})),
        error("Invalid value for wifi_password")
    );

    h.device.set_fail_settings(true);
    assert_eq!(
        h.send(json!({"type": "setting", "key": "printer_ip", "value": "10.0.0.2"})),
        error("Failed to save setting")
    );
    assert!(h.device.settings().is_empty());
}

// ============================================================================
// System
// ============================================================================

#[test]
fn reboot_replies_before_restarting() {
    let h = Harness::new();
    let outcome = h
        .dispatcher
        .dispatch(br#"{"type":"system","action":"reboot"}"#);

    assert_eq!(
        parse(&outcome),
        json!({"success": true, "message": "Rebooting..."})
    );
    assert_eq!(outcome.after, Some(PostAction::Reboot));
    assert_eq!(h.device.reboot_count(), 0);

    h.dispatcher.run_post_action(outcome.after);
    assert_eq!(h.device.reboot_count(), 1);
}

#[test]
fn reconnect_wifi() {
    let h = Harness::new();
    assert_eq!(
        h.send(json!({"type": "system", "action": "reconnect_wifi"})),
        json!({"success": true, "message": "Reconnecting to WiFi..."})
    );
    assert_eq!(h.device.reconnect_count(), 1);

    h.device.set_fail_reconnect(true);
    assert_eq!(
        h.send(json!({"type": "system", "action": "reconnect_wifi"})),
        error("Failed to initiate WiFi reconnection")
    );
}

#[test]
fn get_mac() {
    let h = Harness::new();
    assert_eq!(
        h.send(json!({"type": "system", "action": "get_mac"})),
        json!({"success": true, "mac": "24:0A:C4:12:34:56"})
    );
}

// ============================================================================
// Printer Pass-through
// ============================================================================

#[test]
fn printer_commands_are_published() {
    let h = Harness::new();
    for request in [
        json!({"type": "printer", "action": "pause"}),
        json!({"type": "printer", "action": "light", "on": true}),
        json!({"type": "printer", "action": "light", "node": "heatbed_light", "on": false}),
        json!({"type": "printer", "action": "speed", "level": 3}),
        json!({"type": "printer", "action": "gcode", "gcode": "G28\n"}),
        json!({"type": "printer", "action": "switch_feeder", "target": 255}),
    ] {
        assert_eq!(h.send(request.clone()), json!({"success": true}), "{}", request);
    }

    assert_eq!(
        h.printer.sent(),
        vec![
            PrinterCommand::Pause,
            PrinterCommand::Light {
                node: LightNode::Chamber,
                on: true
            },
            PrinterCommand::Light {
                node: LightNode::Heatbed,
                on: false
            },
            PrinterCommand::SpeedProfile(SpeedLevel::Sport),
            PrinterCommand::Gcode("G28\n".to_string()),
            PrinterCommand::SwitchFeeder {
                target: 255,
                curr_temp: 0,
                tar_temp: 0
            },
        ]
    );
}

#[test]
fn printer_bad_parameters() {
    let h = Harness::new();
    for request in [
        json!({"type": "printer", "action": "light"}),
        json!({"type": "printer", "action": "light", "node": "porch", "on": true}),
        json!({"type": "printer", "action": "speed", "level": 5}),
        json!({"type": "printer", "action": "gcode"}),
        json!({"type": "printer", "action": "switch_feeder"}),
        json!({"type": "printer", "action": "prompt_sound", "enabled": "yes"}),
    ] {
        assert_eq!(h.send(request.clone()), error("Invalid parameters"), "{}", request);
    }
    assert!(h.printer.sent().is_empty());
}

#[test]
fn printer_offline() {
    let h = Harness::new();
    h.printer.set_connected(false);
    assert_eq!(
        h.send(json!({"type": "printer", "action": "push_all"})),
        error("Printer not connected")
    );
}

struct RefusingLink;

impl PrinterLink for RefusingLink {
    fn send(&self, _command: &PrinterCommand) -> Result<(), LinkError> {
        Err(LinkError::Publish("queue full".to_string()))
    }
}

#[test]
fn printer_publish_refused() {
    let registry = Arc::new(SharedRegistry::new(FilamentRegistry::new(
        MockStore::new(),
        "filaments",
    )));
    let dispatcher: TestDispatcher<RefusingLink> =
        Dispatcher::new(registry, Arc::new(MockDevice::new()), RefusingLink);

    let outcome = dispatcher.dispatch(br#"{"type":"printer","action":"resume"}"#);
    assert_eq!(parse(&outcome), error("Failed to send printer command"));
}
