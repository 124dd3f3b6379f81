//! Control-protocol dispatcher.
//!
//! One JSON request in, one JSON response out. The request's `type`
//! selects a handler (`setting`, `system`, `filament`, `printer`), the
//! `action` selects the operation, and every outcome is rendered as either
//! `{"success": true, ...}` or `{"error": "<message>"}`. The one exception
//! is a filament lookup, which answers with the bare record.
//!
//! # Example
//!
//! ```rust
//! use core::cell::RefCell;
//! use top_ams::hal::{MockDevice, MockStore};
//! use top_ams::traits::NoPrinter;
//! use top_ams::{Dispatcher, FilamentRegistry};
//!
//! let registry = RefCell::new(FilamentRegistry::new(MockStore::new(), "filaments"));
//! let dispatcher = Dispatcher::new(&registry, MockDevice::new(), NoPrinter);
//!
//! let out = dispatcher.dispatch(br#"{"type":"filament","action":"add","motor_id":5,"metadata":"{}"}"#);
//! assert_eq!(out.response, r#"{"id":1,"success":true}"#);
//! ```

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use crate::commands::{LightNode, PrinterCommand, SpeedLevel};
use crate::metadata::Metadata;
use crate::registry::{FilamentRecord, RegistryAccess, RegistryError};
use crate::settings::SettingKey;
use crate::traits::{format_mac, DeviceControl, LinkError, PrinterLink};

// ============================================================================
// Outcome
// ============================================================================

/// Side effect to run after the response has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    /// Restart the device.
    Reboot,
}

/// Rendered response plus any deferred side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// JSON response text.
    pub response: String,
    /// Action to run once `response` is on the wire.
    pub after: Option<PostAction>,
}

impl DispatchOutcome {
    fn reply(value: Value) -> Self {
        Self {
            response: value.to_string(),
            after: None,
        }
    }

    fn then(mut self, action: PostAction) -> Self {
        self.after = Some(action);
        self
    }
}

/// Reply for a frame longer than `max_frame_len`, or `None` if it fits.
///
/// Transports call this before reading the payload so an oversized frame is
/// never buffered.
pub fn oversized_frame(len: usize, max_frame_len: usize) -> Option<DispatchOutcome> {
    (len > max_frame_len).then(|| DispatchOutcome::reply(error("Message too large")))
}

fn error(message: &str) -> Value {
    json!({ "error": message })
}

fn success() -> Value {
    json!({ "success": true })
}

fn record_json(record: &FilamentRecord) -> Value {
    json!({
        "id": record.id,
        "motor_id": record.motor_id,
        "metadata": record.metadata.as_str(),
    })
}

fn records_json<'a>(records: impl IntoIterator<Item = &'a FilamentRecord>) -> Value {
    Value::Array(records.into_iter().map(record_json).collect())
}

// ============================================================================
// Field Helpers
// ============================================================================

/// Integer field. Whole-valued floats are accepted; anything outside `i32` is not.
fn int_field(request: &Map<String, Value>, name: &str) -> Option<i32> {
    let value = request.get(name)?;
    let wide = value.as_i64().or_else(|| {
        value
            .as_f64()
            .map(|f| (f, f as i64))
            .filter(|(f, whole)| *whole as f64 == *f)
            .map(|(_, whole)| whole)
    })?;
    i32::try_from(wide).ok()
}

fn str_field<'a>(request: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    request.get(name).and_then(Value::as_str)
}

fn bool_field(request: &Map<String, Value>, name: &str) -> Option<bool> {
    request.get(name).and_then(Value::as_bool)
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Interprets control requests against the registry and device.
///
/// Generic over how the registry is shared (`R`), the device side effects
/// (`D`) and the printer channel (`P`), so the same dispatcher runs on
/// ESP32, on desktop and in tests.
pub struct Dispatcher<R, D, P> {
    registry: R,
    device: D,
    printer: P,
}

impl<R, D, P> Dispatcher<R, D, P>
where
    R: RegistryAccess,
    D: DeviceControl,
    P: PrinterLink,
{
    /// Create a dispatcher over the given collaborators.
    pub fn new(registry: R, device: D, printer: P) -> Self {
        Self {
            registry,
            device,
            printer,
        }
    }

    /// The registry handle.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// The device handle.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The printer link.
    pub fn printer(&self) -> &P {
        &self.printer
    }

    /// Handle one raw request frame.
    ///
    /// Always produces a response; never panics on client input.
    pub fn dispatch(&self, raw: &[u8]) -> DispatchOutcome {
        let request = match serde_json::from_slice::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            // Valid JSON that is not an object has no type field
            Ok(_) => return DispatchOutcome::reply(error("Missing or invalid action")),
            Err(_) => return DispatchOutcome::reply(error("Invalid JSON")),
        };

        let Some(kind) = str_field(&request, "type") else {
            return DispatchOutcome::reply(error("Missing or invalid action"));
        };
        debug!("control request type={}", kind);

        match kind {
            "setting" => DispatchOutcome::reply(self.handle_setting(&request)),
            "system" => self.handle_system(&request),
            "filament" => DispatchOutcome::reply(self.handle_filament(&request)),
            "printer" => DispatchOutcome::reply(self.handle_printer(&request)),
            _ => DispatchOutcome::reply(error("Unknown type")),
        }
    }

    /// Run a deferred action after its response was sent.
    pub fn run_post_action(&self, action: Option<PostAction>) {
        if let Some(PostAction::Reboot) = action {
            info!("rebooting on request");
            self.device.reboot();
        }
    }

    // ------------------------------------------------------------------------
    // setting
    // ------------------------------------------------------------------------

    fn handle_setting(&self, request: &Map<String, Value>) -> Value {
        let Some(name) = str_field(request, "key") else {
            return error("Missing or invalid key");
        };
        let Some(key) = SettingKey::parse(name) else {
            return error("Unknown setting key");
        };
        let Some(value) = str_field(request, "value") else {
            return error(&alloc::format!("Invalid value for {}", key));
        };

        match self.device.apply_setting(key, value) {
            Ok(()) => success(),
            Err(e) => {
                warn!("setting {} not saved: {}", key, e);
                error("Failed to save setting")
            }
        }
    }

    // ------------------------------------------------------------------------
    // system
    // ------------------------------------------------------------------------

    fn handle_system(&self, request: &Map<String, Value>) -> DispatchOutcome {
        let Some(action) = str_field(request, "action") else {
            return DispatchOutcome::reply(error("Missing or invalid action"));
        };

        match action {
            "reboot" => DispatchOutcome::reply(json!({
                "success": true,
                "message": "Rebooting...",
            }))
            .then(PostAction::Reboot),
            "reconnect_wifi" => match self.device.reconnect_wifi() {
                Ok(()) => DispatchOutcome::reply(json!({
                    "success": true,
                    "message": "Reconnecting to WiFi...",
                })),
                Err(e) => {
                    warn!("{}", e);
                    DispatchOutcome::reply(error("Failed to initiate WiFi reconnection"))
                }
            },
            "get_mac" => DispatchOutcome::reply(json!({
                "success": true,
                "mac": format_mac(&self.device.mac_address()),
            })),
            _ => DispatchOutcome::reply(error("Unknown action")),
        }
    }

    // ------------------------------------------------------------------------
    // filament
    // ------------------------------------------------------------------------

    fn handle_filament(&self, request: &Map<String, Value>) -> Value {
        let Some(action) = str_field(request, "action") else {
            return error("Missing or invalid action");
        };

        match action {
            "add" => self.filament_add(request),
            "remove" => self.filament_remove(request),
            "update" => self.filament_update(request),
            "list" | "get" => self.filament_get(request),
            "list_all" => self.registry.with_registry(|r| {
                json!({ "success": true, "filaments": records_json(r.records()) })
            }),
            "find" => self.filament_find(request),
            "count" => self
                .registry
                .with_registry(|r| json!({ "success": true, "count": r.len() })),
            _ => error("Unknown action"),
        }
    }

    fn filament_add(&self, request: &Map<String, Value>) -> Value {
        let (Some(motor_id), Some(metadata)) =
            (int_field(request, "motor_id"), str_field(request, "metadata"))
        else {
            return error("Invalid parameters");
        };

        let metadata = Metadata::new(metadata);
        match self.registry.with_registry(|r| r.add(motor_id, metadata)) {
            Ok(id) => json!({ "success": true, "id": id }),
            Err(RegistryError::DuplicateMotor(_)) => error("Motor ID already in use"),
            Err(e) => {
                warn!("add failed: {}", e);
                error("Invalid parameters")
            }
        }
    }

    fn filament_remove(&self, request: &Map<String, Value>) -> Value {
        let Some(id) = int_field(request, "id") else {
            return error("Invalid parameters");
        };

        match self.registry.with_registry(|r| r.remove(id)) {
            Ok(_) => success(),
            Err(_) => error("ID not found"),
        }
    }

    fn filament_update(&self, request: &Map<String, Value>) -> Value {
        let Some(id) = int_field(request, "id") else {
            return error("Invalid parameters");
        };
        // A non-number or -1 leaves the motor unchanged; any other number must be valid
        let motor_id = match request.get("motor_id") {
            Some(Value::Number(_)) => match int_field(request, "motor_id") {
                Some(-1) => None,
                Some(m) => Some(m),
                None => return error("Invalid parameters"),
            },
            _ => None,
        };
        let metadata = str_field(request, "metadata").map(Metadata::new);

        match self
            .registry
            .with_registry(|r| r.update(id, motor_id, metadata))
        {
            Ok(()) => success(),
            Err(e) => {
                debug!("update of {} failed: {}", id, e);
                error("Update failed")
            }
        }
    }

    fn filament_get(&self, request: &Map<String, Value>) -> Value {
        let Some(id) = int_field(request, "id") else {
            return error("Invalid parameters");
        };

        self.registry.with_registry(|r| match r.get_by_id(id) {
            Some(record) => record_json(record),
            None => error("ID not found"),
        })
    }

    fn filament_find(&self, request: &Map<String, Value>) -> Value {
        let Some(key) = str_field(request, "key") else {
            return error("Invalid parameters");
        };
        // Non-string values are matched by their rendered text
        let value = match request.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
            _ => return error("Invalid parameters"),
        };

        self.registry.with_registry(|r| {
            let found: Vec<&FilamentRecord> = r.find_by_metadata_field(key, &value);
            json!({ "success": true, "filaments": records_json(found) })
        })
    }

    // ------------------------------------------------------------------------
    // printer
    // ------------------------------------------------------------------------

    fn handle_printer(&self, request: &Map<String, Value>) -> Value {
        let Some(action) = str_field(request, "action") else {
            return error("Missing or invalid action");
        };

        let command = match parse_printer_command(action, request) {
            Ok(command) => command,
            Err(message) => return error(message),
        };

        match self.printer.send(&command) {
            Ok(()) => success(),
            Err(LinkError::NotConnected) => error("Printer not connected"),
            Err(e) => {
                warn!("printer command failed: {}", e);
                error("Failed to send printer command")
            }
        }
    }
}

/// Build a printer command from a `printer` request.
fn parse_printer_command(
    action: &str,
    request: &Map<String, Value>,
) -> Result<PrinterCommand, &'static str> {
    const INVALID: &str = "Invalid parameters";

    let command = match action {
        "pause" => PrinterCommand::Pause,
        "resume" => PrinterCommand::Resume,
        "stop" => PrinterCommand::Stop,
        "push_all" => PrinterCommand::PushAll,
        "get_version" => PrinterCommand::GetVersion,
        "light" => {
            let node = str_field(request, "node")
                .map(LightNode::parse)
                .unwrap_or(Some(LightNode::Chamber))
                .ok_or(INVALID)?;
            let on = bool_field(request, "on").ok_or(INVALID)?;
            PrinterCommand::Light { node, on }
        }
        "speed" => {
            let level = int_field(request, "level").ok_or(INVALID)?;
            PrinterCommand::SpeedProfile(SpeedLevel::from_level(level.into()).ok_or(INVALID)?)
        }
        "gcode" => {
            let gcode = str_field(request, "gcode").ok_or(INVALID)?;
            PrinterCommand::Gcode(gcode.to_string())
        }
        "switch_feeder" => PrinterCommand::SwitchFeeder {
            target: int_field(request, "target").ok_or(INVALID)?,
            curr_temp: int_field(request, "curr_temp").unwrap_or(0),
            tar_temp: int_field(request, "tar_temp").unwrap_or(0),
        },
        "prompt_sound" => PrinterCommand::PromptSound(bool_field(request, "enabled").ok_or(INVALID)?),
        _ => return Err("Unknown action"),
    };
    Ok(command)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::hal::{MockDevice, MockPrinterLink, MockStore};
    use crate::registry::FilamentRegistry;
    use core::cell::RefCell;

    type TestRegistry = RefCell<FilamentRegistry<MockStore>>;

    fn registry() -> TestRegistry {
        RefCell::new(FilamentRegistry::new(MockStore::new(), "filaments"))
    }

    fn parse(outcome: &DispatchOutcome) -> Value {
        serde_json::from_str(&outcome.response).unwrap()
    }

    #[test]
    fn invalid_json() {
        let reg = registry();
        let d = Dispatcher::new(&reg, MockDevice::new(), MockPrinterLink::new());
        assert_eq!(parse(&d.dispatch(b"{not json")), json!({"error": "Invalid JSON"}));
    }

    #[test]
    fn non_object_request() {
        let reg = registry();
        let d = Dispatcher::new(&reg, MockDevice::new(), MockPrinterLink::new());
        assert_eq!(
            parse(&d.dispatch(b"[1,2]")),
            json!({"error": "Missing or invalid action"})
        );
    }

    #[test]
    fn missing_type() {
        let reg = registry();
        let d = Dispatcher::new(&reg, MockDevice::new(), MockPrinterLink::new());
        assert_eq!(
            parse(&d.dispatch(br#"{"type":5}"#)),
            json!({"error": "Missing or invalid action"})
        );
    }

    #[test]
    fn int_field_accepts_whole_floats_only() {
        let map = json!({"a": 3, "b": 3.0, "c": 3.5, "d": "3", "e": 1e12});
        let map = map.as_object().unwrap();
        assert_eq!(int_field(map, "a"), Some(3));
        assert_eq!(int_field(map, "b"), Some(3));
        assert_eq!(int_field(map, "c"), None);
        assert_eq!(int_field(map, "d"), None);
        assert_eq!(int_field(map, "e"), None);
    }

    #[test]
    fn update_minus_one_keeps_motor() {
        let reg = registry();
        let d = Dispatcher::new(&reg, MockDevice::new(), MockPrinterLink::new());
        d.dispatch(br#"{"type":"filament","action":"add","motor_id":4,"metadata":"{}"}"#);
        let out = d.dispatch(
            br#"{"type":"filament","action":"update","id":1,"motor_id":-1,"metadata":"{\"a\":1}"}"#,
        );
        assert_eq!(parse(&out), json!({"success": true}));
        reg.with_registry(|r| {
            let rec = r.get_by_id(1).unwrap();
            assert_eq!(rec.motor_id, 4);
            assert_eq!(rec.metadata.as_str(), r#"{"a":1}"#);
        });
    }

    #[test]
    fn printer_light_defaults_to_chamber() {
        let cmd = parse_printer_command("light", json!({"on": true}).as_object().unwrap());
        assert_eq!(
            cmd,
            Ok(PrinterCommand::Light {
                node: LightNode::Chamber,
                on: true
            })
        );
    }

    #[test]
    fn printer_bad_params() {
        let empty = Map::new();
        assert_eq!(parse_printer_command("light", &empty), Err("Invalid parameters"));
        assert_eq!(
            parse_printer_command("speed", json!({"level": 9}).as_object().unwrap()),
            Err("Invalid parameters")
        );
        assert_eq!(parse_printer_command("explode", &empty), Err("Unknown action"));
    }

    #[test]
    fn oversized_frames_get_an_error_without_a_post_action() {
        assert_eq!(oversized_frame(4096, 4096), None);
        assert_eq!(oversized_frame(0, 4096), None);

        let outcome = oversized_frame(200 * 1024, 4096).unwrap();
        assert_eq!(parse(&outcome), json!({"error": "Message too large"}));
        assert_eq!(outcome.after, None);
    }
}
