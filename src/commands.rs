//! Printer-bound command catalog.
//!
//! Every command the AMS can publish on the printer request topic, each
//! rendered as a fixed JSON body with its parameters substituted. Encoding
//! is pure: the same command always yields byte-identical output.
//!
//! # Example
//!
//! ```rust
//! use top_ams::commands::PrinterCommand;
//!
//! let body = PrinterCommand::Pause.encode();
//! assert_eq!(body, r#"{"print":{"command":"pause","sequence_id":"0"}}"#);
//! ```

use alloc::format;
use alloc::string::{String, ToString};

use serde_json::{json, Value};

/// Controllable light on the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightNode {
    /// Main chamber light.
    Chamber,
    /// Secondary chamber light.
    Chamber2,
    /// Heat-bed light.
    Heatbed,
}

impl LightNode {
    /// Node name used by the printer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chamber => "chamber_light",
            Self::Chamber2 => "chamber_light2",
            Self::Heatbed => "heatbed_light",
        }
    }

    /// Parse a node name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chamber_light" => Some(Self::Chamber),
            "chamber_light2" => Some(Self::Chamber2),
            "heatbed_light" => Some(Self::Heatbed),
            _ => None,
        }
    }

    /// Blink on/off time in ms. The heat-bed light takes zero.
    fn blink_ms(&self) -> u32 {
        match self {
            Self::Heatbed => 0,
            _ => 500,
        }
    }
}

/// Buzzer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerMode {
    /// Silence the buzzer.
    Silent = 0,
    /// Continuous alarm.
    Alarm = 1,
    /// Intermittent beeping.
    Beeping = 2,
}

/// Print speed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedLevel {
    /// Silent (50%).
    Silent = 1,
    /// Standard (100%).
    Standard = 2,
    /// Sport (124%).
    Sport = 3,
    /// Ludicrous (166%).
    Ludicrous = 4,
}

impl SpeedLevel {
    /// Level from its numeric value, 1 through 4.
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Silent),
            2 => Some(Self::Standard),
            3 => Some(Self::Sport),
            4 => Some(Self::Ludicrous),
            _ => None,
        }
    }
}

/// Command published to the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterCommand {
    /// Switch a light on or off.
    Light {
        /// Which light.
        node: LightNode,
        /// On when true.
        on: bool,
    },
    /// Change the print speed profile.
    SpeedProfile(SpeedLevel),
    /// Ask for firmware/module versions.
    GetVersion,
    /// Pause the current print.
    Pause,
    /// Resume a paused print.
    Resume,
    /// Stop the current print.
    Stop,
    /// Request a full status report.
    PushAll,
    /// Start periodic status pushes.
    StartPush,
    /// Run raw G-code, lines separated by `\n`.
    Gcode(String),
    /// Switch the active feeder slot.
    SwitchFeeder {
        /// Target slot, 255 to unload.
        target: i32,
        /// Current nozzle temperature.
        curr_temp: i32,
        /// Target nozzle temperature.
        tar_temp: i32,
    },
    /// Assign a filament profile to a tray.
    FilamentSetting {
        /// AMS unit index.
        ams_id: i32,
        /// Tray index within the unit.
        tray_id: i32,
        /// Filament profile id.
        tray_info_idx: String,
        /// Colour as `RRGGBBAA` hex.
        tray_color: String,
        /// Minimum nozzle temperature.
        nozzle_temp_min: i32,
        /// Maximum nozzle temperature.
        nozzle_temp_max: i32,
        /// Material, e.g. `"PLA"`.
        tray_type: String,
    },
    /// List attached accessories (X1 only).
    GetAccessories,
    /// Enable or disable prompt sounds.
    PromptSound(bool),
    /// Set the buzzer mode.
    Buzzer(BuzzerMode),
}

impl PrinterCommand {
    /// Convert command to JSON payload.
    pub fn to_json(&self) -> Value {
        match self {
            PrinterCommand::Light { node, on } => json!({
                "system": {
                    "sequence_id": "0",
                    "command": "ledctrl",
                    "led_node": node.as_str(),
                    "led_mode": if *on { "on" } else { "off" },
                    "led_on_time": node.blink_ms(),
                    "led_off_time": node.blink_ms(),
                    "loop_times": 0,
                    "interval_time": 0
                }
            }),

            PrinterCommand::SpeedProfile(level) => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "print_speed",
                    "param": (*level as u8).to_string()
                }
            }),

            PrinterCommand::GetVersion => json!({
                "info": {
                    "sequence_id": "0",
                    "command": "get_version"
                }
            }),

            PrinterCommand::Pause => print_command("pause"),
            PrinterCommand::Resume => print_command("resume"),
            PrinterCommand::Stop => print_command("stop"),

            PrinterCommand::PushAll => json!({
                "pushing": {
                    "sequence_id": "0",
                    "command": "pushall"
                }
            }),

            PrinterCommand::StartPush => json!({
                "pushing": {
                    "sequence_id": "0",
                    "command": "start"
                }
            }),

            PrinterCommand::Gcode(gcode) => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "gcode_line",
                    "param": gcode
                }
            }),

            PrinterCommand::SwitchFeeder {
                target,
                curr_temp,
                tar_temp,
            } => json!({
                "print": {
                    "command": "ams_change_filament",
                    "sequence_id": "0",
                    "target": target,
                    "curr_temp": curr_temp,
                    "tar_temp": tar_temp
                }
            }),

            PrinterCommand::FilamentSetting {
                ams_id,
                tray_id,
                tray_info_idx,
                tray_color,
                nozzle_temp_min,
                nozzle_temp_max,
                tray_type,
            } => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "ams_filament_setting",
                    "ams_id": ams_id,
                    "tray_id": tray_id,
                    "tray_info_idx": tray_info_idx,
                    "tray_color": tray_color,
                    "nozzle_temp_min": nozzle_temp_min,
                    "nozzle_temp_max": nozzle_temp_max,
                    "tray_type": tray_type
                }
            }),

            PrinterCommand::GetAccessories => json!({
                "system": {
                    "sequence_id": "0",
                    "command": "get_accessories",
                    "accessory_type": "none"
                }
            }),

            PrinterCommand::PromptSound(enable) => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "print_option",
                    "sound_enable": enable
                }
            }),

            PrinterCommand::Buzzer(mode) => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "buzzer_ctrl",
                    "mode": *mode as u8,
                    "reason": ""
                }
            }),
        }
    }

    /// Render the payload published on the request topic.
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }
}

fn print_command(command: &str) -> Value {
    json!({
        "print": {
            "sequence_id": "0",
            "command": command
        }
    })
}

// ============================================================================
// G-code Helpers
// ============================================================================

/// G-code that homes all axes.
pub const HOME_GCODE: &str = "G28\n";

/// Relative move of one axis, wrapped in soft-endstop handling.
pub fn move_axis_gcode(axis: char, distance: i32, speed: i32) -> String {
    format!(
        "M211 S\nM211 X1 Y1 Z1\nM1002 push_ref_mode\nG91 \nG1 {}{}.0 F{}\nM1002 pop_ref_mode\nM211 R\n",
        axis, distance, speed
    )
}

/// Relative extrusion of `distance` mm.
pub fn extruder_gcode(distance: i32) -> String {
    format!("M83 \nG0 E{}.0 F900\n", distance)
}
