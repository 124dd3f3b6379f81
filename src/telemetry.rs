//! Printer telemetry extraction.
//!
//! The printer pushes large status reports on its report topic. The AMS
//! only cares about a handful of fields under the `"print"` object, and
//! most reports are partial deltas, so extraction produces a
//! [`StatusUpdate`] of optional fields that is merged into the last known
//! [`PrinterStatus`].
//!
//! Extraction is total: malformed JSON, a missing `"print"` object or a
//! wrong-typed field simply produce an update with fewer fields set.

use alloc::string::String;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Last known printer status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    /// Nozzle temperature in °C.
    pub nozzle_temper: f64,
    /// Bed temperature in °C.
    pub bed_temper: f64,
    /// Printer Wi-Fi signal as reported, e.g. `"-45dBm"`.
    pub wifi_signal: String,
}

/// Fields found in one status report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusUpdate {
    /// Nozzle temperature, if present and numeric.
    pub nozzle_temper: Option<f64>,
    /// Bed temperature, if present and numeric.
    pub bed_temper: Option<f64>,
    /// Wi-Fi signal, if present and a string.
    pub wifi_signal: Option<String>,
}

impl StatusUpdate {
    /// True when the report carried none of the tracked fields.
    pub fn is_empty(&self) -> bool {
        self.nozzle_temper.is_none() && self.bed_temper.is_none() && self.wifi_signal.is_none()
    }
}

/// Pull the tracked fields out of a raw report payload.
///
/// ```rust
/// use top_ams::telemetry::extract;
///
/// let update = extract(br#"{"print":{"nozzle_temper":215.5,"wifi_signal":"-40dBm"}}"#);
/// assert_eq!(update.nozzle_temper, Some(215.5));
/// assert_eq!(update.bed_temper, None);
/// assert_eq!(update.wifi_signal.as_deref(), Some("-40dBm"));
///
/// assert!(extract(b"not json").is_empty());
/// ```
pub fn extract(payload: &[u8]) -> StatusUpdate {
    match serde_json::from_slice::<Value>(payload) {
        Ok(value) => extract_value(&value),
        Err(_) => StatusUpdate::default(),
    }
}

/// Same as [`extract`] for an already parsed report.
pub fn extract_value(report: &Value) -> StatusUpdate {
    let Some(print) = report.get("print").filter(|p| p.is_object()) else {
        return StatusUpdate::default();
    };

    StatusUpdate {
        nozzle_temper: print.get("nozzle_temper").and_then(Value::as_f64),
        bed_temper: print.get("bed_temper").and_then(Value::as_f64),
        wifi_signal: print
            .get("wifi_signal")
            .and_then(Value::as_str)
            .map(String::from),
    }
}

/// Apply an update to a status, keeping old values for absent fields.
pub fn merge(old: &PrinterStatus, update: StatusUpdate) -> PrinterStatus {
    PrinterStatus {
        nozzle_temper: update.nozzle_temper.unwrap_or(old.nozzle_temper),
        bed_temper: update.bed_temper.unwrap_or(old.bed_temper),
        wifi_signal: update
            .wifi_signal
            .unwrap_or_else(|| old.wifi_signal.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> PrinterStatus {
        PrinterStatus {
            nozzle_temper: 200.0,
            bed_temper: 60.0,
            wifi_signal: String::from("-50dBm"),
        }
    }

    #[test]
    fn full_report() {
        let update = extract(
            br#"{"print":{"nozzle_temper":220,"bed_temper":65.5,"wifi_signal":"-42dBm","mc_percent":12}}"#,
        );
        assert_eq!(update.nozzle_temper, Some(220.0));
        assert_eq!(update.bed_temper, Some(65.5));
        assert_eq!(update.wifi_signal.as_deref(), Some("-42dBm"));
    }

    #[test]
    fn wrong_types_are_skipped() {
        let update = extract(br#"{"print":{"nozzle_temper":"hot","bed_temper":null,"wifi_signal":-40}}"#);
        assert!(update.is_empty());
    }

    #[test]
    fn missing_or_non_object_print() {
        assert!(extract(br#"{"info":{"command":"get_version"}}"#).is_empty());
        assert!(extract(br#"{"print":"nope"}"#).is_empty());
        assert!(extract(b"[1,2,3]").is_empty());
        assert!(extract(b"").is_empty());
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let update = StatusUpdate {
            bed_temper: Some(70.0),
            ..Default::default()
        };
        let merged = merge(&status(), update);
        assert_eq!(merged.nozzle_temper, 200.0);
        assert_eq!(merged.bed_temper, 70.0);
        assert_eq!(merged.wifi_signal, "-50dBm");
    }

    #[test]
    fn merge_empty_update_is_identity() {
        assert_eq!(merge(&status(), StatusUpdate::default()), status());
    }
}
