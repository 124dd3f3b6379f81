//! JSON response types for the HTTP status endpoints.
//!
//! The control protocol itself answers with free-form JSON built by the
//! dispatcher; these types cover the read-only REST side.

use serde::{Deserialize, Serialize};

use crate::registry::FilamentRecord;
use crate::telemetry::PrinterStatus;

// ============================================================================
// Response Types
// ============================================================================

/// API response wrapper for consistent JSON structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (present when success=true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present when success=false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Device status: printer telemetry plus registry summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Last known printer telemetry
    pub printer: PrinterStatus,
    /// Whether the printer link is up
    pub printer_connected: bool,
    /// Number of registered filaments
    pub filament_count: usize,
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilamentResponse {
    /// Filament id
    pub id: i32,
    /// Feeder motor
    pub motor_id: i32,
    /// Raw metadata text
    pub metadata: String,
}

impl From<&FilamentRecord> for FilamentResponse {
    fn from(record: &FilamentRecord) -> Self {
        Self {
            id: record.id,
            motor_id: record.motor_id,
            metadata: record.metadata.as_str().to_string(),
        }
    }
}
