//! Printer-bound network abstraction.
//!
//! The printer exposes a pub/sub channel: status reports arrive on
//! `device/<serial>/report` and commands are published on
//! `device/<serial>/request`. The core only needs the outbound half,
//! expressed as [`PrinterLink`]. The inbound half feeds
//! [`crate::telemetry::extract`] from whichever transport is in use.
//!
//! ```text
//! device/<serial>/report   - printer -> AMS (telemetry, read-only)
//! device/<serial>/request  - AMS -> printer (fire-and-forget commands)
//! ```

use alloc::string::String;
use alloc::sync::Arc;

use crate::commands::PrinterCommand;

/// Error returned when a command cannot be handed to the printer channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// No printer connection is configured or it is currently down.
    #[error("printer not connected")]
    NotConnected,
    /// The transport refused the publish.
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Outbound channel to the printer.
///
/// Publishing is fire-and-forget: `Ok` means the transport accepted the
/// message, not that the printer acted on it.
pub trait PrinterLink {
    /// Publish one encoded command on the printer request channel.
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError>;

    /// Whether the link currently believes it is connected.
    fn is_connected(&self) -> bool {
        true
    }
}

impl<T: PrinterLink + ?Sized> PrinterLink for Arc<T> {
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError> {
        (**self).send(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

impl<T: PrinterLink + ?Sized> PrinterLink for &T {
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError> {
        (**self).send(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

impl<T: PrinterLink> PrinterLink for Option<T> {
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError> {
        match self {
            Some(link) => link.send(command),
            None => Err(LinkError::NotConnected),
        }
    }

    fn is_connected(&self) -> bool {
        self.as_ref().is_some_and(PrinterLink::is_connected)
    }
}

/// Link used when no printer is configured. Every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrinter;

impl PrinterLink for NoPrinter {
    fn send(&self, _command: &PrinterCommand) -> Result<(), LinkError> {
        Err(LinkError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }
}
