//! # Error Types
//!
//! This module defines error types used throughout the catprint library.
//!
//! ## Policy
//!
//! | Error | Fatal? | Handling |
//! |-------|--------|----------|
//! | `Discovery` | yes | returned from `connect()` |
//! | `ProfileMismatch` | yes | returned from `connect()` |
//! | `InitWarning` | no | logged, collected, remaining init steps still run |
//! | `WriteFailure` | yes | aborts the job (and any queued jobs), no retry |
//! | `Disconnected` | yes | invalidates the connection, caller must reconnect |

use thiserror::Error;

/// Main error type for catprint operations
#[derive(Debug, Error)]
pub enum PrintError {
    /// No device was chosen, or BLE is unavailable on this host
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The connected device exposes none of the registered profiles
    #[error("No registered printer profile matches device {device}")]
    ProfileMismatch { device: String },

    /// A single init command failed. Never returned from a job, only logged
    /// and collected.
    #[error("Init command {step} for {profile} failed: {source}")]
    InitWarning {
        profile: &'static str,
        step: usize,
        #[source]
        source: TransportError,
    },

    /// The transport rejected a write
    #[error("Write failed at command {command}, chunk {chunk}: {source}")]
    WriteFailure {
        command: usize,
        chunk: usize,
        #[source]
        source: TransportError,
    },

    /// The printer went away
    #[error("Printer disconnected")]
    Disconnected,

    /// The matched characteristic supports neither write mode
    #[error("Characteristic {0} is not writable")]
    CharacteristicNotWritable(uuid::Uuid),

    /// An operation needed a live connection and none exists
    #[error("Printer not connected")]
    NotConnected,

    /// Another job holds the connection and the caller asked not to wait
    #[error("Printer is busy with another job")]
    Busy,

    /// Pixel data does not match its declared dimensions
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Configuration could not be loaded or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a GATT backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The service or characteristic does not exist on the device
    #[error("{0} not found")]
    NotFound(String),

    /// The device refused the write
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The write did not complete within the configured timeout
    #[error("write timed out after {0} ms")]
    Timeout(u64),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

/// Result type for catprint operations
pub type PrintResult<T> = Result<T, PrintError>;
