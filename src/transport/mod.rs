//! # Printer Transport Layer
//!
//! BLE GATT plumbing between the job pipeline and a physical printer.
//!
//! ## Layers
//!
//! ```text
//! Discovery ──► GattServer ──► GattService ──► GattCharacteristic
//!  (pick a        (one BLE       (profile's        (the single
//!   device)        link)          service)          write endpoint)
//! ```
//!
//! The traits below are the seam between the pipeline and a BLE stack.
//! [`mock`] implements them in memory for tests and dry runs; `ble`
//! implements them on top of btleplug (feature `ble`).
//!
//! ## Ownership
//!
//! A [`Connection`] owns the matched characteristic. Only [`TransportWriter`]
//! writes to it, one write at a time.
//!
//! ## Available Transports
//!
//! - [`mock`]: In-memory printer that records every write
//! - `ble`: btleplug central (Linux, macOS, Windows)

#[cfg(feature = "ble")]
pub mod ble;
pub mod mock;
pub mod writer;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PrintResult, TransportError};
use crate::printer::{DeviceFilter, PrinterProfile};

pub use writer::{Pacer, Progress, ProgressFn, TokioPacer, TransportConfig, TransportWriter};

/// Write modes a characteristic advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties {
    pub write: bool,
    pub write_without_response: bool,
}

impl CharacteristicProperties {
    /// Both write modes.
    pub const WRITABLE: Self = Self {
        write: true,
        write_without_response: true,
    };

    /// The write mode to use: unacknowledged when available.
    pub fn preferred_write(&self) -> Option<WriteKind> {
        if self.write_without_response {
            Some(WriteKind::WithoutResponse)
        } else if self.write {
            Some(WriteKind::WithResponse)
        } else {
            None
        }
    }
}

/// GATT write flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Acknowledged write
    WithResponse,
    /// Unacknowledged write (lower latency)
    WithoutResponse,
}

/// A writable endpoint on the printer.
#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    fn properties(&self) -> CharacteristicProperties;

    async fn write(&self, data: &[u8], kind: WriteKind) -> Result<(), TransportError>;
}

/// A primary service on the printer.
#[async_trait]
pub trait GattService: Send + Sync {
    fn uuid(&self) -> Uuid;

    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, TransportError>;
}

/// A connected BLE device.
#[async_trait]
pub trait GattServer: Send + Sync {
    /// Advertised name, or an address when the device has none.
    fn device_name(&self) -> String;

    async fn primary_service(&self, uuid: Uuid) -> Result<Arc<dyn GattService>, TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Token cancelled when the link drops, whatever the cause.
    fn link(&self) -> CancellationToken;
}

/// One-shot device selection.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Choose a device matching `filter` and open its GATT server.
    async fn request_device(&self, filter: &DeviceFilter) -> PrintResult<Arc<dyn GattServer>>;
}

/// A live link to a printer with its matched profile.
#[derive(Clone)]
pub struct Connection {
    server: Arc<dyn GattServer>,
    profile: PrinterProfile,
    characteristic: Arc<dyn GattCharacteristic>,
    write_kind: WriteKind,
    link: CancellationToken,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("device", &self.server.device_name())
            .field("profile", &self.profile.name)
            .field("write_kind", &self.write_kind)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(
        server: Arc<dyn GattServer>,
        profile: PrinterProfile,
        characteristic: Arc<dyn GattCharacteristic>,
        write_kind: WriteKind,
    ) -> Self {
        let link = server.link();
        Self {
            server,
            profile,
            characteristic,
            write_kind,
            link,
        }
    }

    pub fn device_name(&self) -> String {
        self.server.device_name()
    }

    pub fn profile(&self) -> &PrinterProfile {
        &self.profile
    }

    pub fn write_kind(&self) -> WriteKind {
        self.write_kind
    }

    /// False once the link has dropped.
    pub fn is_alive(&self) -> bool {
        !self.link.is_cancelled()
    }

    pub fn link(&self) -> &CancellationToken {
        &self.link
    }

    /// Handle a BLE backend uses to report a dropped link.
    pub fn disconnect_handle(&self) -> DisconnectHandle {
        DisconnectHandle {
            link: self.link.clone(),
        }
    }

    pub(crate) fn characteristic(&self) -> &Arc<dyn GattCharacteristic> {
        &self.characteristic
    }

    /// Close the link and invalidate this connection.
    pub async fn close(&self) -> Result<(), TransportError> {
        let result = self.server.disconnect().await;
        self.link.cancel();
        result
    }
}

/// Reports asynchronous link loss.
#[derive(Debug, Clone)]
pub struct DisconnectHandle {
    link: CancellationToken,
}

impl DisconnectHandle {
    pub fn new(link: CancellationToken) -> Self {
        Self { link }
    }

    /// Mark the link as gone. Any in-flight write fails with `Disconnected`.
    pub fn notify(&self) {
        self.link.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.link.is_cancelled()
    }
}
