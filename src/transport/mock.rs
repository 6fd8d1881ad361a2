//! # Mock Printer
//!
//! An in-memory GATT device that records every write. Used by the unit and
//! integration tests and by the library's doc examples.
//!
//! ```
//! use catprint::transport::mock::MockPrinter;
//!
//! let mock = MockPrinter::x5().fail_write_at(3);
//! assert!(mock.writes().is_empty());
//! ```
//!
//! Failure injection works on the write *attempt* index across the whole
//! device, so `fail_write_at(3)` rejects the fourth write the device sees.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    CharacteristicProperties, Connection, Discovery, GattCharacteristic, GattServer, GattService, Pacer, WriteKind,
};
use crate::error::{PrintError, PrintResult, TransportError};
use crate::printer::{DeviceFilter, PrinterProfile};
use crate::printer::profile::{CAT_READ_WRITE_CHARACTERISTIC, CAT_SERVICE, CAT_WRITE_CHARACTERISTIC};

/// One successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub characteristic: Uuid,
    pub kind: WriteKind,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    writes: Vec<WriteRecord>,
    attempts: usize,
    fail_at: Vec<usize>,
    disconnect_at: Option<usize>,
    latency: Option<Duration>,
    disconnects: usize,
    link: CancellationToken,
}

/// # Mock Printer
///
/// Cheap to clone; clones share the same device state.
#[derive(Clone)]
pub struct MockPrinter {
    name: String,
    services: Arc<HashMap<Uuid, Vec<(Uuid, CharacteristicProperties)>>>,
    state: Arc<Mutex<MockState>>,
}

impl MockPrinter {
    /// A device with no services.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Arc::new(HashMap::new()),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// An X5 exposing both ae01 and ae10 under ae30.
    pub fn x5() -> Self {
        Self::new("X5")
            .with_characteristic(CAT_SERVICE, CAT_WRITE_CHARACTERISTIC, CharacteristicProperties::WRITABLE)
            .with_characteristic(CAT_SERVICE, CAT_READ_WRITE_CHARACTERISTIC, CharacteristicProperties::WRITABLE)
    }

    /// A device exposing exactly one profile's pair.
    pub fn for_profile(name: impl Into<String>, profile: &PrinterProfile) -> Self {
        Self::new(name).with_characteristic(
            profile.service,
            profile.characteristic,
            CharacteristicProperties::WRITABLE,
        )
    }

    /// Add a characteristic. Must be called before the mock is cloned.
    pub fn with_characteristic(mut self, service: Uuid, characteristic: Uuid, props: CharacteristicProperties) -> Self {
        Arc::make_mut(&mut self.services)
            .entry(service)
            .or_default()
            .push((characteristic, props));
        self
    }

    /// Reject the write attempt with this index.
    pub fn fail_write_at(self, attempt: usize) -> Self {
        self.lock().fail_at.push(attempt);
        self
    }

    /// Drop the link during this write attempt. The write never completes.
    pub fn disconnect_at(self, attempt: usize) -> Self {
        self.lock().disconnect_at = Some(attempt);
        self
    }

    /// Delay every write.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Successful writes, in order.
    /// Service UUIDs the device advertises, sorted.
    pub fn advertised(&self) -> Vec<Uuid> {
        let mut uuids: Vec<Uuid> = self.services.keys().copied().collect();
        uuids.sort();
        uuids
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Every successfully written byte, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.lock().writes.iter().flat_map(|w| w.data.iter().copied()).collect()
    }

    /// Write attempts, including rejected ones.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// How many times `disconnect()` was called.
    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnects
    }

    /// Simulate the printer powering off.
    pub fn drop_link(&self) {
        self.lock().link.cancel();
    }

    /// Fresh link token if the previous one dropped.
    fn reconnect(&self) {
        let mut state = self.lock();
        if state.link.is_cancelled() {
            state.link = CancellationToken::new();
        }
    }

    fn token(&self) -> CancellationToken {
        self.lock().link.clone()
    }

    /// Build a connection for a profile without running init.
    pub async fn connection(&self, profile: PrinterProfile) -> PrintResult<Connection> {
        let server: Arc<dyn GattServer> = Arc::new(self.clone());
        let service = server
            .primary_service(profile.service)
            .await
            .map_err(|e| PrintError::Discovery(e.to_string()))?;
        let characteristic = service
            .characteristic(profile.characteristic)
            .await
            .map_err(|e| PrintError::Discovery(e.to_string()))?;
        let kind = characteristic
            .properties()
            .preferred_write()
            .ok_or(PrintError::CharacteristicNotWritable(profile.characteristic))?;
        Ok(Connection::new(server, profile, characteristic, kind))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GattServer for MockPrinter {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<Arc<dyn GattService>, TransportError> {
        if self.token().is_cancelled() {
            return Err(TransportError::Backend("not connected".into()));
        }
        match self.services.get(&uuid) {
            Some(chars) => Ok(Arc::new(MockService {
                uuid,
                characteristics: chars.clone(),
                printer: self.clone(),
            })),
            None => Err(TransportError::NotFound(format!("service {uuid}"))),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.disconnects += 1;
        state.link.cancel();
        Ok(())
    }

    fn link(&self) -> CancellationToken {
        self.token()
    }
}

struct MockService {
    uuid: Uuid,
    characteristics: Vec<(Uuid, CharacteristicProperties)>,
    printer: MockPrinter,
}

#[async_trait]
impl GattService for MockService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, TransportError> {
        self.characteristics
            .iter()
            .find(|(id, _)| *id == uuid)
            .map(|&(uuid, properties)| {
                Arc::new(MockCharacteristic {
                    uuid,
                    properties,
                    printer: self.printer.clone(),
                }) as Arc<dyn GattCharacteristic>
            })
            .ok_or_else(|| TransportError::NotFound(format!("characteristic {uuid}")))
    }
}

struct MockCharacteristic {
    uuid: Uuid,
    properties: CharacteristicProperties,
    printer: MockPrinter,
}

#[async_trait]
impl GattCharacteristic for MockCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn properties(&self) -> CharacteristicProperties {
        self.properties
    }

    async fn write(&self, data: &[u8], kind: WriteKind) -> Result<(), TransportError> {
        let (attempt, latency, hang, link) = {
            let mut state = self.printer.lock();
            let attempt = state.attempts;
            state.attempts += 1;
            (attempt, state.latency, state.disconnect_at == Some(attempt), state.link.clone())
        };

        if hang {
            link.cancel();
            std::future::pending::<()>().await;
        }
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        } else {
            tokio::task::yield_now().await;
        }
        if link.is_cancelled() {
            return Err(TransportError::Backend("link lost".into()));
        }

        let mut state = self.printer.lock();
        if state.fail_at.contains(&attempt) {
            return Err(TransportError::Rejected(format!("write {attempt} rejected")));
        }
        state.writes.push(WriteRecord {
            characteristic: self.uuid,
            kind,
            data: data.to_vec(),
        });
        Ok(())
    }
}

/// Hands out one prepared mock device.
#[derive(Clone)]
pub struct MockDiscovery {
    device: Option<MockPrinter>,
}

impl MockDiscovery {
    pub fn new(device: MockPrinter) -> Self {
        Self { device: Some(device) }
    }

    /// Discovery that never finds anything.
    pub fn empty() -> Self {
        Self { device: None }
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn request_device(&self, filter: &DeviceFilter) -> PrintResult<Arc<dyn GattServer>> {
        match &self.device {
            Some(device) if filter.accepts(Some(&device.name), &device.advertised()) => {
                device.reconnect();
                Ok(Arc::new(device.clone()))
            }
            Some(device) => Err(PrintError::Discovery(format!(
                "{} does not match the device filter",
                device.name
            ))),
            None => Err(PrintError::Discovery("no device chosen".into())),
        }
    }
}

/// Pacer that records requested pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        tokio::task::yield_now().await;
    }
}
