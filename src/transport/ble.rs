//! # BLE Transport (btleplug)
//!
//! Real hardware backend for the GATT traits, built on btleplug's central
//! role. Enabled with the `ble` feature.
//!
//! ## Discovery
//!
//! 1. Take the first Bluetooth adapter
//! 2. Scan for `scan_time` (printers rarely advertise their services, so the
//!    scan itself is unfiltered)
//! 3. Pick the first peripheral advertising one of the filter's services,
//!    else the first whose local name passes the [`DeviceFilter`]
//! 4. Subscribe to adapter events, then connect and discover services
//!
//! Adapter `DeviceDisconnected` events for the chosen peripheral cancel the
//! connection's link token, which fails any in-flight write with
//! `Disconnected`. The subscription is taken before connecting, and the
//! peripheral is checked once more after the watcher starts, so a drop during
//! connect still cancels the link.
//!
//! ## Platform Notes
//!
//! - Linux: needs BlueZ and permission to talk to it over D-Bus
//! - macOS: the terminal app must be granted Bluetooth access

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Manager, Peripheral};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CharacteristicProperties, Discovery, GattCharacteristic, GattServer, GattService, WriteKind};
use crate::error::{PrintError, PrintResult, TransportError};
use crate::printer::DeviceFilter;

/// Default scan window.
pub const DEFAULT_SCAN_TIME: Duration = Duration::from_secs(5);

fn discovery_err(e: btleplug::Error) -> PrintError {
    PrintError::Discovery(e.to_string())
}

fn backend_err(e: btleplug::Error) -> TransportError {
    TransportError::Backend(e.to_string())
}

/// Scans for and connects to a printer.
#[derive(Debug, Clone)]
pub struct BleDiscovery {
    pub scan_time: Duration,
}

impl Default for BleDiscovery {
    fn default() -> Self {
        Self {
            scan_time: DEFAULT_SCAN_TIME,
        }
    }
}

#[async_trait]
impl Discovery for BleDiscovery {
    async fn request_device(&self, filter: &DeviceFilter) -> PrintResult<Arc<dyn GattServer>> {
        let manager = Manager::new().await.map_err(discovery_err)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(discovery_err)?
            .into_iter()
            .next()
            .ok_or_else(|| PrintError::Discovery("no Bluetooth adapter".into()))?;

        info!(scan_ms = self.scan_time.as_millis() as u64, "scanning for printers");
        adapter.start_scan(ScanFilter::default()).await.map_err(discovery_err)?;
        tokio::time::sleep(self.scan_time).await;

        let mut by_service = None;
        let mut by_name = None;
        for peripheral in adapter.peripherals().await.map_err(discovery_err)? {
            let Some(props) = peripheral.properties().await.map_err(discovery_err)? else {
                continue;
            };
            if !filter.accepts(props.local_name.as_deref(), &props.services) {
                debug!(name = ?props.local_name, "skipping device");
                continue;
            }
            let name = props.local_name.unwrap_or_else(|| format!("{:?}", peripheral.id()));
            if filter.advertises_known_service(&props.services) {
                by_service = Some((peripheral, name));
                break;
            }
            if by_name.is_none() {
                by_name = Some((peripheral, name));
            }
        }
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "stop_scan failed");
        }

        let (peripheral, name) = by_service
            .or(by_name)
            .ok_or_else(|| PrintError::Discovery("no matching printer found".into()))?;

        let mut events = adapter.events().await.map_err(discovery_err)?;
        info!(device = %name, "connecting");
        peripheral.connect().await.map_err(discovery_err)?;
        peripheral.discover_services().await.map_err(discovery_err)?;

        let link = CancellationToken::new();
        let id = peripheral.id();
        let watch = link.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watch.cancelled() => break,
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                            watch.cancel();
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        });

        if !peripheral.is_connected().await.map_err(discovery_err)? {
            warn!(device = %name, "dropped while connecting");
            link.cancel();
        }

        Ok(Arc::new(BleServer { peripheral, name, link }))
    }
}

struct BleServer {
    peripheral: Peripheral,
    name: String,
    link: CancellationToken,
}

#[async_trait]
impl GattServer for BleServer {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<Arc<dyn GattService>, TransportError> {
        self.peripheral
            .services()
            .into_iter()
            .find(|s| s.primary && s.uuid == uuid)
            .map(|s| {
                Arc::new(BleService {
                    peripheral: self.peripheral.clone(),
                    uuid: s.uuid,
                    characteristics: s.characteristics.into_iter().collect(),
                }) as Arc<dyn GattService>
            })
            .ok_or_else(|| TransportError::NotFound(format!("service {uuid}")))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let result = self.peripheral.disconnect().await.map_err(backend_err);
        self.link.cancel();
        result
    }

    fn link(&self) -> CancellationToken {
        self.link.clone()
    }
}

struct BleService {
    peripheral: Peripheral,
    uuid: Uuid,
    characteristics: Vec<Characteristic>,
}

#[async_trait]
impl GattService for BleService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, TransportError> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .map(|c| {
                Arc::new(BleCharacteristic {
                    peripheral: self.peripheral.clone(),
                    characteristic: c.clone(),
                }) as Arc<dyn GattCharacteristic>
            })
            .ok_or_else(|| TransportError::NotFound(format!("characteristic {uuid}")))
    }
}

struct BleCharacteristic {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

#[async_trait]
impl GattCharacteristic for BleCharacteristic {
    fn uuid(&self) -> Uuid {
        self.characteristic.uuid
    }

    fn properties(&self) -> CharacteristicProperties {
        let flags = self.characteristic.properties;
        CharacteristicProperties {
            write: flags.contains(CharPropFlags::WRITE),
            write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        }
    }

    async fn write(&self, data: &[u8], kind: WriteKind) -> Result<(), TransportError> {
        let write_type = match kind {
            WriteKind::WithResponse => WriteType::WithResponse,
            WriteKind::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(&self.characteristic, data, write_type)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))
    }
}
