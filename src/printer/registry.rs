//! # Device Registry
//!
//! Resolves a connected GATT server to a [`PrinterProfile`].
//!
//! ## Probing
//!
//! ```text
//! for profile in registry (declared order):
//!     primary_service(profile.service)?        ── miss → next profile
//!     characteristic(profile.characteristic)?  ── miss → next profile
//!     → match (first success wins)
//! no match → ProfileMismatch
//! ```
//!
//! A device exposing several known pairs resolves to whichever profile is
//! declared first. Cat-family matches then run the connect-time init
//! sequence; each init command that fails is logged and skipped.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::profile::{PrinterProfile, VENDOR_EXTRA_SERVICE};
use crate::error::{PrintError, PrintResult};
use crate::transport::{Connection, GattServer, TransportWriter};

/// Advertised-name prefixes accepted by default.
pub const DEFAULT_NAME_PREFIXES: [&str; 5] = ["X5", "GB0", "MX", "PeriPage", "Printer"];

/// Narrows device discovery to likely printers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Accept devices whose name starts with any of these. Empty accepts all.
    pub name_prefixes: Vec<String>,
    /// Devices advertising any of these are accepted regardless of name
    pub services: Vec<Uuid>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            name_prefixes: DEFAULT_NAME_PREFIXES.iter().map(|s| s.to_string()).collect(),
            services: DeviceRegistry::builtin().service_uuids(),
        }
    }
}

impl DeviceFilter {
    /// Accept any device name.
    pub fn any() -> Self {
        Self {
            name_prefixes: Vec::new(),
            ..Self::default()
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name_prefixes.is_empty() || self.name_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Whether the device advertises one of the filter's services.
    pub fn advertises_known_service(&self, advertised: &[Uuid]) -> bool {
        advertised.iter().any(|uuid| self.services.contains(uuid))
    }

    /// Accept a scanned device by advertised service or by name.
    pub fn accepts(&self, name: Option<&str>, advertised: &[Uuid]) -> bool {
        self.advertises_known_service(advertised) || name.is_some_and(|n| self.matches(n))
    }
}

/// A probed connection plus the init commands that failed along the way.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub connection: Connection,
    /// `PrintError::InitWarning` entries, one per failed init command
    pub warnings: Vec<PrintError>,
}

/// # Device Registry
///
/// An ordered, immutable list of profiles, injected at construction.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    profiles: Vec<PrinterProfile>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DeviceRegistry {
    pub fn new(profiles: Vec<PrinterProfile>) -> Self {
        Self { profiles }
    }

    /// The built-in profile table.
    pub fn builtin() -> Self {
        Self::new(PrinterProfile::builtin())
    }

    pub fn profiles(&self) -> &[PrinterProfile] {
        &self.profiles
    }

    pub fn by_name(&self, name: &str) -> Option<&PrinterProfile> {
        self.profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Every distinct service UUID, in registry order, plus the vendor
    /// extra service.
    pub fn service_uuids(&self) -> Vec<Uuid> {
        let mut uuids: Vec<Uuid> = Vec::new();
        for uuid in self
            .profiles
            .iter()
            .map(|p| p.service)
            .chain(std::iter::once(VENDOR_EXTRA_SERVICE))
        {
            if !uuids.contains(&uuid) {
                uuids.push(uuid);
            }
        }
        uuids
    }

    /// Discovery filter with default name prefixes and this table's services.
    pub fn filter(&self) -> DeviceFilter {
        DeviceFilter {
            services: self.service_uuids(),
            ..DeviceFilter::default()
        }
    }

    /// Find the first profile whose pair the device exposes. No init.
    pub async fn resolve(&self, server: Arc<dyn GattServer>) -> PrintResult<Connection> {
        let device = server.device_name();

        for profile in &self.profiles {
            let service = match server.primary_service(profile.service).await {
                Ok(service) => service,
                Err(e) => {
                    debug!(profile = profile.name, error = %e, "service miss");
                    continue;
                }
            };
            let characteristic = match service.characteristic(profile.characteristic).await {
                Ok(characteristic) => characteristic,
                Err(e) => {
                    debug!(profile = profile.name, error = %e, "characteristic miss");
                    continue;
                }
            };

            let kind = characteristic
                .properties()
                .preferred_write()
                .ok_or(PrintError::CharacteristicNotWritable(profile.characteristic))?;

            info!(device = %device, profile = profile.name, write = ?kind, "matched printer profile");
            return Ok(Connection::new(server, profile.clone(), characteristic, kind));
        }

        if server.link().is_cancelled() {
            return Err(PrintError::Disconnected);
        }
        Err(PrintError::ProfileMismatch { device })
    }

    /// Resolve the profile, then run its connect-time init sequence.
    ///
    /// Init failures are collected as warnings; only a dropped link is fatal.
    pub async fn probe(&self, server: Arc<dyn GattServer>, writer: &TransportWriter) -> PrintResult<ProbeOutcome> {
        let connection = self.resolve(server).await?;
        let profile = connection.profile().clone();
        let mut warnings = Vec::new();

        if profile.runs_init() {
            for (step, blob) in profile.init.iter().enumerate() {
                match writer.write(&connection, blob).await {
                    Ok(()) => {}
                    Err(PrintError::Disconnected) => return Err(PrintError::Disconnected),
                    Err(PrintError::WriteFailure { source, .. }) => {
                        let warning = PrintError::InitWarning {
                            profile: profile.name,
                            step,
                            source,
                        };
                        warn!(error = %warning, "init command failed, continuing");
                        warnings.push(warning);
                    }
                    Err(other) => return Err(other),
                }
                writer.pause(&connection, writer.config().init_delay_ms).await?;
            }
        } else {
            debug!(profile = profile.name, "no connect-time init");
        }

        Ok(ProbeOutcome { connection, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::profile::{CAT_INIT_ENABLE, CAT_INIT_QUERY, CAT_SERVICE, CAT_WRITE_CHARACTERISTIC};
    use crate::transport::mock::{MockPrinter, RecordingPacer};
    use crate::transport::{CharacteristicProperties, TransportConfig};
    use pretty_assertions::assert_eq;

    fn writer() -> TransportWriter {
        TransportWriter::with_pacer(TransportConfig::default(), Arc::new(RecordingPacer::default()))
    }

    #[tokio::test]
    async fn test_first_declared_profile_wins() {
        // exposes ae01 and ae10: both X5 profiles plus GB02 match
        let mock = MockPrinter::x5();
        let outcome = DeviceRegistry::builtin()
            .probe(Arc::new(mock.clone()), &writer())
            .await
            .unwrap();
        assert_eq!(outcome.connection.profile().name, "X5 Cat Printer (Write)");

        let reordered = DeviceRegistry::new(vec![PrinterProfile::X5_READ_WRITE, PrinterProfile::X5_WRITE]);
        let conn = reordered.resolve(Arc::new(mock)).await.unwrap();
        assert_eq!(conn.profile().name, "X5 Cat Printer (Read/Write)");
    }

    #[tokio::test]
    async fn test_link_dropped_while_connecting_is_disconnected() {
        // discovery hands over a server whose link was already cancelled
        let mock = MockPrinter::x5();
        mock.drop_link();
        let err = DeviceRegistry::builtin()
            .probe(Arc::new(mock.clone()), &writer())
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::Disconnected));
        assert_eq!(mock.attempts(), 0);
    }

    #[tokio::test]
    async fn test_cat_init_sequence_written() {
        let mock = MockPrinter::x5();
        let outcome = DeviceRegistry::builtin()
            .probe(Arc::new(mock.clone()), &writer())
            .await
            .unwrap();
        assert!(outcome.warnings.is_empty());

        let mut expected = CAT_INIT_QUERY.to_vec();
        expected.extend_from_slice(&CAT_INIT_ENABLE);
        assert_eq!(mock.written_bytes(), expected);
    }

    #[tokio::test]
    async fn test_peripage_skips_cat_init() {
        let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE);
        let outcome = DeviceRegistry::builtin()
            .probe(Arc::new(mock.clone()), &writer())
            .await
            .unwrap();
        assert_eq!(outcome.connection.profile().name, "PeriPage");
        assert_eq!(mock.attempts(), 0);
    }

    #[tokio::test]
    async fn test_init_failure_is_warning() {
        let mock = MockPrinter::x5().fail_write_at(0);
        let outcome = DeviceRegistry::builtin()
            .probe(Arc::new(mock.clone()), &writer())
            .await
            .unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(outcome.warnings[0], PrintError::InitWarning { step: 0, .. }));
        // second init command still went out
        assert_eq!(mock.written_bytes(), CAT_INIT_ENABLE.to_vec());
    }

    #[tokio::test]
    async fn test_no_match_is_profile_mismatch() {
        let mock = MockPrinter::new("Printer-XYZ").with_characteristic(
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            CharacteristicProperties::WRITABLE,
        );
        let err = DeviceRegistry::builtin().resolve(Arc::new(mock)).await.unwrap_err();
        assert!(matches!(err, PrintError::ProfileMismatch { device } if device == "Printer-XYZ"));
    }

    #[tokio::test]
    async fn test_service_without_characteristic_falls_through() {
        // ae30 present but neither ae01 nor ae10: falls through to PeriPage
        let mock = MockPrinter::for_profile("MX05", &PrinterProfile::PERIPAGE).with_characteristic(
            CAT_SERVICE,
            Uuid::from_u128(3),
            CharacteristicProperties::WRITABLE,
        );
        let conn = DeviceRegistry::builtin().resolve(Arc::new(mock)).await.unwrap();
        assert_eq!(conn.profile().name, "PeriPage");
    }

    #[tokio::test]
    async fn test_unwritable_characteristic_rejected() {
        let mock = MockPrinter::new("X5").with_characteristic(
            CAT_SERVICE,
            CAT_WRITE_CHARACTERISTIC,
            CharacteristicProperties::default(),
        );
        let err = DeviceRegistry::builtin().resolve(Arc::new(mock)).await.unwrap_err();
        assert!(matches!(err, PrintError::CharacteristicNotWritable(_)));
    }

    #[test]
    fn test_filter_and_lookup() {
        let registry = DeviceRegistry::builtin();
        let filter = registry.filter();
        assert!(filter.matches("X5h-0001"));
        assert!(filter.matches("GB02"));
        assert!(!filter.matches("Pixel Buds"));
        assert!(DeviceFilter::any().matches("Pixel Buds"));

        // unnamed or oddly named devices still pass on a known service
        assert!(filter.accepts(None, &[CAT_SERVICE]));
        assert!(filter.accepts(Some("Pixel Buds"), &[Uuid::nil(), VENDOR_EXTRA_SERVICE]));
        assert!(filter.accepts(Some("MX06"), &[]));
        assert!(!filter.accepts(Some("Pixel Buds"), &[Uuid::nil()]));
        assert!(!filter.accepts(None, &[]));

        let services = registry.service_uuids();
        assert_eq!(services.len(), 5);
        assert_eq!(services[0], CAT_SERVICE);
        assert_eq!(*services.last().unwrap(), VENDOR_EXTRA_SERVICE);

        assert_eq!(registry.by_name("peripage").map(|p| p.name), Some("PeriPage"));
        assert!(registry.by_name("nope").is_none());
    }
}
