//! # Printer Profiles
//!
//! A profile pairs a GATT (service, characteristic) with everything needed to
//! talk to the hardware behind it: frame layout, bit order, row prefix and
//! init sequence.
//!
//! ## Built-in Profiles
//!
//! | # | Name | Service | Characteristic | Family | Framing | Bits |
//! |---|------|---------|----------------|--------|---------|------|
//! | 1 | X5 Cat Printer (Write) | ae30 | ae01 | Cat | A | LSB |
//! | 2 | X5 Cat Printer (Read/Write) | ae30 | ae10 | Cat | A | LSB |
//! | 3 | Cat Printer GB02 | ae30 | ae01 | Cat | B | MSB |
//! | 4 | Standard ESC/POS | 18f0 | 2af1 | Generic | A | LSB |
//! | 5 | PeriPage | ff00 | ff02 | Generic | A | LSB |
//! | 6 | Generic BLE Printer | 49535343-fe7d-… | 49535343-8841-… | Generic | A | LSB |
//!
//! Profile 3 shares its GATT pair with profile 1, so registry order means it
//! only wins in custom tables that leave profile 1 out.
//!
//! ## Physical Properties
//!
//! ```text
//! ├──────── 48mm printable ────────┤
//! │           384 dots             │   203 DPI ≈ 8 dots/mm
//! ```

use uuid::Uuid;

use crate::protocol::bitmap::BitOrder;
use crate::protocol::commands::{DEFAULT_ENERGY, LinePrefix};
use crate::protocol::framing::FramingStrategy;

/// Expand a 16-bit Bluetooth SIG short UUID.
pub const fn uuid16(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

pub const CAT_SERVICE: Uuid = uuid16(0xAE30);
pub const CAT_WRITE_CHARACTERISTIC: Uuid = uuid16(0xAE01);
pub const CAT_READ_WRITE_CHARACTERISTIC: Uuid = uuid16(0xAE10);
pub const ESCPOS_SERVICE: Uuid = uuid16(0x18F0);
pub const ESCPOS_CHARACTERISTIC: Uuid = uuid16(0x2AF1);
pub const PERIPAGE_SERVICE: Uuid = uuid16(0xFF00);
pub const PERIPAGE_CHARACTERISTIC: Uuid = uuid16(0xFF02);
pub const GENERIC_SERVICE: Uuid = Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455);
pub const GENERIC_CHARACTERISTIC: Uuid = Uuid::from_u128(0x49535343_8841_43f4_a8d4_ecbe34729bb3);

/// Vendor service some firmwares expose next to ae30. Requested during
/// discovery so the browser-style permission model grants access to it.
pub const VENDOR_EXTRA_SERVICE: Uuid = Uuid::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2);

/// Get-info followed by get-status, as captured.
pub const CAT_INIT_QUERY: [u8; 18] = [
    0x51, 0x78, 0xA8, 0x00, 0x01, 0x00, 0x00, 0x00, 0xFF, 0x51, 0x78, 0xA3, 0x00, 0x01, 0x00, 0x00, 0x00, 0xFF,
];

/// Opcode 0xBB with payload 0x01, as captured.
pub const CAT_INIT_ENABLE: [u8; 9] = [0x51, 0x78, 0xBB, 0x00, 0x01, 0x00, 0x01, 0x07, 0xFF];

/// Connect-time init for the Cat family.
pub const CAT_INIT: &[&[u8]] = &[&CAT_INIT_QUERY, &CAT_INIT_ENABLE];

/// Hardware family. Only the Cat family runs a connect-time init sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFamily {
    Cat,
    Generic,
}

/// # Printer Profile
///
/// Static description of one supported (service, characteristic) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterProfile {
    /// Display name
    pub name: &'static str,

    pub service: Uuid,

    pub characteristic: Uuid,

    pub family: ProfileFamily,

    /// Frame layout for every command
    pub framing: FramingStrategy,

    /// Which bit of a packed byte is the leftmost dot
    pub bit_order: BitOrder,

    /// Bytes placed before each row's bitmap
    pub line_prefix: LinePrefix,

    /// Rows to feed after every drawn row, if the firmware needs it
    pub feed_per_row: Option<u8>,

    /// Raw frames sent once per connection, in order
    pub init: &'static [&'static [u8]],

    /// Heat energy for the job preamble
    pub energy: u16,

    /// Quality payload for the job preamble, if any
    pub quality: Option<&'static [u8]>,
}

impl PrinterProfile {
    const CAT_BASE: Self = Self {
        name: "",
        service: CAT_SERVICE,
        characteristic: CAT_WRITE_CHARACTERISTIC,
        family: ProfileFamily::Cat,
        framing: FramingStrategy::VARIANT_A,
        bit_order: BitOrder::LsbFirst,
        line_prefix: LinePrefix::None,
        feed_per_row: None,
        init: CAT_INIT,
        energy: DEFAULT_ENERGY,
        quality: None,
    };

    const GENERIC_BASE: Self = Self {
        family: ProfileFamily::Generic,
        init: &[],
        ..Self::CAT_BASE
    };

    pub const X5_WRITE: Self = Self {
        name: "X5 Cat Printer (Write)",
        ..Self::CAT_BASE
    };

    pub const X5_READ_WRITE: Self = Self {
        name: "X5 Cat Printer (Read/Write)",
        characteristic: CAT_READ_WRITE_CHARACTERISTIC,
        ..Self::CAT_BASE
    };

    pub const GB02: Self = Self {
        name: "Cat Printer GB02",
        framing: FramingStrategy::VARIANT_B,
        bit_order: BitOrder::MsbFirst,
        line_prefix: LinePrefix::LineNumber,
        ..Self::CAT_BASE
    };

    pub const ESCPOS: Self = Self {
        name: "Standard ESC/POS",
        service: ESCPOS_SERVICE,
        characteristic: ESCPOS_CHARACTERISTIC,
        ..Self::GENERIC_BASE
    };

    pub const PERIPAGE: Self = Self {
        name: "PeriPage",
        service: PERIPAGE_SERVICE,
        characteristic: PERIPAGE_CHARACTERISTIC,
        ..Self::GENERIC_BASE
    };

    pub const GENERIC_BLE: Self = Self {
        name: "Generic BLE Printer",
        service: GENERIC_SERVICE,
        characteristic: GENERIC_CHARACTERISTIC,
        ..Self::GENERIC_BASE
    };

    /// The built-in table, in probe order.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::X5_WRITE,
            Self::X5_READ_WRITE,
            Self::GB02,
            Self::ESCPOS,
            Self::PERIPAGE,
            Self::GENERIC_BLE,
        ]
    }

    /// Whether the connect-time init sequence runs. Depends only on the
    /// profile family.
    pub fn runs_init(&self) -> bool {
        self.family == ProfileFamily::Cat && !self.init.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid16_expansion() {
        assert_eq!(CAT_SERVICE.to_string(), "0000ae30-0000-1000-8000-00805f9b34fb");
        assert_eq!(PERIPAGE_CHARACTERISTIC.to_string(), "0000ff02-0000-1000-8000-00805f9b34fb");
        assert_eq!(GENERIC_SERVICE.to_string(), "49535343-fe7d-4ae5-8fa9-9fafd205e455");
    }

    #[test]
    fn test_builtin_order() {
        let names: Vec<_> = PrinterProfile::builtin().iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "X5 Cat Printer (Write)",
                "X5 Cat Printer (Read/Write)",
                "Cat Printer GB02",
                "Standard ESC/POS",
                "PeriPage",
                "Generic BLE Printer",
            ]
        );
    }

    #[test]
    fn test_init_only_for_cat_family() {
        assert!(PrinterProfile::X5_WRITE.runs_init());
        assert!(PrinterProfile::GB02.runs_init());
        assert!(!PrinterProfile::PERIPAGE.runs_init());
        assert!(!PrinterProfile::GENERIC_BLE.runs_init());

        // a generic profile never inits, even if someone gives it blobs
        let generic = PrinterProfile {
            init: CAT_INIT,
            ..PrinterProfile::ESCPOS
        };
        assert!(!generic.runs_init());
    }

    #[test]
    fn test_cat_init_blobs_are_valid_frames() {
        let a = FramingStrategy::VARIANT_A;
        assert!(a.decode(&CAT_INIT_QUERY[..9]).is_ok());
        assert!(a.decode(&CAT_INIT_QUERY[9..]).is_ok());
        assert!(a.decode(&CAT_INIT_ENABLE).is_ok());
    }
}
