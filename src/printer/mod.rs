//! # Printer Module
//!
//! Supported hardware and how to recognise it.
//!
//! ## Modules
//!
//! - [`profile`]: Per-model GATT pairs, framing and init sequences
//! - [`registry`]: Ordered profile table and device probing

pub mod profile;
pub mod registry;

pub use profile::{PrinterProfile, ProfileFamily};
pub use registry::{DeviceFilter, DeviceRegistry, ProbeOutcome};
