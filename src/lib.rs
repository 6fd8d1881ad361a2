//! # Catprint - BLE Cat Printer Library
//!
//! Catprint drives the cheap 384-dot BLE thermal printers sold as X5, GB01,
//! GB02, MX05 and friends. It provides:
//!
//! - **Image processing**: Sobel and Canny line art, Floyd-Steinberg and
//!   Atkinson dithering
//! - **Text**: bitmap-font rasterization for notes and labels
//! - **Protocol**: `0x51 0x78` command framing in both observed layouts
//! - **Transport**: paced GATT writes with progress and disconnect handling
//! - **Jobs**: a serialized print queue over one connection
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn demo() -> catprint::PrintResult<()> {
//! use std::sync::Arc;
//! use catprint::{config::PrintConfig, job::Printer, render::buffer::PixelBuffer};
//! use catprint::transport::mock::{MockDiscovery, MockPrinter};
//!
//! // Any `Discovery` works here; the `ble` feature provides a real one.
//! let discovery = Arc::new(MockDiscovery::new(MockPrinter::x5()));
//! let printer = Printer::new(discovery, PrintConfig::default());
//!
//! printer.connect().await?;
//!
//! let photo = PixelBuffer::filled(640, 480, [200, 120, 80, 255]);
//! printer.print_image(&photo).await?;
//! printer.print_label("hello from catprint").await?;
//! printer.print_and_cut().await?;
//!
//! printer.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! PixelBuffer ─► fit_width(384) ─► ImageMode ─► GrayscaleBuffer
//!                                                  │
//!   TransportWriter ◄─ CommandPacket ◄─ JobBuilder ◄┘ (BitmapPacker + FramingStrategy)
//!        │
//!        └─► GattCharacteristic (chunked, paced)
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`render`] | Pixel buffers, edge detection, dithering, text |
//! | [`protocol`] | Bit packing, checksums, framing, commands |
//! | [`printer`] | Hardware profiles and device probing |
//! | [`transport`] | GATT traits, paced writer, mock and BLE backends |
//! | [`job`] | Job building and the `Printer` orchestrator |
//! | [`config`] | JSON configuration |
//! | [`error`] | Error types |

pub mod config;
pub mod error;
pub mod job;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use config::PrintConfig;
pub use error::{PrintError, PrintResult, TransportError};
pub use job::{PrintRequest, Printer};
pub use printer::{DeviceRegistry, PrinterProfile};
