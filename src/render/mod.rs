//! # Rendering Module
//!
//! This module turns pixels into something a 1-bit thermal head can print.
//!
//! ## Modules
//!
//! - [`buffer`]: RGBA, grayscale and mask containers
//! - [`edge`]: Sobel and Canny edge detection
//! - [`dither`]: Floyd-Steinberg, Atkinson and threshold binarization
//! - [`process`]: presets combining the above
//! - [`text`]: text rasterization
//!
//! ## Usage Example
//!
//! ```
//! use catprint::render::buffer::PixelBuffer;
//! use catprint::render::process::ImageMode;
//!
//! // A 768px photo is fitted to the 384px head, then traced with Sobel
//! let photo = PixelBuffer::filled(768, 400, [200, 180, 160, 255]);
//! let processed = ImageMode::default().apply(&photo.fit_width(384));
//!
//! assert_eq!(processed.width, 384);
//! ```

pub mod buffer;
pub mod dither;
pub mod edge;
pub mod process;
pub mod text;
