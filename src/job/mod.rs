//! # Print Jobs
//!
//! - [`builder`]: Frames a processed image (or a feed) into a phased packet stream
//! - [`orchestrator`]: [`Printer`], the connect/print/disconnect surface

pub mod builder;
pub mod orchestrator;

pub use builder::{JobBuilder, JobConfig, PrintJob};
pub use orchestrator::{ConnectionState, JobReport, JobState, PrintRequest, Printer};
