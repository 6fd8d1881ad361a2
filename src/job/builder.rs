//! # Print Job Builder
//!
//! Turns a processed image into the packet stream for one print:
//!
//! ```text
//! preamble   drawing mode (0xBE) → energy (0xAF) → [quality (0xA4)] → lattice start (0xA6)
//! body       draw row 0 (0xA2) [→ feed] → draw row 1 → ... → draw row h-1
//! finalize   feed(1) × finalize_feed_rows → lattice end (0xA6)
//! ```
//!
//! Feed-only jobs (paper advance, cut) have neither preamble nor finalize.

use serde::{Deserialize, Serialize};

use crate::error::{PrintError, PrintResult};
use crate::printer::PrinterProfile;
use crate::protocol::bitmap::BitmapPacker;
use crate::protocol::commands::{self, DRAWING_MODE_IMAGE, LATTICE_END, LATTICE_START, LinePrefix};
use crate::protocol::framing::CommandPacket;
use crate::render::buffer::GrayscaleBuffer;

/// Feed rows after the last image row, so the print clears the tear bar.
pub const FINALIZE_FEED_ROWS: usize = 100;

/// Single-row feeds for `print_and_cut`.
pub const CUT_FEED_ROWS: usize = 5;

/// Job-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Overrides the profile's heat energy
    pub energy: Option<u16>,
    pub finalize_feed_rows: usize,
    pub cut_feed_rows: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            energy: None,
            finalize_feed_rows: FINALIZE_FEED_ROWS,
            cut_feed_rows: CUT_FEED_ROWS,
        }
    }
}

/// A fully framed job, split by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintJob {
    pub preamble: Vec<CommandPacket>,
    pub body: Vec<CommandPacket>,
    pub finalize: Vec<CommandPacket>,
}

impl PrintJob {
    /// Total command count.
    pub fn len(&self) -> usize {
        self.preamble.len() + self.body.len() + self.finalize.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn packets(&self) -> impl Iterator<Item = &CommandPacket> {
        self.preamble.iter().chain(&self.body).chain(&self.finalize)
    }

    /// Every frame concatenated, as it would hit the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.packets().flat_map(|p| p.bytes.iter().copied()).collect()
    }
}

/// Builds jobs for one profile.
#[derive(Debug, Clone)]
pub struct JobBuilder<'a> {
    profile: &'a PrinterProfile,
    config: &'a JobConfig,
}

impl<'a> JobBuilder<'a> {
    pub fn new(profile: &'a PrinterProfile, config: &'a JobConfig) -> Self {
        Self { profile, config }
    }

    pub fn energy(&self) -> u16 {
        self.config.energy.unwrap_or(self.profile.energy)
    }

    fn preamble(&self) -> Vec<CommandPacket> {
        let framing = &self.profile.framing;
        let mut packets = vec![
            commands::set_drawing_mode(framing, DRAWING_MODE_IMAGE),
            commands::set_energy(framing, self.energy()),
        ];
        if let Some(quality) = self.profile.quality {
            packets.push(commands::set_quality(framing, quality));
        }
        packets.push(commands::set_lattice(framing, &LATTICE_START));
        packets
    }

    fn finalize(&self) -> Vec<CommandPacket> {
        let framing = &self.profile.framing;
        let mut packets: Vec<_> = (0..self.config.finalize_feed_rows)
            .map(|_| commands::feed_paper(framing, 1))
            .collect();
        packets.push(commands::set_lattice(framing, &LATTICE_END));
        packets
    }

    /// Image job from a processed buffer. Values below 128 print.
    ///
    /// Profiles that number their rows carry a u16 line index, so taller
    /// images are rejected rather than wrapped.
    pub fn image(&self, gray: &GrayscaleBuffer) -> PrintResult<PrintJob> {
        let framing = &self.profile.framing;
        if self.profile.line_prefix == LinePrefix::LineNumber && gray.height > usize::from(u16::MAX) + 1 {
            return Err(PrintError::InvalidImage(format!(
                "{} rows exceed the {} line counter",
                gray.height, self.profile.name
            )));
        }
        let rows = BitmapPacker::new(self.profile.bit_order).pack(gray);

        let mut body = Vec::with_capacity(rows.len() * 2);
        for (y, row) in rows.iter().enumerate() {
            // bounded above for LineNumber; other prefixes ignore the index
            let line = u16::try_from(y).unwrap_or(u16::MAX);
            body.push(commands::draw_bitmap_line(framing, row, self.profile.line_prefix, line));
            if let Some(feed) = self.profile.feed_per_row {
                body.push(commands::feed_paper(framing, feed));
            }
        }

        Ok(PrintJob {
            preamble: self.preamble(),
            body,
            finalize: self.finalize(),
        })
    }

    /// Advance the paper by `rows` dot rows.
    pub fn feed(&self, rows: u8) -> PrintJob {
        PrintJob {
            body: vec![commands::feed_paper(&self.profile.framing, rows)],
            ..PrintJob::default()
        }
    }

    /// Single-row feeds that push the last print past the cutter.
    pub fn cut(&self) -> PrintJob {
        let framing = &self.profile.framing;
        PrintJob {
            body: (0..self.config.cut_feed_rows)
                .map(|_| commands::feed_paper(framing, 1))
                .collect(),
            ..PrintJob::default()
        }
    }
}
