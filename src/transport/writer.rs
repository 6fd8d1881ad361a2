//! # Paced Transport Writer
//!
//! These printers have a tiny receive buffer and no flow control that anyone
//! has reverse engineered, so every byte goes out on a fixed schedule:
//!
//! ```text
//! command 0: [chunk 0] 100ms [chunk 1] 100ms [chunk 2]
//!            50ms
//! command 1: [chunk 0]
//!            50ms
//! ...
//! command 9: [chunk 0]
//!            progress(10, total) + 100ms batch pause + 50ms
//! command 10 ...
//! ```
//!
//! - Payloads are split into 128-byte chunks, 100 ms apart. No delay follows
//!   the last chunk.
//! - Whole commands are 50 ms apart.
//! - Every 10 commands the writer reports progress and pauses 100 ms more.
//!
//! Unthrottled writes corrupt or drop rows on this hardware class.
//!
//! ## Failure
//!
//! The first rejected chunk aborts the stream and is reported as
//! [`PrintError::WriteFailure`] with the command and chunk index. Nothing is
//! retried. A dropped link surfaces as [`PrintError::Disconnected`], even
//! while a write or a pause is pending.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use super::{Connection, WriteKind};
use crate::error::{PrintError, PrintResult, TransportError};
use crate::protocol::framing::CommandPacket;

/// Default chunk size (bytes)
pub const CHUNK_SIZE: usize = 128;

/// Delay between chunks of one payload (milliseconds)
pub const CHUNK_DELAY_MS: u64 = 100;

/// Delay between commands (milliseconds)
pub const COMMAND_DELAY_MS: u64 = 50;

/// Commands per progress report
pub const BATCH_SIZE: usize = 10;

/// Extra pause after each batch (milliseconds)
pub const BATCH_PAUSE_MS: u64 = 100;

/// Delay after each connect-time init command (milliseconds)
pub const INIT_DELAY_MS: u64 = 100;

/// Transport pacing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub chunk_size: usize,
    pub chunk_delay_ms: u64,
    pub command_delay_ms: u64,
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub init_delay_ms: u64,
    /// Per-write timeout. `None` waits for the backend indefinitely.
    pub write_timeout_ms: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_delay_ms: CHUNK_DELAY_MS,
            command_delay_ms: COMMAND_DELAY_MS,
            batch_size: BATCH_SIZE,
            batch_pause_ms: BATCH_PAUSE_MS,
            init_delay_ms: INIT_DELAY_MS,
            write_timeout_ms: None,
        }
    }
}

/// Sleeps between writes.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real-time pacing with `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Progress callback: `(commands sent, commands total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Where a packet stream sits within a whole job, for progress and error
/// indices.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<ProgressFn>,
    offset: usize,
    total: usize,
}

impl Progress {
    pub fn new(callback: Option<ProgressFn>, total: usize) -> Self {
        Self {
            callback,
            offset: 0,
            total,
        }
    }

    /// Same job, stream starting at command `offset`.
    pub fn at(&self, offset: usize) -> Self {
        Self {
            callback: self.callback.clone(),
            offset,
            total: self.total,
        }
    }

    fn report(&self, sent: usize) {
        if let Some(cb) = &self.callback {
            cb(self.offset + sent, self.total.max(self.offset + sent));
        }
    }
}

enum ChunkFailure {
    Disconnected,
    Rejected { chunk: usize, source: TransportError },
}

/// # Transport Writer
///
/// Serializes framed commands onto a [`Connection`] with the mandatory pacing.
///
/// ## Example
///
/// ```no_run
/// # async fn demo(conn: catprint::transport::Connection) -> catprint::PrintResult<()> {
/// use catprint::protocol::commands;
/// use catprint::transport::{Progress, TransportConfig, TransportWriter};
///
/// let writer = TransportWriter::new(TransportConfig::default());
/// let framing = conn.profile().framing;
/// let packets = vec![commands::feed_paper(&framing, 1), commands::feed_paper(&framing, 1)];
/// writer.send_packets(&conn, &packets, &Progress::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransportWriter {
    config: TransportConfig,
    pacer: Arc<dyn Pacer>,
}

impl TransportWriter {
    pub fn new(config: TransportConfig) -> Self {
        Self::with_pacer(config, Arc::new(TokioPacer))
    }

    pub fn with_pacer(config: TransportConfig, pacer: Arc<dyn Pacer>) -> Self {
        Self { config, pacer }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Number of chunks for a payload of `len` bytes.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.config.chunk_size.max(1))
    }

    /// Write one raw payload, chunked. Failures carry command index 0.
    pub async fn write(&self, conn: &Connection, bytes: &[u8]) -> PrintResult<()> {
        self.write_chunks(conn, bytes)
            .await
            .map_err(|f| Self::into_error(f, 0))
    }

    /// Write a packet stream with command pacing, batch pauses and progress.
    ///
    /// A final progress report fires once the last packet is written.
    pub async fn send_packets(
        &self,
        conn: &Connection,
        packets: &[CommandPacket],
        progress: &Progress,
    ) -> PrintResult<()> {
        let count = packets.len();
        let batch = self.config.batch_size.max(1);

        for (i, packet) in packets.iter().enumerate() {
            let command = progress.offset + i;
            trace!(command, opcode = packet.opcode, len = packet.len(), "write");

            if let Err(failure) = self.write_chunks(conn, &packet.bytes).await {
                let err = Self::into_error(failure, command);
                error!(command, opcode = packet.opcode, error = %err, "command write failed");
                return Err(err);
            }

            let sent = i + 1;
            if sent == count {
                break;
            }
            if sent % batch == 0 {
                debug!(sent = progress.offset + sent, total = progress.total, "batch written");
                progress.report(sent);
                self.pause(conn, self.config.batch_pause_ms).await?;
            }
            self.pause(conn, self.config.command_delay_ms).await?;
        }

        progress.report(count);
        Ok(())
    }

    /// Sleep through the pacer, bailing out if the link drops.
    pub async fn pause(&self, conn: &Connection, millis: u64) -> PrintResult<()> {
        if millis == 0 {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = conn.link().cancelled() => Err(PrintError::Disconnected),
            _ = self.pacer.pause(Duration::from_millis(millis)) => Ok(()),
        }
    }

    async fn write_chunks(&self, conn: &Connection, bytes: &[u8]) -> Result<(), ChunkFailure> {
        let size = self.config.chunk_size.max(1);
        let chunks = self.chunk_count(bytes.len());
        let kind = conn.write_kind();

        for (index, chunk) in bytes.chunks(size).enumerate() {
            self.write_one(conn, chunk, kind)
                .await
                .map_err(|failure| match failure {
                    ChunkFailure::Rejected { source, .. } => ChunkFailure::Rejected { chunk: index, source },
                    other => other,
                })?;

            if index + 1 < chunks {
                self.pause(conn, self.config.chunk_delay_ms)
                    .await
                    .map_err(|_| ChunkFailure::Disconnected)?;
            }
        }
        Ok(())
    }

    async fn write_one(&self, conn: &Connection, chunk: &[u8], kind: WriteKind) -> Result<(), ChunkFailure> {
        let link = conn.link();
        let write = conn.characteristic().write(chunk, kind);

        let result = tokio::select! {
            biased;
            _ = link.cancelled() => return Err(ChunkFailure::Disconnected),
            r = async {
                match self.config.write_timeout_ms {
                    Some(ms) => tokio::time::timeout(Duration::from_millis(ms), write)
                        .await
                        .unwrap_or(Err(TransportError::Timeout(ms))),
                    None => write.await,
                }
            } => r,
        };

        result.map_err(|source| {
            if link.is_cancelled() {
                ChunkFailure::Disconnected
            } else {
                ChunkFailure::Rejected { chunk: 0, source }
            }
        })
    }

    fn into_error(failure: ChunkFailure, command: usize) -> PrintError {
        match failure {
            ChunkFailure::Disconnected => PrintError::Disconnected,
            ChunkFailure::Rejected { chunk, source } => PrintError::WriteFailure { command, chunk, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::PrinterProfile;
    use crate::protocol::commands;
    use crate::transport::mock::{MockPrinter, RecordingPacer};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    async fn connect(mock: &MockPrinter) -> Connection {
        mock.connection(PrinterProfile::X5_WRITE)
            .await
            .expect("mock exposes X5 pair")
    }

    fn writer(pacer: &Arc<RecordingPacer>) -> TransportWriter {
        TransportWriter::with_pacer(TransportConfig::default(), pacer.clone())
    }

    #[tokio::test]
    async fn test_chunk_count_and_delays() {
        let mock = MockPrinter::x5();
        let conn = connect(&mock).await;
        let pacer = Arc::new(RecordingPacer::default());

        writer(&pacer).write(&conn, &vec![0xAA; 1000]).await.unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 8);
        assert!(writes[..7].iter().all(|w| w.data.len() == 128));
        assert_eq!(writes[7].data.len(), 1000 - 7 * 128);
        assert_eq!(pacer.pauses(), vec![Duration::from_millis(100); 7]);
    }

    #[tokio::test]
    async fn test_single_chunk_has_no_delay() {
        let mock = MockPrinter::x5();
        let conn = connect(&mock).await;
        let pacer = Arc::new(RecordingPacer::default());

        writer(&pacer).write(&conn, &[1, 2, 3]).await.unwrap();
        assert_eq!(mock.writes().len(), 1);
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_failure_at_chunk_three_stops_stream() {
        let mock = MockPrinter::x5().fail_write_at(3);
        let conn = connect(&mock).await;
        let pacer = Arc::new(RecordingPacer::default());

        let err = writer(&pacer).write(&conn, &vec![0x55; 1280]).await.unwrap_err();
        match err {
            PrintError::WriteFailure { command, chunk, .. } => {
                assert_eq!(command, 0);
                assert_eq!(chunk, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        // chunks 0..=2 landed, 4..=9 never attempted
        assert_eq!(mock.writes().len(), 3);
        assert_eq!(mock.attempts(), 4);
    }

    #[tokio::test]
    async fn test_command_pacing_and_progress() {
        let mock = MockPrinter::x5();
        let conn = connect(&mock).await;
        let pacer = Arc::new(RecordingPacer::default());
        let framing = conn.profile().framing;
        let packets: Vec<_> = (0..25).map(|_| commands::feed_paper(&framing, 1)).collect();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new(
            Some(Arc::new(move |cur, total| sink.lock().unwrap().push((cur, total)))),
            25,
        );

        writer(&pacer).send_packets(&conn, &packets, &progress).await.unwrap();

        assert_eq!(mock.writes().len(), 25);
        assert_eq!(*seen.lock().unwrap(), vec![(10, 25), (20, 25), (25, 25)]);

        let pauses = pacer.pauses();
        let command = pauses.iter().filter(|d| **d == Duration::from_millis(50)).count();
        let batch = pauses.iter().filter(|d| **d == Duration::from_millis(100)).count();
        assert_eq!(command, 24);
        assert_eq!(batch, 2);
    }

    #[tokio::test]
    async fn test_failure_reports_command_index() {
        let mock = MockPrinter::x5().fail_write_at(4);
        let conn = connect(&mock).await;
        let pacer = Arc::new(RecordingPacer::default());
        let framing = conn.profile().framing;
        let packets: Vec<_> = (0..8).map(|_| commands::feed_paper(&framing, 1)).collect();

        let err = writer(&pacer)
            .send_packets(&conn, &packets, &Progress::new(None, 108).at(100))
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::WriteFailure { command: 104, chunk: 0, .. }));
        assert_eq!(mock.writes().len(), 4);
    }

    #[tokio::test]
    async fn test_uses_write_with_response_when_only_option() {
        let mock = MockPrinter::new("X5-ack").with_characteristic(
            crate::printer::profile::CAT_SERVICE,
            crate::printer::profile::CAT_WRITE_CHARACTERISTIC,
            crate::transport::CharacteristicProperties {
                write: true,
                write_without_response: false,
            },
        );
        let conn = connect(&mock).await;
        writer(&Arc::new(RecordingPacer::default())).write(&conn, &[0]).await.unwrap();
        assert_eq!(mock.writes()[0].kind, WriteKind::WithResponse);
    }

    #[tokio::test]
    async fn test_disconnect_mid_write_fails_fast() {
        let mock = MockPrinter::x5().disconnect_at(2);
        let conn = connect(&mock).await;
        let pacer = Arc::new(RecordingPacer::default());

        let err = writer(&pacer).write(&conn, &vec![0; 1000]).await.unwrap_err();
        assert!(matches!(err, PrintError::Disconnected));
        assert!(!conn.is_alive());
    }

    #[tokio::test]
    async fn test_write_timeout() {
        let mock = MockPrinter::x5().with_latency(Duration::from_millis(200));
        let conn = connect(&mock).await;
        let config = TransportConfig {
            write_timeout_ms: Some(10),
            ..TransportConfig::default()
        };
        let writer = TransportWriter::with_pacer(config, Arc::new(RecordingPacer::default()));

        let err = writer.write(&conn, &[1]).await.unwrap_err();
        assert!(matches!(
            err,
            PrintError::WriteFailure {
                source: TransportError::Timeout(10),
                ..
            }
        ));
    }
}
