//! # Print Orchestrator
//!
//! [`Printer`] is the library surface: connect, print, feed, disconnect.
//!
//! ## Job States
//!
//! ```text
//!   Idle ──► Connecting ──► Initializing ──► Printing ──► Finalizing ──► Idle
//!    │      (no live link)   (preamble)      (rows)       (feeds, end)
//!    │                           │               │             │
//!    └───────────────────────────┴───────────────┴─────────────┴──► Failed
//! ```
//!
//! ## Ordering
//!
//! Every job holds the session lock from its first write to its last, so two
//! concurrent calls never interleave their command streams. The lock is a
//! FIFO `tokio::sync::Mutex`: callers are served in the order they asked.
//! Image processing and text rasterization happen before the lock is taken.
//!
//! ## Failure Policy
//!
//! | Error | Effect |
//! |-------|--------|
//! | preamble write rejected | `InitWarning` in the report, job continues |
//! | `WriteFailure` | job and rest of queue abort, connection kept |
//! | `Disconnected` | job and rest of queue abort, connection invalidated |
//!
//! After a disconnect, printing fails with `Disconnected` until the caller
//! runs [`Printer::connect`] again. There is no automatic reconnect.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use super::builder::{JobBuilder, PrintJob};
use crate::config::PrintConfig;
use crate::error::{PrintError, PrintResult};
use crate::printer::DeviceRegistry;
use crate::protocol::bitmap::RASTER_WIDTH;
use crate::render::buffer::{GrayscaleBuffer, PixelBuffer};
use crate::render::text::{SpleenRasterizer, TextRasterizer, TextStyle};
use crate::transport::{Connection, Discovery, Progress, ProgressFn, TransportWriter};

/// Where the current (or last) job is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Connecting,
    Initializing,
    Printing,
    Finalizing,
    Failed,
}

/// Link state reported to the connection callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub type ConnectionStateFn = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// One queued print.
#[derive(Debug, Clone)]
pub enum PrintRequest {
    /// Photo or drawing, processed with the configured image mode
    Image(PixelBuffer),
    /// Left-aligned body text
    Text(String),
    /// Centered single label
    Label(String),
    /// Advance paper by this many dot rows
    Feed(u8),
    /// Push the last print past the cutter
    Cut,
}

/// Outcome of one successful job.
#[derive(Debug, Default)]
pub struct JobReport {
    /// Commands written
    pub commands: usize,
    /// Image rows printed
    pub rows: usize,
    /// Non-fatal init failures (connect-time and preamble)
    pub warnings: Vec<PrintError>,
}

/// A request after CPU-side work, ready to frame for a profile.
enum Prepared {
    Raster(GrayscaleBuffer),
    Feed(u8),
    Cut,
}

enum Session {
    /// Never connected, or closed by the caller
    Idle,
    Live(Connection),
    /// The link dropped. Cleared by an explicit `connect()`.
    Lost,
}

/// # Printer
///
/// ## Example
///
/// ```no_run
/// # async fn demo() -> catprint::PrintResult<()> {
/// use std::sync::Arc;
/// use catprint::config::PrintConfig;
/// use catprint::job::{PrintRequest, Printer};
/// use catprint::transport::mock::{MockDiscovery, MockPrinter};
///
/// let printer = Printer::new(Arc::new(MockDiscovery::new(MockPrinter::x5())), PrintConfig::default())
///     .on_progress(|sent, total| println!("{sent}/{total}"));
///
/// printer.connect().await?;
/// printer.print_text("hello").await?;
/// printer.print_queue(vec![PrintRequest::Label("bye".into()), PrintRequest::Cut]).await?;
/// printer.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct Printer {
    registry: DeviceRegistry,
    discovery: Arc<dyn Discovery>,
    writer: TransportWriter,
    rasterizer: Arc<dyn TextRasterizer>,
    config: PrintConfig,
    session: Mutex<Session>,
    state: watch::Sender<JobState>,
    on_connection: Option<ConnectionStateFn>,
    on_progress: Option<ProgressFn>,
}

impl Printer {
    pub fn new(discovery: Arc<dyn Discovery>, config: PrintConfig) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        Self {
            registry: DeviceRegistry::builtin(),
            discovery,
            writer: TransportWriter::new(config.transport.clone()),
            rasterizer: Arc::new(SpleenRasterizer),
            config,
            session: Mutex::new(Session::Idle),
            state,
            on_connection: None,
            on_progress: None,
        }
    }

    pub fn with_registry(mut self, registry: DeviceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_writer(mut self, writer: TransportWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn TextRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Called on every link state change, including asynchronous drops.
    pub fn on_connection_state(mut self, f: impl Fn(ConnectionState) + Send + Sync + 'static) -> Self {
        self.on_connection = Some(Arc::new(f));
        self
    }

    /// Called with `(commands sent, commands total)` every batch and at the
    /// end of each job.
    pub fn on_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Watch job state transitions.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub async fn is_connected(&self) -> bool {
        matches!(&*self.session.lock().await, Session::Live(conn) if conn.is_alive())
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Discover, probe and initialize a printer.
    ///
    /// A no-op when a live connection exists. Returns init warnings.
    pub async fn connect(&self) -> PrintResult<Vec<PrintError>> {
        let mut session = self.session.lock().await;
        self.connect_locked(&mut session).await
    }

    async fn connect_locked(&self, session: &mut Session) -> PrintResult<Vec<PrintError>> {
        if matches!(session, Session::Live(conn) if conn.is_alive()) {
            return Ok(Vec::new());
        }

        self.set_state(JobState::Connecting);
        self.emit(ConnectionState::Connecting);

        let outcome = match self.discovery.request_device(&self.registry.filter()).await {
            Ok(server) => self.registry.probe(server, &self.writer).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(outcome) => {
                info!(
                    device = %outcome.connection.device_name(),
                    profile = outcome.connection.profile().name,
                    warnings = outcome.warnings.len(),
                    "printer connected"
                );
                self.watch_link(&outcome.connection);
                *session = Session::Live(outcome.connection);
                self.emit(ConnectionState::Connected);
                self.set_state(JobState::Idle);
                Ok(outcome.warnings)
            }
            Err(e) => {
                error!(error = %e, "connect failed");
                *session = Session::Idle;
                self.emit(ConnectionState::Disconnected);
                self.set_state(JobState::Failed);
                Err(e)
            }
        }
    }

    /// Close the link. Waits for the running job, if any.
    pub async fn disconnect(&self) -> PrintResult<()> {
        let mut session = self.session.lock().await;
        if let Session::Live(conn) = std::mem::replace(&mut *session, Session::Idle) {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "disconnect reported an error");
            }
        }
        self.set_state(JobState::Idle);
        Ok(())
    }

    fn watch_link(&self, conn: &Connection) {
        let link = conn.link().clone();
        let device = conn.device_name();
        let callback = self.on_connection.clone();
        tokio::spawn(async move {
            link.cancelled().await;
            info!(device = %device, "printer disconnected");
            if let Some(cb) = callback {
                cb(ConnectionState::Disconnected);
            }
        });
    }

    // ========================================================================
    // Printing
    // ========================================================================

    pub async fn print_image(&self, image: &PixelBuffer) -> PrintResult<JobReport> {
        let prepared = Prepared::Raster(self.process_image(image)?);
        self.run_one(prepared).await
    }

    pub async fn print_text(&self, text: &str) -> PrintResult<JobReport> {
        let prepared = self.prepare(&PrintRequest::Text(text.to_string()))?;
        self.run_one(prepared).await
    }

    pub async fn print_label(&self, text: &str) -> PrintResult<JobReport> {
        let prepared = self.prepare(&PrintRequest::Label(text.to_string()))?;
        self.run_one(prepared).await
    }

    pub async fn feed(&self, rows: u8) -> PrintResult<JobReport> {
        self.run_one(Prepared::Feed(rows)).await
    }

    pub async fn print_and_cut(&self) -> PrintResult<JobReport> {
        self.run_one(Prepared::Cut).await
    }

    /// Send several requests back-to-back over one connection.
    ///
    /// The first failure aborts the remaining requests.
    pub async fn print_queue(&self, requests: Vec<PrintRequest>) -> PrintResult<Vec<JobReport>> {
        let prepared = requests
            .iter()
            .map(|r| self.prepare(r))
            .collect::<PrintResult<Vec<_>>>()?;
        let mut session = self.session.lock().await;
        self.run_locked(&mut session, prepared).await
    }

    /// Like [`Printer::print_queue`], but fails with `Busy` instead of
    /// waiting for a running job.
    pub async fn try_print_queue(&self, requests: Vec<PrintRequest>) -> PrintResult<Vec<JobReport>> {
        let prepared = requests
            .iter()
            .map(|r| self.prepare(r))
            .collect::<PrintResult<Vec<_>>>()?;
        let mut session = self.session.try_lock().map_err(|_| PrintError::Busy)?;
        self.run_locked(&mut session, prepared).await
    }

    /// Scale to the print head and apply the configured image mode.
    pub fn process_image(&self, image: &PixelBuffer) -> PrintResult<GrayscaleBuffer> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PrintError::InvalidImage(format!(
                "empty image {}x{}",
                image.width(),
                image.height()
            )));
        }
        let scaled = image.fit_width(RASTER_WIDTH);
        Ok(self.config.image.apply(&scaled))
    }

    fn prepare(&self, request: &PrintRequest) -> PrintResult<Prepared> {
        Ok(match request {
            PrintRequest::Image(image) => Prepared::Raster(self.process_image(image)?),
            PrintRequest::Text(text) => Prepared::Raster(
                self.rasterizer
                    .rasterize(text, &TextStyle::default())?
                    .to_grayscale(),
            ),
            PrintRequest::Label(text) => {
                Prepared::Raster(self.rasterizer.rasterize(text, &TextStyle::label())?.to_grayscale())
            }
            PrintRequest::Feed(rows) => Prepared::Feed(*rows),
            PrintRequest::Cut => Prepared::Cut,
        })
    }

    async fn run_one(&self, prepared: Prepared) -> PrintResult<JobReport> {
        let mut session = self.session.lock().await;
        let mut reports = self.run_locked(&mut session, vec![prepared]).await?;
        Ok(reports.pop().unwrap_or_default())
    }

    async fn run_locked(&self, session: &mut Session, jobs: Vec<Prepared>) -> PrintResult<Vec<JobReport>> {
        let mut connect_warnings = if matches!(session, Session::Idle) {
            self.connect_locked(session).await?
        } else {
            Vec::new()
        };

        let live = match &*session {
            Session::Live(conn) if conn.is_alive() => Some(conn.clone()),
            Session::Idle => return Err(PrintError::NotConnected),
            _ => None,
        };
        let Some(conn) = live else {
            *session = Session::Lost;
            self.set_state(JobState::Failed);
            return Err(PrintError::Disconnected);
        };

        let count = jobs.len();
        let mut reports = Vec::with_capacity(count);
        for (index, prepared) in jobs.into_iter().enumerate() {
            let job = match self.build(&conn, &prepared) {
                Ok(job) => job,
                Err(e) => {
                    error!(job = index, error = %e, "job rejected");
                    self.set_state(JobState::Failed);
                    return Err(e);
                }
            };
            let rows = match &prepared {
                Prepared::Raster(gray) => gray.height,
                _ => 0,
            };

            match self.execute(&conn, &job).await {
                Ok(mut warnings) => {
                    warnings.append(&mut connect_warnings);
                    info!(job = index, commands = job.len(), rows, "job complete");
                    reports.push(JobReport {
                        commands: job.len(),
                        rows,
                        warnings,
                    });
                }
                Err(e) => {
                    error!(job = index, remaining = count - index - 1, error = %e, "job failed");
                    if matches!(e, PrintError::Disconnected) {
                        *session = Session::Lost;
                    }
                    self.set_state(JobState::Failed);
                    return Err(e);
                }
            }
        }

        self.set_state(JobState::Idle);
        Ok(reports)
    }

    fn build(&self, conn: &Connection, prepared: &Prepared) -> PrintResult<PrintJob> {
        let builder = JobBuilder::new(conn.profile(), &self.config.job);
        Ok(match prepared {
            Prepared::Raster(gray) => builder.image(gray)?,
            Prepared::Feed(rows) => builder.feed(*rows),
            Prepared::Cut => builder.cut(),
        })
    }

    async fn execute(&self, conn: &Connection, job: &PrintJob) -> PrintResult<Vec<PrintError>> {
        let progress = Progress::new(self.on_progress.clone(), job.len());
        let command_delay = self.writer.config().command_delay_ms;
        let mut warnings = Vec::new();

        if !job.preamble.is_empty() {
            self.set_state(JobState::Initializing);
            for (step, packet) in job.preamble.iter().enumerate() {
                match self.writer.write(conn, &packet.bytes).await {
                    Ok(()) => {}
                    Err(PrintError::WriteFailure { source, .. }) => {
                        let warning = PrintError::InitWarning {
                            profile: conn.profile().name,
                            step,
                            source,
                        };
                        warn!(error = %warning, "preamble command failed, continuing");
                        warnings.push(warning);
                    }
                    Err(e) => return Err(e),
                }
                self.writer.pause(conn, command_delay).await?;
            }
        }

        self.set_state(JobState::Printing);
        let offset = job.preamble.len();
        self.writer
            .send_packets(conn, &job.body, &progress.at(offset))
            .await?;

        if !job.finalize.is_empty() {
            self.writer.pause(conn, command_delay).await?;
            self.set_state(JobState::Finalizing);
            self.writer
                .send_packets(conn, &job.finalize, &progress.at(offset + job.body.len()))
                .await?;
        }

        Ok(warnings)
    }

    fn set_state(&self, state: JobState) {
        debug!(?state, "job state");
        self.state.send_replace(state);
    }

    fn emit(&self, state: ConnectionState) {
        if let Some(cb) = &self.on_connection {
            cb(state);
        }
    }
}
