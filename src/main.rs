//! # Catprint CLI
//!
//! Command-line interface for BLE cat printers.
//!
//! ## Usage
//!
//! ```bash
//! # List built-in printer profiles
//! catprint profiles
//!
//! # Preview how a photo will print
//! catprint preview photo.jpg out.png --mode canny
//!
//! # Render text or a label to PNG
//! catprint text "Hello there" out.png --label
//!
//! # Dump the framed packets for a photo (no hardware)
//! catprint packets photo.jpg --profile "Cat Printer GB02"
//!
//! # Print (requires the `ble` feature)
//! catprint print photo.jpg
//! catprint print --text "Shopping list: milk"
//! ```
//!
//! Set `RUST_LOG=catprint=debug` for per-batch transport logs.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use catprint::{
    DeviceRegistry, PrintConfig, PrintError, PrintResult,
    job::JobBuilder,
    render::{
        buffer::{GrayscaleBuffer, PixelBuffer},
        dither::DitheringAlgorithm,
        edge::CannyParams,
        process::ImageMode,
        text::{SpleenRasterizer, TextRasterizer, TextStyle},
    },
};

/// Catprint - BLE thermal cat printer utility
#[derive(Parser, Debug)]
#[command(name = "catprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Image mode: sobel, canny, fs, atkinson, threshold[:N]
    #[arg(long, global = true)]
    mode: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List built-in printer profiles in probe order
    Profiles,

    /// Process an image and save the printable result as PNG
    Preview {
        input: PathBuf,
        output: PathBuf,
    },

    /// Render text and save it as PNG
    Text {
        text: String,
        output: PathBuf,

        /// Centered label style
        #[arg(long)]
        label: bool,
    },

    /// Hex-dump the framed packets for an image
    Packets {
        input: PathBuf,

        /// Profile name (see `catprint profiles`)
        #[arg(long, default_value = "X5 Cat Printer (Write)")]
        profile: String,
    },

    /// Print over Bluetooth
    Print {
        /// Image to print
        input: Option<PathBuf>,

        /// Print text instead of an image
        #[arg(long, conflicts_with = "input")]
        text: Option<String>,

        /// Print a centered label instead of an image
        #[arg(long, conflicts_with_all = ["input", "text"])]
        label: Option<String>,

        /// Feed extra rows and stop at the cutter
        #[arg(long)]
        cut: bool,

        /// Scan time in seconds
        #[arg(long, default_value = "5")]
        scan: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catprint=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> PrintResult<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PrintConfig::from_json_file(path)?,
        None => PrintConfig::default(),
    };
    if let Some(mode) = &cli.mode {
        config.image = parse_mode(mode)?;
    }

    match cli.command {
        Commands::Profiles => {
            println!("{:<3} {:<28} {:<38} {:<38}", "#", "NAME", "SERVICE", "CHARACTERISTIC");
            for (i, p) in DeviceRegistry::builtin().profiles().iter().enumerate() {
                println!("{:<3} {:<28} {:<38} {:<38}", i + 1, p.name, p.service, p.characteristic);
            }
            Ok(())
        }

        Commands::Preview { input, output } => {
            let processed = process(&config, &load_image(&input)?);
            save_png(&output, &processed)?;
            println!("Saved {}x{} preview to {}", processed.width, processed.height, output.display());
            Ok(())
        }

        Commands::Text { text, output, label } => {
            let style = if label { TextStyle::label() } else { TextStyle::default() };
            let gray = SpleenRasterizer.rasterize(&text, &style)?.to_grayscale();
            save_png(&output, &gray)?;
            println!("Saved {}x{} text to {}", gray.width, gray.height, output.display());
            Ok(())
        }

        Commands::Packets { input, profile } => {
            let registry = DeviceRegistry::builtin();
            let profile = registry
                .by_name(&profile)
                .ok_or_else(|| PrintError::Config(format!("unknown profile: {}", profile)))?;
            let processed = process(&config, &load_image(&input)?);
            let job = JobBuilder::new(profile, &config.job).image(&processed)?;

            for packet in job.packets() {
                let hex: Vec<String> = packet.bytes.iter().map(|b| format!("{:02x}", b)).collect();
                println!("{}", hex.join(""));
            }
            eprintln!("{} packets, {} bytes", job.len(), job.to_bytes().len());
            Ok(())
        }

        Commands::Print {
            input,
            text,
            label,
            cut,
            scan,
        } => print(config, input, text, label, cut, scan).await,
    }
}

#[cfg(feature = "ble")]
async fn print(
    config: PrintConfig,
    input: Option<PathBuf>,
    text: Option<String>,
    label: Option<String>,
    cut: bool,
    scan: u64,
) -> PrintResult<()> {
    use catprint::{PrintRequest, Printer};
    use catprint::transport::ble::BleDiscovery;
    use std::sync::Arc;
    use std::time::Duration;

    let mut requests = Vec::new();
    match (input, text, label) {
        (Some(path), _, _) => requests.push(PrintRequest::Image(load_image(&path)?)),
        (_, Some(text), _) => requests.push(PrintRequest::Text(text)),
        (_, _, Some(label)) => requests.push(PrintRequest::Label(label)),
        _ => {}
    }
    if cut {
        requests.push(PrintRequest::Cut);
    }
    if requests.is_empty() {
        return Err(PrintError::Config("nothing to print".into()));
    }

    let discovery = BleDiscovery {
        scan_time: Duration::from_secs(scan),
    };
    let printer = Printer::new(Arc::new(discovery), config)
        .on_connection_state(|state| eprintln!("connection: {:?}", state))
        .on_progress(|sent, total| eprintln!("progress: {}/{}", sent, total));

    for warning in printer.connect().await? {
        eprintln!("warning: {}", warning);
    }
    let reports = printer.print_queue(requests).await?;
    let rows: usize = reports.iter().map(|r| r.rows).sum();
    println!("Printed {} job(s), {} rows", reports.len(), rows);
    printer.disconnect().await
}

#[cfg(not(feature = "ble"))]
async fn print(
    _config: PrintConfig,
    _input: Option<PathBuf>,
    _text: Option<String>,
    _label: Option<String>,
    _cut: bool,
    _scan: u64,
) -> PrintResult<()> {
    Err(PrintError::Discovery(
        "built without Bluetooth support; rebuild with --features ble".into(),
    ))
}

fn parse_mode(mode: &str) -> PrintResult<ImageMode> {
    match mode.to_lowercase().as_str() {
        "sobel" => Ok(ImageMode::default()),
        "canny" => {
            let CannyParams { low, high, sigma } = CannyParams::default();
            Ok(ImageMode::Canny {
                low,
                high,
                sigma,
                invert: true,
            })
        }
        other => DitheringAlgorithm::from_str(other)
            .map(|algorithm| ImageMode::Dither { algorithm })
            .map_err(PrintError::Config),
    }
}

fn load_image(path: &Path) -> PrintResult<PixelBuffer> {
    let img = image::open(path)
        .map_err(|e| PrintError::InvalidImage(format!("{}: {}", path.display(), e)))?;
    Ok(PixelBuffer::from(img.to_rgba8()))
}

fn process(config: &PrintConfig, pixels: &PixelBuffer) -> GrayscaleBuffer {
    config.image.apply(&pixels.fit_width(catprint::protocol::bitmap::RASTER_WIDTH))
}

fn save_png(path: &Path, gray: &GrayscaleBuffer) -> PrintResult<()> {
    gray.to_pixels()
        .to_rgba_image()
        .save(path)
        .map_err(|e| PrintError::InvalidImage(format!("Failed to save PNG: {}", e)))
}
