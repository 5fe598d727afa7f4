//! EdgeView: live edge detection from a camera into a GPU window

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use edgeview::capture::{still, FrameSource, StillImage, TestPattern, V4l2Capture};
use edgeview::convert::Rotation;
use edgeview::filter::{self, FilterConfig, Mode, QualityLevel};
use edgeview::{display, utils, Config};

#[derive(Parser)]
#[command(name = "edgeview", version, about = "Live edge detection with a GPU display")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a source through the filter into a window (default)
    Run(RunArgs),
    /// Filter one image file and write the result
    Still {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = QualityArg::Normal)]
        quality: QualityArg,
        /// Skip edge detection
        #[arg(long)]
        raw: bool,
    },
    /// List capture devices and their preferred format
    Devices,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Capture device node, overrides auto-detection
    #[arg(short, long)]
    device: Option<String>,
    /// Use a synthetic moving pattern instead of a camera
    #[arg(long, conflicts_with_all = ["device", "image"])]
    test_pattern: bool,
    /// Stream a still image instead of a camera
    #[arg(long, conflicts_with = "device")]
    image: Option<PathBuf>,
    #[arg(short, long, value_enum)]
    quality: Option<QualityArg>,
    /// Start in raw passthrough
    #[arg(long)]
    raw: bool,
    #[arg(long, value_enum)]
    rotate: Option<RotateArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum QualityArg {
    Fast,
    Normal,
    High,
}

impl From<QualityArg> for QualityLevel {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Fast => QualityLevel::Fast,
            QualityArg::Normal => QualityLevel::Normal,
            QualityArg::High => QualityLevel::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RotateArg {
    #[value(name = "0")]
    None,
    #[value(name = "90")]
    Cw90,
    #[value(name = "180")]
    Cw180,
    #[value(name = "270")]
    Cw270,
}

impl From<RotateArg> for Rotation {
    fn from(arg: RotateArg) -> Self {
        match arg {
            RotateArg::None => Rotation::None,
            RotateArg::Cw90 => Rotation::Cw90,
            RotateArg::Cw180 => Rotation::Cw180,
            RotateArg::Cw270 => Rotation::Cw270,
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(config, args),
        Command::Still {
            input,
            output,
            quality,
            raw,
        } => process_still(&input, &output, quality.into(), raw),
        Command::Devices => {
            list_devices();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edgeview=info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(fmt::time::uptime()));

    #[cfg(feature = "profiling")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());

    registry.init();
}

fn run(mut config: Config, args: RunArgs) -> Result<()> {
    info!("EdgeView launching...");

    if let Some(quality) = args.quality {
        config.filter.quality = quality.into();
    }
    if args.raw {
        config.filter.mode = Mode::RawPassthrough;
    }
    if let Some(rotate) = args.rotate {
        config.capture.rotation = rotate.into();
    }
    if let Some(device) = args.device {
        config.capture.device = device;
    }

    let capture = &config.capture;
    let source: Box<dyn FrameSource> = if args.test_pattern {
        Box::new(TestPattern::new(capture.width, capture.height, capture.fps))
    } else if let Some(path) = args.image {
        Box::new(StillImage::new(path, capture.fps))
    } else {
        if config.capture.device.is_empty() {
            let found = utils::auto_detect_device()?;
            config.capture.device = found.path;
            config.capture.format = found.format;
        }
        info!("Using capture device: {}", config.capture.device);
        Box::new(V4l2Capture::new(config.capture.clone())?)
    };

    display::run(config, source)?;

    info!("EdgeView shutting down");
    Ok(())
}

fn process_still(
    input: &std::path::Path,
    output: &std::path::Path,
    quality: QualityLevel,
    raw: bool,
) -> Result<()> {
    let frame = still::load_rgb(input)?;
    let (width, height) = (frame.width(), frame.height());
    let config = FilterConfig {
        mode: if raw {
            Mode::RawPassthrough
        } else {
            Mode::EdgeDetect
        },
        quality,
    };

    let started = Instant::now();
    let rgb = filter::apply(frame.data(), width, height, &config)?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let image = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| eyre!("filtered image has the wrong size"))?;
    image.save(output)?;

    println!(
        "{}x{} {:?} in {:.2} ms -> {}",
        width,
        height,
        config.quality,
        elapsed_ms,
        output.display()
    );
    Ok(())
}

fn list_devices() {
    let devices = utils::list_devices();
    if devices.is_empty() {
        println!("No capture devices found");
    }
    for dev in devices {
        println!("{}\t{:?}\t{}", dev.path, dev.format, dev.card);
    }
}
