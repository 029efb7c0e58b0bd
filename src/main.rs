use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use framestack_rs::image_pipeline::window::DEFAULT_WINDOW_SIZE;
use framestack_rs::image_pipeline::{
    AccumulatorBackend, DisplayFormat, FrameDimensions, StackConfig, StackPipeline,
};
use framestack_rs::logger;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Tiff,
}

impl From<FormatArg> for DisplayFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => DisplayFormat::Jpeg,
            FormatArg::Tiff => DisplayFormat::Tiff,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Cpu,
    Cuda,
}

impl From<BackendArg> for AccumulatorBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cpu => AccumulatorBackend::Cpu,
            BackendArg::Cuda => AccumulatorBackend::Cuda,
        }
    }
}

/// Sliding-window frame stacker
#[derive(Parser, Debug)]
#[command(name = "framestack", version, about)]
struct Args {
    /// Input clip: a flat RGBA16 file (needs --size) or a directory of raw stills
    #[arg(short, long)]
    input: PathBuf,

    /// Output basename
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// 3D LUT applied to display outputs
    #[arg(short, long)]
    lut: Option<PathBuf>,

    /// Output gain
    #[arg(short, long, default_value_t = 1.0)]
    gain: f32,

    /// Dark reference frame (flat RGBA16, clip size)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Subtract the reference after the LUT instead of before it
    #[arg(short = 'L', long)]
    reference_after_lut: bool,

    /// Average the whole clip into one output
    #[arg(short, long)]
    single: bool,

    /// Dump the ungraded 16-bit mean instead of a display image (implies --single)
    #[arg(short = 'R', long)]
    raw: bool,

    /// Frames per window
    #[arg(short, long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window: u32,

    /// Frame size of flat clips, e.g. 1920x1080
    #[arg(long, value_name = "WxH")]
    size: Option<FrameDimensions>,

    /// Maximum decode jobs in flight
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Display output format
    #[arg(long, value_enum, default_value_t = FormatArg::Jpeg)]
    format: FormatArg,

    /// Accumulation backend
    #[arg(long, value_enum, default_value_t = BackendArg::Cpu)]
    backend: BackendArg,
}

fn main() -> Result<()> {
    logger::init();
    let args = Args::parse();

    let config = StackConfig::builder()
        .window_size(args.window)
        .single(args.single)
        .raw_dump(args.raw)
        .gain(args.gain)
        .max_jobs_in_flight(args.jobs)
        .lut_path(args.lut)
        .reference_path(args.reference)
        .reference_after_lut(args.reference_after_lut)
        .backend(args.backend.into())
        .display_format(args.format.into())
        .frame_size(args.size)
        .build();

    info!("Stacking {} -> {}", args.input.display(), args.output.display());
    let pipeline = StackPipeline::open(&args.input, &args.output, config)
        .with_context(|| format!("failed to open {}", args.input.display()))?;

    let report = pipeline.run().context("stacking failed")?;
    info!(
        "Wrote {} outputs from {} frames",
        report.outputs_written, report.frames_submitted
    );
    Ok(())
}
