mod capture;
mod cli;
mod presets;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use retrocam_core::editor::{EditAdjustments, EditSession};
use retrocam_core::geometry::{CropMode, Rect};
use retrocam_core::io::save_image;
use retrocam_core::shake::{RandomSource, SeededRandom, ThreadRandom};
use retrocam_core::{CameraModel, FilterConfig};
use retrocam_metadata::{CaptureMetadata, load_oriented};
use retrocam_video::{Transcoder, default_output_path};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{CaptureSession, DirectorySink, FixedMotion, MotionSensor, NoMotion};
use crate::cli::{Cli, Command, EditArgs, InfoArgs, ModelsArgs, PhotoArgs, VideoArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let presets = cli.presets.as_deref();
    match cli.cmd {
        Command::Photo(args) => cmd_photo(args, presets),
        Command::Video(args) => cmd_video(args, presets),
        Command::Edit(args) => cmd_edit(args),
        Command::Models(args) => cmd_models(args, presets),
        Command::Info(args) => cmd_info(args),
    }
}

fn cmd_photo(args: PhotoArgs, presets: Option<&Path>) -> Result<()> {
    let models = presets::load_models(presets)?;
    let model = presets::resolve_model(&models, &args.model)?;
    let mut config = model.filter_config.clone();
    if let Some(ar) = args.aspect {
        config = config.with_aspect_ratio(ar);
    }
    if let Some(c) = args.composition {
        config = config.with_composition(c.into());
    }

    let raw = load_oriented(&args.input)?;
    let motion: Box<dyn MotionSensor> = match args.motion {
        Some(sample) => Box::new(FixedMotion(sample)),
        None => Box::new(NoMotion),
    };
    match args.seed {
        Some(seed) => run_capture(&args, model, config, &raw, motion, SeededRandom::new(seed)),
        None => run_capture(&args, model, config, &raw, motion, ThreadRandom),
    }
}

fn run_capture(
    args: &PhotoArgs,
    model: &CameraModel,
    config: FilterConfig,
    raw: &retrocam_core::ImageBuf,
    motion: Box<dyn MotionSensor>,
    rng: impl RandomSource,
) -> Result<()> {
    let mut session = CaptureSession::new(model, config, motion, rng);
    if args.no_shake {
        session = session.without_shake();
    }
    let mut sink = DirectorySink::new(&args.out_dir, args.format);
    let name = capture::output_name(&args.input, &model.id);
    let result = session.capture(raw, &name, &mut sink)?;
    println!("{}", result.path.display());
    Ok(())
}

fn cmd_video(args: VideoArgs, presets: Option<&Path>) -> Result<()> {
    let models = presets::load_models(presets)?;
    let model = presets::resolve_model(&models, &args.model)?;
    let output = args.out.clone().unwrap_or_else(default_output_path);
    let existed_before = output.exists();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let transcoder = Transcoder::ffmpeg(model.filter_config.clone()).with_output(&output);
    let result = runtime.block_on(transcoder.run(&args.input));

    match result {
        Ok(report) => {
            info!(
                frames = report.frames_written,
                skipped = report.frames_skipped,
                "video filtered"
            );
            println!("{}", report.output_path.display());
            Ok(())
        }
        Err(e) => {
            discard_failed_output(&output, existed_before);
            Err(e).with_context(|| format!("filter video {}", args.input.display()))
        }
    }
}

/// Remove what a failed run left at `output`. A file that was there before
/// the run is never touched.
fn discard_failed_output(output: &Path, existed_before: bool) {
    if existed_before || !output.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(output) {
        warn!(path = %output.display(), error = %e, "failed to remove partial output");
    }
}

fn cmd_edit(args: EditArgs) -> Result<()> {
    let source = load_oriented(&args.input)?;
    let (w, h) = (source.width as f64, source.height as f64);
    let mut session = EditSession::new(source);
    session.set_adjustments(EditAdjustments::new(
        args.brightness,
        args.contrast,
        args.saturation,
    ));
    if let Some(ar) = args.crop {
        session.set_display_bounds(Rect::new(0.0, 0.0, w, h));
        session.set_crop_mode(CropMode::Fixed(ar));
        session.begin_crop();
    }
    let edited = session.render()?;
    save_image(&edited, &args.out)?;
    println!("{}", args.out.display());
    Ok(())
}

fn cmd_models(args: ModelsArgs, presets: Option<&Path>) -> Result<()> {
    let models = presets::load_models(presets)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }
    for m in &models {
        let (w, h) = m.filter_config.output_size();
        println!(
            "{:<10} {:<12} {:<8} {}  {:>4.1} MP  {:>4.0} mm  {}x{}",
            m.id, m.name, m.era, m.year, m.megapixels, m.focal_length_mm, w, h
        );
    }
    Ok(())
}

fn cmd_info(args: InfoArgs) -> Result<()> {
    let meta = CaptureMetadata::from_file(&args.input)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }
    for (key, value) in meta.summary_lines() {
        println!("{key:<14} {value}");
    }
    Ok(())
}
