use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use retrocam_core::{AspectRatio, CompositionOrder, MotionSample};

#[derive(Parser, Debug)]
#[command(name = "retrocam", version, about = "Vintage phone camera emulation")]
pub struct Cli {
    /// Preset file with extra or overriding camera models (JSON).
    #[arg(long, global = true)]
    pub presets: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter a still photo as if taken with a vintage phone.
    Photo(PhotoArgs),
    /// Colour-filter a video (requires `ffmpeg` and `ffprobe` on PATH).
    Video(VideoArgs),
    /// Adjust and crop a still, like the post-capture editor.
    Edit(EditArgs),
    /// List the available camera models.
    Models(ModelsArgs),
    /// Print capture metadata read from a still's EXIF block.
    Info(InfoArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Composition {
    #[default]
    ColorThenDownscale,
    CropThenColor,
    ColorCropDownscale,
}

impl From<Composition> for CompositionOrder {
    fn from(c: Composition) -> Self {
        match c {
            Composition::ColorThenDownscale => CompositionOrder::ColorThenDownscale,
            Composition::CropThenColor => CompositionOrder::CropThenColor,
            Composition::ColorCropDownscale => CompositionOrder::ColorCropDownscale,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PhotoFormat {
    #[default]
    Jpeg,
    Png,
}

#[derive(Parser, Debug)]
pub struct PhotoArgs {
    /// Source image (JPEG, PNG, TIFF or camera RAW).
    pub input: PathBuf,

    /// Camera model id.
    #[arg(long, default_value = "iphone4")]
    pub model: String,

    /// Output aspect ratio (1:1, 4:3, 16:9).
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// Override the model's crop/colour/downscale ordering.
    #[arg(long, value_enum)]
    pub composition: Option<Composition>,

    /// Directory the filtered photo is written to.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = PhotoFormat::Jpeg)]
    pub format: PhotoFormat,

    /// Rotation rate `x,y,z` (rad/s) used to orient the motion blur.
    #[arg(long, value_parser = parse_motion, allow_hyphen_values = true)]
    pub motion: Option<MotionSample>,

    /// Seed for the hand-shake generator, for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the hand-shake simulation.
    #[arg(long, default_value_t = false)]
    pub no_shake: bool,
}

#[derive(Parser, Debug)]
pub struct VideoArgs {
    /// Source video file.
    pub input: PathBuf,

    /// Camera model id.
    #[arg(long, default_value = "iphone4")]
    pub model: String,

    /// Output path. Defaults to `<uuid>_filtered.mov` in the temp directory.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct EditArgs {
    pub input: PathBuf,

    /// Output image path; format follows the extension.
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub brightness: f32,

    #[arg(long, default_value_t = 1.0)]
    pub contrast: f32,

    #[arg(long, default_value_t = 1.0)]
    pub saturation: f32,

    /// Crop to the largest centred rectangle of this ratio.
    #[arg(long)]
    pub crop: Option<AspectRatio>,
}

#[derive(Parser, Debug)]
pub struct ModelsArgs {
    /// Print as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    pub input: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// `"x,y,z"` → [`MotionSample`].
pub fn parse_motion(s: &str) -> Result<MotionSample, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected three comma-separated values, got '{s}'"));
    };
    let parse = |v: &str| {
        v.parse::<f64>()
            .map_err(|e| format!("invalid rotation rate '{v}': {e}"))
    };
    Ok(MotionSample {
        x: parse(x)?,
        y: parse(y)?,
        z: parse(z)?,
    })
}
