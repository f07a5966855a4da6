//! Still capture: filter, shake, persist.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result};
use retrocam_core::io::save_image;
use retrocam_core::shake::RandomSource;
use retrocam_core::{
    CameraModel, FilterConfig, ImageBuf, MotionSample, ShakeEffect, apply_filters, apply_shake,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::PhotoFormat;

/// Source of device rotation rates at the moment of capture.
pub trait MotionSensor {
    fn sample(&mut self) -> Option<MotionSample>;
}

impl<T: MotionSensor + ?Sized> MotionSensor for Box<T> {
    fn sample(&mut self) -> Option<MotionSample> {
        (**self).sample()
    }
}

/// No sensor: the blur direction is drawn at random.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMotion;

impl MotionSensor for NoMotion {
    fn sample(&mut self) -> Option<MotionSample> {
        None
    }
}

/// A sample supplied up front, e.g. from the command line.
#[derive(Clone, Copy, Debug)]
pub struct FixedMotion(pub MotionSample);

impl MotionSensor for FixedMotion {
    fn sample(&mut self) -> Option<MotionSample> {
        Some(self.0)
    }
}

/// Where finished photos go.
pub trait PhotoSink {
    /// Store `image` under `name` (no extension) and return where it went.
    fn store(&mut self, name: &str, image: &ImageBuf) -> Result<PathBuf>;
}

/// Writes photos into a directory.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    format: PhotoFormat,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, format: PhotoFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }
}

impl PhotoSink for DirectorySink {
    fn store(&mut self, name: &str, image: &ImageBuf) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output dir '{}'", self.dir.display()))?;
        let ext = match self.format {
            PhotoFormat::Jpeg => "jpg",
            PhotoFormat::Png => "png",
        };
        let path = self.dir.join(format!("{name}.{ext}"));
        save_image(image, &path)?;
        Ok(path)
    }
}

/// Keeps photos in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    pub stored: Vec<(String, ImageBuf)>,
}

#[cfg(test)]
impl PhotoSink for MemorySink {
    fn store(&mut self, name: &str, image: &ImageBuf) -> Result<PathBuf> {
        self.stored.push((name.to_string(), image.clone()));
        Ok(PathBuf::from(name))
    }
}

/// What one capture produced.
#[derive(Clone, Debug, Serialize)]
pub struct CaptureResult {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub model_id: String,
    pub filter_config: FilterConfig,
    pub shake_effect: Option<ShakeEffect>,
    pub captured_at: SystemTime,
}

/// One model's capture path with its collaborators.
pub struct CaptureSession<'a, M, R> {
    model: &'a CameraModel,
    config: FilterConfig,
    motion: M,
    rng: R,
    shake: bool,
}

impl<'a, M: MotionSensor, R: RandomSource> CaptureSession<'a, M, R> {
    pub fn new(model: &'a CameraModel, config: FilterConfig, motion: M, rng: R) -> Self {
        Self {
            model,
            config,
            motion,
            rng,
            shake: true,
        }
    }

    pub fn without_shake(mut self) -> Self {
        self.shake = false;
        self
    }

    /// Filter `raw` (already upright), apply hand shake and hand the result
    /// to `sink` under `name`.
    pub fn capture(
        &mut self,
        raw: &ImageBuf,
        name: &str,
        sink: &mut impl PhotoSink,
    ) -> Result<CaptureResult> {
        let start = Instant::now();
        let filtered = apply_filters(raw, &self.config)
            .with_context(|| format!("filter capture for {}", self.model.id))?;

        let (image, shake_effect) = if self.shake {
            let effect = ShakeEffect::generate(self.motion.sample(), &self.config, &mut self.rng);
            match apply_shake(&filtered, &effect) {
                Ok(shaken) => (shaken, Some(effect)),
                Err(e) => {
                    warn!(error = %e, "shake failed, keeping filtered frame");
                    (filtered, None)
                }
            }
        } else {
            (filtered, None)
        };
        debug!(?shake_effect, "shake applied");

        let path = sink.store(name, &image)?;
        info!(
            model = %self.model.id,
            path = %path.display(),
            w = image.width,
            h = image.height,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "photo captured"
        );
        Ok(CaptureResult {
            path,
            width: image.width,
            height: image.height,
            model_id: self.model.id.clone(),
            filter_config: self.config.clone(),
            shake_effect,
            captured_at: SystemTime::now(),
        })
    }
}

/// `<stem>_<model>` for the file written from `input`.
pub fn output_name(input: &Path, model_id: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_string());
    format!("{stem}_{model_id}")
}
