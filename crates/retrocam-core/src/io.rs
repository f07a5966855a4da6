use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use tracing::{debug, info};

use crate::color::{linear_to_srgb_u8, srgb_to_linear, srgb_u8_to_linear};
use crate::image_buf::ImageBuf;

pub const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", "crw", "nef", "nrw", "arw", "srf", "sr2", "raf", "rw2", "orf", "pef", "dng",
    "3fr", "erf", "iiq", "kdc", "mef", "mos", "mrw", "raw", "rwl", "srw", "x3f",
];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif"];

/// Quality used for captured stills.
pub const JPEG_QUALITY: u8 = 90;

pub fn is_supported_extension(ext: &str) -> bool {
    let lower = ext.to_ascii_lowercase();
    RAW_EXTENSIONS.contains(&lower.as_str()) || IMAGE_EXTENSIONS.contains(&lower.as_str())
}

pub fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Develop a camera RAW file with rawler's default pipeline and bring it
/// back to linear light.
pub fn decode_raw(path: &Path) -> Result<ImageBuf> {
    info!(?path, "decoding RAW file");
    let t0 = Instant::now();

    let raw = rawler::decode_file(path)
        .with_context(|| format!("failed to decode RAW: {}", path.display()))?;
    let intermediate = rawler::imgop::develop::RawDevelop::default()
        .develop_intermediate(&raw)
        .with_context(|| format!("development failed: {}", path.display()))?;

    let rawler::imgop::develop::Intermediate::ThreeColor(rgb) = intermediate else {
        bail!("unexpected intermediate format (expected RGB)");
    };

    let mut data = Vec::with_capacity(rgb.data.len() * 3);
    for px in &rgb.data {
        for &c in px.iter().take(3) {
            data.push(srgb_to_linear(c.clamp(0.0, 1.0)));
        }
    }
    debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "decode_raw");
    Ok(ImageBuf::from_data(rgb.width as u32, rgb.height as u32, data)?)
}

/// Decode a JPEG, PNG or TIFF file to linear RGB.
pub fn load_image(path: &Path) -> Result<ImageBuf> {
    info!(?path, "loading image file");
    let t0 = Instant::now();

    let img = image::open(path)
        .with_context(|| format!("failed to open image: {}", path.display()))?
        .into_rgb8();

    let mut data = Vec::with_capacity((img.width() as usize) * (img.height() as usize) * 3);
    for px in img.pixels() {
        data.extend(px.0.iter().map(|&c| srgb_u8_to_linear(c)));
    }
    debug!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        width = img.width(),
        height = img.height(),
        "load_image"
    );
    Ok(ImageBuf::from_data(img.width(), img.height(), data)?)
}

/// Load any supported still, RAW or standard.
pub fn load_any(path: &Path) -> Result<ImageBuf> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if is_raw_extension(ext) {
        decode_raw(path)
    } else {
        load_image(path)
    }
}

/// sRGB 8-bit copy of `image`.
pub fn to_rgb8(image: &ImageBuf) -> Result<RgbImage> {
    let bytes: Vec<u8> = image.data.iter().map(|&v| linear_to_srgb_u8(v)).collect();
    RgbImage::from_raw(image.width, image.height, bytes)
        .context("pixel buffer does not match its dimensions")
}

/// Encode as baseline JPEG.
pub fn encode_jpeg(image: &ImageBuf, quality: u8) -> Result<Vec<u8>> {
    let rgb = to_rgb8(image)?;
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .context("JPEG encoding failed")?;
    Ok(out.into_inner())
}

/// Write `image` to `path`; the format follows the extension
/// (JPEG at [`JPEG_QUALITY`] when it is `jpg`/`jpeg`).
pub fn save_image(image: &ImageBuf, path: &Path) -> Result<()> {
    let t0 = Instant::now();
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unsupported output format: {}", path.display()))?;

    if format == ImageFormat::Jpeg {
        let bytes = encode_jpeg(image, JPEG_QUALITY)?;
        std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        to_rgb8(image)?
            .save_with_format(path, format)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    info!(?path, elapsed_ms = t0.elapsed().as_millis() as u64, "image saved");
    Ok(())
}
