//! Backend on the system `ffmpeg`/`ffprobe` binaries.
//!
//! Video is decoded to rawvideo RGBA at its coded size on a pipe, with the
//! per-frame timestamps listed by a separate `ffprobe` pass. Filtered frames
//! go back to the encoder as a Matroska rawvideo stream so every frame keeps
//! its own timestamp. Audio is stream-copied into a sidecar file and joined
//! with the encoded video by a final `-c copy` mux.

mod mkv;
mod probe;
mod reader;
mod writer;

use std::io::Read as _;
use std::path::Path;
use std::process::{ChildStderr, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::Context as _;
use retrocam_core::{FilterError, Result};

pub use probe::{
    parse_ff_ratio, parse_frame_times_json, parse_probe_json, probe, probe_frame_times,
};
pub use reader::{FfmpegAudioReader, FfmpegVideoReader};
pub use writer::{FfmpegContainer, FfmpegVideoWriter};

use crate::track::{
    AudioTrackReader, ContainerWriter, Demuxer, Muxer, OutputSettings, SourceTracks,
    VideoTrackReader,
};

pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg") && tool_runs("ffprobe")
}

fn tool_runs(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

const STDERR_TAIL_BYTES: usize = 16 * 1024;

/// Reads a child's stderr on its own thread so a chatty process never
/// blocks on a full pipe. Keeps the last few KiB for error messages.
pub(crate) struct StderrDrain(Option<JoinHandle<Vec<u8>>>);

impl StderrDrain {
    pub(crate) fn spawn(stderr: Option<ChildStderr>) -> Self {
        Self(stderr.map(|mut pipe| {
            std::thread::spawn(move || {
                let mut tail = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            tail.extend_from_slice(&chunk[..n]);
                            if tail.len() > STDERR_TAIL_BYTES {
                                tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                            }
                        }
                    }
                }
                tail
            })
        }))
    }

    /// Wait for the pipe to close and return what was kept.
    pub(crate) fn finish(&mut self) -> String {
        match self.0.take().map(JoinHandle::join) {
            Some(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
            _ => String::new(),
        }
    }
}

pub(crate) fn backend_error(e: anyhow::Error) -> FilterError {
    FilterError::VideoProcessingFailed(format!("{e:#}"))
}

fn require_ffmpeg() -> Result<()> {
    if is_ffmpeg_on_path() {
        Ok(())
    } else {
        Err(FilterError::VideoProcessingFailed(
            "ffmpeg and ffprobe are required for video, but were not found on PATH".into(),
        ))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegDemuxer;

impl Demuxer for FfmpegDemuxer {
    fn open(&self, path: &Path) -> Result<SourceTracks> {
        require_ffmpeg()?;
        let info = probe(path).map_err(backend_error)?;
        let Some(video_info) = info.video else {
            return Ok(SourceTracks {
                info,
                video: None,
                audio: None,
            });
        };

        let times = probe_frame_times(path).map_err(backend_error)?;
        let video: Box<dyn VideoTrackReader> = Box::new(
            FfmpegVideoReader::spawn(path, video_info, times).map_err(backend_error)?,
        );
        let audio = if info.has_audio {
            let reader: Box<dyn AudioTrackReader> =
                Box::new(FfmpegAudioReader::spawn(path).map_err(backend_error)?);
            Some(reader)
        } else {
            None
        };
        Ok(SourceTracks {
            info,
            video: Some(video),
            audio,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegMuxer;

impl Muxer for FfmpegMuxer {
    fn create(&self, output: &Path, settings: &OutputSettings) -> Result<Box<dyn ContainerWriter>> {
        require_ffmpeg()?;
        ensure_parent_dir(output).map_err(backend_error)?;
        Ok(Box::new(FfmpegContainer::new(output, *settings)))
    }
}
