use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{Context as _, bail};
use retrocam_core::{FilterError, Result};
use tracing::{debug, warn};

use super::mkv::RawVideoStream;
use super::{StderrDrain, backend_error};
use crate::media::{AudioSample, Timestamp, VideoFrame};
use crate::pool::FramePool;
use crate::track::{
    AudioTrackWriter, ContainerWriter, OutputSettings, VideoTrackWriter, WriterStatus,
};

const POOL_CAPACITY: usize = 3;

/// `<output><suffix>` next to the final file.
fn sidecar(output: &Path, suffix: &str) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(suffix);
    output.with_file_name(name)
}

fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temporary file"),
    }
}

/// A running H.264 encoder reading Matroska rawvideo on stdin.
struct Encoder {
    child: Child,
    stream: RawVideoStream<BufWriter<ChildStdin>>,
    stderr: StderrDrain,
}

/// H.264 encoder fed RGBA8 frames with their own timestamps.
///
/// The encoder is started by the first frame, whose timescale becomes the
/// output track timescale. Frames are written at the microsecond nearest
/// their timestamp, which rounds back exactly for timescales up to 1 MHz.
pub struct FfmpegVideoWriter {
    out_path: PathBuf,
    encoder: Option<Encoder>,
    finished: bool,
    pool: FramePool,
    width: u32,
    height: u32,
}

impl FfmpegVideoWriter {
    pub fn new(out_path: &Path, settings: &OutputSettings) -> Self {
        Self {
            out_path: out_path.to_path_buf(),
            encoder: None,
            finished: false,
            pool: FramePool::new(
                VideoFrame::byte_len(settings.width, settings.height),
                POOL_CAPACITY,
            ),
            width: settings.width,
            height: settings.height,
        }
    }

    fn spawn_encoder(&self, timescale: u32) -> anyhow::Result<Encoder> {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(encode_args(timescale))
            .arg(&self.out_path);

        let mut child = cmd
            .spawn()
            .context("failed to spawn ffmpeg (is it installed and on PATH?)")?;
        let stdin = child
            .stdin
            .take()
            .context("failed to open ffmpeg stdin (unexpected)")?;
        let stderr = StderrDrain::spawn(child.stderr.take());
        let stream = RawVideoStream::new(BufWriter::new(stdin), self.width, self.height)
            .context("failed to write stream header to ffmpeg")?;
        debug!(timescale, path = %self.out_path.display(), "encoder started");
        Ok(Encoder {
            child,
            stream,
            stderr,
        })
    }
}

fn encode_args(timescale: u32) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "matroska",
        "-i",
        "pipe:0",
        "-an",
        "-copyts",
        "-fps_mode",
        "passthrough",
        "-c:v",
        "libx264",
        "-profile:v",
        "high",
        // yuv420p needs even dimensions
        "-vf",
        "pad=ceil(iw/2)*2:ceil(ih/2)*2",
        "-pix_fmt",
        "yuv420p",
        "-video_track_timescale",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.push(timescale.max(1).to_string());
    args
}

impl VideoTrackWriter for FfmpegVideoWriter {
    fn acquire_buffer(&mut self) -> Option<Vec<u8>> {
        self.pool.acquire()
    }

    fn append(&mut self, frame: VideoFrame) -> Result<()> {
        let VideoFrame {
            pts,
            width,
            height,
            rgba,
        } = frame;
        let written = self.write_frame(pts, width, height, &rgba);
        self.pool.release(rgba);
        written
    }

    fn mark_finished(&mut self) -> Result<()> {
        self.finished = true;
        let Some(Encoder {
            mut child,
            stream,
            mut stderr,
        }) = self.encoder.take()
        else {
            return Ok(());
        };
        // dropping stdin ends the encoder's input, also when the flush failed
        let flushed = stream
            .into_inner()
            .into_inner()
            .map(drop)
            .map_err(|e| e.into_error());
        let status = child
            .wait()
            .context("failed to wait for ffmpeg to finish")
            .map_err(backend_error)?;
        let log = stderr.finish();
        if !status.success() {
            return Err(FilterError::VideoProcessingFailed(format!(
                "ffmpeg encode failed (status {status}): {log}"
            )));
        }
        flushed.map_err(|e| {
            FilterError::VideoProcessingFailed(format!("failed to flush frames to ffmpeg: {e}"))
        })?;
        debug!(pool = ?self.pool.stats(), "encoder finished");
        Ok(())
    }
}

impl FfmpegVideoWriter {
    fn write_frame(&mut self, pts: Timestamp, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
        if width != self.width || height != self.height {
            return Err(FilterError::VideoProcessingFailed(format!(
                "frame size mismatch: got {width}x{height}, expected {}x{}",
                self.width, self.height
            )));
        }
        if self.finished {
            return Err(FilterError::VideoProcessingFailed(
                "video track already finished".into(),
            ));
        }
        if self.encoder.is_none() {
            self.encoder = Some(self.spawn_encoder(pts.timescale).map_err(backend_error)?);
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(FilterError::VideoProcessingFailed("encoder not running".into()));
        };
        encoder.stream.write_frame(pts.micros(), rgba).map_err(|e| {
            FilterError::VideoProcessingFailed(format!("failed to write frame to ffmpeg: {e}"))
        })
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            let _ = encoder.child.kill();
            let _ = encoder.child.wait();
        }
    }
}

/// Appends stream-copied audio bytes to a sidecar file.
pub struct FfmpegAudioWriter {
    file: Option<BufWriter<File>>,
}

impl AudioTrackWriter for FfmpegAudioWriter {
    fn append(&mut self, sample: AudioSample) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(FilterError::VideoProcessingFailed(
                "audio track already finished".into(),
            ));
        };
        file.write_all(&sample.data)?;
        Ok(())
    }

    fn mark_finished(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

/// How the display rotation is written onto the muxed video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RotationTag {
    /// `-display_rotation` on the input, copied as a display matrix.
    DisplayMatrix,
    /// The clockwise `rotate` metadata tag older ffmpeg builds understand.
    Legacy,
}

/// Output container. The encoded video and copied audio are written to
/// sidecar files first and joined by `finish_writing` into a partial file
/// that replaces `output` only once it is complete.
pub struct FfmpegContainer {
    output: PathBuf,
    settings: OutputSettings,
    video_path: PathBuf,
    audio_path: PathBuf,
    partial_path: PathBuf,
    video: Option<FfmpegVideoWriter>,
    audio: Option<FfmpegAudioWriter>,
}

impl FfmpegContainer {
    pub fn new(output: &Path, settings: OutputSettings) -> Self {
        Self {
            output: output.to_path_buf(),
            settings,
            video_path: sidecar(output, ".video.mp4"),
            audio_path: sidecar(output, ".audio.mka"),
            partial_path: partial(output),
            video: None,
            audio: None,
        }
    }

    fn mux_args(&self, tag: RotationTag) -> Vec<OsString> {
        let rotation = self.settings.rotation;
        let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into()];
        if rotation != 0 && tag == RotationTag::DisplayMatrix {
            args.push("-display_rotation:v:0".into());
            args.push(rotation.to_string().into());
        }
        args.push("-i".into());
        args.push(self.video_path.clone().into());
        if self.settings.has_audio {
            args.push("-i".into());
            args.push(self.audio_path.clone().into());
        }
        args.extend(["-map", "0:v:0"].map(OsString::from));
        if self.settings.has_audio {
            args.extend(["-map", "1:a:0"].map(OsString::from));
        }
        if rotation != 0 && tag == RotationTag::Legacy {
            args.push("-metadata:s:v:0".into());
            args.push(format!("rotate={}", (-rotation).rem_euclid(360)).into());
        }
        args.extend(["-copyts", "-c", "copy", "-movflags", "+faststart"].map(OsString::from));
        args.push(self.partial_path.clone().into());
        args
    }

    fn run_mux(&self, tag: RotationTag) -> anyhow::Result<()> {
        let out = Command::new("ffmpeg")
            .args(self.mux_args(tag))
            .output()
            .context("failed to run ffmpeg for muxing")?;
        if !out.status.success() {
            bail!(
                "ffmpeg mux failed for '{}': {}",
                self.output.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }

    fn mux(&self) -> anyhow::Result<()> {
        let size = std::fs::metadata(&self.video_path)
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            bail!("encoder produced no video");
        }

        match self.run_mux(RotationTag::DisplayMatrix) {
            Ok(()) => {}
            Err(e) if self.settings.rotation != 0 => {
                debug!(error = %format!("{e:#}"), "display rotation rejected, retrying with rotate tag");
                self.run_mux(RotationTag::Legacy)?;
            }
            Err(e) => return Err(e),
        }
        std::fs::rename(&self.partial_path, &self.output).with_context(|| {
            format!(
                "failed to move '{}' to '{}'",
                self.partial_path.display(),
                self.output.display()
            )
        })
    }

    fn remove_temporaries(&self) {
        remove_if_exists(&self.video_path);
        remove_if_exists(&self.audio_path);
        remove_if_exists(&self.partial_path);
    }
}

/// `<stem>.partial.<ext>` next to `output`, keeping the extension so ffmpeg
/// picks the same container format.
fn partial(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    let mut name = stem;
    name.push(".partial");
    if let Some(ext) = output.extension() {
        name.push(".");
        name.push(ext);
    }
    output.with_file_name(name)
}

impl ContainerWriter for FfmpegContainer {
    fn start_session(&mut self, at: Timestamp) -> Result<()> {
        if at != Timestamp::ZERO {
            debug!(?at, "session start ignored, frames keep their own timestamps");
        }
        self.video = Some(FfmpegVideoWriter::new(&self.video_path, &self.settings));
        if self.settings.has_audio {
            let file = File::create(&self.audio_path)
                .with_context(|| format!("failed to create '{}'", self.audio_path.display()))
                .map_err(backend_error)?;
            self.audio = Some(FfmpegAudioWriter {
                file: Some(BufWriter::new(file)),
            });
        }
        Ok(())
    }

    fn take_video_writer(&mut self) -> Option<Box<dyn VideoTrackWriter>> {
        self.video
            .take()
            .map(|w| Box::new(w) as Box<dyn VideoTrackWriter>)
    }

    fn take_audio_writer(&mut self) -> Option<Box<dyn AudioTrackWriter>> {
        self.audio
            .take()
            .map(|w| Box::new(w) as Box<dyn AudioTrackWriter>)
    }

    fn finish_writing(&mut self) -> WriterStatus {
        let status = match self.mux() {
            Ok(()) => WriterStatus::Completed,
            Err(e) => WriterStatus::Failed(format!("{e:#}")),
        };
        self.remove_temporaries();
        status
    }

    fn cancel_writing(&mut self) {
        self.video = None;
        self.audio = None;
        self.remove_temporaries();
    }
}
