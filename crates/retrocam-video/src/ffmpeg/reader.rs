use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context as _, bail};
use retrocam_core::{FilterError, Result};

use super::{StderrDrain, backend_error};
use crate::media::{AudioSample, Timestamp, VideoFrame, VideoTrackInfo};
use crate::track::{AudioTrackReader, VideoTrackReader};

const AUDIO_CHUNK_BYTES: usize = 64 * 1024;

/// A running `ffmpeg` whose stdout we consume.
struct PipedProcess {
    child: Option<Child>,
    stdout: ChildStdout,
    stderr: StderrDrain,
}

impl PipedProcess {
    fn spawn(cmd: &mut Command) -> anyhow::Result<Self> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg (is it installed and on PATH?)")?;
        let stdout = child
            .stdout
            .take()
            .context("failed to open ffmpeg stdout (unexpected)")?;
        let stderr = StderrDrain::spawn(child.stderr.take());
        Ok(Self {
            child: Some(child),
            stdout,
            stderr,
        })
    }

    /// Fill `buf` from the pipe. Returns how many bytes were read; fewer
    /// than `buf.len()` only at end of stream.
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Reap the process after end of stream and surface its exit status.
    fn finish(&mut self) -> anyhow::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().context("failed to wait for ffmpeg to finish")?;
        let stderr = self.stderr.finish();
        if !status.success() {
            bail!("ffmpeg decode failed (status {status}): {stderr}");
        }
        Ok(())
    }
}

impl Drop for PipedProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Decodes the first video stream to RGBA8 frames at its coded size.
///
/// Autorotation is off, so a rotated clip arrives as stored. Every decoded
/// frame is passed through unchanged in count, and frame `i` is stamped with
/// the `i`th timestamp from [`probe_frame_times`](super::probe_frame_times).
pub struct FfmpegVideoReader {
    process: PipedProcess,
    info: VideoTrackInfo,
    times: VecDeque<Timestamp>,
    index: u64,
    done: bool,
}

impl FfmpegVideoReader {
    pub fn spawn(path: &Path, info: VideoTrackInfo, times: Vec<Timestamp>) -> anyhow::Result<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map",
                "0:v:0",
                "-fps_mode",
                "passthrough",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ]);
        Ok(Self::with_process(PipedProcess::spawn(&mut cmd)?, info, times))
    }

    fn with_process(process: PipedProcess, info: VideoTrackInfo, times: Vec<Timestamp>) -> Self {
        Self {
            process,
            info,
            times: times.into(),
            index: 0,
            done: false,
        }
    }
}

impl VideoTrackReader for FfmpegVideoReader {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.done {
            return Ok(None);
        }
        let mut rgba = vec![0u8; VideoFrame::byte_len(self.info.width, self.info.height)];
        let n = self.process.read_full(&mut rgba)?;
        if n == 0 {
            self.done = true;
            self.process.finish().map_err(backend_error)?;
            if !self.times.is_empty() {
                return Err(FilterError::VideoProcessingFailed(format!(
                    "decoder stopped after {} frames, {} more were listed",
                    self.index,
                    self.times.len()
                )));
            }
            return Ok(None);
        }
        if n < rgba.len() {
            self.done = true;
            return Err(FilterError::VideoProcessingFailed(format!(
                "truncated frame {}: got {n} of {} bytes",
                self.index,
                rgba.len()
            )));
        }

        let Some(pts) = self.times.pop_front() else {
            self.done = true;
            return Err(FilterError::VideoProcessingFailed(format!(
                "decoder produced more than the {} frames listed",
                self.index
            )));
        };
        self.index += 1;
        Ok(Some(VideoFrame {
            pts,
            width: self.info.width,
            height: self.info.height,
            rgba,
        }))
    }
}

/// Stream-copies the first audio stream as Matroska bytes.
pub struct FfmpegAudioReader {
    process: PipedProcess,
    done: bool,
}

impl FfmpegAudioReader {
    pub fn spawn(path: &Path) -> anyhow::Result<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-i"]).arg(path).args([
            "-map", "0:a:0", "-c:a", "copy", "-f", "matroska", "pipe:1",
        ]);
        Ok(Self {
            process: PipedProcess::spawn(&mut cmd)?,
            done: false,
        })
    }
}

impl AudioTrackReader for FfmpegAudioReader {
    fn next_sample(&mut self) -> Result<Option<AudioSample>> {
        if self.done {
            return Ok(None);
        }
        let mut data = vec![0u8; AUDIO_CHUNK_BYTES];
        let n = self.process.read_full(&mut data)?;
        if n < data.len() {
            self.done = true;
        }
        if n == 0 {
            self.process.finish().map_err(backend_error)?;
            return Ok(None);
        }
        data.truncate(n);
        Ok(Some(AudioSample { pts: None, data }))
    }
}
