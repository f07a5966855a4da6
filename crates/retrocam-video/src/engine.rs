use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use retrocam_core::{FilterConfig, FilterError, ImageBuf, Result, apply_color_or_passthrough};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ffmpeg::{FfmpegDemuxer, FfmpegMuxer};
use crate::media::{Timestamp, VideoFrame};
use crate::track::{
    AudioTrackReader, AudioTrackWriter, ContainerWriter, Demuxer, Muxer, OutputSettings,
    VideoTrackReader, VideoTrackWriter, WriterStatus,
};

/// Lifecycle of one [`Transcoder::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeState {
    #[default]
    Idle,
    /// Reading and writing, both workers active.
    Running,
    Finalizing,
    Completed,
    Failed,
}

/// Cloneable cancellation flag, checked by both workers between samples.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeReport {
    pub output_path: PathBuf,
    pub frames_written: u64,
    pub frames_skipped: u64,
    pub audio_samples_copied: u64,
}

/// `<temp dir>/<uuid>_filtered.mov`
pub fn default_output_path() -> PathBuf {
    std::env::temp_dir().join(format!("{}_filtered.mov", uuid::Uuid::new_v4()))
}

/// Colour-filter a video file with the ffmpeg backend and return the path of
/// the written file. On failure the partial output is left for the caller.
pub async fn transcode(input: &Path, config: &FilterConfig) -> Result<PathBuf> {
    let report = Transcoder::ffmpeg(config.clone()).run(input).await?;
    Ok(report.output_path)
}

/// Reads a source, filters every frame through the colour pipeline and
/// writes it back out at the source's native size. Audio is copied.
pub struct Transcoder {
    demuxer: Arc<dyn Demuxer>,
    muxer: Arc<dyn Muxer>,
    config: FilterConfig,
    output: Option<PathBuf>,
    cancel: CancelHandle,
    state: watch::Sender<TranscodeState>,
}

impl Transcoder {
    pub fn new(
        demuxer: impl Demuxer + 'static,
        muxer: impl Muxer + 'static,
        config: FilterConfig,
    ) -> Self {
        Self {
            demuxer: Arc::new(demuxer),
            muxer: Arc::new(muxer),
            config,
            output: None,
            cancel: CancelHandle::new(),
            state: watch::Sender::new(TranscodeState::Idle),
        }
    }

    pub fn ffmpeg(config: FilterConfig) -> Self {
        Self::new(FfmpegDemuxer, FfmpegMuxer, config)
    }

    /// Write to `path` instead of a fresh file in the temp directory.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> TranscodeState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscodeState> {
        self.state.subscribe()
    }

    pub async fn run(&self, input: &Path) -> Result<TranscodeReport> {
        let start = Instant::now();
        let result = self.run_inner(input).await;
        match &result {
            Ok(report) => {
                self.state.send_replace(TranscodeState::Completed);
                info!(
                    output = %report.output_path.display(),
                    frames = report.frames_written,
                    skipped = report.frames_skipped,
                    audio_samples = report.audio_samples_copied,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "transcode complete"
                );
            }
            Err(e) => {
                self.state.send_replace(TranscodeState::Failed);
                warn!(input = %input.display(), error = %e, "transcode failed");
            }
        }
        result
    }

    async fn run_inner(&self, input: &Path) -> Result<TranscodeReport> {
        if !tokio::fs::try_exists(input).await? {
            return Err(FilterError::FileNotFound(input.to_path_buf()));
        }

        let demuxer = Arc::clone(&self.demuxer);
        let path = input.to_path_buf();
        let source = blocking(move || demuxer.open(&path)).await?;
        let (Some(video_info), Some(video_reader)) = (source.info.video, source.video) else {
            return Err(FilterError::NoVideoTrack);
        };
        let audio_reader = source.audio;

        let output = self.output.clone().unwrap_or_else(default_output_path);
        let settings = OutputSettings {
            width: video_info.width,
            height: video_info.height,
            fps_num: video_info.fps_num,
            fps_den: video_info.fps_den,
            rotation: video_info.rotation,
            has_audio: audio_reader.is_some(),
        };

        let muxer = Arc::clone(&self.muxer);
        let target = output.clone();
        let mut writer = blocking(move || {
            let mut writer = muxer.create(&target, &settings)?;
            writer.start_session(Timestamp::ZERO)?;
            Ok(writer)
        })
        .await?;

        let video_writer = writer
            .take_video_writer()
            .ok_or_else(|| FilterError::VideoProcessingFailed("writer has no video track".into()))?;
        let audio = match audio_reader {
            Some(reader) => {
                let writer = writer.take_audio_writer().ok_or_else(|| {
                    FilterError::VideoProcessingFailed("writer has no audio track".into())
                })?;
                Some((reader, writer))
            }
            None => None,
        };

        self.state.send_replace(TranscodeState::Running);
        info!(
            input = %input.display(),
            output = %output.display(),
            width = settings.width,
            height = settings.height,
            has_audio = settings.has_audio,
            "transcode started"
        );

        let config = self.config.clone();
        let cancel = self.cancel.clone();
        let video_task = tokio::task::spawn_blocking(move || {
            run_video_worker(video_reader, video_writer, &config, &cancel)
        });
        let cancel = self.cancel.clone();
        let audio_task = async move {
            match audio {
                Some((reader, writer)) => Some(
                    tokio::task::spawn_blocking(move || run_audio_worker(reader, writer, &cancel))
                        .await,
                ),
                None => None,
            }
        };
        let (video_result, audio_result) = tokio::join!(video_task, audio_task);
        let video_result = video_result.map_err(join_failed).and_then(|r| r);
        let audio_result = match audio_result {
            Some(joined) => joined.map_err(join_failed).and_then(|r| r.map(Some)),
            None => Ok(None),
        };

        self.state.send_replace(TranscodeState::Finalizing);
        let cancelled = self.cancel.is_cancelled();
        let status = blocking(move || Ok(close_writer(writer, cancelled))).await?;

        let video_stats = video_result?;
        let audio_samples = audio_result?.unwrap_or(0);
        match status {
            WriterStatus::Completed => Ok(TranscodeReport {
                output_path: output,
                frames_written: video_stats.written,
                frames_skipped: video_stats.skipped,
                audio_samples_copied: audio_samples,
            }),
            WriterStatus::Cancelled => Err(FilterError::Cancelled),
            WriterStatus::Failed(reason) => Err(FilterError::VideoProcessingFailed(reason)),
        }
    }
}

fn close_writer(mut writer: Box<dyn ContainerWriter>, cancelled: bool) -> WriterStatus {
    if cancelled {
        writer.cancel_writing();
        return WriterStatus::Cancelled;
    }
    writer.finish_writing()
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(join_failed)?
}

fn join_failed(e: tokio::task::JoinError) -> FilterError {
    FilterError::VideoProcessingFailed(format!("worker task failed: {e}"))
}

fn processing_failed(what: &str, e: FilterError) -> FilterError {
    match e {
        FilterError::VideoProcessingFailed(_) | FilterError::Cancelled => e,
        other => FilterError::VideoProcessingFailed(format!("{what}: {other}")),
    }
}

#[derive(Debug, Default)]
struct VideoStats {
    written: u64,
    skipped: u64,
}

fn run_video_worker(
    mut reader: Box<dyn VideoTrackReader>,
    mut writer: Box<dyn VideoTrackWriter>,
    config: &FilterConfig,
    cancel: &CancelHandle,
) -> Result<VideoStats> {
    let mut stats = VideoStats::default();
    let outcome = loop {
        if cancel.is_cancelled() {
            break Err(FilterError::Cancelled);
        }
        let frame = match reader.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(e) => break Err(processing_failed("read frame", e)),
        };
        match filter_frame(frame, writer.as_mut(), config) {
            Ok(true) => stats.written += 1,
            Ok(false) => stats.skipped += 1,
            Err(e) => break Err(e),
        }
    };

    let finished = writer.mark_finished();
    outcome?;
    finished.map_err(|e| processing_failed("finish video track", e))?;
    debug!(
        written = stats.written,
        skipped = stats.skipped,
        "video track finished"
    );
    Ok(stats)
}

/// Returns `false` when the frame was dropped for lack of an output buffer.
fn filter_frame(
    frame: VideoFrame,
    writer: &mut dyn VideoTrackWriter,
    config: &FilterConfig,
) -> Result<bool> {
    let VideoFrame {
        pts,
        width,
        height,
        rgba,
    } = frame;
    let input = ImageBuf::from_rgba8_srgb(width, height, &rgba)
        .map_err(|e| processing_failed("decode frame", e))?;
    let filtered = apply_color_or_passthrough(&input, config);

    let Some(mut buf) = writer.acquire_buffer() else {
        warn!(
            pts = pts.value,
            timescale = pts.timescale,
            "output buffer pool exhausted, skipping frame"
        );
        return Ok(false);
    };
    buf.resize(VideoFrame::byte_len(width, height), 0);
    filtered.write_rgba8_srgb(&mut buf);

    writer
        .append(VideoFrame {
            pts,
            width,
            height,
            rgba: buf,
        })
        .map_err(|e| processing_failed("append frame", e))?;
    Ok(true)
}

fn run_audio_worker(
    mut reader: Box<dyn AudioTrackReader>,
    mut writer: Box<dyn AudioTrackWriter>,
    cancel: &CancelHandle,
) -> Result<u64> {
    let mut copied = 0_u64;
    let outcome = loop {
        if cancel.is_cancelled() {
            break Err(FilterError::Cancelled);
        }
        match reader.next_sample() {
            Ok(Some(sample)) => {
                if let Err(e) = writer.append(sample) {
                    break Err(processing_failed("append audio", e));
                }
                copied += 1;
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(processing_failed("read audio", e)),
        }
    };

    let finished = writer.mark_finished();
    outcome?;
    finished.map_err(|e| processing_failed("finish audio track", e))?;
    debug!(samples = copied, "audio track finished");
    Ok(copied)
}
