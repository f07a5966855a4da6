//! In-memory demuxer and muxer for exercising the engine without ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use retrocam_core::{FilterError, Result};

use crate::media::{AudioSample, SourceInfo, Timestamp, VideoFrame, VideoTrackInfo};
use crate::pool::{FramePool, FramePoolStats};
use crate::track::{
    AudioTrackReader, AudioTrackWriter, ContainerWriter, Demuxer, Muxer, OutputSettings,
    SourceTracks, VideoTrackReader, VideoTrackWriter, WriterStatus,
};

/// Decoded content of a fake source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySource {
    pub video: Option<VideoTrackInfo>,
    pub frames: Vec<VideoFrame>,
    pub audio: Option<Vec<AudioSample>>,
}

impl MemorySource {
    /// `count` frames of a horizontal ramp at `fps`/1, timestamps from zero.
    pub fn ramp(width: u32, height: u32, count: u64, fps: u32) -> Self {
        let frames = (0..count)
            .map(|i| VideoFrame {
                pts: Timestamp::from_frame_index(i, fps, 1),
                width,
                height,
                rgba: ramp_rgba(width, height, i),
            })
            .collect();
        Self {
            video: Some(VideoTrackInfo {
                width,
                height,
                fps_num: fps,
                fps_den: 1,
                rotation: 0,
            }),
            frames,
            audio: None,
        }
    }

    pub fn audio_only(samples: Vec<AudioSample>) -> Self {
        Self {
            video: None,
            frames: Vec::new(),
            audio: Some(samples),
        }
    }

    pub fn with_audio(mut self, samples: Vec<AudioSample>) -> Self {
        self.audio = Some(samples);
        self
    }

    /// Mark the video as displayed rotated by `degrees` counter-clockwise.
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.rotation = degrees;
        }
        self
    }

    /// Replace the frame timestamps, e.g. to model a variable frame rate.
    pub fn with_timestamps(mut self, pts: &[Timestamp]) -> Self {
        for (frame, &t) in self.frames.iter_mut().zip(pts) {
            frame.pts = t;
        }
        self
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            video: self.video,
            has_audio: self.audio.is_some(),
            duration_sec: self.frames.last().map(|f| f.pts.seconds()),
        }
    }
}

fn ramp_rgba(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(VideoFrame::byte_len(width, height));
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            out.extend_from_slice(&[r, g, (seed % 256) as u8, 255]);
        }
    }
    out
}

/// Serves the same [`MemorySource`] for any existing path.
#[derive(Clone, Debug)]
pub struct MemoryDemuxer {
    source: MemorySource,
}

impl MemoryDemuxer {
    pub fn new(source: MemorySource) -> Self {
        Self { source }
    }
}

impl Demuxer for MemoryDemuxer {
    fn open(&self, _path: &Path) -> Result<SourceTracks> {
        let source = self.source.clone();
        let info = source.info();
        let video = source.video.map(|_| {
            Box::new(FrameQueue(source.frames.into_iter())) as Box<dyn VideoTrackReader>
        });
        let audio = source
            .audio
            .map(|samples| Box::new(SampleQueue(samples.into_iter())) as Box<dyn AudioTrackReader>);
        Ok(SourceTracks { info, video, audio })
    }
}

struct FrameQueue(std::vec::IntoIter<VideoFrame>);

impl VideoTrackReader for FrameQueue {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        Ok(self.0.next())
    }
}

struct SampleQueue(std::vec::IntoIter<AudioSample>);

impl AudioTrackReader for SampleQueue {
    fn next_sample(&mut self) -> Result<Option<AudioSample>> {
        Ok(self.0.next())
    }
}

/// Everything a [`MemoryMuxer`] was asked to write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recording {
    pub output: Option<PathBuf>,
    pub settings: Option<OutputSettings>,
    pub session_start: Option<Timestamp>,
    pub frames: Vec<VideoFrame>,
    pub audio: Vec<AudioSample>,
    pub has_audio_track: bool,
    pub video_finished: bool,
    pub audio_finished: bool,
    pub status: Option<WriterStatus>,
    pub pool: FramePoolStats,
}

#[derive(Clone, Copy, Debug)]
struct MemoryMuxerOpts {
    pool_capacity: usize,
    recycle_buffers: bool,
    fail_append_at: Option<usize>,
}

impl Default for MemoryMuxerOpts {
    fn default() -> Self {
        Self {
            pool_capacity: 4,
            recycle_buffers: true,
            fail_append_at: None,
        }
    }
}

/// Records output in memory. Clones share one [`Recording`], so a test can
/// keep a handle after moving the muxer into a transcoder.
#[derive(Clone, Debug, Default)]
pub struct MemoryMuxer {
    recording: Arc<Mutex<Recording>>,
    opts: MemoryMuxerOpts,
}

impl MemoryMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.opts.pool_capacity = capacity;
        self
    }

    /// Keep appended buffers instead of returning them to the pool, so the
    /// pool runs dry after `pool_capacity` frames.
    pub fn holding_buffers(mut self) -> Self {
        self.opts.recycle_buffers = false;
        self
    }

    /// Make the append of the `n`th frame (zero-based) fail.
    pub fn failing_append_at(mut self, n: usize) -> Self {
        self.opts.fail_append_at = Some(n);
        self
    }

    pub fn recording(&self) -> Recording {
        lock(&self.recording).clone()
    }
}

fn lock(recording: &Mutex<Recording>) -> MutexGuard<'_, Recording> {
    recording.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Muxer for MemoryMuxer {
    fn create(&self, output: &Path, settings: &OutputSettings) -> Result<Box<dyn ContainerWriter>> {
        {
            let mut rec = lock(&self.recording);
            *rec = Recording {
                output: Some(output.to_path_buf()),
                settings: Some(*settings),
                ..Recording::default()
            };
        }
        Ok(Box::new(MemoryContainer {
            recording: Arc::clone(&self.recording),
            opts: self.opts,
            settings: *settings,
            video: None,
            audio: None,
        }))
    }
}

struct MemoryContainer {
    recording: Arc<Mutex<Recording>>,
    opts: MemoryMuxerOpts,
    settings: OutputSettings,
    video: Option<MemoryVideoWriter>,
    audio: Option<MemoryAudioWriter>,
}

impl ContainerWriter for MemoryContainer {
    fn start_session(&mut self, at: Timestamp) -> Result<()> {
        lock(&self.recording).session_start = Some(at);
        self.video = Some(MemoryVideoWriter {
            recording: Arc::clone(&self.recording),
            pool: FramePool::new(
                VideoFrame::byte_len(self.settings.width, self.settings.height),
                self.opts.pool_capacity,
            ),
            opts: self.opts,
            appended: 0,
            failed: false,
        });
        if self.settings.has_audio {
            lock(&self.recording).has_audio_track = true;
            self.audio = Some(MemoryAudioWriter {
                recording: Arc::clone(&self.recording),
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
        let mut rec = lock(&self.recording);
        let status = match rec.status.clone() {
            Some(WriterStatus::Failed(reason)) => WriterStatus::Failed(reason),
            _ if !rec.video_finished => {
                WriterStatus::Failed("video track was never marked finished".into())
            }
            _ if rec.has_audio_track && !rec.audio_finished => {
                WriterStatus::Failed("audio track was never marked finished".into())
            }
            _ => WriterStatus::Completed,
        };
        rec.status = Some(status.clone());
        status
    }

    fn cancel_writing(&mut self) {
        lock(&self.recording).status = Some(WriterStatus::Cancelled);
    }
}

struct MemoryVideoWriter {
    recording: Arc<Mutex<Recording>>,
    pool: FramePool,
    opts: MemoryMuxerOpts,
    appended: usize,
    failed: bool,
}

impl VideoTrackWriter for MemoryVideoWriter {
    fn acquire_buffer(&mut self) -> Option<Vec<u8>> {
        let buf = self.pool.acquire();
        lock(&self.recording).pool = self.pool.stats();
        buf
    }

    fn append(&mut self, frame: VideoFrame) -> Result<()> {
        if self.failed || self.opts.fail_append_at == Some(self.appended) {
            self.failed = true;
            lock(&self.recording).status =
                Some(WriterStatus::Failed(format!("append rejected at frame {}", self.appended)));
            return Err(FilterError::VideoProcessingFailed(format!(
                "writer rejected frame at {:?}",
                frame.pts
            )));
        }
        self.appended += 1;
        let mut rec = lock(&self.recording);
        if self.opts.recycle_buffers {
            rec.frames.push(frame.clone());
            self.pool.release(frame.rgba);
        } else {
            rec.frames.push(frame);
        }
        rec.pool = self.pool.stats();
        Ok(())
    }

    fn mark_finished(&mut self) -> Result<()> {
        lock(&self.recording).video_finished = true;
        Ok(())
    }
}

struct MemoryAudioWriter {
    recording: Arc<Mutex<Recording>>,
}

impl AudioTrackWriter for MemoryAudioWriter {
    fn append(&mut self, sample: AudioSample) -> Result<()> {
        lock(&self.recording).audio.push(sample);
        Ok(())
    }

    fn mark_finished(&mut self) -> Result<()> {
        lock(&self.recording).audio_finished = true;
        Ok(())
    }
}
