//! Seams between the transcoding engine and a container backend.
//!
//! Track readers and writers are owned by exactly one worker each and are
//! moved onto blocking threads, so they must be `Send + 'static`.

use std::path::Path;

use retrocam_core::Result;
use serde::{Deserialize, Serialize};

use crate::media::{AudioSample, SourceInfo, Timestamp, VideoFrame};

pub trait VideoTrackReader: Send {
    /// Next decoded frame in presentation order, `None` once exhausted.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;
}

pub trait AudioTrackReader: Send {
    fn next_sample(&mut self) -> Result<Option<AudioSample>>;
}

pub trait VideoTrackWriter: Send {
    /// Borrow an output buffer from the writer's pool. `None` when the pool
    /// is exhausted.
    fn acquire_buffer(&mut self) -> Option<Vec<u8>>;

    /// Append at `frame.pts`. The writer takes the buffer back.
    fn append(&mut self, frame: VideoFrame) -> Result<()>;

    fn mark_finished(&mut self) -> Result<()>;
}

pub trait AudioTrackWriter: Send {
    fn append(&mut self, sample: AudioSample) -> Result<()>;

    fn mark_finished(&mut self) -> Result<()>;
}

/// The opened source: its stream summary plus track readers.
pub struct SourceTracks {
    pub info: SourceInfo,
    pub video: Option<Box<dyn VideoTrackReader>>,
    pub audio: Option<Box<dyn AudioTrackReader>>,
}

impl std::fmt::Debug for SourceTracks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTracks")
            .field("info", &self.info)
            .field("video", &self.video.is_some())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}

pub trait Demuxer: Send + Sync {
    fn open(&self, path: &Path) -> Result<SourceTracks>;
}

/// Output track layout. Video keeps the source's native resolution and
/// display rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    #[serde(default)]
    pub rotation: i32,
    pub has_audio: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriterStatus {
    Completed,
    Failed(String),
    Cancelled,
}

pub trait ContainerWriter: Send {
    /// Begin the writing session. Track writers are available afterwards.
    fn start_session(&mut self, at: Timestamp) -> Result<()>;

    fn take_video_writer(&mut self) -> Option<Box<dyn VideoTrackWriter>>;

    fn take_audio_writer(&mut self) -> Option<Box<dyn AudioTrackWriter>>;

    /// Close the container once every track is marked finished.
    fn finish_writing(&mut self) -> WriterStatus;

    /// Abandon the output, e.g. after cancellation.
    fn cancel_writing(&mut self) {}
}

pub trait Muxer: Send + Sync {
    fn create(&self, output: &Path, settings: &OutputSettings) -> Result<Box<dyn ContainerWriter>>;
}
