//! Frame-by-frame colour filtering of recorded video.
//!
//! The [`Transcoder`] reads a source container through a [`Demuxer`], runs
//! every video frame through the colour pipeline, passes audio through
//! untouched and writes the result through a [`Muxer`]. The production
//! backend drives the system `ffmpeg`; [`memory`] is used in tests.

mod engine;
pub mod ffmpeg;
pub mod media;
pub mod memory;
mod pool;
pub mod track;

pub use engine::{
    CancelHandle, TranscodeReport, TranscodeState, Transcoder, default_output_path, transcode,
};
pub use media::{AudioSample, SourceInfo, Timestamp, VideoFrame, VideoTrackInfo};
pub use pool::{FramePool, FramePoolStats};
pub use track::{
    AudioTrackReader, AudioTrackWriter, ContainerWriter, Demuxer, Muxer, OutputSettings,
    SourceTracks, VideoTrackReader, VideoTrackWriter, WriterStatus,
};
