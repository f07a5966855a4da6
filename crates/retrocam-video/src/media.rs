use serde::{Deserialize, Serialize};

/// Rational presentation time: `value / timescale` seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub value: i64,
    pub timescale: u32,
}

impl Timestamp {
    pub const ZERO: Self = Self {
        value: 0,
        timescale: 1,
    };

    pub const fn new(value: i64, timescale: u32) -> Self {
        Self { value, timescale }
    }

    /// Time of frame `index` at a constant `num/den` frames per second.
    pub fn from_frame_index(index: u64, num: u32, den: u32) -> Self {
        Self {
            value: (index as i64) * den as i64,
            timescale: num.max(1),
        }
    }

    /// The same instant in whole microseconds, rounded to nearest.
    pub fn micros(&self) -> i64 {
        if self.timescale == 0 {
            return 0;
        }
        let ts = i128::from(self.timescale);
        let scaled = i128::from(self.value) * 1_000_000;
        let rounded = if scaled >= 0 {
            (scaled + ts / 2) / ts
        } else {
            (scaled - ts / 2) / ts
        };
        rounded as i64
    }

    pub fn seconds(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.value as f64 / self.timescale as f64
    }
}

/// One decoded video sample, tightly packed sRGB RGBA8.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub pts: Timestamp,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl VideoFrame {
    pub fn byte_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }
}

/// One compressed audio sample, copied through without decoding.
///
/// `pts` is `None` when the backend moves audio as an opaque byte stream
/// rather than as individual packets.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSample {
    pub pts: Option<Timestamp>,
    pub data: Vec<u8>,
}

/// Coded size of the first video stream plus its nominal rate.
///
/// `rotation` is the display rotation in degrees counter-clockwise
/// (0, 90, 180 or 270). Frames are always delivered at the coded size; the
/// rotation is carried to the output as metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTrackInfo {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    #[serde(default)]
    pub rotation: i32,
}

/// What a demuxer found in the source container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub video: Option<VideoTrackInfo>,
    pub has_audio: bool,
    pub duration_sec: Option<f64>,
}
