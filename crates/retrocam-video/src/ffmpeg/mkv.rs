//! Just enough Matroska to hand timed rawvideo frames to `ffmpeg` on a pipe.
//!
//! One video track, `V_UNCOMPRESSED` RGBA, microsecond timestamps. The
//! segment has unknown size so the stream can be written front to back;
//! every frame gets its own cluster so block timestamps are always zero
//! relative to it.

use std::io::{self, Write};

const EBML: u32 = 0x1A45_DFA3;
const EBML_VERSION: u32 = 0x4286;
const EBML_READ_VERSION: u32 = 0x42F7;
const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
const DOC_TYPE: u32 = 0x4282;
const DOC_TYPE_VERSION: u32 = 0x4287;
const DOC_TYPE_READ_VERSION: u32 = 0x4285;

const SEGMENT: u32 = 0x1853_8067;
const INFO: u32 = 0x1549_A966;
const TIMESTAMP_SCALE: u32 = 0x2A_D7B1;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;

const TRACKS: u32 = 0x1654_AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
const TRACK_TYPE: u32 = 0x83;
const FLAG_LACING: u32 = 0x9C;
const CODEC_ID: u32 = 0x86;
const VIDEO: u32 = 0xE0;
const PIXEL_WIDTH: u32 = 0xB0;
const PIXEL_HEIGHT: u32 = 0xBA;
const COLOUR_SPACE: u32 = 0x2E_B524;

const CLUSTER: u32 = 0x1F43_B675;
const CLUSTER_TIMESTAMP: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;

/// Nanoseconds per timestamp tick.
const MICROSECOND_NS: u64 = 1_000;
const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
/// Track number vint, relative timestamp 0, keyframe without lacing.
const BLOCK_HEADER: [u8; 4] = [0x81, 0x00, 0x00, 0x80];

/// Writes a single-track RGBA rawvideo Matroska stream.
pub struct RawVideoStream<W: Write> {
    out: W,
}

impl<W: Write> RawVideoStream<W> {
    /// Write the stream header for `width`x`height` frames.
    pub fn new(mut out: W, width: u32, height: u32) -> io::Result<Self> {
        let mut head = Vec::new();
        element(
            &mut head,
            EBML,
            &[
                uint(EBML_VERSION, 1),
                uint(EBML_READ_VERSION, 1),
                uint(EBML_MAX_ID_LENGTH, 4),
                uint(EBML_MAX_SIZE_LENGTH, 8),
                bytes(DOC_TYPE, b"matroska"),
                uint(DOC_TYPE_VERSION, 4),
                uint(DOC_TYPE_READ_VERSION, 2),
            ]
            .concat(),
        );
        write_id(&mut head, SEGMENT);
        head.extend_from_slice(&UNKNOWN_SIZE);
        element(
            &mut head,
            INFO,
            &[
                uint(TIMESTAMP_SCALE, MICROSECOND_NS),
                bytes(MUXING_APP, b"retrocam"),
                bytes(WRITING_APP, b"retrocam"),
            ]
            .concat(),
        );
        let video = [
            uint(PIXEL_WIDTH, u64::from(width)),
            uint(PIXEL_HEIGHT, u64::from(height)),
            bytes(COLOUR_SPACE, b"RGBA"),
        ]
        .concat();
        let entry = [
            uint(TRACK_NUMBER, 1),
            uint(TRACK_UID, 1),
            uint(TRACK_TYPE, 1),
            uint(FLAG_LACING, 0),
            bytes(CODEC_ID, b"V_UNCOMPRESSED"),
            bytes(VIDEO, &video),
        ]
        .concat();
        let mut tracks = Vec::new();
        element(&mut tracks, TRACK_ENTRY, &entry);
        element(&mut head, TRACKS, &tracks);

        out.write_all(&head)?;
        Ok(Self { out })
    }

    /// Append one frame presented at `micros`.
    pub fn write_frame(&mut self, micros: i64, rgba: &[u8]) -> io::Result<()> {
        let at = u64::try_from(micros).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("negative frame timestamp {micros}us"),
            )
        })?;
        let timestamp = uint(CLUSTER_TIMESTAMP, at);
        let block_len = (BLOCK_HEADER.len() + rgba.len()) as u64;

        let mut block_head = Vec::with_capacity(16);
        write_id(&mut block_head, SIMPLE_BLOCK);
        write_size(&mut block_head, block_len);
        block_head.extend_from_slice(&BLOCK_HEADER);

        let cluster_len = (timestamp.len() + block_head.len() + rgba.len()) as u64;
        let mut head = Vec::with_capacity(32);
        write_id(&mut head, CLUSTER);
        write_size(&mut head, cluster_len);
        head.extend_from_slice(&timestamp);
        head.extend_from_slice(&block_head);

        self.out.write_all(&head)?;
        self.out.write_all(rgba)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_id(buf: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    buf.extend_from_slice(&bytes[skip..]);
}

/// Shortest EBML variable-length size. All-ones values are reserved.
fn write_size(buf: &mut Vec<u8>, size: u64) {
    let len = (1..=8u32)
        .find(|&n| size < (1u64 << (7 * n)) - 1)
        .unwrap_or(8);
    let marked = size | (1u64 << (7 * len));
    buf.extend_from_slice(&marked.to_be_bytes()[8 - len as usize..]);
}

fn element(buf: &mut Vec<u8>, id: u32, payload: &[u8]) {
    write_id(buf, id);
    write_size(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

fn uint(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    let mut out = Vec::new();
    element(&mut out, id, &bytes[skip..]);
    out
}

fn bytes(id: u32, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    element(&mut out, id, value);
    out
}
