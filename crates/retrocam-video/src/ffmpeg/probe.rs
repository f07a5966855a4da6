use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use anyhow::{Context as _, bail};
use serde::Deserialize;

use crate::media::{SourceInfo, Timestamp, VideoTrackInfo};

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Run `ffprobe` on `path` and summarise its first video stream.
pub fn probe(path: &Path) -> anyhow::Result<SourceInfo> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .context("failed to run ffprobe")?;
    if !out.status.success() {
        bail!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    parse_probe_json(&out.stdout)
}

/// Presentation timestamps of every decoded frame of the first video
/// stream, in decode output order, in the stream's own time base.
pub fn probe_frame_times(path: &Path) -> anyhow::Result<Vec<Timestamp>> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=time_base:frame=best_effort_timestamp",
            "-print_format",
            "json",
        ])
        .arg(path)
        .output()
        .context("failed to run ffprobe")?;
    if !out.status.success() {
        bail!(
            "ffprobe frame listing failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    parse_frame_times_json(&out.stdout)
}

/// Interpret `ffprobe -print_format json -show_streams -show_format` output.
///
/// A source without a video stream parses fine with `video: None`.
pub fn parse_probe_json(json: &[u8]) -> anyhow::Result<SourceInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json).context("ffprobe json parse failed")?;

    let video = match parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
    {
        Some(stream) => {
            let width = stream.width.context("missing video width from ffprobe")?;
            let height = stream.height.context("missing video height from ffprobe")?;
            let (fps_num, fps_den) = parse_ff_ratio(stream.r_frame_rate.as_deref().unwrap_or("0/1"))
                .filter(|(num, _)| *num > 0)
                .context("invalid video r_frame_rate")?;
            Some(VideoTrackInfo {
                width,
                height,
                fps_num,
                fps_den,
                rotation: stream_rotation(stream),
            })
        }
        None => None,
    };

    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok());
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(SourceInfo {
        video,
        has_audio,
        duration_sec,
    })
}

/// Display rotation, counter-clockwise. The display matrix wins over the
/// legacy clockwise `rotate` tag.
fn stream_rotation(stream: &ProbeStream) -> i32 {
    if let Some(deg) = stream.side_data_list.iter().find_map(|d| d.rotation) {
        return quarter_turns(deg);
    }
    match stream.tags.get("rotate").and_then(|r| r.trim().parse::<f64>().ok()) {
        Some(cw) => quarter_turns(-cw),
        None => 0,
    }
}

/// Snap to the nearest multiple of 90 in `0..360`.
fn quarter_turns(deg: f64) -> i32 {
    let turns = (deg / 90.0).round() as i32;
    (turns * 90).rem_euclid(360)
}

#[derive(Deserialize)]
struct FrameEntry {
    best_effort_timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct TimeBaseEntry {
    time_base: Option<String>,
}

#[derive(Deserialize)]
struct FrameTimesOut {
    #[serde(default)]
    frames: Vec<FrameEntry>,
    #[serde(default)]
    streams: Vec<TimeBaseEntry>,
}

/// Interpret `-show_entries stream=time_base:frame=best_effort_timestamp`.
///
/// A frame without a timestamp is an error rather than a guess.
pub fn parse_frame_times_json(json: &[u8]) -> anyhow::Result<Vec<Timestamp>> {
    let parsed: FrameTimesOut =
        serde_json::from_slice(json).context("ffprobe frame json parse failed")?;
    let (tb_num, tb_den) = parsed
        .streams
        .first()
        .and_then(|s| s.time_base.as_deref())
        .and_then(parse_ff_ratio)
        .filter(|(num, _)| *num > 0)
        .context("missing video time_base from ffprobe")?;

    parsed
        .frames
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let ts = f
                .best_effort_timestamp
                .with_context(|| format!("frame {i} has no timestamp"))?;
            Ok(Timestamp::new(ts * i64::from(tb_num), tb_den))
        })
        .collect()
}

/// `"30000/1001"` → `(30000, 1001)`. A zero denominator is rejected.
pub fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let (num, den) = s.trim().split_once('/')?;
    let num = num.trim().parse::<u32>().ok()?;
    let den = den.trim().parse::<u32>().ok()?;
    if den == 0 {
        return None;
    }
    Some((num, den))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_parsing() {
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio(" 25/1 "), Some((25, 1)));
        assert_eq!(parse_ff_ratio("30/0"), None);
        assert_eq!(parse_ff_ratio("30"), None);
        assert_eq!(parse_ff_ratio("a/b"), None);
    }

    #[test]
    fn video_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1"},
                {"codec_type": "audio", "r_frame_rate": "0/0"}
            ],
            "format": {"duration": "2.500000"}
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(
            info.video,
            Some(VideoTrackInfo {
                width: 1920,
                height: 1080,
                fps_num: 30,
                fps_den: 1,
                rotation: 0,
            })
        );
        assert!(info.has_audio);
        assert_eq!(info.duration_sec, Some(2.5));
    }

    #[test]
    fn audio_only_has_no_video() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let info = parse_probe_json(json).unwrap();
        assert!(info.video.is_none());
        assert!(info.has_audio);
        assert!(info.duration_sec.is_none());
    }

    #[test]
    fn video_missing_size_is_an_error() {
        let json = br#"{"streams": [{"codec_type": "video", "r_frame_rate": "30/1"}]}"#;
        assert!(parse_probe_json(json).is_err());
    }

    #[test]
    fn display_matrix_rotation_is_counter_clockwise() {
        let json = br#"{"streams": [{
            "codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
        }]}"#;
        let video = parse_probe_json(json).unwrap().video.unwrap();
        // coded size is reported as stored, not as displayed
        assert_eq!((video.width, video.height), (1920, 1080));
        assert_eq!(video.rotation, 270);
    }

    #[test]
    fn legacy_rotate_tag_is_clockwise() {
        let json = br#"{"streams": [{
            "codec_type": "video", "width": 640, "height": 480, "r_frame_rate": "30/1",
            "tags": {"rotate": "90", "handler_name": "Core Media Video"}
        }]}"#;
        assert_eq!(parse_probe_json(json).unwrap().video.unwrap().rotation, 270);
        assert_eq!(quarter_turns(90.0), 90);
        assert_eq!(quarter_turns(-180.0), 180);
        assert_eq!(quarter_turns(359.9), 0);
    }

    #[test]
    fn frame_times_keep_source_time_base() {
        let json = br#"{
            "frames": [
                {"best_effort_timestamp": 0},
                {"best_effort_timestamp": 20},
                {"best_effort_timestamp": 30},
                {"best_effort_timestamp": 60}
            ],
            "streams": [{"time_base": "1/600"}]
        }"#;
        let times = parse_frame_times_json(json).unwrap();
        let values: Vec<i64> = times.iter().map(|t| t.value).collect();
        assert_eq!(values, vec![0, 20, 30, 60]);
        assert!(times.iter().all(|t| t.timescale == 600));
    }

    #[test]
    fn frame_times_scale_by_time_base_numerator() {
        let json = br#"{"frames": [{"best_effort_timestamp": 3}], "streams": [{"time_base": "1001/30000"}]}"#;
        assert_eq!(
            parse_frame_times_json(json).unwrap(),
            vec![Timestamp::new(3003, 30000)]
        );
    }

    #[test]
    fn frame_without_timestamp_is_an_error() {
        let json = br#"{"frames": [{"best_effort_timestamp": 0}, {}], "streams": [{"time_base": "1/600"}]}"#;
        let err = parse_frame_times_json(json).unwrap_err();
        assert!(err.to_string().contains("frame 1"), "{err}");
        let json = br#"{"frames": [], "streams": []}"#;
        assert!(parse_frame_times_json(json).is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_probe_json(b"not json").is_err());
    }
}
