use std::path::{Path, PathBuf};
use std::process::Command;

use retrocam_core::{FilterConfig, FilterError, ImageBuf, apply_color};
use retrocam_video::ffmpeg::{is_ffmpeg_on_path, probe};
use retrocam_video::memory::{MemoryDemuxer, MemoryMuxer, MemorySource};
use retrocam_video::{AudioSample, Timestamp, TranscodeState, Transcoder, WriterStatus};

fn input_file() -> tempfile::NamedTempFile {
    tempfile::NamedTempFile::new().unwrap()
}

fn transcoder(source: MemorySource, muxer: &MemoryMuxer) -> Transcoder {
    Transcoder::new(
        MemoryDemuxer::new(source),
        muxer.clone(),
        FilterConfig::iphone4(),
    )
}

fn audio(n: u8) -> Vec<AudioSample> {
    (0..n)
        .map(|i| AudioSample {
            pts: None,
            data: vec![i; 16],
        })
        .collect()
}

#[tokio::test]
async fn thirty_frames_without_audio() {
    let input = input_file();
    let muxer = MemoryMuxer::new();
    let t = transcoder(MemorySource::ramp(32, 24, 30, 30), &muxer);

    let report = t.run(input.path()).await.unwrap();
    assert_eq!(report.frames_written, 30);
    assert_eq!(report.frames_skipped, 0);
    assert_eq!(report.audio_samples_copied, 0);
    assert_eq!(t.state(), TranscodeState::Completed);

    let rec = muxer.recording();
    assert_eq!(rec.frames.len(), 30);
    assert!(!rec.has_audio_track);
    assert!(rec.audio.is_empty());
    assert_eq!(rec.status, Some(WriterStatus::Completed));
    let settings = rec.settings.unwrap();
    assert_eq!((settings.width, settings.height), (32, 24));
    assert_eq!(rec.output.as_deref(), Some(report.output_path.as_path()));
}

#[tokio::test]
async fn timestamps_and_order_are_preserved() {
    let input = input_file();
    let source = MemorySource::ramp(8, 8, 12, 24);
    let expected: Vec<_> = source.frames.iter().map(|f| f.pts).collect();
    let muxer = MemoryMuxer::new();
    transcoder(source, &muxer).run(input.path()).await.unwrap();

    let written: Vec<_> = muxer.recording().frames.iter().map(|f| f.pts).collect();
    assert_eq!(written, expected);
}

#[tokio::test]
async fn frames_carry_the_color_filter_at_native_size() {
    let input = input_file();
    let source = MemorySource::ramp(16, 10, 2, 30);
    let first = source.frames[0].clone();
    let muxer = MemoryMuxer::new();
    transcoder(source, &muxer).run(input.path()).await.unwrap();

    let decoded = ImageBuf::from_rgba8_srgb(first.width, first.height, &first.rgba).unwrap();
    let expected = apply_color(&decoded, &FilterConfig::iphone4())
        .unwrap()
        .to_rgba_u8_srgb();
    let out = &muxer.recording().frames[0];
    assert_eq!((out.width, out.height), (16, 10));
    assert_eq!(out.rgba, expected);
    assert_ne!(out.rgba, first.rgba);
}

#[tokio::test]
async fn audio_is_copied_untouched() {
    let input = input_file();
    let samples = audio(7);
    let muxer = MemoryMuxer::new();
    let source = MemorySource::ramp(8, 8, 5, 30).with_audio(samples.clone());
    let report = transcoder(source, &muxer).run(input.path()).await.unwrap();

    assert_eq!(report.audio_samples_copied, 7);
    let rec = muxer.recording();
    assert!(rec.has_audio_track && rec.audio_finished);
    assert_eq!(rec.audio, samples);
}

#[tokio::test]
async fn missing_input_is_file_not_found() {
    let muxer = MemoryMuxer::new();
    let t = transcoder(MemorySource::ramp(8, 8, 1, 30), &muxer);
    let missing = PathBuf::from("/definitely/not/here.mov");
    let err = t.run(&missing).await.unwrap_err();
    assert!(matches!(err, FilterError::FileNotFound(ref p) if p == &missing));
    assert_eq!(t.state(), TranscodeState::Failed);
    assert!(muxer.recording().output.is_none());
}

#[tokio::test]
async fn unreadable_input_path_is_an_io_error() {
    let file = input_file();
    // a regular file used as a directory cannot be checked, it is not missing
    let below_file = file.path().join("clip.mov");
    let muxer = MemoryMuxer::new();
    let err = transcoder(MemorySource::ramp(8, 8, 1, 30), &muxer)
        .run(&below_file)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::Io(_)), "{err:?}");
    assert!(muxer.recording().output.is_none());
}

#[tokio::test]
async fn variable_frame_rate_timestamps_are_kept() {
    let input = input_file();
    let pts: Vec<_> = [0, 20, 30, 60, 61, 100]
        .into_iter()
        .map(|v| Timestamp::new(v, 600))
        .collect();
    let source = MemorySource::ramp(8, 8, 6, 30).with_timestamps(&pts);
    let muxer = MemoryMuxer::new();
    let report = transcoder(source, &muxer).run(input.path()).await.unwrap();

    assert_eq!(report.frames_written, 6);
    let written: Vec<_> = muxer.recording().frames.iter().map(|f| f.pts).collect();
    assert_eq!(written, pts);
}

#[tokio::test]
async fn rotation_and_coded_size_reach_the_writer() {
    let input = input_file();
    let muxer = MemoryMuxer::new();
    let source = MemorySource::ramp(12, 8, 2, 30).with_rotation(270);
    transcoder(source, &muxer).run(input.path()).await.unwrap();

    let rec = muxer.recording();
    let settings = rec.settings.unwrap();
    assert_eq!((settings.width, settings.height, settings.rotation), (12, 8, 270));
    assert!(rec.frames.iter().all(|f| (f.width, f.height) == (12, 8)));
}

#[tokio::test]
async fn audio_only_source_has_no_video_track() {
    let input = input_file();
    let muxer = MemoryMuxer::new();
    let t = transcoder(MemorySource::audio_only(audio(3)), &muxer);
    let err = t.run(input.path()).await.unwrap_err();
    assert!(matches!(err, FilterError::NoVideoTrack));
}

#[tokio::test]
async fn append_failure_fails_the_file() {
    let input = input_file();
    let muxer = MemoryMuxer::new().failing_append_at(3);
    let t = transcoder(MemorySource::ramp(8, 8, 10, 30), &muxer);
    let err = t.run(input.path()).await.unwrap_err();
    assert!(matches!(err, FilterError::VideoProcessingFailed(_)), "{err}");
    assert_eq!(t.state(), TranscodeState::Failed);

    let rec = muxer.recording();
    assert_eq!(rec.frames.len(), 3);
    assert!(rec.video_finished);
    assert!(matches!(rec.status, Some(WriterStatus::Failed(_))));
}

#[tokio::test]
async fn exhausted_pool_skips_frames() {
    let input = input_file();
    let muxer = MemoryMuxer::new().with_pool_capacity(4).holding_buffers();
    let report = transcoder(MemorySource::ramp(8, 8, 30, 30), &muxer)
        .run(input.path())
        .await
        .unwrap();
    assert_eq!(report.frames_written, 4);
    assert_eq!(report.frames_skipped, 26);

    let rec = muxer.recording();
    assert_eq!(rec.frames.len(), 4);
    assert_eq!(rec.pool.exhausted, 26);
    // the frames that did get through are the first ones, in order
    let pts: Vec<_> = rec.frames.iter().map(|f| f.pts.value).collect();
    assert_eq!(pts, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn cancelled_run_fails_with_cancelled() {
    let input = input_file();
    let muxer = MemoryMuxer::new();
    let t = transcoder(MemorySource::ramp(8, 8, 30, 30).with_audio(audio(4)), &muxer);
    t.cancel_handle().cancel();
    let err = t.run(input.path()).await.unwrap_err();
    assert!(matches!(err, FilterError::Cancelled));
    assert_eq!(muxer.recording().status, Some(WriterStatus::Cancelled));
    assert_eq!(t.state(), TranscodeState::Failed);
}

#[tokio::test]
async fn explicit_output_path_is_used() {
    let input = input_file();
    let muxer = MemoryMuxer::new();
    let t = transcoder(MemorySource::ramp(8, 8, 2, 30), &muxer).with_output("/tmp/custom.mov");
    let report = t.run(input.path()).await.unwrap();
    assert_eq!(report.output_path, PathBuf::from("/tmp/custom.mov"));
}

#[tokio::test]
async fn state_changes_are_observable() {
    let input = input_file();
    let muxer = MemoryMuxer::new();
    let t = transcoder(MemorySource::ramp(8, 8, 3, 30), &muxer);
    let rx = t.subscribe();
    assert_eq!(*rx.borrow(), TranscodeState::Idle);
    t.run(input.path()).await.unwrap();
    assert_eq!(*rx.borrow(), TranscodeState::Completed);
}

fn has_libx264() -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains("libx264"))
        .unwrap_or(false)
}

fn ffmpeg_ready() -> bool {
    if is_ffmpeg_on_path() && has_libx264() {
        return true;
    }
    eprintln!("skipping: ffmpeg with libx264 not available");
    false
}

fn ffmpeg(args: &[&str]) -> bool {
    Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error"])
        .args(args)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn make_clip(path: &Path, with_audio: bool) {
    let mut args = vec!["-f", "lavfi", "-i", "testsrc=size=96x64:rate=30"];
    if with_audio {
        args.extend(["-f", "lavfi", "-i", "sine=frequency=440:duration=1"]);
    }
    args.extend(["-frames:v", "30", "-c:v", "mpeg4"]);
    if with_audio {
        args.extend(["-c:a", "aac", "-shortest"]);
    }
    let path = path.to_str().unwrap();
    args.push(path);
    assert!(ffmpeg(&args));
}

/// 30 fps test pattern with every fourth frame dropped, so frame spacing
/// alternates between one and two ticks.
fn make_vfr_clip(path: &Path) {
    assert!(ffmpeg(&[
        "-f",
        "lavfi",
        "-i",
        "testsrc=size=96x64:rate=30:duration=1",
        "-vf",
        "select='not(eq(mod(n\\,4)\\,1))'",
        "-fps_mode",
        "passthrough",
        "-c:v",
        "mpeg4",
        path.to_str().unwrap(),
    ]));
}

/// Copy `src` to `dst` with a quarter-turn display rotation and return the
/// rotation read back, or `None` when this ffmpeg can write neither form of
/// rotation metadata.
fn make_rotated_copy(src: &Path, dst: &Path) -> Option<i32> {
    let (src, dst) = (src.to_str().unwrap(), dst.to_str().unwrap());
    let tagged = ffmpeg(&["-display_rotation:v:0", "90", "-i", src, "-c", "copy", dst])
        || ffmpeg(&["-i", src, "-c", "copy", "-metadata:s:v:0", "rotate=270", dst]);
    if !tagged {
        return None;
    }
    let rotation = probe(Path::new(dst)).unwrap().video.unwrap().rotation;
    (rotation != 0).then_some(rotation)
}

/// Presentation time of every frame, in seconds, as ffprobe reports it.
fn frame_times(path: &Path) -> Vec<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "frame=best_effort_timestamp_time",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .unwrap();
    assert!(out.status.success());
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| l.trim().trim_end_matches(','))
        .filter(|l| !l.is_empty())
        .map(|l| l.parse().unwrap())
        .collect()
}

fn assert_same_times(input: &[f64], output: &[f64]) {
    assert_eq!(input.len(), output.len(), "{input:?} vs {output:?}");
    for (i, (a, b)) in input.iter().zip(output).enumerate() {
        assert!((a - b).abs() < 1e-3, "frame {i}: {a} vs {b}");
    }
}

/// First frame as stored, without applying display rotation.
fn first_frame(path: &Path) -> Vec<u8> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-noautorotate", "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    out.stdout
}

fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let total: u64 = a.iter().zip(b).map(|(x, y)| u64::from(x.abs_diff(*y))).sum();
    total as f64 / a.len() as f64
}

async fn filter(input: &Path, out: &Path, config: FilterConfig) -> retrocam_video::TranscodeReport {
    Transcoder::ffmpeg(config)
        .with_output(out)
        .run(input)
        .await
        .unwrap()
}

#[tokio::test]
async fn ffmpeg_keeps_frame_count_and_timestamps() {
    if !ffmpeg_ready() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let silent = dir.path().join("silent.mp4");
    make_clip(&silent, false);
    let out = dir.path().join("silent_filtered.mov");
    let report = filter(&silent, &out, FilterConfig::iphone4()).await;

    let input_times = frame_times(&silent);
    assert_eq!(input_times.len(), 30);
    assert_eq!(report.frames_written, 30);
    assert_same_times(&input_times, &frame_times(&out));

    let info = probe(&out).unwrap();
    let video = info.video.unwrap();
    assert_eq!((video.width, video.height, video.rotation), (96, 64, 0));
    assert!(!info.has_audio);
}

#[tokio::test]
async fn ffmpeg_keeps_variable_frame_timing() {
    if !ffmpeg_ready() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let vfr = dir.path().join("vfr.mov");
    make_vfr_clip(&vfr);
    let input_times = frame_times(&vfr);
    let gaps: Vec<f64> = input_times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(
        gaps.iter().any(|g| (g - gaps[0]).abs() > 1e-3),
        "fixture is not variable rate: {input_times:?}"
    );

    let out = dir.path().join("vfr_filtered.mov");
    let report = filter(&vfr, &out, FilterConfig::iphone6()).await;
    assert_eq!(report.frames_written, input_times.len() as u64);
    assert_same_times(&input_times, &frame_times(&out));
}

#[tokio::test]
async fn ffmpeg_keeps_rotation_and_stored_pixels() {
    if !ffmpeg_ready() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.mp4");
    make_clip(&plain, false);
    let rotated = dir.path().join("rotated.mp4");
    let Some(rotation) = make_rotated_copy(&plain, &rotated) else {
        eprintln!("skipping: this ffmpeg cannot tag rotation");
        return;
    };
    assert_eq!(rotation % 90, 0);

    let out = dir.path().join("rotated_filtered.mov");
    let config = FilterConfig::iphone4();
    let report = filter(&rotated, &out, config.clone()).await;
    assert_eq!(report.frames_written, 30);

    let video = probe(&out).unwrap().video.unwrap();
    assert_eq!((video.width, video.height, video.rotation), (96, 64, rotation));

    // the stored frame is the colour-filtered stored input, not a sheared copy
    let source = first_frame(&rotated);
    let decoded = ImageBuf::from_rgba8_srgb(96, 64, &source).unwrap();
    let expected = apply_color(&decoded, &config).unwrap().to_rgba_u8_srgb();
    let diff = mean_abs_diff(&first_frame(&out), &expected);
    assert!(diff < 20.0, "mean difference {diff}");
}

#[tokio::test]
async fn ffmpeg_copies_audio_and_cleans_up() {
    if !ffmpeg_ready() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let loud = dir.path().join("loud.mp4");
    make_clip(&loud, true);
    let out = dir.path().join("loud_filtered.mov");
    let report = filter(&loud, &out, FilterConfig::iphone6()).await;
    assert!(report.audio_samples_copied > 0);
    assert!(probe(&out).unwrap().has_audio);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.contains(".video.") || n.contains(".audio.") || n.contains(".partial."))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn ffmpeg_failure_leaves_existing_output() {
    if !ffmpeg_ready() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let not_video = dir.path().join("notes.mov");
    std::fs::write(&not_video, b"not a video").unwrap();
    let out = dir.path().join("existing.mov");
    std::fs::write(&out, b"user data").unwrap();

    let err = Transcoder::ffmpeg(FilterConfig::iphone4())
        .with_output(&out)
        .run(&not_video)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::VideoProcessingFailed(_)), "{err}");
    assert_eq!(std::fs::read(&out).unwrap(), b"user data");
}
