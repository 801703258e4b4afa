use std::f32::consts::PI;

use tempfile::tempdir;
use unmix::{
    audio_info, read_audio, read_audio_with, write_audio, AudioData, LoadOptions, UnmixError,
    WriteOptions,
};

fn tone(freq: f32, rate: u32, frames: usize, channels: u16) -> AudioData {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let v = (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5;
        for _ in 0..channels {
            samples.push(v);
        }
    }
    AudioData {
        samples,
        sample_rate: rate,
        channels,
    }
}

#[test]
fn missing_file_is_not_found() {
    let err = read_audio("does_not_exist.wav").unwrap_err();
    assert!(matches!(err, UnmixError::NotFound { .. }));

    let err = audio_info("does_not_exist.wav").unwrap_err();
    assert!(matches!(err, UnmixError::NotFound { .. }));
}

#[test]
fn write_read_roundtrip_mono() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("roundtrip.wav");

    let original = tone(220.0, 22050, 1000, 1);
    write_audio(&path, &original, &WriteOptions::default()).unwrap();

    let loaded = read_audio(&path).unwrap();
    assert_eq!(loaded.sample_rate, 22050);
    assert_eq!(loaded.channels, 1);
    assert_eq!(loaded.samples.len(), 1000);
}

#[test]
fn write_read_roundtrip_stereo() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("stereo.wav");

    let original = tone(440.0, 44100, 4410, 2);
    write_audio(&path, &original, &WriteOptions::default()).unwrap();

    let loaded = read_audio(&path).unwrap();
    assert_eq!(loaded.sample_rate, 44100);
    assert_eq!(loaded.channels, 2);
    assert_eq!(loaded.frames(), 4410);

    // 16-bit quantization noise only
    for (a, b) in loaded.samples.iter().zip(original.samples.iter()) {
        assert!((a - b).abs() < 1e-3, "{a} vs {b}");
    }
}

#[test]
fn invalid_bit_depth_rejected_without_writing() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("bad_depth.wav");

    let audio = tone(220.0, 44100, 100, 1);
    let err = write_audio(
        &path,
        &audio,
        &WriteOptions {
            bit_depth: 48,
            normalize: false,
        },
    )
    .unwrap_err();

    assert!(matches!(err, UnmixError::InvalidParameter(_)));
    assert!(!path.exists(), "rejected write must not create a file");
}

#[test]
fn all_valid_bit_depths_write() {
    let tmp = tempdir().unwrap();
    let audio = tone(220.0, 44100, 256, 2);

    for depth in [8u16, 16, 24, 32] {
        let path = tmp.path().join(format!("depth_{depth}.wav"));
        write_audio(
            &path,
            &audio,
            &WriteOptions {
                bit_depth: depth,
                normalize: false,
            },
        )
        .unwrap();
        let loaded = read_audio(&path).unwrap();
        assert_eq!(loaded.frames(), 256, "bit depth {depth}");
        assert_eq!(loaded.channels, 2, "bit depth {depth}");
    }
}

#[test]
fn normalize_scales_to_headroom_peak() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("normalized.wav");

    let audio = AudioData {
        samples: vec![0.1, -0.2, 0.4, -0.1],
        sample_rate: 8000,
        channels: 1,
    };
    write_audio(
        &path,
        &audio,
        &WriteOptions {
            bit_depth: 16,
            normalize: true,
        },
    )
    .unwrap();

    let loaded = read_audio(&path).unwrap();
    let peak = loaded.samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    assert!((peak - 0.95).abs() < 1e-2, "peak was {peak}");
}

#[test]
fn mono_downmix_averages_channels() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("downmix.wav");

    // L and R cancel exactly
    let frames = 500;
    let mut samples = Vec::with_capacity(frames * 2);
    for _ in 0..frames {
        samples.push(0.5);
        samples.push(-0.5);
    }
    let audio = AudioData {
        samples,
        sample_rate: 22050,
        channels: 2,
    };
    write_audio(&path, &audio, &WriteOptions::default()).unwrap();

    let loaded = read_audio_with(
        &path,
        &LoadOptions {
            mono: true,
            ..LoadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(loaded.channels, 1);
    assert_eq!(loaded.samples.len(), frames);
    for &s in &loaded.samples {
        assert!(s.abs() < 1e-3, "expected cancellation, got {s}");
    }
}

#[test]
fn offset_and_duration_trim_frames() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("trim.wav");

    let audio = tone(100.0, 8000, 8000, 1);
    write_audio(&path, &audio, &WriteOptions::default()).unwrap();

    let loaded = read_audio_with(
        &path,
        &LoadOptions {
            offset: 0.25,
            duration: Some(0.5),
            ..LoadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(loaded.samples.len(), 4000);
}

#[test]
fn resample_on_load_halves_frames() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("resample.wav");

    let audio = tone(440.0, 44100, 1000, 1);
    write_audio(&path, &audio, &WriteOptions::default()).unwrap();

    let loaded = read_audio_with(
        &path,
        &LoadOptions {
            sample_rate: Some(22050),
            ..LoadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(loaded.sample_rate, 22050);
    assert_eq!(loaded.samples.len(), 500);
}

#[test]
fn info_reports_stream_parameters() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("info.wav");

    let audio = tone(220.0, 22050, 1000, 2);
    write_audio(&path, &audio, &WriteOptions::default()).unwrap();

    let info = audio_info(&path).unwrap();
    assert_eq!(info.sample_rate, 22050);
    assert_eq!(info.channels, 2);
    assert_eq!(info.frames, Some(1000));
    assert!((info.duration - 1000.0 / 22050.0).abs() < 1e-6);
}

#[test]
fn decode_failure_on_garbage_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("garbage.wav");
    std::fs::write(&path, b"this is not a wav file at all").unwrap();

    let err = read_audio(&path).unwrap_err();
    assert!(matches!(err, UnmixError::Decode { .. }));
}
