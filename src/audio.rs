use std::{fs, fs::File, path::Path};

use anyhow::{anyhow, Context};
use hound::WavWriter;
use log::debug;
use rubato::{
    InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction,
};
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::{
    error::{Result, UnmixError},
    types::{AudioData, AudioInfo},
};

/// Bit depths accepted by [`write_audio`].
pub const VALID_BIT_DEPTHS: [u16; 4] = [8, 16, 24, 32];

/// Options for [`read_audio_with`].
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Target sample rate; `None` keeps the file's native rate.
    pub sample_rate: Option<u32>,
    /// Downmix to a single channel by averaging.
    pub mono: bool,
    /// Skip this many seconds from the start.
    pub offset: f64,
    /// Keep at most this many seconds.
    pub duration: Option<f64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sample_rate: None,
            mono: false,
            offset: 0.0,
            duration: None,
        }
    }
}

/// Options for [`write_audio`].
#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub bit_depth: u16,
    /// Scale to 0.95 peak before quantizing.
    pub normalize: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            bit_depth: 16,
            normalize: false,
        }
    }
}

/// Decode an entire audio file at its native rate and channel layout.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    read_audio_with(path, &LoadOptions::default())
}

/// Decode an audio file, then apply offset/duration trimming, mono downmix
/// and resampling as requested.
pub fn read_audio_with<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    if !path.exists() {
        return Err(UnmixError::NotFound { path: path.into() });
    }
    if opts.offset < 0.0 {
        return Err(UnmixError::InvalidParameter(format!(
            "negative offset: {}",
            opts.offset
        )));
    }
    if let Some(d) = opts.duration {
        if d <= 0.0 {
            return Err(UnmixError::InvalidParameter(format!(
                "non-positive duration: {d}"
            )));
        }
    }

    let mut audio = decode_file(path)?;

    let trimmed = trim_frames(&audio.samples, audio.channels, audio.sample_rate, opts);
    audio.samples = trimmed;

    if opts.mono && audio.channels > 1 {
        audio.samples = downmix_to_mono(&audio.samples, audio.channels);
        audio.channels = 1;
    }

    if let Some(target) = opts.sample_rate {
        if target == 0 {
            return Err(UnmixError::InvalidParameter("sample rate 0".into()));
        }
        if target != audio.sample_rate {
            audio.samples =
                resample(&audio.samples, audio.channels, audio.sample_rate, target)?;
            audio.sample_rate = target;
        }
    }

    debug!(
        "read {:?}: rate={} channels={} frames={}",
        path,
        audio.sample_rate,
        audio.channels,
        audio.frames()
    );

    Ok(audio)
}

fn decode_file(path: &Path) -> Result<AudioData> {
    let file: File = File::open(path)
        .with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| UnmixError::Decode {
            path: path.into(),
            reason: e.to_string(),
        })?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| UnmixError::Decode {
            path: path.into(),
            reason: "no default track".into(),
        })?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| UnmixError::Decode {
            path: path.into(),
            reason: e.to_string(),
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = 0;
    let mut channels: u16 = 0;

    while let Ok(packet) = format.next_packet() {
        let decoded = decoder.decode(&packet).map_err(|e| UnmixError::Decode {
            path: path.into(),
            reason: e.to_string(),
        })?;
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    if sample_rate == 0 || channels == 0 {
        return Err(UnmixError::Decode {
            path: path.into(),
            reason: "no audio packets decoded".into(),
        });
    }

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

fn trim_frames(samples: &[f32], channels: u16, rate: u32, opts: &LoadOptions) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    let total = samples.len() / ch;
    let skip = ((opts.offset * rate as f64).round() as usize).min(total);
    let take = opts
        .duration
        .map(|d| ((d * rate as f64).round() as usize).min(total - skip))
        .unwrap_or(total - skip);
    samples[skip * ch..(skip + take) * ch].to_vec()
}

pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|chunk| chunk.iter().copied().sum::<f32>() / channels as f32)
        .collect()
}

/// Sinc resample all channels from `from` to `to` Hz.
fn resample(samples: &[f32], channels: u16, from: u32, to: u32) -> Result<Vec<f32>> {
    let ch = channels.max(1) as usize;
    let in_frames = samples.len() / ch;
    if in_frames == 0 {
        return Ok(Vec::new());
    }

    let ratio = to as f64 / from as f64;
    let out_frames = (in_frames as f64 * ratio).round() as usize;

    let params = InterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: InterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    const CHUNK: usize = 1024;
    let mut resampler = SincFixedIn::<f32>::new(ratio, params, CHUNK, ch);

    // Planar copy, zero-padded to a whole number of chunks.
    let padded = in_frames.div_ceil(CHUNK) * CHUNK;
    let mut planar: Vec<Vec<f32>> = vec![vec![0.0; padded]; ch];
    for (i, frame) in samples.chunks(ch).enumerate() {
        for (c, &s) in frame.iter().enumerate() {
            planar[c][i] = s;
        }
    }

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(out_frames); ch];
    for start in (0..padded).step_by(CHUNK) {
        let chunk: Vec<Vec<f32>> = planar
            .iter()
            .map(|c| c[start..start + CHUNK].to_vec())
            .collect();
        let produced = resampler
            .process(&chunk)
            .map_err(|e| anyhow!("resample failed: {e}"))?;
        for (c, data) in produced.into_iter().enumerate() {
            out[c].extend_from_slice(&data);
        }
    }

    for c in out.iter_mut() {
        c.truncate(out_frames);
        c.resize(out_frames, 0.0);
    }

    let mut interleaved = Vec::with_capacity(out_frames * ch);
    for i in 0..out_frames {
        for c in 0..ch {
            interleaved.push(out[c][i]);
        }
    }
    Ok(interleaved)
}

/// Write interleaved audio as PCM WAV.
///
/// The bit depth is validated before any file is created, so a rejected
/// depth leaves nothing on disk.
pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioData, opts: &WriteOptions) -> Result<()> {
    let path: &Path = path.as_ref();

    if !VALID_BIT_DEPTHS.contains(&opts.bit_depth) {
        return Err(UnmixError::InvalidParameter(format!(
            "invalid bit depth: {} (must be one of {:?})",
            opts.bit_depth, VALID_BIT_DEPTHS
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut scale = 1.0f32;
    if opts.normalize {
        let peak = audio
            .samples
            .iter()
            .fold(0.0f32, |m, &s| m.max(s.abs()));
        if peak > 0.0 {
            // 0.95 leaves headroom against quantization overshoot
            scale = 0.95 / peak;
        }
    }

    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: opts.bit_depth,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    match opts.bit_depth {
        8 => {
            for &sample in &audio.samples {
                let s = (sample * scale * i8::MAX as f32)
                    .clamp(i8::MIN as f32, i8::MAX as f32) as i8;
                writer.write_sample(s)?;
            }
        }
        16 => {
            for &sample in &audio.samples {
                let s = (sample * scale * i16::MAX as f32)
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                writer.write_sample(s)?;
            }
        }
        24 => {
            const MAX24: f32 = 8_388_607.0;
            for &sample in &audio.samples {
                let s = (sample * scale * MAX24).clamp(-MAX24 - 1.0, MAX24) as i32;
                writer.write_sample(s)?;
            }
        }
        _ => {
            for &sample in &audio.samples {
                let s = (sample as f64 * scale as f64 * i32::MAX as f64)
                    .clamp(i32::MIN as f64, i32::MAX as f64) as i32;
                writer.write_sample(s)?;
            }
        }
    }

    writer.finalize()?;
    debug!("wrote {:?}: {} frames", path, audio.frames());
    Ok(())
}

/// Probe stream metadata without decoding the whole file.
pub fn audio_info<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let path: &Path = path.as_ref();

    if !path.exists() {
        return Err(UnmixError::NotFound { path: path.into() });
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open audio file: {:?}", path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if let Some(ext) = &ext {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| UnmixError::Decode {
            path: path.into(),
            reason: e.to_string(),
        })?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| UnmixError::Decode {
            path: path.into(),
            reason: "no default track".into(),
        })?;
    let params = &track.codec_params;

    let sample_rate = params.sample_rate.ok_or_else(|| UnmixError::Decode {
        path: path.into(),
        reason: "unknown sample rate".into(),
    })?;
    let channels = params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);
    let frames = params.n_frames;
    let duration = frames
        .map(|f| f as f64 / sample_rate as f64)
        .unwrap_or(0.0);

    Ok(AudioInfo {
        duration,
        sample_rate,
        channels,
        frames,
        format: ext.unwrap_or_else(|| "unknown".into()),
    })
}
