//! Stem separation: normalize, run the model windowed over the mix,
//! denormalize, write one file per model-reported stem.

use std::{fs, path::Path, path::PathBuf};

use anyhow::anyhow;
use log::info;

use crate::{
    audio::{read_audio_with, write_audio, LoadOptions, WriteOptions},
    core::{dsp::to_planar_stereo, engine},
    device::select_backend,
    error::Result,
    model::ensure_model,
    types::{AudioData, SplitOptions, SplitResult},
};

/// Reference statistics used for the symmetric normalize/denormalize pair.
struct RefStats {
    mean: f32,
    std: f32,
}

/// Mean and standard deviation of the across-channel average signal.
///
/// The same statistics must scale the model output back up, otherwise the
/// stems come out at the wrong loudness.
fn reference_stats(planar: &[[f32; 2]]) -> RefStats {
    let n = planar.len().max(1) as f64;
    let mut sum = 0.0f64;
    for s in planar {
        sum += (s[0] as f64 + s[1] as f64) / 2.0;
    }
    let mean = sum / n;

    let mut var = 0.0f64;
    for s in planar {
        let r = (s[0] as f64 + s[1] as f64) / 2.0 - mean;
        var += r * r;
    }
    let std = (var / n).sqrt();

    RefStats {
        mean: mean as f32,
        // silence would otherwise divide by zero
        std: if std < f64::EPSILON { 1.0 } else { std } as f32,
    }
}

/// Separate a mix into stems and write one WAV per stem.
///
/// All stems are accumulated in memory and written only after inference has
/// fully succeeded, so a model failure leaves no partial output.
pub fn separate_stems(input_path: &str, opts: SplitOptions) -> Result<SplitResult> {
    let input = Path::new(input_path);
    if !input.exists() {
        return Err(crate::error::UnmixError::NotFound { path: input.into() });
    }

    let handle = ensure_model(&opts.model_name, opts.manifest_url_override.as_deref())?;
    let backend = select_backend();
    info!("running model {} on {}", handle.manifest.name, backend.name());
    engine::preload(&handle, backend)?;

    let mf = engine::manifest();

    if mf.channels != 2 {
        return Err(anyhow!("Currently expecting stereo models").into());
    }

    let audio = read_audio_with(
        input,
        &LoadOptions {
            sample_rate: Some(mf.sample_rate),
            ..LoadOptions::default()
        },
    )?;
    let stereo = to_planar_stereo(&audio.samples, audio.channels);
    let n = stereo.len();

    if n == 0 {
        return Err(anyhow!("Empty audio").into());
    }

    let win = mf.window;
    let hop = mf.hop;
    if !(win > 0 && hop > 0 && hop <= win) {
        return Err(anyhow!("Bad win/hop in manifest").into());
    }

    let stats = reference_stats(&stereo);

    let stems_count = mf.stems.len();
    let mut acc: Vec<Vec<[f32; 2]>> = vec![vec![[0f32; 2]; n]; stems_count];

    let mut left = vec![0f32; win];
    let mut right = vec![0f32; win];

    let mut pos = 0usize;
    while pos < n {
        // Window out the normalized mix, zero-padded past the end
        for i in 0..win {
            let idx = pos + i;
            if idx < n {
                left[i] = (stereo[idx][0] - stats.mean) / stats.std;
                right[i] = (stereo[idx][1] - stats.mean) / stats.std;
            } else {
                left[i] = 0.0;
                right[i] = 0.0;
            }
        }

        let out = engine::run_window(&[left.clone(), right.clone()])?;

        let copy_len = win.min(n - pos);
        for st in 0..stems_count {
            for i in 0..copy_len {
                acc[st][pos + i][0] = out[(st, 0, i)];
                acc[st][pos + i][1] = out[(st, 1, i)];
            }
        }

        if pos + hop >= n {
            break;
        }
        pos += hop;
    }

    // Undo the input normalization with the same reference statistics
    for stem in acc.iter_mut() {
        for s in stem.iter_mut() {
            s[0] = s[0] * stats.std + stats.mean;
            s[1] = s[1] * stats.std + stats.mean;
        }
    }

    let file_stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let out_dir = PathBuf::from(&opts.output_dir);
    fs::create_dir_all(&out_dir)?;

    let mut stems = Vec::with_capacity(stems_count);
    for (st, name) in mf.stems.iter().enumerate() {
        let mut inter = Vec::with_capacity(n * 2);
        for s in &acc[st] {
            inter.push(s[0]);
            inter.push(s[1]);
        }
        let data = AudioData {
            samples: inter,
            sample_rate: mf.sample_rate,
            channels: 2,
        };
        let path = out_dir.join(format!("{}_{}.wav", file_stem, name.to_lowercase()));
        write_audio(&path, &data, &WriteOptions::default())?;
        info!("wrote {:?}", path);
        stems.push((name.to_lowercase(), path));
    }

    Ok(SplitResult {
        stems,
        sample_rate: mf.sample_rate,
    })
}
