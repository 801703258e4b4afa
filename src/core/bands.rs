//! Drum component separation: partition a drum stem into kick, snare,
//! hi-hat and tom bands with fixed bandpass filters.
//!
//! The bands deliberately overlap (snare and toms share 150-500 Hz); this
//! is a frequency-domain approximation of the kit, not a disjoint
//! partition.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::info;
use rayon::prelude::*;

use crate::{
    audio::{read_audio_with, write_audio, LoadOptions, WriteOptions},
    core::dsp::{design_bandpass, filter_channels},
    error::Result,
    types::AudioData,
};

/// Drum components produced by [`split_drum_bands`], in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrumBand {
    Kick,
    Snare,
    Hihat,
    Toms,
}

impl DrumBand {
    pub fn label(self) -> &'static str {
        match self {
            DrumBand::Kick => "kick",
            DrumBand::Snare => "snare",
            DrumBand::Hihat => "hihat",
            DrumBand::Toms => "toms",
        }
    }
}

/// Band table: label, low edge, high edge (`None` = Nyquist).
pub static DRUM_BANDS: [(DrumBand, f64, Option<f64>); 4] = [
    (DrumBand::Kick, 20.0, Some(200.0)),    // kick fundamental
    (DrumBand::Snare, 150.0, Some(4000.0)), // snare body + brightness
    (DrumBand::Hihat, 5000.0, None),        // cymbal/hat energy up to Nyquist
    (DrumBand::Toms, 80.0, Some(500.0)),    // tom fundamentals
];

/// Sample rate drum stems are loaded at before splitting.
pub const DRUM_SAMPLE_RATE: u32 = 44_100;

/// Filter one drum-stem waveform into the four fixed component bands.
///
/// Pure function of (waveform, sample rate); every band sees the full
/// multi-channel input and yields an output of identical shape. Bands are
/// independent, so they run in parallel. Any band failing fails the whole
/// call with no partial result.
pub fn split_drum_bands(audio: &AudioData) -> Result<Vec<(DrumBand, AudioData)>> {
    DRUM_BANDS
        .par_iter()
        .map(|&(band, low, high)| {
            let high_hz = high.unwrap_or(audio.sample_rate as f64 / 2.0);
            let sos = design_bandpass(audio.sample_rate, low, high_hz)?;
            let samples = filter_channels(&sos, &audio.samples, audio.channels);
            Ok((
                band,
                AudioData {
                    samples,
                    sample_rate: audio.sample_rate,
                    channels: audio.channels,
                },
            ))
        })
        .collect()
}

/// Load a drum stem, split it into components and write one WAV per band.
///
/// All four bands are computed before the first file is written, so a
/// filtering failure leaves no partial output on disk. Returns label to
/// written path.
pub fn separate_drums(
    drum_file: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> Result<BTreeMap<DrumBand, PathBuf>> {
    let drum_file = drum_file.as_ref();
    let output_dir = output_dir.as_ref();

    info!("loading drum stem {:?}", drum_file);
    let audio = read_audio_with(
        drum_file,
        &LoadOptions {
            sample_rate: Some(DRUM_SAMPLE_RATE),
            ..LoadOptions::default()
        },
    )?;

    let bands = split_drum_bands(&audio)?;

    let file_stem = drum_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let mut files = BTreeMap::new();
    for (band, data) in &bands {
        let path = output_dir.join(format!("{}_{}.wav", file_stem, band.label()));
        write_audio(&path, data, &WriteOptions::default())?;
        info!("wrote {:?}", path);
        files.insert(*band, path);
    }

    Ok(files)
}
