//! # unmix
//!
//! Audio source separation: split a stereo mix into stems (vocals, drums,
//! bass, other) with a pretrained model, and split a drum stem into kick,
//! snare, hi-hat and tom components with a fixed bandpass filter bank.

pub mod audio;
pub mod core;
pub mod device;
pub mod error;
pub mod model;
pub mod paths;
pub mod registry;
pub mod types;

pub use crate::{
    audio::{audio_info, read_audio, read_audio_with, write_audio, LoadOptions, WriteOptions},
    core::bands::{separate_drums, split_drum_bands, DrumBand, DRUM_BANDS},
    core::separator::separate_stems,
    device::{select_backend, Backend},
    error::{Result, UnmixError},
    model::{set_download_progress_callback, DownloadProgress},
    types::{AudioData, AudioInfo, SplitOptions, SplitResult},
};
