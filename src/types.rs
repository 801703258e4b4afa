use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Decoded audio held as interleaved f32 samples.
///
/// All channels share one length: `samples.len()` is always a multiple of
/// `channels`, and every operation in this crate preserves that.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Stream-level metadata, obtained without decoding the full file.
#[derive(Clone, Debug)]
pub struct AudioInfo {
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: Option<u64>,
    pub format: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SplitOptions {
    pub output_dir: String,
    pub model_name: String,
    pub manifest_url_override: Option<String>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            output_dir: "output_stems".into(),
            model_name: "htdemucs".into(),
            manifest_url_override: None,
        }
    }
}

/// One written stem file per model-reported source name.
#[derive(Clone, Debug)]
pub struct SplitResult {
    pub stems: Vec<(String, PathBuf)>,
    pub sample_rate: u32,
}

impl SplitResult {
    pub fn get(&self, name: &str) -> Option<&PathBuf> {
        self.stems
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, p)| p)
    }
}
