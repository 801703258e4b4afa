//! Compute backend selection.
//!
//! Which backend executes the model affects speed only, never output
//! semantics, so this is a pure function of the build features and one
//! environment override rather than cached global state.

use std::env;

use log::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Cuda,
    CoreMl,
    Cpu,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cuda => "cuda",
            Backend::CoreMl => "coreml",
            Backend::Cpu => "cpu",
        }
    }
}

/// Pick the best available backend.
///
/// `UNMIX_DEVICE=cuda|coreml|cpu` forces a choice, but only among providers
/// actually compiled in — forcing an absent provider falls back to CPU with
/// a warning instead of reporting an accelerator that never runs.
/// Without the override, the first compiled-in accelerated provider wins.
pub fn select_backend() -> Backend {
    if let Ok(forced) = env::var("UNMIX_DEVICE") {
        match forced.to_ascii_lowercase().as_str() {
            "cuda" => {
                if cfg!(feature = "cuda") {
                    return Backend::Cuda;
                }
                warn!("UNMIX_DEVICE=cuda but the cuda feature is not compiled in, using cpu");
                return Backend::Cpu;
            }
            "coreml" => {
                if cfg!(all(feature = "coreml", target_os = "macos")) {
                    return Backend::CoreMl;
                }
                warn!("UNMIX_DEVICE=coreml but CoreML is not available in this build, using cpu");
                return Backend::Cpu;
            }
            "cpu" => return Backend::Cpu,
            other => warn!("unknown UNMIX_DEVICE {:?}, autodetecting", other),
        }
    }

    if cfg!(feature = "cuda") {
        Backend::Cuda
    } else if cfg!(all(feature = "coreml", target_os = "macos")) {
        Backend::CoreMl
    } else {
        Backend::Cpu
    }
}
