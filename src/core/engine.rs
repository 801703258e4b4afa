//! ONNX Runtime wrapper around the separation model.
//!
//! The model is treated as an opaque primitive: one waveform window in,
//! one waveform per stem out, names and shapes supplied by the manifest.

use std::sync::Mutex;

use anyhow::{anyhow, Context};
use ndarray::Array3;
use once_cell::sync::OnceCell;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::{Tensor, Value},
};

use crate::{
    device::Backend,
    error::{Result, UnmixError},
    model::{ModelHandle, ModelManifest},
};

static SESSION: OnceCell<Mutex<Session>> = OnceCell::new();
static MANIFEST: OnceCell<ModelManifest> = OnceCell::new();
static ORT_INIT: OnceCell<()> = OnceCell::new();

pub fn preload(h: &ModelHandle, backend: Backend) -> Result<()> {
    // Pin error type so `?` is unambiguous.
    ORT_INIT.get_or_try_init::<_, UnmixError>(|| {
        ort::init().commit().map_err(UnmixError::from)?;
        Ok(())
    })?;

    let builder = SessionBuilder::new()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?;

    let builder = register_backend(builder, backend)?;

    let session = builder.commit_from_file(&h.local_path)?;

    SESSION.set(Mutex::new(session)).ok();
    MANIFEST.set(h.manifest.clone()).ok();
    Ok(())
}

#[allow(unused_variables, unused_mut)]
fn register_backend(mut builder: SessionBuilder, backend: Backend) -> Result<SessionBuilder> {
    match backend {
        #[cfg(feature = "cuda")]
        Backend::Cuda => {
            use ort::execution_providers::CUDAExecutionProvider;
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])?;
        }
        #[cfg(feature = "coreml")]
        Backend::CoreMl => {
            use ort::execution_providers::CoreMLExecutionProvider;
            builder = builder
                .with_execution_providers([CoreMLExecutionProvider::default().build()])?;
        }
        // CPU needs no provider registration.
        _ => {}
    }
    Ok(builder)
}

pub fn manifest() -> &'static ModelManifest {
    MANIFEST
        .get()
        .expect("engine::preload() must be called once before using the engine")
}

/// Run the model over one window of planar channel data.
///
/// `planar` holds `manifest.channels` slices of exactly `manifest.window`
/// samples each. Returns `[stems, channels, window]`.
pub fn run_window(planar: &[Vec<f32>]) -> Result<Array3<f32>> {
    let mf = manifest();
    let ch = mf.channels as usize;
    let win = mf.window;
    let stems = mf.stems.len();

    if planar.len() != ch {
        return Err(anyhow!("Expected {} channels, got {}", ch, planar.len()).into());
    }
    for c in planar {
        if c.len() != win {
            return Err(anyhow!("Bad window length {} (expected {})", c.len(), win).into());
        }
    }

    // Build input [1, C, W], planar
    let mut flat = Vec::with_capacity(ch * win);
    for c in planar {
        flat.extend_from_slice(c);
    }
    let input_value: Value = Tensor::from_array((vec![1, ch, win], flat))
        .context("input tensor")?
        .into_dyn();

    let mut session = SESSION
        .get()
        .expect("engine::preload first")
        .lock()
        .expect("session poisoned");

    let input_name = session
        .inputs
        .iter()
        .find(|i| i.name == mf.input_name)
        .map(|i| i.name.clone())
        .ok_or_else(|| anyhow!("Model missing input '{}'", mf.input_name))?;

    let outputs = session.run(vec![(input_name, input_value)])?;

    let out: Value = outputs
        .into_iter()
        .find_map(|(name, v)| if name == mf.output_name { Some(v) } else { None })
        .ok_or_else(|| anyhow!("Model did not return '{}' output", mf.output_name))?;

    // Extract [1, S, C, W] and squeeze to [S, C, W]
    let (_shape, data) = out.try_extract_tensor::<f32>()?;
    if data.len() != stems * ch * win {
        return Err(anyhow!(
            "Unexpected output length {} (expected {})",
            data.len(),
            stems * ch * win
        )
        .into());
    }
    let out = Array3::from_shape_vec((stems, ch, win), data.to_vec())
        .map_err(|e| anyhow!("output reshape: {e}"))?;
    Ok(out)
}
