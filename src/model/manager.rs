//! Model distribution: resolve a manifest, keep a checksum-verified copy of
//! the model artifact in the local cache, and report download progress per
//! artifact.

use std::{
    fs,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    time::Duration,
};

use log::info;
use reqwest::blocking::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{
    error::{Result, UnmixError},
    paths::models_cache_dir,
    registry::resolve_manifest_url,
};

fn default_input_name() -> String {
    "mix".into()
}

fn default_output_name() -> String {
    "stems".into()
}

/// Everything the engine needs to know about a model, fetched from the
/// registry-resolved manifest URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    pub backend: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub window: usize,
    pub hop: usize,
    pub stems: Vec<String>,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    pub url: String,
    pub sha256: String,
    pub filesize: u64,
}

#[derive(Debug)]
pub struct ModelHandle {
    pub manifest: ModelManifest,
    pub local_path: PathBuf,
}

/// Download progress for one model artifact. `total` is unknown when the
/// server sends no length and the manifest declares none.
#[derive(Clone, Copy, Debug)]
pub struct DownloadProgress {
    pub received: u64,
    pub total: Option<u64>,
}

type ProgressCallback = Box<dyn Fn(&str, DownloadProgress) + Send + 'static>;

static PROGRESS_CB: OnceLock<Mutex<Option<ProgressCallback>>> = OnceLock::new();

/// Install a process-wide observer for model downloads. The callback gets
/// the model name and the bytes received so far.
pub fn set_download_progress_callback(cb: impl Fn(&str, DownloadProgress) + Send + 'static) {
    let _ = PROGRESS_CB.set(Mutex::new(Some(Box::new(cb))));
}

fn report_progress(model: &str, received: u64, total: Option<u64>) {
    if let Some(m) = PROGRESS_CB.get() {
        if let Ok(g) = m.lock() {
            if let Some(cb) = &*g {
                cb(model, DownloadProgress { received, total });
            }
        }
    }
}

fn http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60 * 60))
        .build()
        .expect("reqwest client build failed")
}

/// Resolve, download if needed and checksum-verify a model, returning a
/// handle to the cached artifact.
pub fn ensure_model(model_name: &str, manifest_url_override: Option<&str>) -> Result<ModelHandle> {
    let manifest_url = if let Some(url) = manifest_url_override {
        url.to_string()
    } else {
        resolve_manifest_url(model_name)?
    };

    let client = http_client();
    let manifest: ModelManifest = client
        .get(&manifest_url)
        .send()?
        .error_for_status()?
        .json()?;

    if manifest.stems.is_empty() {
        return Err(UnmixError::Registry(format!(
            "Manifest for `{}` declares no stems",
            manifest.name
        )));
    }

    let cache_dir = models_cache_dir()?;
    fs::create_dir_all(&cache_dir)?;
    let file_name = format!("{}-{}.onnx", manifest.name, &manifest.sha256[..8]);
    let local_path = cache_dir.join(file_name);

    if !artifact_is_valid(&local_path, &manifest)? {
        info!("downloading model {} v{}", manifest.name, manifest.version);
        fetch_artifact(&client, &manifest, &local_path)?;
        if !artifact_is_valid(&local_path, &manifest)? {
            return Err(UnmixError::Checksum {
                path: local_path.display().to_string(),
            });
        }
    }

    Ok(ModelHandle {
        manifest,
        local_path,
    })
}

/// A cached artifact is valid when it exists, matches the manifest size
/// (when one is declared) and hashes to the manifest checksum.
fn artifact_is_valid(path: &Path, manifest: &ModelManifest) -> Result<bool> {
    let meta = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Ok(false),
    };
    if manifest.filesize > 0 && meta.len() != manifest.filesize {
        return Ok(false);
    }

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hex::encode(hasher.finalize());
    Ok(digest.eq_ignore_ascii_case(&manifest.sha256))
}

/// Stream the manifest's artifact into the cache, reporting progress under
/// the model's name. The transfer goes through a `.part` sibling and is
/// renamed only once complete, so an interrupted download never
/// masquerades as a cached model.
fn fetch_artifact(client: &Client, manifest: &ModelManifest, dest: &Path) -> Result<()> {
    let staging = dest.with_extension("part");

    let mut resp = client.get(&manifest.url).send()?.error_for_status()?;

    let total = resp
        .content_length()
        .filter(|&t| t > 0)
        .or((manifest.filesize > 0).then_some(manifest.filesize));

    report_progress(&manifest.name, 0, total);

    let mut out = File::create(&staging)?;
    let mut received: u64 = 0;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = resp.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        received += n as u64;
        report_progress(&manifest.name, received, total);
    }
    out.flush()?;
    drop(out);

    if dest.exists() {
        fs::remove_file(dest).ok();
    }
    fs::rename(&staging, dest)?;

    report_progress(&manifest.name, received, total.or(Some(received)));

    Ok(())
}
