pub mod manager;

pub use manager::{
    ensure_model, set_download_progress_callback, DownloadProgress, ModelHandle, ModelManifest,
};
