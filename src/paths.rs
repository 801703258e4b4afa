use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{Result, UnmixError};

pub fn models_cache_dir() -> Result<PathBuf> {
    let proj =
        ProjectDirs::from("dev", "Unmix", "unmix").ok_or(UnmixError::CacheDirUnavailable)?;
    let mut p = PathBuf::from(proj.cache_dir());
    p.push("models");
    Ok(p)
}
