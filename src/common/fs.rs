use std::{fs, path::{Path, PathBuf}};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Create the parent directory of an output file.
pub(crate) fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Content-addressed cache location for a remote resource: `<dir>/<sha256(key)>.<ext>`.
pub(crate) fn cache_path(dir: &Path, key: &str, ext: &str) -> PathBuf {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    dir.join(format!("{digest}.{ext}"))
}
