use std::{fs::File, io::Write, path::{Path, PathBuf}, time::Duration};

use anyhow::{Context, Result};
use reqwest::{blocking::Client, redirect::Policy};
use tempfile::NamedTempFile;

/// Write-then-rename wrapper, so a failed download never leaves a partial file at the target.
struct PendingWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl PendingWrite {
    fn open(target: &Path) -> Result<Self> {
        let parent = target.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
        let tmp = NamedTempFile::new_in(parent).context("create temp file")?;
        Ok(Self { target: target.to_path_buf(), tmp })
    }

    fn finalize(self) -> Result<()> {
        self.tmp.as_file().sync_all().ok(); // best-effort fsync file
        self.tmp.persist(&self.target)
            .with_context(|| format!("rename to {}", self.target.display()))?;
        if let Some(dir) = self.target.parent() {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.tmp.write(buf) }
    fn flush(&mut self) -> std::io::Result<()> { self.tmp.flush() }
}

/// Blocking HTTP client shared by raster and tile downloads.
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("zonalmap/", env!("CARGO_PKG_VERSION")))
        .redirect(Policy::limited(10))
        .timeout(timeout)
        .build()
        .context("build HTTP client")
}

/// Download `url` to `out_path` unless it is already there. Returns true when a request was made.
pub(crate) fn download_once(client: &Client, url: &str, out_path: &Path) -> Result<bool> {
    if out_path.exists() {
        return Ok(false);
    }

    let mut sink = PendingWrite::open(out_path)?;
    let mut resp = client.get(url).send()
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} returned error status"))?;

    std::io::copy(&mut resp, &mut sink).with_context(|| format!("write {}", out_path.display()))?;
    sink.finalize()?;
    Ok(true)
}
