#[cfg(feature = "download")]
pub(crate) mod download;
pub(crate) mod fs;
