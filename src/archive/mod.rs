//! Read-only views over the bundle that carries the native libraries.
//!
//! Resources are addressed by `/`-rooted paths (`/natives/libfoo.so`); each
//! implementation maps them onto its own entry names.

mod directory;
mod tar_gz;
mod zip;

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

pub use directory::DirectoryArchive;
pub use tar_gz::TarGzArchive;
pub use zip::ZipArchiveBundle;

/// Source of embedded resources.
pub trait ResourceArchive: Send + Sync {
    /// Whether a resource exists at `path`.
    fn contains(&self, path: &str) -> bool;

    /// Open the resource at `path` as a byte stream, `None` if it is absent.
    fn open(&self, path: &str) -> Result<Option<Box<dyn Read + Send + '_>>>;
}

/// Archive entry name for a resource path: the path without leading `/`.
pub(crate) fn entry_name(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Open the bundle at `path`, choosing the format from the path itself.
///
/// Directories are read in place; `.zip` and `.tar.gz`/`.tgz` files are
/// indexed in memory.
pub fn open_archive(path: &Path) -> Result<Box<dyn ResourceArchive>> {
    if path.is_dir() {
        return Ok(Box::new(DirectoryArchive::new(path)));
    }

    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") || name.ends_with(".jar") {
        return Ok(Box::new(ZipArchiveBundle::open(path)?));
    }
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        return Ok(Box::new(TarGzArchive::open(path)?));
    }

    Err(anyhow!("Unsupported archive format: {}", path.display()))
}

/// Resources held in memory, keyed by entry name.
///
/// Useful for libraries embedded with `include_bytes!`.
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. `path` may be given with or without its leading `/`.
    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.entries
            .insert(entry_name(path).to_string(), bytes.into());
    }

    pub fn with(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceArchive for MemoryArchive {
    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(entry_name(path))
    }

    fn open(&self, path: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        Ok(self
            .entries
            .get(entry_name(path))
            .map(|bytes| Box::new(Cursor::new(bytes.as_slice())) as Box<dyn Read + Send + '_>))
    }
}
