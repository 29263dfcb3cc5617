use anyhow::{Context, Result};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use super::{ResourceArchive, entry_name};

/// An unpacked bundle: resources are plain files under `root`.
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a resource path below the root, refusing anything that would
    /// escape it. Names ending in `/` never denote a resource.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        if path.ends_with('/') {
            return None;
        }
        let relative = Path::new(entry_name(path));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ResourceArchive for DirectoryArchive {
    fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|p| p.is_file())
    }

    fn open(&self, path: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        let Some(file_path) = self.resolve(path) else {
            return Ok(None);
        };
        if file_path.is_dir() {
            return Ok(None);
        }
        match File::open(&file_path) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to open {:?}", file_path)),
        }
    }
}
