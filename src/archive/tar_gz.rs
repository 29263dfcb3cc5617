use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::debug;
use std::io::Read;
use std::path::{Component, Path};
use tar::Archive;

use super::{MemoryArchive, ResourceArchive};

/// A `.tar.gz` bundle, indexed into memory when opened.
pub struct TarGzArchive {
    entries: MemoryArchive,
}

impl TarGzArchive {
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Indexing tar.gz bundle {:?}", path);
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open archive at {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("Failed to read archive {:?}", path))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut archive = Archive::new(GzDecoder::new(reader));
        let mut entries = MemoryArchive::new();

        for entry in archive.entries().context("Failed to read tar entries")? {
            let mut entry = entry.context("Failed to read tar entry")?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let name = {
                let path = entry.path().context("Invalid tar entry path")?;
                if path.components().any(|c| matches!(c, Component::ParentDir)) {
                    debug!("Skipping entry with invalid path {:?}", path);
                    continue;
                }
                path.components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            };

            let mut content = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut content)
                .with_context(|| format!("Failed to read tar entry {}", name))?;
            entries.insert(&name, content);
        }

        debug!("Indexed {} tar entries", entries.len());
        Ok(Self { entries })
    }
}

impl ResourceArchive for TarGzArchive {
    fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    fn open(&self, path: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        self.entries.open(path)
    }
}
