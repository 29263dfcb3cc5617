use anyhow::{Context, Result};
use log::debug;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use zip::ZipArchive;
use zip::result::ZipError;

use super::{ResourceArchive, entry_name};

/// A zip (or jar) bundle held in memory.
///
/// The zip crate needs `Read + Seek` and a mutable archive to read an entry,
/// so the bytes are kept in memory behind a mutex and each opened entry is
/// decompressed into its own buffer.
pub struct ZipArchiveBundle {
    archive: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
}

impl ZipArchiveBundle {
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening zip bundle {:?}", path);
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to open archive at {:?}", path))?;
        Self::from_bytes(bytes).with_context(|| format!("Failed to parse ZIP archive {:?}", path))
    }

    /// Bundle from in-memory bytes, e.g. a zip embedded with `include_bytes!`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let archive =
            ZipArchive::new(Cursor::new(bytes.into())).context("Failed to parse ZIP archive")?;
        Ok(Self {
            archive: Mutex::new(archive),
        })
    }

    pub fn len(&self) -> usize {
        self.archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceArchive for ZipArchiveBundle {
    fn contains(&self, path: &str) -> bool {
        let name = entry_name(path);
        if name.is_empty() || name.ends_with('/') {
            return false;
        }
        self.archive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .file_names()
            .any(|n| n == name)
    }

    fn open(&self, path: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
        let name = entry_name(path);
        let mut archive = self.archive.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read ZIP entry {}", name));
            }
        };
        if entry.is_dir() {
            return Ok(None);
        }

        let mut buffer = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to decompress ZIP entry {}", name))?;
        Ok(Some(Box::new(Cursor::new(buffer))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::CompressionMethod;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    fn create_test_zip(files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in files {
            zip.start_file(*name, options)?;
            zip.write_all(content)?;
        }
        zip.add_directory("natives/empty/", options)?;

        Ok(zip.finish()?.into_inner())
    }

    #[test]
    fn test_zip_bundle_from_bytes() -> Result<()> {
        let bytes = create_test_zip(&[
            ("natives/libfoo.so", b"generic"),
            ("natives/libfoo.Darwin.aarch64.so", b"mac"),
        ])?;
        let bundle = ZipArchiveBundle::from_bytes(bytes)?;

        assert!(bundle.contains("/natives/libfoo.so"));
        assert!(bundle.contains("/natives/libfoo.Darwin.aarch64.so"));
        assert!(!bundle.contains("/natives/libbar.so"));
        assert!(!bundle.contains("/natives/empty/"));

        let mut content = Vec::new();
        bundle
            .open("/natives/libfoo.Darwin.aarch64.so")?
            .expect("entry present")
            .read_to_end(&mut content)?;
        assert_eq!(content, b"mac");

        assert!(bundle.open("/natives/libbar.so")?.is_none());
        Ok(())
    }

    #[test]
    fn test_zip_bundle_open_from_disk() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bundle.zip");
        std::fs::write(&path, create_test_zip(&[("libfoo.so", b"payload")])?)?;

        let bundle = ZipArchiveBundle::open(&path)?;
        assert!(!bundle.is_empty());
        assert!(bundle.contains("/libfoo.so"));
        Ok(())
    }

    #[test]
    fn test_zip_bundle_rejects_garbage() {
        assert!(ZipArchiveBundle::from_bytes(b"not a zip".to_vec()).is_err());
    }
}
