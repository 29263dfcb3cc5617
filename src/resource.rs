//! Logical paths of resources stored in an archive.

use std::fmt;

use crate::error::LoadError;

/// Shortest prefix accepted for an extracted file name.
pub const MIN_PREFIX_LEN: usize = 3;

/// A validated `/`-rooted resource path such as `/natives/libvw_jni.so`.
///
/// The file name is split at its first dot: `libvw.x86_64.so` has prefix
/// `libvw` and suffix `.x86_64.so`. The prefix names the extracted temp file
/// and is what stale-file sweeps match on.
///
/// Trailing separators only affect the file name: `/natives/libfoo.so/`
/// names `libfoo.so`, but [`as_str`](Self::as_str) keeps the path exactly as
/// requested, so archive lookups see the separator and find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    path: String,
    file_start: usize,
    file_end: usize,
}

impl ResourcePath {
    pub fn parse(path: &str) -> Result<Self, LoadError> {
        if !path.starts_with('/') {
            return Err(LoadError::invalid_path(path, "path must start with '/'"));
        }

        // Trailing separators are ignored: "/natives/libfoo/" names "libfoo".
        let trimmed = path.trim_end_matches('/');
        let file_start = trimmed.rfind('/').map(|i| i + 1).unwrap_or(0);
        if file_start >= trimmed.len() {
            return Err(LoadError::invalid_path(path, "path has no file name"));
        }

        let resource = Self {
            path: path.to_string(),
            file_start,
            file_end: trimmed.len(),
        };

        if resource.prefix().chars().count() < MIN_PREFIX_LEN {
            return Err(LoadError::invalid_path(
                path,
                format!(
                    "file name prefix must be at least {} characters long",
                    MIN_PREFIX_LEN
                ),
            ));
        }

        Ok(resource)
    }

    /// The path as requested; this is the archive lookup key.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Name of the entry inside the archive (the path without its leading `/`).
    pub fn entry_name(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    pub fn file_name(&self) -> &str {
        &self.path[self.file_start..self.file_end]
    }

    /// File name up to (not including) the first dot.
    pub fn prefix(&self) -> &str {
        let name = self.file_name();
        name.split_once('.').map_or(name, |(prefix, _)| prefix)
    }

    /// First dot of the file name and everything after it, if any.
    pub fn suffix(&self) -> Option<&str> {
        let name = self.file_name();
        name.find('.').map(|i| &name[i..])
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
