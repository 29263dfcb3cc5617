//! Stale-file collection.
//!
//! Every extracted library `<name>` is paired with an empty `<name>.lock`
//! marker while its process is alive. A library without a marker belongs to
//! a process that crashed before creating it, or whose exit cleanup removed
//! the marker but not the library. Either way it can be reclaimed.
//!
//! The check is advisory: nothing prevents another process from writing its
//! marker between our existence check and the removal. That window is
//! accepted.

use log::{debug, info, warn};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const LOCK_SUFFIX: &str = ".lock";

/// Marker path for an extracted library: `<path>.lock`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one sweep. Failures are informational only.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<SweepFailure>,
}

/// Remove files in `directory` starting with `prefix` that have no lock file.
///
/// Never fails: an unreadable directory yields an empty report and each
/// failed removal is logged and recorded.
pub fn sweep<R: Runtime>(runtime: &R, prefix: &str, directory: &Path) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match runtime.read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping stale library sweep of {:?}: {:#}", directory, e);
            return report;
        }
    };

    for entry in entries {
        let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !name.starts_with(prefix) || name.ends_with(LOCK_SUFFIX) {
            continue;
        }
        if runtime.exists(&lock_path_for(&entry)) {
            continue;
        }

        match runtime.remove_file(&entry) {
            Ok(()) => {
                debug!("Removed stale library {:?}", entry);
                report.removed.push(entry);
            }
            Err(e) => {
                warn!("Failed to remove stale library {:?}: {:#}", entry, e);
                report.failed.push(SweepFailure {
                    path: entry,
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    if !report.removed.is_empty() {
        info!(
            "Removed {} stale '{}' libraries from {:?}",
            report.removed.len(),
            prefix,
            directory
        );
    }
    report
}
