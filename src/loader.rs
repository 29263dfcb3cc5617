//! Native library loading.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Loads a native library file into the running process.
#[cfg_attr(test, mockall::automock)]
pub trait NativeLoader: Send + Sync {
    /// Load the library at `path`. Once loaded it stays loaded until exit.
    fn load(&self, path: &Path) -> Result<()>;
}

struct LoadedLibrary {
    path: PathBuf,
    _library: libloading::Library,
}

// Dropping a `Library` unloads it; handles live here for the rest of the process.
static LOADED: Mutex<Vec<LoadedLibrary>> = Mutex::new(Vec::new());

/// The OS dynamic loader (`dlopen` on Unix, `LoadLibraryW` on Windows).
pub struct SystemLoader;

impl NativeLoader for SystemLoader {
    #[tracing::instrument(skip(self))]
    fn load(&self, path: &Path) -> Result<()> {
        // SAFETY: loading runs the library's initialisers. The archive the
        // library came from is trusted by the caller.
        let library = unsafe { libloading::Library::new(path) }
            .with_context(|| format!("dynamic loader rejected {:?}", path))?;

        debug!("Loaded {:?}", path);
        LOADED
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoadedLibrary {
                path: path.to_path_buf(),
                _library: library,
            });
        Ok(())
    }
}

/// Paths of every library loaded through [`SystemLoader`], in load order.
pub fn loaded_libraries() -> Vec<PathBuf> {
    LOADED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|lib| lib.path.clone())
        .collect()
}
