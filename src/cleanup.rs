use log::{debug, warn};
use std::path::PathBuf;
use std::sync::{Mutex, Once, PoisonError};

/// Tracks files that should be removed when the process exits
#[derive(Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub const fn new() -> Self {
        Self { paths: Vec::new() }
    }

    /// Add a path to be cleaned up. Registering the same path twice is a no-op.
    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every registered file, most recently registered first.
    ///
    /// Errors are ignored: a library that is still mapped cannot be removed
    /// on every platform, and the stale-file sweep of a later process will
    /// pick it up.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..).rev() {
            debug!("Cleaning up: {:?}", path);
            if let Err(e) = std::fs::remove_file(&path) {
                debug!("Could not remove {:?} at exit: {}", path, e);
            }
        }
    }
}

static EXIT_CLEANUP: Mutex<CleanupContext> = Mutex::new(CleanupContext::new());
static INSTALL_HOOK: Once = Once::new();

/// Register `path` for removal when the process exits normally.
///
/// Exit handlers do not run when the process is killed, so this only
/// complements the lock-file sweep.
pub fn register_on_exit(path: PathBuf) {
    INSTALL_HOOK.call_once(install_exit_hook);
    EXIT_CLEANUP
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .add(path);
}

/// Paths currently scheduled for removal at exit.
pub fn registered_on_exit() -> Vec<PathBuf> {
    EXIT_CLEANUP
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .paths()
        .to_vec()
}

/// Run the exit cleanup now. Also invoked by the exit hook.
pub fn run_exit_cleanup() {
    // try_lock: never block process teardown on a thread that died holding the lock
    match EXIT_CLEANUP.try_lock() {
        Ok(mut ctx) => ctx.cleanup(),
        Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner().cleanup(),
        Err(std::sync::TryLockError::WouldBlock) => {
            debug!("Exit cleanup registry busy; leaving files for the next sweep")
        }
    }
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn on_exit() {
        run_exit_cleanup();
    }

    // SAFETY: `on_exit` is a plain function without captured state and stays
    // valid for the lifetime of the process.
    let rc = unsafe { libc::atexit(on_exit) };
    if rc != 0 {
        warn!("Failed to register exit cleanup handler; relying on stale-file sweeps");
    }
}

#[cfg(not(unix))]
fn install_exit_hook() {
    warn!("Exit cleanup is not supported on this platform; relying on stale-file sweeps");
}
