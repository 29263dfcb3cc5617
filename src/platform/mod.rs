//! Platform identification.
//!
//! Produces the `family` and `arch` components used to name platform
//! variants of a native library: `Darwin` on macOS, `<Distro>.<Release>` on
//! Linux (e.g. `Ubuntu.22`). Nothing is cached; callers that load several
//! libraries may keep the [`PlatformTag`] themselves.

mod distro;

use log::debug;
use serde::Serialize;
use std::fmt;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::runtime::Runtime;

pub use distro::{parse_distro_label, parse_os_release, parse_release};

/// Family reported for every macOS host.
pub const DARWIN: &str = "Darwin";

/// Platform components of a variant resource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformTag {
    pub family: String,
    pub arch: String,
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family, self.arch)
    }
}

/// Identify the running platform.
///
/// Distribution detection only happens on Linux; macOS and unknown systems
/// never read the kernel version or run the release command.
pub fn identify<R: Runtime>(runtime: &R, config: &LoaderConfig) -> Result<PlatformTag, LoadError> {
    let os = runtime.os_name();
    let lower = os.to_lowercase();

    let family = if lower.contains("mac") {
        DARWIN.to_string()
    } else if lower.contains("linux") {
        distro::linux_family(runtime, config)?
    } else {
        return Err(LoadError::UnsupportedPlatform { os });
    };

    let tag = PlatformTag {
        family,
        arch: runtime.arch(),
    };
    debug!("Identified platform {} (os: {})", tag, os);
    Ok(tag)
}
