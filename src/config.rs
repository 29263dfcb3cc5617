//! Loader configuration.
//!
//! Defaults reproduce the historical behavior (system temp directory,
//! `/proc/version` plus `lsb_release -r` for distro detection). Each knob can
//! be overridden through `NATLOAD_*` environment variables or CLI flags.

use anyhow::{Result, anyhow};
use log::warn;
use std::path::PathBuf;
use std::str::FromStr;

use crate::runtime::Runtime;

/// Size of the buffer used to stream a resource into its temp file.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

pub const DEFAULT_VERSION_FILE: &str = "/proc/version";
pub const DEFAULT_OS_RELEASE_FILE: &str = "/etc/os-release";

pub const ENV_TMPDIR: &str = "NATLOAD_TMPDIR";
pub const ENV_BUFFER_SIZE: &str = "NATLOAD_BUFFER_SIZE";
pub const ENV_DISTRO_SOURCE: &str = "NATLOAD_DISTRO_SOURCE";

/// How the Linux distribution label and release are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DistroSource {
    /// Kernel version string plus the `lsb_release -r` output. Produces the
    /// names existing variant binaries were built with.
    #[default]
    #[value(alias = "lsb-release", alias = "lsb_release")]
    ReleaseCommand,
    /// `NAME` and `VERSION_ID` from `/etc/os-release`.
    #[value(alias = "os_release")]
    OsRelease,
}

impl FromStr for DistroSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release-command" | "lsb_release" | "lsb-release" => Ok(Self::ReleaseCommand),
            "os-release" | "os_release" => Ok(Self::OsRelease),
            other => Err(anyhow!(
                "unknown distro source '{}' (expected release-command or os-release)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Directory for extracted libraries; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub buffer_size: usize,
    pub distro_source: DistroSource,
    pub version_file: PathBuf,
    pub os_release_file: PathBuf,
    /// Program followed by its arguments.
    pub release_command: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            distro_source: DistroSource::default(),
            version_file: PathBuf::from(DEFAULT_VERSION_FILE),
            os_release_file: PathBuf::from(DEFAULT_OS_RELEASE_FILE),
            release_command: vec!["lsb_release".to_string(), "-r".to_string()],
        }
    }
}

impl LoaderConfig {
    /// Defaults overridden by `NATLOAD_*` environment variables.
    ///
    /// Malformed values are logged and ignored so a bad environment never
    /// prevents the library from loading.
    pub fn from_env<R: Runtime>(runtime: &R) -> Self {
        let mut config = Self::default();

        if let Ok(dir) = runtime.env_var(ENV_TMPDIR)
            && !dir.is_empty()
        {
            config.temp_dir = Some(PathBuf::from(dir));
        }

        if let Ok(raw) = runtime.env_var(ENV_BUFFER_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.buffer_size = size,
                _ => warn!("Ignoring invalid {}={:?}", ENV_BUFFER_SIZE, raw),
            }
        }

        if let Ok(raw) = runtime.env_var(ENV_DISTRO_SOURCE) {
            match raw.parse() {
                Ok(source) => config.distro_source = source,
                Err(e) => warn!("Ignoring {}: {}", ENV_DISTRO_SOURCE, e),
            }
        }

        config
    }

    /// Directory where libraries are extracted and swept.
    pub fn temp_dir<R: Runtime>(&self, runtime: &R) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| runtime.temp_dir())
    }
}
