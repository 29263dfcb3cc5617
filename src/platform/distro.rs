//! Linux distribution detection.

use log::debug;
use regex::Regex;
use std::sync::LazyLock;

use crate::config::{DistroSource, LoaderConfig};
use crate::error::LoadError;
use crate::runtime::Runtime;

// Label right after the third '(' of a kernel version string:
// "Linux version 5.15.0 (buildd@lcy02) (gcc (Ubuntu 11.4.0-1ubuntu1) 11.4.0) #1 SMP"
static DISTRO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^(]+\([^(]+\([^(]+\(([A-Za-z\s]+)").expect("distro pattern is valid")
});

static RELEASE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Release:\s*(\d+)").expect("release pattern is valid"));

/// Extract the distribution label from a kernel version line.
pub fn parse_distro_label(version_line: &str) -> Option<String> {
    DISTRO_PATTERN
        .captures(version_line)
        .map(|caps| caps[1].trim().to_string())
        .filter(|label| !label.is_empty())
}

/// Major release from release-query output. When several lines match, the
/// last one wins.
pub fn parse_release(output: &str) -> Option<String> {
    let mut release = None;
    for line in output.lines() {
        if let Some(caps) = RELEASE_PATTERN.captures(line) {
            release = Some(caps[1].to_string());
        }
    }
    release
}

/// `NAME` and the major part of `VERSION_ID` from an os-release file.
pub fn parse_os_release(content: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut version = None;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        match key.trim() {
            "NAME" if !value.is_empty() => name = Some(value.to_string()),
            "VERSION_ID" => {
                let major: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
                if !major.is_empty() {
                    version = Some(major);
                }
            }
            _ => {}
        }
    }

    (name, version)
}

/// `<Distro>.<Release>` for the running Linux host.
pub(super) fn linux_family<R: Runtime>(
    runtime: &R,
    config: &LoaderConfig,
) -> Result<String, LoadError> {
    let (distro, release) = match config.distro_source {
        DistroSource::ReleaseCommand => (
            kernel_distro_label(runtime, config),
            release_from_command(runtime, config),
        ),
        DistroSource::OsRelease => match runtime.read_to_string(&config.os_release_file) {
            Ok(content) => parse_os_release(&content),
            Err(e) => {
                debug!("Cannot read os-release: {:#}", e);
                (None, None)
            }
        },
    };

    match (distro, release) {
        (Some(distro), Some(release)) => Ok(format!("{}.{}", distro.trim().replace(' ', "_"), release)),
        (distro, release) => Err(LoadError::DistroDetectionFailed { distro, release }),
    }
}

fn kernel_distro_label<R: Runtime>(runtime: &R, config: &LoaderConfig) -> Option<String> {
    match runtime.read_to_string(&config.version_file) {
        Ok(content) => content.lines().next().and_then(parse_distro_label),
        Err(e) => {
            debug!("Cannot read kernel version: {:#}", e);
            None
        }
    }
}

fn release_from_command<R: Runtime>(runtime: &R, config: &LoaderConfig) -> Option<String> {
    let (program, args) = config.release_command.split_first()?;
    match runtime.command_output(program, args) {
        Ok(output) => parse_release(&output),
        Err(e) => {
            debug!("Release query failed: {:#}", e);
            None
        }
    }
}
