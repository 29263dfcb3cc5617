//! Load platform-specific native libraries shipped inside an archive.
//!
//! The archive carries a generic build of each library plus optional
//! platform overrides. At startup the matching variant is copied into a
//! uniquely named temp file, loaded into the process, and paired with a
//! `.lock` marker so that later processes can reclaim copies left behind by
//! crashed ones.
//!
//! ```no_run
//! use natload::archive::ZipArchiveBundle;
//!
//! # fn main() -> anyhow::Result<()> {
//! let bundle = ZipArchiveBundle::open(std::path::Path::new("natives.zip"))?;
//! // Loads /vw/libvw_jni.Ubuntu.22.x86_64.so when present, else /vw/libvw_jni.so
//! natload::load_platform_library(&bundle, "/vw/libvw_jni", ".so")?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod loader;
pub mod materialize;
pub mod platform;
pub mod resource;
pub mod runtime;
pub mod sweep;
pub mod variant;

use archive::ResourceArchive;
use config::LoaderConfig;
use loader::{NativeLoader, SystemLoader};
use runtime::{RealRuntime, Runtime};

pub use error::LoadError;
pub use materialize::ExtractedLibrary;
pub use platform::PlatformTag;
pub use sweep::SweepReport;

/// Resolve the platform variant of `base + suffix`, then extract and load it.
pub fn load_platform_library(
    archive: &dyn ResourceArchive,
    base: &str,
    suffix: &str,
) -> Result<ExtractedLibrary, LoadError> {
    let runtime = RealRuntime;
    let config = LoaderConfig::from_env(&runtime);
    load_platform_library_with(&runtime, &SystemLoader, &config, archive, base, suffix)
}

pub fn load_platform_library_with<R: Runtime, L: NativeLoader>(
    runtime: &R,
    loader: &L,
    config: &LoaderConfig,
    archive: &dyn ResourceArchive,
    base: &str,
    suffix: &str,
) -> Result<ExtractedLibrary, LoadError> {
    let path = variant::resolve(runtime, config, archive, base, suffix)?;
    materialize::load(runtime, loader, config, archive, &path)
}

/// Extract and load the resource at exactly `path`, skipping variant
/// resolution.
pub fn load_library_from_archive(
    archive: &dyn ResourceArchive,
    path: &str,
) -> Result<ExtractedLibrary, LoadError> {
    let runtime = RealRuntime;
    let config = LoaderConfig::from_env(&runtime);
    load_library_from_archive_with(&runtime, &SystemLoader, &config, archive, path)
}

pub fn load_library_from_archive_with<R: Runtime, L: NativeLoader>(
    runtime: &R,
    loader: &L,
    config: &LoaderConfig,
    archive: &dyn ResourceArchive,
    path: &str,
) -> Result<ExtractedLibrary, LoadError> {
    materialize::load(runtime, loader, config, archive, path)
}
