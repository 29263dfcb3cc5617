//! Platform variant resolution.
//!
//! An archive ships one generic library (`/natives/libfoo.so`) and any number
//! of platform overrides named `<base>.<family>.<arch><suffix>`, e.g.
//! `/natives/libfoo.Ubuntu.22.x86_64.so`.

use log::debug;

use crate::archive::ResourceArchive;
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::platform::{self, PlatformTag};
use crate::runtime::Runtime;

/// `<base>.<family>.<arch><suffix>`
pub fn variant_name(base: &str, tag: &PlatformTag, suffix: &str) -> String {
    format!("{}.{}.{}{}", base, tag.family, tag.arch, suffix)
}

/// Resource path to load for the running platform.
///
/// Fails only when the platform cannot be identified.
pub fn resolve<R: Runtime>(
    runtime: &R,
    config: &LoaderConfig,
    archive: &dyn ResourceArchive,
    base: &str,
    suffix: &str,
) -> Result<String, LoadError> {
    let tag = platform::identify(runtime, config)?;
    Ok(resolve_for(archive, base, suffix, &tag))
}

/// Platform-qualified name when the archive has it, otherwise `base + suffix`.
pub fn resolve_for(
    archive: &dyn ResourceArchive,
    base: &str,
    suffix: &str,
    tag: &PlatformTag,
) -> String {
    let candidate = variant_name(base, tag, suffix);
    if archive.contains(&candidate) {
        debug!("Using platform variant {}", candidate);
        candidate
    } else {
        let generic = format!("{}{}", base, suffix);
        debug!("No variant {}; falling back to {}", candidate, generic);
        generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::runtime::MockRuntime;
    use crate::test_utils::{UBUNTU_PROC_VERSION, mock_linux_runtime};

    fn tag(family: &str, arch: &str) -> PlatformTag {
        PlatformTag {
            family: family.into(),
            arch: arch.into(),
        }
    }

    #[test]
    fn test_variant_name() {
        assert_eq!(
            variant_name("/vw/libvw_jni", &tag("Ubuntu.22", "x86_64"), ".so"),
            "/vw/libvw_jni.Ubuntu.22.x86_64.so"
        );
        assert_eq!(
            variant_name("/vw/libvw_jni", &tag("Darwin", "aarch64"), ""),
            "/vw/libvw_jni.Darwin.aarch64"
        );
    }

    #[test]
    fn test_resolve_for_prefers_variant() {
        let archive = MemoryArchive::new()
            .with("/vw/libvw_jni.so", b"generic".to_vec())
            .with("/vw/libvw_jni.Darwin.aarch64.so", b"mac".to_vec());

        assert_eq!(
            resolve_for(&archive, "/vw/libvw_jni", ".so", &tag("Darwin", "aarch64")),
            "/vw/libvw_jni.Darwin.aarch64.so"
        );
    }

    #[test]
    fn test_resolve_for_falls_back_to_generic() {
        let archive = MemoryArchive::new()
            .with("/vw/libvw_jni.so", b"generic".to_vec())
            .with("/vw/libvw_jni.Darwin.aarch64.so", b"mac".to_vec());

        assert_eq!(
            resolve_for(&archive, "/vw/libvw_jni", ".so", &tag("Darwin", "x86_64")),
            "/vw/libvw_jni.so"
        );
    }

    #[test]
    fn test_resolve_for_returns_generic_even_when_absent() {
        let archive = MemoryArchive::new();
        assert_eq!(
            resolve_for(&archive, "/vw/libvw_jni", ".so", &tag("Darwin", "x86_64")),
            "/vw/libvw_jni.so"
        );
    }

    #[test]
    fn test_resolve_on_linux() {
        let runtime = mock_linux_runtime(
            Ok(UBUNTU_PROC_VERSION.to_string()),
            Ok("Release:\t22.04\n".to_string()),
        );
        let archive = MemoryArchive::new()
            .with("/vw/libvw_jni.so", b"generic".to_vec())
            .with("/vw/libvw_jni.Ubuntu.22.x86_64.so", b"ubuntu".to_vec());

        let resolved = resolve(&runtime, &LoaderConfig::default(), &archive, "/vw/libvw_jni", ".so");
        assert_eq!(resolved.unwrap(), "/vw/libvw_jni.Ubuntu.22.x86_64.so");
    }

    #[test]
    fn test_resolve_propagates_platform_failure() {
        let mut runtime = MockRuntime::new();
        runtime.expect_os_name().returning(|| "freebsd".to_string());
        let archive = MemoryArchive::new().with("/vw/libvw_jni.so", b"generic".to_vec());

        let resolved = resolve(&runtime, &LoaderConfig::default(), &archive, "/vw/libvw_jni", ".so");
        assert!(matches!(
            resolved,
            Err(LoadError::UnsupportedPlatform { .. })
        ));
    }
}
