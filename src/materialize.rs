//! Extract a library from the archive into a temp file and load it.

use log::{debug, info, warn};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::archive::ResourceArchive;
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::loader::NativeLoader;
use crate::resource::ResourcePath;
use crate::runtime::Runtime;
use crate::sweep::{self, lock_path_for};

/// Suffix given to extracted files whose resource name has no extension.
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";

/// A library extracted and loaded by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedLibrary {
    pub temp_path: PathBuf,
    pub lock_path: PathBuf,
}

/// Copy the resource at `path` into a fresh temp file and load it.
///
/// The extracted file is never deleted by this call, not even when copying
/// or loading fails: a loaded library cannot be removed everywhere, and
/// leftovers are reclaimed at exit or by a later sweep. On success the lock
/// file `<temp>.lock` marks the copy as in use, then other processes' stale
/// copies sharing the same prefix are swept.
pub fn load<R: Runtime, L: NativeLoader>(
    runtime: &R,
    loader: &L,
    config: &LoaderConfig,
    archive: &dyn ResourceArchive,
    path: &str,
) -> Result<ExtractedLibrary, LoadError> {
    let resource = ResourcePath::parse(path)?;

    // Open the source first so a missing resource never leaves a temp file.
    let source = archive
        .open(resource.as_str())
        .map_err(|e| LoadError::io(resource.as_str(), e))?
        .ok_or_else(|| LoadError::NotFound {
            path: resource.to_string(),
        })?;

    let configured_dir = config.temp_dir(runtime);
    let temp_dir = std::path::absolute(&configured_dir)
        .map_err(|e| LoadError::io(&configured_dir, e))?;

    let (temp_path, writer) = runtime
        .create_temp_file(
            &temp_dir,
            resource.prefix(),
            resource.suffix().unwrap_or(DEFAULT_TEMP_SUFFIX),
        )
        .map_err(|e| LoadError::io(&temp_dir, e))?;
    runtime.delete_on_exit(&temp_path);

    if !runtime.exists(&temp_path) {
        return Err(LoadError::Io {
            path: temp_path,
            reason: "temporary file does not exist after creation".to_string(),
        });
    }

    let copied = copy_to_file(source, writer, config.buffer_size)
        .map_err(|e| LoadError::io(&temp_path, e))?;
    debug!("Extracted {} ({} bytes) to {:?}", resource, copied, temp_path);

    loader
        .load(&temp_path)
        .map_err(|e| LoadError::LoadFailure {
            path: temp_path.clone(),
            reason: format!("{:#}", e),
        })?;
    info!("Loaded native library {} from {:?}", resource, temp_path);

    let lock_path = lock_path_for(&temp_path);
    match runtime.create_file(&lock_path) {
        Ok(_) => runtime.delete_on_exit(&lock_path),
        // The library is already loaded; without the marker a later sweep
        // may unlink it, which a mapped library survives.
        Err(e) => warn!("Failed to create lock file {:?}: {:#}", lock_path, e),
    }

    sweep::sweep(runtime, resource.prefix(), &temp_dir);

    Ok(ExtractedLibrary {
        temp_path,
        lock_path,
    })
}

/// Stream `source` into `dest` and close both, whatever the outcome.
fn copy_to_file(
    mut source: Box<dyn Read + Send + '_>,
    mut dest: Box<dyn Write + Send>,
    buffer_size: usize,
) -> io::Result<u64> {
    let copied = copy_stream(&mut source, &mut dest, buffer_size)?;
    dest.flush()?;
    Ok(copied)
}

/// Copy through a fixed-size buffer, returning the number of bytes written.
pub fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> io::Result<u64> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{DirectoryArchive, MemoryArchive};
    use crate::loader::MockNativeLoader;
    use crate::runtime::{MockRuntime, RealRuntime};
    use anyhow::{Result, anyhow};
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    const BUFFER: usize = 16;

    fn config_in(dir: &TempDir) -> LoaderConfig {
        LoaderConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            buffer_size: BUFFER,
            ..LoaderConfig::default()
        }
    }

    fn accepting_loader() -> MockNativeLoader {
        let mut loader = MockNativeLoader::new();
        loader.expect_load().times(1).returning(|_| Ok(()));
        loader
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Archive whose single resource fails after yielding some bytes.
    struct FailingArchive;

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("archive entry truncated"));
            }
            self.served = true;
            buf[..4].copy_from_slice(b"\x7fELF");
            Ok(4)
        }
    }

    impl ResourceArchive for FailingArchive {
        fn contains(&self, _path: &str) -> bool {
            true
        }

        fn open(&self, _path: &str) -> Result<Option<Box<dyn Read + Send + '_>>> {
            Ok(Some(Box::new(FailingReader { served: false })))
        }
    }

    #[test]
    fn test_copy_stream_round_trip_sizes() {
        for size in [0, BUFFER, 3 * BUFFER + 5] {
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let mut out = Vec::new();
            let copied = copy_stream(&mut data.as_slice(), &mut out, BUFFER).unwrap();
            assert_eq!(copied, size as u64);
            assert_eq!(out, data, "size {}", size);
        }
    }

    #[test]
    fn test_copy_stream_zero_buffer_still_copies() {
        let mut out = Vec::new();
        copy_stream(&mut &b"abc"[..], &mut out, 0).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test_log::test]
    fn test_load_extracts_exact_bytes() {
        for size in [0, BUFFER, 4 * BUFFER + 7] {
            let dir = tempdir().unwrap();
            let data: Vec<u8> = (0..size).map(|i| (i * 7 % 256) as u8).collect();
            let archive = MemoryArchive::new().with("/natives/libfoo.so", data.clone());

            let extracted = load(
                &RealRuntime,
                &accepting_loader(),
                &config_in(&dir),
                &archive,
                "/natives/libfoo.so",
            )
            .unwrap();

            assert_eq!(fs::read(&extracted.temp_path).unwrap(), data, "size {}", size);
        }
    }

    #[test]
    fn test_load_names_temp_file_from_resource() {
        let dir = tempdir().unwrap();
        let archive = MemoryArchive::new().with("/natives/libvw_jni.Darwin.x86_64.dylib", b"x".to_vec());

        let extracted = load(
            &RealRuntime,
            &accepting_loader(),
            &config_in(&dir),
            &archive,
            "/natives/libvw_jni.Darwin.x86_64.dylib",
        )
        .unwrap();

        let name = extracted.temp_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("libvw_jni"));
        assert!(name.ends_with(".Darwin.x86_64.dylib"));
        assert_eq!(extracted.temp_path.parent().unwrap(), dir.path());
    }

    #[test]
    fn test_load_creates_exactly_one_lock_file() {
        let dir = tempdir().unwrap();
        let archive = MemoryArchive::new().with("/libfoo.so", b"payload".to_vec());

        let extracted = load(
            &RealRuntime,
            &accepting_loader(),
            &config_in(&dir),
            &archive,
            "/libfoo.so",
        )
        .unwrap();

        let temp_name = extracted.temp_path.file_name().unwrap().to_string_lossy().into_owned();
        let locks: Vec<String> = dir_names(dir.path())
            .into_iter()
            .filter(|n| n.ends_with(".lock"))
            .collect();
        assert_eq!(locks, vec![format!("{}.lock", temp_name)]);
        assert_eq!(extracted.lock_path, lock_path_for(&extracted.temp_path));
        assert!(extracted.lock_path.exists());
    }

    #[test]
    fn test_load_passes_absolute_path_to_loader() {
        let dir = tempdir().unwrap();
        let archive = MemoryArchive::new().with("/libfoo.so", b"payload".to_vec());
        let mut loader = MockNativeLoader::new();
        loader
            .expect_load()
            .withf(|p| p.is_absolute() && p.exists())
            .times(1)
            .returning(|_| Ok(()));

        load(&RealRuntime, &loader, &config_in(&dir), &archive, "/libfoo.so").unwrap();
    }

    #[test]
    fn test_load_sweeps_stale_copies() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join("libfoo8841.so");
        let live = dir.path().join("libfoo1234.so");
        let live_lock = dir.path().join("libfoo1234.so.lock");
        let unrelated = dir.path().join("libbar0000.so");
        for path in [&stale, &live, &live_lock, &unrelated] {
            fs::write(path, "").unwrap();
        }
        let archive = MemoryArchive::new().with("/libfoo.so", b"payload".to_vec());

        let extracted = load(
            &RealRuntime,
            &accepting_loader(),
            &config_in(&dir),
            &archive,
            "/libfoo.so",
        )
        .unwrap();

        assert!(!stale.exists());
        assert!(live.exists());
        assert!(unrelated.exists());
        assert!(extracted.temp_path.exists());
    }

    #[test]
    fn test_load_rejects_relative_path_without_touching_fs() {
        let runtime = MockRuntime::new();
        let loader = MockNativeLoader::new();
        let archive = MemoryArchive::new().with("/libfoo.so", b"x".to_vec());

        let result = load(&runtime, &loader, &LoaderConfig::default(), &archive, "libfoo.so");
        assert!(matches!(result, Err(LoadError::InvalidPath { .. })));
    }

    #[test]
    fn test_load_rejects_short_prefix_without_touching_fs() {
        let runtime = MockRuntime::new();
        let loader = MockNativeLoader::new();
        let archive = MemoryArchive::new().with("/ab.so", b"x".to_vec());

        let result = load(&runtime, &loader, &LoaderConfig::default(), &archive, "/ab.so");
        assert!(matches!(result, Err(LoadError::InvalidPath { .. })));
    }

    #[test]
    fn test_load_missing_resource_creates_no_temp_file() {
        let dir = tempdir().unwrap();
        let loader = MockNativeLoader::new();

        let result = load(
            &RealRuntime,
            &loader,
            &config_in(&dir),
            &MemoryArchive::new(),
            "/natives/libfoo.so",
        );

        match result {
            Err(LoadError::NotFound { path }) => assert_eq!(path, "/natives/libfoo.so"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(dir_names(dir.path()).is_empty());
    }

    #[test]
    fn test_load_trailing_separator_is_not_found() {
        let dir = tempdir().unwrap();
        let bundle = tempdir().unwrap();
        fs::create_dir(bundle.path().join("natives")).unwrap();
        fs::write(bundle.path().join("natives/libfoo.so"), b"payload").unwrap();
        let loader = MockNativeLoader::new();

        let result = load(
            &RealRuntime,
            &loader,
            &config_in(&dir),
            &DirectoryArchive::new(bundle.path()),
            "/natives/libfoo.so/",
        );

        match result {
            Err(LoadError::NotFound { path }) => assert_eq!(path, "/natives/libfoo.so/"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(dir_names(dir.path()).is_empty());
    }

    #[test]
    fn test_load_missing_temp_dir_is_io_error() {
        let archive = MemoryArchive::new().with("/libfoo.so", b"payload".to_vec());
        let loader = MockNativeLoader::new();
        let config = LoaderConfig {
            temp_dir: Some(PathBuf::from("/nonexistent/natload/scratch")),
            ..LoaderConfig::default()
        };

        match load(&RealRuntime, &loader, &config, &archive, "/libfoo.so") {
            Err(LoadError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/natload/scratch"))
            }
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_load_vanished_temp_file_is_io_error() {
        let mut runtime = MockRuntime::new();
        let temp_path = PathBuf::from("/scratch/libfoo7.so");

        let created = temp_path.clone();
        runtime
            .expect_create_temp_file()
            .times(1)
            .returning(move |_, _, _| {
                Ok((created.clone(), Box::new(io::sink()) as Box<dyn Write + Send>))
            });
        runtime.expect_delete_on_exit().return_const(());
        runtime.expect_exists().returning(|_| false);
        runtime.expect_create_file().never();
        runtime.expect_read_dir().never();

        let mut loader = MockNativeLoader::new();
        loader.expect_load().never();

        let config = LoaderConfig {
            temp_dir: Some(PathBuf::from("/scratch")),
            ..LoaderConfig::default()
        };
        let archive = MemoryArchive::new().with("/libfoo.so", b"payload".to_vec());

        match load(&runtime, &loader, &config, &archive, "/libfoo.so") {
            Err(LoadError::Io { path, reason }) => {
                assert_eq!(path, temp_path);
                assert!(reason.contains("does not exist after creation"));
            }
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_load_copy_failure_leaves_temp_file() {
        let dir = tempdir().unwrap();
        let loader = MockNativeLoader::new();

        let result = load(&RealRuntime, &loader, &config_in(&dir), &FailingArchive, "/libfoo.so");

        match result {
            Err(LoadError::Io { path, reason }) => {
                assert!(path.starts_with(dir.path()));
                assert!(reason.contains("archive entry truncated"));
                assert!(path.exists());
            }
            other => panic!("expected Io, got {:?}", other),
        }
        let names = dir_names(dir.path());
        assert_eq!(names.len(), 1);
        assert!(!names[0].ends_with(".lock"));
    }

    #[test]
    fn test_load_failure_is_fatal_and_leaves_no_lock() {
        let dir = tempdir().unwrap();
        let archive = MemoryArchive::new().with("/libfoo.so", b"not elf".to_vec());
        let mut loader = MockNativeLoader::new();
        loader
            .expect_load()
            .times(1)
            .returning(|_| Err(anyhow!("wrong ELF class: ELFCLASS32")));

        let result = load(&RealRuntime, &loader, &config_in(&dir), &archive, "/libfoo.so");

        match result {
            Err(LoadError::LoadFailure { path, reason }) => {
                assert!(reason.contains("ELFCLASS32"));
                assert!(path.exists());
            }
            other => panic!("expected LoadFailure, got {:?}", other),
        }
        assert!(dir_names(dir.path()).iter().all(|n| !n.ends_with(".lock")));
    }

    #[test]
    fn test_load_with_system_loader_rejects_garbage() {
        let dir = tempdir().unwrap();
        let archive = MemoryArchive::new().with("/libgarbage.so", b"garbage".to_vec());

        let result = load(
            &RealRuntime,
            &crate::loader::SystemLoader,
            &config_in(&dir),
            &archive,
            "/libgarbage.so",
        );
        assert!(matches!(result, Err(LoadError::LoadFailure { .. })));
    }

    #[test]
    fn test_lock_file_failure_is_not_fatal() {
        let mut runtime = MockRuntime::new();
        let temp_path = PathBuf::from("/scratch/libfoo42.so");
        let lock_path = PathBuf::from("/scratch/libfoo42.so.lock");

        let created = temp_path.clone();
        runtime
            .expect_create_temp_file()
            .times(1)
            .returning(move |_, _, _| {
                Ok((created.clone(), Box::new(io::sink()) as Box<dyn Write + Send>))
            });
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_create_file()
            .withf(move |p| p == lock_path.as_path())
            .times(1)
            .returning(|_| Err(anyhow!("read-only file system")));
        runtime
            .expect_delete_on_exit()
            .with(mockall::predicate::eq(temp_path.clone()))
            .times(1)
            .return_const(());
        runtime.expect_read_dir().returning(|_| Ok(Vec::new()));

        let config = LoaderConfig {
            temp_dir: Some(PathBuf::from("/scratch")),
            ..LoaderConfig::default()
        };
        let archive = MemoryArchive::new().with("/libfoo.so", b"payload".to_vec());

        let extracted = load(&runtime, &accepting_loader(), &config, &archive, "/libfoo.so").unwrap();
        assert_eq!(extracted.temp_path, temp_path);
    }

    #[test]
    fn test_extension_less_resource_gets_default_suffix() {
        let dir = tempdir().unwrap();
        let archive = MemoryArchive::new().with("/natives/libplain", b"x".to_vec());

        let extracted = load(
            &RealRuntime,
            &accepting_loader(),
            &config_in(&dir),
            &archive,
            "/natives/libplain",
        )
        .unwrap();
        assert!(
            extracted
                .temp_path
                .to_string_lossy()
                .ends_with(DEFAULT_TEMP_SUFFIX)
        );
    }
}
