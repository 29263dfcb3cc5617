//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the environment,
//! file system and process operations the loader needs, enabling dependency
//! injection and testability.
//!
//! # Structure
//!
//! - `env` - Environment variables and host information (OS name, arch, temp dir)
//! - `fs` - File system operations (read, temp files, markers, directory listing)
//! - `process` - External command invocation

mod env;
mod fs;
mod process;

use anyhow::Result;
use std::env as std_env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    /// Name of the running operating system (e.g. `linux`, `macos`).
    fn os_name(&self) -> String;

    /// Hardware architecture of the running process, unnormalized.
    fn arch(&self) -> String;

    fn temp_dir(&self) -> PathBuf;

    // Processes
    /// Run `program` and return everything it wrote to stdout.
    /// The exit status is not inspected.
    fn command_output(&self, program: &str, args: &[String]) -> Result<String>;

    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Create a new, uniquely named file `<prefix><random><suffix>` in `dir`.
    /// The file is kept on disk after the returned writer is dropped.
    fn create_temp_file(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
    ) -> Result<(PathBuf, Box<dyn Write + Send>)>;

    fn create_file(&self, path: &Path) -> Result<Box<dyn Write + Send>>;
    fn exists(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Schedule `path` for best-effort removal when the process exits.
    fn delete_on_exit(&self, path: &Path);
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn os_name(&self) -> String {
        self.os_name_impl()
    }

    fn arch(&self) -> String {
        self.arch_impl()
    }

    fn temp_dir(&self) -> PathBuf {
        self.temp_dir_impl()
    }

    fn command_output(&self, program: &str, args: &[String]) -> Result<String> {
        self.command_output_impl(program, args)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn create_temp_file(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
    ) -> Result<(PathBuf, Box<dyn Write + Send>)> {
        self.create_temp_file_impl(dir, prefix, suffix)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        self.create_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn delete_on_exit(&self, path: &Path) {
        self.delete_on_exit_impl(path)
    }
}
