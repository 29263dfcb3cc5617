//! Environment and host information operations.

use std::env;
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn os_name_impl(&self) -> String {
        env::consts::OS.to_string()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn arch_impl(&self) -> String {
        env::consts::ARCH.to_string()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn temp_dir_impl(&self) -> PathBuf {
        env::temp_dir()
    }
}
