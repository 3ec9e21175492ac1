//! Temporary configuration files for testing config loading.

use crate::config::StorageConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A JSON config file that is deleted when dropped.
pub struct TempConfigFile {
    #[allow(dead_code)]
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempConfigFile {
    /// Write `json` verbatim to a fresh `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written.
    pub fn from_json(json: &str) -> std::io::Result<Self> {
        let mut temp_file = tempfile::Builder::new().suffix(".json").tempfile()?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    /// Serialize `config` into a fresh `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or the file written.
    pub fn from_config(config: &StorageConfig) -> std::io::Result<Self> {
        let json = serde_json::to_string_pretty(config)?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
