//! Runtime configuration for the storage wrappers.
//!
//! Provider limits (`MAX_BATCH_SIZE`, `MAX_MESSAGES_PER_REQUEST`) are constants
//! and live next to the code they bound. Everything in [`StorageConfig`] is a per-client
//! choice.

use crate::retry::{RetryMode, RetrySettings};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long a fetched queue message stays invisible to other consumers.
    pub visibility_timeout_secs: u64,
    pub retry: RetrySettings,
    /// Content type recorded on uploaded objects.
    pub object_content_type: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: 30,
            retry: RetrySettings::default(),
            object_content_type: "application/json".to_string(),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    /// Load settings from environment variables sharing `prefix`, falling
    /// back to defaults for anything unset.
    ///
    /// Recognized suffixes: `VISIBILITY_TIMEOUT_SECS`, `RETRY_MODE`,
    /// `RETRY_DELTA_MS`, `RETRY_MAX_ATTEMPTS`, `CONTENT_TYPE`.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized variable holds an unparsable value
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_vars(std::env::vars(), prefix)
    }

    /// Like [`StorageConfig::from_env`], but reads from the given key/value
    /// pairs instead of the process environment. Pairs without `prefix` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a recognized variable holds an unparsable value
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
        prefix: &str,
    ) -> Result<Self> {
        Self::from_map(&vars_with_prefix(vars, prefix))
            .with_context(|| format!("load storage config from env prefix '{prefix}'"))
    }

    /// Load settings from a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or does not parse
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse storage config {}", path.display()))?;
        Ok(config)
    }

    fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = vars.get("visibility_timeout_secs") {
            config.visibility_timeout_secs =
                v.parse().with_context(|| format!("VISIBILITY_TIMEOUT_SECS={v}"))?;
        }
        if let Some(v) = vars.get("retry_mode") {
            config.retry.mode = match v.to_ascii_lowercase().as_str() {
                "exponential" => RetryMode::Exponential,
                "linear" => RetryMode::Linear,
                "none" => RetryMode::None,
                other => bail!("unknown RETRY_MODE '{other}'"),
            };
        }
        if let Some(v) = vars.get("retry_delta_ms") {
            config.retry.delta_backoff_ms =
                v.parse().with_context(|| format!("RETRY_DELTA_MS={v}"))?;
        }
        if let Some(v) = vars.get("retry_max_attempts") {
            config.retry.max_attempts =
                v.parse().with_context(|| format!("RETRY_MAX_ATTEMPTS={v}"))?;
        }
        if let Some(v) = vars.get("content_type") {
            config.object_content_type.clone_from(v);
        }

        Ok(config)
    }
}

fn vars_with_prefix(
    vars: impl IntoIterator<Item = (String, String)>,
    prefix: &str,
) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .map(|name| (name.to_lowercase(), value))
        })
        .collect()
}

/// Name under which a client binds to a resource: `name`, lower-cased.
///
/// ```
/// assert_eq!(ironstore::config::resource_name("Orders"), "orders");
/// ```
#[must_use]
pub fn resource_name(name: &str) -> String {
    name.to_lowercase()
}

/// Default resource name for values of type `T`: the type's short name,
/// lower-cased (`my_app::OrderEvent` becomes `orderevent`).
#[must_use]
pub fn default_resource_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    resource_name(base.rsplit("::").next().unwrap_or(base))
}
