//! Typed objects stored as blobs.
//!
//! [`ObjectContainer`] stores one serialized `T` per blob name.
//!
//! # Name normalization
//!
//! Every `/` is stripped from a blob name before use, so `"a/b"` and `"ab"`
//! address the same blob. Hierarchical names are therefore flattened rather
//! than rejected. This applies to every operation that takes a name.

use crate::backend::traits::{BlobClient, ErrorKind, StorageError, StorageResult};
use crate::codec::{Codec, JsonCodec};
use crate::config::StorageConfig;
use crate::retry::RetryPolicy;
use crate::validation::validate_container_name;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Strip path separators from a blob name.
#[must_use]
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    if name.contains('/') {
        Cow::Owned(name.replace('/', ""))
    } else {
        Cow::Borrowed(name)
    }
}

pub struct ObjectContainer<T, C, K = JsonCodec> {
    client: C,
    codec: K,
    content_type: String,
    _t: PhantomData<fn() -> T>,
}

impl<T, C> ObjectContainer<T, C>
where
    T: Serialize + DeserializeOwned,
    C: BlobClient,
{
    /// Open a container with the default configuration and JSON payloads.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid container name, or any error from
    /// creating the container
    pub fn new(client: C) -> StorageResult<Self> {
        Self::with_config(client, &StorageConfig::default())
    }

    /// # Errors
    ///
    /// See [`ObjectContainer::new`]
    pub fn with_config(client: C, config: &StorageConfig) -> StorageResult<Self> {
        Self::with_codec(client, config, JsonCodec)
    }
}

impl<T, C, K> ObjectContainer<T, C, K>
where
    T: Serialize + DeserializeOwned,
    C: BlobClient,
    K: Codec,
{
    /// Open a container: validate its name, install the configured retry
    /// policy and create the container if it is missing.
    ///
    /// Objects are uploaded with the configured content type, or the codec's
    /// own when the configuration leaves it empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid container name, or any error from
    /// creating the container
    pub fn with_codec(client: C, config: &StorageConfig, codec: K) -> StorageResult<Self> {
        validate_container_name(client.container_name())?;
        client.set_retry_policy(config.retry.build());
        client.create_if_not_exists()?;
        debug!(container = client.container_name(), "opened object container");

        let content_type = if config.object_content_type.is_empty() {
            codec.content_type().to_string()
        } else {
            config.object_content_type.clone()
        };
        Ok(Self {
            client,
            codec,
            content_type,
            _t: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.client.container_name()
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    pub fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>) {
        self.client.set_retry_policy(policy);
    }

    /// # Errors
    ///
    /// Returns the backend's error
    pub fn exists(&self, name: &str) -> StorageResult<bool> {
        self.client.exists(&normalize_name(name))
    }

    /// Read and decode an object; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or `Serialization` if the stored bytes do
    /// not decode into `T`
    pub fn get(&self, name: &str) -> StorageResult<Option<T>> {
        let name = normalize_name(name);
        let Some(bytes) = self.client.download(&name)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            StorageError::new(ErrorKind::Serialization, format!("blob '{name}' is not UTF-8"))
                .with_detail(e.to_string())
        })?;
        self.codec.decode(&text).map(Some)
    }

    /// Store `value` under `name`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the value cannot be encoded, or the backend's error
    pub fn add_or_replace(&self, value: &T, name: &str) -> StorageResult<()> {
        let text = self.codec.encode(value)?;
        self.client
            .upload(&normalize_name(name), text.as_bytes(), &self.content_type)
    }

    /// Store `value` under `name` only if nothing is stored there yet.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken, otherwise as
    /// [`ObjectContainer::add_or_replace`]
    pub fn add(&self, value: &T, name: &str) -> StorageResult<()> {
        let name = normalize_name(name);
        if self.client.exists(&name)? {
            return Err(StorageError::new(
                ErrorKind::AlreadyExists,
                format!("Blob [{name}] cannot be added because the name already exists"),
            ));
        }
        self.add_or_replace(value, &name)
    }

    /// Delete an object. Deleting a missing object is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the backend's error
    pub fn delete(&self, name: &str) -> StorageResult<()> {
        self.client.delete(&normalize_name(name))
    }

    /// Last modification time of an object. Objects the backend reports
    /// without a timestamp yield [`DateTime::UNIX_EPOCH`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object does not exist, otherwise the backend's error
    pub fn last_modified(&self, name: &str) -> StorageResult<DateTime<Utc>> {
        let name = normalize_name(name);
        self.require_exists(&name)?;
        let properties = self.client.fetch_properties(&name)?;
        Ok(properties.last_modified.unwrap_or(DateTime::UNIX_EPOCH))
    }

    /// Stored size of an object in bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object does not exist, otherwise the backend's error
    pub fn size(&self, name: &str) -> StorageResult<u64> {
        let name = normalize_name(name);
        self.require_exists(&name)?;
        Ok(self.client.fetch_properties(&name)?.length)
    }

    /// # Errors
    ///
    /// Returns the backend's error
    pub fn list_names(&self) -> StorageResult<Vec<String>> {
        self.client.list_all()
    }

    fn require_exists(&self, name: &str) -> StorageResult<()> {
        if self.client.exists(name)? {
            Ok(())
        } else {
            Err(StorageError::new(
                ErrorKind::NotFound,
                format!("The blob [{name}] does not exist"),
            ))
        }
    }
}
