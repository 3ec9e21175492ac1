//! Core traits for the storage backend.
//!
//! These traits are the narrow boundary between the typed wrappers in this
//! crate and whatever actually talks to the storage service. All calls are
//! blocking; implementations that sit on an async SDK are expected to block
//! internally.

use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Core Error Type
// ============================================================================

/// Error type shared by every storage operation.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct StorageError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input rejected before any backend call was made.
    InvalidInput,
    NotFound,
    AlreadyExists,
    Serialization,
    Authentication,
    Authorization,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    Other,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Shorthand for a precondition violation.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn is_precondition(&self) -> bool {
        self.kind == ErrorKind::InvalidInput
    }

    /// Whether a retry policy may consider retrying this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::ServiceUnavailable
                | ErrorKind::RateLimited
        )
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// BlobClient - Object Storage
// ============================================================================

/// Properties fetched for a single blob without downloading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    pub length: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Client bound to one blob container.
pub trait BlobClient: Send + Sync {
    /// Name of the container this client is bound to.
    ///
    /// Implementations must bind to the lower-cased form of the name they
    /// were given (see [`resource_name`](crate::config::resource_name)); the
    /// wrappers validate this value as-is.
    fn container_name(&self) -> &str;

    /// Create the container unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the creation request
    fn create_if_not_exists(&self) -> StorageResult<()>;

    /// Install the retry policy used for every request made through this client.
    fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>);

    /// Check if a blob exists
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unreachable
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Upload bytes, replacing any blob with the same name
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails
    fn upload(&self, name: &str, data: &[u8], content_type: &str) -> StorageResult<()>;

    /// Download a blob; `None` when it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails for any reason other than absence
    fn download(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Delete a blob if it exists
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails
    fn delete(&self, name: &str) -> StorageResult<()>;

    /// Fetch blob properties
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the blob does not exist, or any backend failure
    fn fetch_properties(&self, name: &str) -> StorageResult<BlobProperties>;

    /// List the names of every blob in the container
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails
    fn list_all(&self) -> StorageResult<Vec<String>>;
}

// ============================================================================
// QueueClient - Message Queues
// ============================================================================

/// A message as the backend hands it out: serialized payload plus lease data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub pop_receipt: String,
    pub content: String,
    pub dequeue_count: u32,
    pub insertion_time: Option<DateTime<Utc>>,
}

/// Client bound to one queue.
pub trait QueueClient: Send + Sync {
    /// Name of the queue, lower-cased like [`BlobClient::container_name`].
    fn queue_name(&self) -> &str;

    /// Create the queue unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the creation request
    fn create_if_not_exists(&self) -> StorageResult<()>;

    fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>);

    /// Enqueue one serialized payload
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent
    fn enqueue(&self, content: &str) -> StorageResult<()>;

    /// Lease the next visible message, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails
    fn fetch_one(&self, visibility_timeout: Duration) -> StorageResult<Option<RawMessage>>;

    /// Lease up to `count` visible messages. `count` never exceeds
    /// [`crate::queue::MAX_MESSAGES_PER_REQUEST`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or `count` is out of range
    fn fetch_many(&self, count: usize, visibility_timeout: Duration)
    -> StorageResult<Vec<RawMessage>>;

    /// Delete a leased message
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt is stale or the request fails
    fn delete_leased(&self, id: &str, pop_receipt: &str) -> StorageResult<()>;

    /// Replace the payload of a leased message and reset its visibility
    /// timeout in a single request. Returns the refreshed pop receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt is stale or the request fails
    fn update_leased(
        &self,
        id: &str,
        pop_receipt: &str,
        content: &str,
        visibility_timeout: Duration,
    ) -> StorageResult<String>;

    /// Approximate number of messages in the queue, leased ones included
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails
    fn approximate_count(&self) -> StorageResult<usize>;

    /// Remove every message
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails
    fn clear(&self) -> StorageResult<()>;
}

// ============================================================================
// TableClient - Partitioned Key-Value Tables
// ============================================================================

/// Kind of write applied to a table entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOperation {
    Insert,
    InsertOrMerge,
    InsertOrReplace,
    Delete,
}

/// Wire form of a table entity: both keys plus an open property map.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub partition_key: String,
    pub row_key: String,
    pub properties: Map<String, Value>,
}

/// Filter understood by [`TableClient::query`]. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    pub partition_key: Option<String>,
    pub row_key: Option<String>,
    pub take: Option<usize>,
}

impl TableQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    #[must_use]
    pub fn row_key(mut self, row_key: impl Into<String>) -> Self {
        self.row_key = Some(row_key.into());
        self
    }

    #[must_use]
    pub const fn take(mut self, n: usize) -> Self {
        self.take = Some(n);
        self
    }

    #[must_use]
    pub fn matches(&self, record: &EntityRecord) -> bool {
        self.partition_key
            .as_deref()
            .is_none_or(|pk| pk == record.partition_key)
            && self.row_key.as_deref().is_none_or(|rk| rk == record.row_key)
    }
}

/// Client bound to one table.
pub trait TableClient: Send + Sync {
    /// Name of the table, lower-cased like [`BlobClient::container_name`].
    fn table_name(&self) -> &str;

    /// Create the table unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the creation request
    fn create_if_not_exists(&self) -> StorageResult<()>;

    fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>);

    /// Apply one operation to one entity
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` for an insert over an existing key, `NotFound`
    /// for a delete of a missing key, or any backend failure
    fn execute(&self, operation: TableOperation, entity: EntityRecord) -> StorageResult<()>;

    /// Apply one operation to every entity as a single atomic batch. All
    /// entities share one partition key and there are at most
    /// [`crate::table::MAX_BATCH_SIZE`] of them.
    ///
    /// # Errors
    ///
    /// Returns an error if any entity in the batch fails; nothing is applied then
    fn execute_batch(
        &self,
        operation: TableOperation,
        entities: Vec<EntityRecord>,
    ) -> StorageResult<()>;

    /// Return matching entities ordered by partition key, then row key
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    fn query(&self, query: &TableQuery) -> StorageResult<Vec<EntityRecord>>;
}
