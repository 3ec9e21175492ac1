//! # Ironstore
//!
//! Typed, provider-aware wrappers over a hosted storage account.
//!
//! The crate sits between application code and three storage services:
//!
//! - **Tables** ([`Table`]): partitioned key-value entities. Bulk writes of any
//!   size are split into the service's atomic batches automatically.
//! - **Queues** ([`Queue`]): leased messages. Large fetches are issued in
//!   rounds that respect the per-request cap.
//! - **Objects** ([`ObjectContainer`]): one serialized value per blob name.
//!
//! Every wrapper is generic over a backend client trait from [`backend`].
//! [`FakeStorageAccount`] provides in-memory clients for tests.
//!
//! ## Quick Start
//!
//! ```
//! use ironstore::{FakeStorageAccount, ObjectContainer, Queue, Table};
//! use ironstore::testing::{SampleDocument, entities_in_partition};
//!
//! # fn main() -> ironstore::StorageResult<()> {
//! let account = FakeStorageAccount::new();
//!
//! let table = Table::new(account.table_client("products"))?;
//! let summary = table.insert_all(&entities_in_partition("books", 250))?;
//! assert_eq!(summary.batches, 3);
//!
//! let queue: Queue<u32, _> = Queue::new(account.queue_client("orders"))?;
//! queue.add_message(&7)?;
//! let message = queue.get_message()?.expect("one message queued");
//! queue.delete_message(&message)?;
//!
//! let docs = ObjectContainer::new(account.blob_client("documents"))?;
//! docs.add_or_replace(&SampleDocument::new("Q1", "numbers"), "reports/q1")?;
//! assert!(docs.exists("reportsq1")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Provider limits
//!
//! [`MAX_BATCH_SIZE`] and [`MAX_MESSAGES_PER_REQUEST`] are fixed by the
//! service and are not configurable. Everything else lives in
//! [`StorageConfig`].
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

pub mod backend;
pub mod blob;
pub mod codec;
pub mod config;
pub mod queue;
pub mod retry;
pub mod table;
pub mod testing;
pub mod validation;

pub use backend::{
    BlobClient, BlobProperties, EntityRecord, ErrorKind, FakeBlobClient, FakeQueueClient,
    FakeStorageAccount, FakeTableClient, QueueClient, RawMessage, RecordedBatch, StorageError,
    StorageResult, TableClient, TableOperation, TableQuery,
};
pub use blob::{ObjectContainer, normalize_name};
pub use codec::{Codec, JsonCodec};
pub use config::{StorageConfig, default_resource_name, resource_name};
pub use queue::{Lease, MAX_MESSAGES_PER_REQUEST, Queue, QueueMessage};
pub use retry::{ExponentialRetry, LinearRetry, NoRetry, RetryMode, RetryPolicy, RetrySettings};
pub use table::{BulkSummary, MAX_BATCH_SIZE, Table, TableEntity};
