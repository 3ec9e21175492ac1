//! Typed access to a partitioned key-value table.
//!
//! [`Table`] wraps a [`TableClient`] and adds typed single-entity writes,
//! bulk writes split by [`partition`], and simple key-based queries.
//!
//! ## Bulk writes
//!
//! `insert_all`, `insert_or_merge_all`, `insert_or_replace_all` and
//! `delete_all` accept any number of entities across any number of partitions.
//! Each call turns into `ceil(n_p / MAX_BATCH_SIZE)` atomic batches per
//! partition `p`. Atomicity holds per batch only: when a later batch fails,
//! earlier batches have already been committed and are not rolled back.
//!
//! ```
//! use ironstore::testing::entities_in_partition;
//! use ironstore::{FakeStorageAccount, Table};
//!
//! # fn main() -> ironstore::StorageResult<()> {
//! let account = FakeStorageAccount::new();
//! let table = Table::new(account.table_client("customers"))?;
//!
//! let summary = table.insert_all(&entities_in_partition("eu", 150))?;
//! assert_eq!(summary.batches, 2);
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod partition;

pub use entity::TableEntity;
pub use partition::{
    Batch, BulkSummary, MAX_BATCH_SIZE, PartitionGroup, execute_batches, group_by_partition,
    plan_batches, validate_batch,
};

use crate::backend::traits::{
    EntityRecord, StorageResult, TableClient, TableOperation, TableQuery,
};
use crate::config::StorageConfig;
use crate::retry::RetryPolicy;
use crate::validation::{require_non_empty, validate_table_name};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

pub struct Table<T, C> {
    client: C,
    _t: PhantomData<fn() -> T>,
}

impl<T: TableEntity, C: TableClient> Table<T, C> {
    /// Open a table with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid table name, or any error from
    /// creating the table
    pub fn new(client: C) -> StorageResult<Self> {
        Self::with_config(client, &StorageConfig::default())
    }

    /// Open a table: validate its name, install the configured retry policy
    /// and create the table if it is missing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid table name, or any error from
    /// creating the table
    pub fn with_config(client: C, config: &StorageConfig) -> StorageResult<Self> {
        validate_table_name(client.table_name())?;
        client.set_retry_policy(config.retry.build());
        client.create_if_not_exists()?;
        debug!(table = client.table_name(), "opened table");
        Ok(Self {
            client,
            _t: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.client.table_name()
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    pub fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>) {
        self.client.set_retry_policy(policy);
    }

    // ------------------------------------------------------------------------
    // Single entity
    // ------------------------------------------------------------------------

    /// Apply `operation` to one entity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for invalid keys, otherwise the backend's error
    pub fn execute(&self, operation: TableOperation, entity: &T) -> StorageResult<()> {
        let record = EntityRecord::from_entity(entity)?;
        self.client.execute(operation, record)
    }

    /// Insert a new entity.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the key pair is taken
    pub fn insert(&self, entity: &T) -> StorageResult<()> {
        self.execute(TableOperation::Insert, entity)
    }

    /// Insert the entity, or merge its properties into the stored one.
    ///
    /// # Errors
    ///
    /// Returns the backend's error
    pub fn insert_or_merge(&self, entity: &T) -> StorageResult<()> {
        self.execute(TableOperation::InsertOrMerge, entity)
    }

    /// Insert the entity, or replace the stored one entirely.
    ///
    /// # Errors
    ///
    /// Returns the backend's error
    pub fn insert_or_replace(&self, entity: &T) -> StorageResult<()> {
        self.execute(TableOperation::InsertOrReplace, entity)
    }

    /// Delete the entity with the same key pair.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such entity is stored
    pub fn delete(&self, entity: &T) -> StorageResult<()> {
        self.execute(TableOperation::Delete, entity)
    }

    // ------------------------------------------------------------------------
    // Bulk
    // ------------------------------------------------------------------------

    /// Apply `operation` to every entity, split into valid batches.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty input or an invalid key (before any
    /// backend call), or the first failing batch's error
    pub fn bulk(&self, operation: TableOperation, entities: &[T]) -> StorageResult<BulkSummary> {
        let batches = plan_batches(entities)?;
        execute_batches(&self.client, operation, batches)
    }

    /// # Errors
    ///
    /// See [`Table::bulk`]
    pub fn insert_all(&self, entities: &[T]) -> StorageResult<BulkSummary> {
        self.bulk(TableOperation::Insert, entities)
    }

    /// # Errors
    ///
    /// See [`Table::bulk`]
    pub fn insert_or_merge_all(&self, entities: &[T]) -> StorageResult<BulkSummary> {
        self.bulk(TableOperation::InsertOrMerge, entities)
    }

    /// # Errors
    ///
    /// See [`Table::bulk`]
    pub fn insert_or_replace_all(&self, entities: &[T]) -> StorageResult<BulkSummary> {
        self.bulk(TableOperation::InsertOrReplace, entities)
    }

    /// # Errors
    ///
    /// See [`Table::bulk`]
    pub fn delete_all(&self, entities: &[T]) -> StorageResult<BulkSummary> {
        self.bulk(TableOperation::Delete, entities)
    }

    /// Send `entities` as exactly one atomic batch.
    ///
    /// The caller is responsible for the grouping: every entity must share one
    /// partition key and there may be at most [`MAX_BATCH_SIZE`] of them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the batch is empty, oversized, mixes
    /// partitions or holds an invalid key; nothing is sent in that case
    pub fn execute_batch(&self, operation: TableOperation, entities: &[T]) -> StorageResult<()> {
        require_non_empty(entities, "batch operation")?;
        let records = entities
            .iter()
            .map(EntityRecord::from_entity)
            .collect::<StorageResult<Vec<_>>>()?;
        validate_batch(&records)?;
        self.client.execute_batch(operation, records)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Entities matching `query`, ordered by partition key then row key.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or `Serialization` if a stored entity
    /// does not decode into `T`
    pub fn query(&self, query: &TableQuery) -> StorageResult<Vec<T>> {
        self.client
            .query(query)?
            .into_iter()
            .map(EntityRecord::into_entity)
            .collect()
    }

    /// # Errors
    ///
    /// See [`Table::query`]
    pub fn query_all(&self) -> StorageResult<Vec<T>> {
        self.query(&TableQuery::new())
    }

    /// # Errors
    ///
    /// See [`Table::query`]
    pub fn query_partition(&self, partition_key: &str) -> StorageResult<Vec<T>> {
        self.query(&TableQuery::new().partition_key(partition_key))
    }

    /// Point lookup; `None` when the entity does not exist.
    ///
    /// # Errors
    ///
    /// See [`Table::query`]
    pub fn retrieve(&self, partition_key: &str, row_key: &str) -> StorageResult<Option<T>> {
        let query = TableQuery::new()
            .partition_key(partition_key)
            .row_key(row_key)
            .take(1);
        Ok(self.query(&query)?.into_iter().next())
    }
}
