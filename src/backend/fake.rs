//! Fake implementations for testing.
//!
//! These implementations keep all state in memory. They also enforce the
//! provider limits the real service enforces: batch size, a single partition
//! per batch, and messages per fetch. Every client records the calls made
//! through it so tests can assert on the exact request pattern. Failures can
//! be injected into specific batch or fetch calls.
//!
//! Clients obtained from the same [`FakeStorageAccount`] under the same name
//! share state, the way two handles to one real resource would.

use crate::backend::traits::{
    BlobClient, BlobProperties, EntityRecord, ErrorKind, QueueClient, RawMessage, StorageError,
    StorageResult, TableClient, TableOperation, TableQuery,
};
use crate::config::{default_resource_name, resource_name};
use crate::queue::MAX_MESSAGES_PER_REQUEST;
use crate::retry::RetryPolicy;
use crate::table::MAX_BATCH_SIZE;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Shared<T> = Arc<Mutex<T>>;
type RetrySlot = Shared<Option<Arc<dyn RetryPolicy>>>;

fn missing(kind: &str, name: &str) -> StorageError {
    StorageError::new(ErrorKind::NotFound, format!("The specified {kind} '{name}' does not exist"))
}

// ============================================================================
// FakeStorageAccount
// ============================================================================

/// Entry point that hands out fake clients bound to named resources.
#[derive(Clone, Default)]
pub struct FakeStorageAccount {
    containers: Shared<HashMap<String, Shared<ContainerState>>>,
    queues: Shared<HashMap<String, Shared<QueueState>>>,
    tables: Shared<HashMap<String, Shared<TableState>>>,
}

impl FakeStorageAccount {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A blob client for the container `name` (lower-cased).
    ///
    /// # Panics
    ///
    /// Panics if the account mutex is poisoned.
    #[must_use]
    pub fn blob_client(&self, name: &str) -> FakeBlobClient {
        let name = resource_name(name);
        let state = self
            .containers
            .lock()
            .expect("containers mutex poisoned")
            .entry(name.clone())
            .or_default()
            .clone();
        FakeBlobClient {
            name,
            state,
            retry: RetrySlot::default(),
        }
    }

    /// A queue client for the queue `name` (lower-cased).
    ///
    /// # Panics
    ///
    /// Panics if the account mutex is poisoned.
    #[must_use]
    pub fn queue_client(&self, name: &str) -> FakeQueueClient {
        let name = resource_name(name);
        let state = self
            .queues
            .lock()
            .expect("queues mutex poisoned")
            .entry(name.clone())
            .or_default()
            .clone();
        FakeQueueClient {
            name,
            state,
            retry: RetrySlot::default(),
        }
    }

    /// A table client for the table `name` (lower-cased).
    ///
    /// # Panics
    ///
    /// Panics if the account mutex is poisoned.
    #[must_use]
    pub fn table_client(&self, name: &str) -> FakeTableClient {
        let name = resource_name(name);
        let state = self
            .tables
            .lock()
            .expect("tables mutex poisoned")
            .entry(name.clone())
            .or_default()
            .clone();
        FakeTableClient {
            name,
            state,
            retry: RetrySlot::default(),
        }
    }

    /// A blob client for the container named after `T`.
    #[must_use]
    pub fn blob_client_for<T: ?Sized>(&self) -> FakeBlobClient {
        self.blob_client(&default_resource_name::<T>())
    }

    /// A queue client for the queue named after `T`.
    #[must_use]
    pub fn queue_client_for<T: ?Sized>(&self) -> FakeQueueClient {
        self.queue_client(&default_resource_name::<T>())
    }

    /// A table client for the table named after `T`.
    #[must_use]
    pub fn table_client_for<T: ?Sized>(&self) -> FakeTableClient {
        self.table_client(&default_resource_name::<T>())
    }
}

// ============================================================================
// FakeBlobClient
// ============================================================================

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    content_type: String,
    last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct ContainerState {
    created: bool,
    blobs: BTreeMap<String, StoredBlob>,
}

#[derive(Clone)]
pub struct FakeBlobClient {
    name: String,
    state: Shared<ContainerState>,
    retry: RetrySlot,
}

impl FakeBlobClient {
    fn with_container<R>(&self, f: impl FnOnce(&mut ContainerState) -> R) -> StorageResult<R> {
        let mut state = self.state.lock().expect("container mutex poisoned");
        if !state.created {
            return Err(missing("container", &self.name));
        }
        Ok(f(&mut *state))
    }

    /// The retry policy most recently installed on this client.
    ///
    /// # Panics
    ///
    /// Panics if the retry mutex is poisoned.
    #[must_use]
    pub fn retry_policy(&self) -> Option<Arc<dyn RetryPolicy>> {
        self.retry.lock().expect("retry mutex poisoned").clone()
    }

    /// Content type recorded for a stored blob.
    ///
    /// # Panics
    ///
    /// Panics if the container mutex is poisoned.
    #[must_use]
    pub fn content_type_of(&self, name: &str) -> Option<String> {
        let state = self.state.lock().expect("container mutex poisoned");
        state.blobs.get(name).map(|b| b.content_type.clone())
    }
}

impl BlobClient for FakeBlobClient {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn create_if_not_exists(&self) -> StorageResult<()> {
        self.state.lock().expect("container mutex poisoned").created = true;
        Ok(())
    }

    fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>) {
        *self.retry.lock().expect("retry mutex poisoned") = Some(policy);
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        self.with_container(|c| c.blobs.contains_key(name))
    }

    fn upload(&self, name: &str, data: &[u8], content_type: &str) -> StorageResult<()> {
        self.with_container(|c| {
            c.blobs.insert(
                name.to_string(),
                StoredBlob {
                    data: data.to_vec(),
                    content_type: content_type.to_string(),
                    last_modified: Utc::now(),
                },
            );
        })
    }

    fn download(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        self.with_container(|c| c.blobs.get(name).map(|b| b.data.clone()))
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.with_container(|c| {
            c.blobs.remove(name);
        })
    }

    fn fetch_properties(&self, name: &str) -> StorageResult<BlobProperties> {
        self.with_container(|c| {
            c.blobs.get(name).map(|b| BlobProperties {
                length: b.data.len() as u64,
                content_type: Some(b.content_type.clone()),
                last_modified: Some(b.last_modified),
            })
        })?
        .ok_or_else(|| missing("blob", name))
    }

    fn list_all(&self) -> StorageResult<Vec<String>> {
        self.with_container(|c| c.blobs.keys().cloned().collect())
    }
}

// ============================================================================
// FakeQueueClient
// ============================================================================

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    content: String,
    pop_receipt: Option<String>,
    visible_at: Instant,
    dequeue_count: u32,
    insertion_time: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
    created: bool,
    messages: VecDeque<StoredMessage>,
    next_id: u64,
    next_receipt: u64,
    fetch_requests: Vec<usize>,
    fetch_failures: HashMap<usize, StorageError>,
}

impl QueueState {
    fn lease_visible(&mut self, count: usize, visibility_timeout: Duration) -> Vec<RawMessage> {
        let now = Instant::now();
        let mut leased = Vec::new();
        for message in &mut self.messages {
            if leased.len() == count {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            self.next_receipt += 1;
            let receipt = format!("receipt-{}", self.next_receipt);
            message.pop_receipt = Some(receipt.clone());
            message.visible_at = now + visibility_timeout;
            message.dequeue_count += 1;
            leased.push(RawMessage {
                id: message.id.clone(),
                pop_receipt: receipt,
                content: message.content.clone(),
                dequeue_count: message.dequeue_count,
                insertion_time: Some(message.insertion_time),
            });
        }
        leased
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }
}

#[derive(Clone)]
pub struct FakeQueueClient {
    name: String,
    state: Shared<QueueState>,
    retry: RetrySlot,
}

impl FakeQueueClient {
    fn with_queue<R>(&self, f: impl FnOnce(&mut QueueState) -> StorageResult<R>) -> StorageResult<R> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        if !state.created {
            return Err(missing("queue", &self.name));
        }
        f(&mut *state)
    }

    /// Make the `call`-th `fetch_many` request (0-based, counted over the
    /// client's lifetime) fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    pub fn fail_fetch_call(&self, call: usize, error: StorageError) {
        self.state
            .lock()
            .expect("queue mutex poisoned")
            .fetch_failures
            .insert(call, error);
    }

    /// Sizes requested by every `fetch_many` call so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    #[must_use]
    pub fn fetch_requests(&self) -> Vec<usize> {
        self.state
            .lock()
            .expect("queue mutex poisoned")
            .fetch_requests
            .clone()
    }

    /// Number of messages that are currently visible.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().expect("queue mutex poisoned");
        state.messages.iter().filter(|m| m.visible_at <= now).count()
    }

    /// The retry policy most recently installed on this client.
    ///
    /// # Panics
    ///
    /// Panics if the retry mutex is poisoned.
    #[must_use]
    pub fn retry_policy(&self) -> Option<Arc<dyn RetryPolicy>> {
        self.retry.lock().expect("retry mutex poisoned").clone()
    }
}

impl QueueClient for FakeQueueClient {
    fn queue_name(&self) -> &str {
        &self.name
    }

    fn create_if_not_exists(&self) -> StorageResult<()> {
        self.state.lock().expect("queue mutex poisoned").created = true;
        Ok(())
    }

    fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>) {
        *self.retry.lock().expect("retry mutex poisoned") = Some(policy);
    }

    fn enqueue(&self, content: &str) -> StorageResult<()> {
        self.with_queue(|q| {
            q.next_id += 1;
            let message = StoredMessage {
                id: format!("msg-{}", q.next_id),
                content: content.to_string(),
                pop_receipt: None,
                visible_at: Instant::now(),
                dequeue_count: 0,
                insertion_time: Utc::now(),
            };
            q.messages.push_back(message);
            Ok(())
        })
    }

    fn fetch_one(&self, visibility_timeout: Duration) -> StorageResult<Option<RawMessage>> {
        self.with_queue(|q| Ok(q.lease_visible(1, visibility_timeout).pop()))
    }

    fn fetch_many(
        &self,
        count: usize,
        visibility_timeout: Duration,
    ) -> StorageResult<Vec<RawMessage>> {
        self.with_queue(|q| {
            let call = q.fetch_requests.len();
            q.fetch_requests.push(count);
            if count == 0 || count > MAX_MESSAGES_PER_REQUEST {
                return Err(StorageError::new(
                    ErrorKind::InvalidInput,
                    format!("Value for one of the query parameters is out of range: numofmessages={count}"),
                ));
            }
            if let Some(err) = q.fetch_failures.remove(&call) {
                return Err(err);
            }
            Ok(q.lease_visible(count, visibility_timeout))
        })
    }

    fn delete_leased(&self, id: &str, pop_receipt: &str) -> StorageResult<()> {
        self.with_queue(|q| {
            let Some(pos) = q.position_of(id) else {
                return Ok(());
            };
            if q.messages[pos].pop_receipt.as_deref() != Some(pop_receipt) {
                return Err(StorageError::new(
                    ErrorKind::NotFound,
                    format!("Pop receipt for message {id} does not match"),
                ));
            }
            q.messages.remove(pos);
            Ok(())
        })
    }

    fn update_leased(
        &self,
        id: &str,
        pop_receipt: &str,
        content: &str,
        visibility_timeout: Duration,
    ) -> StorageResult<String> {
        self.with_queue(|q| {
            let pos = q
                .position_of(id)
                .ok_or_else(|| missing("message", id))?;
            if q.messages[pos].pop_receipt.as_deref() != Some(pop_receipt) {
                return Err(StorageError::new(
                    ErrorKind::NotFound,
                    format!("Pop receipt for message {id} does not match"),
                ));
            }
            q.next_receipt += 1;
            let receipt = format!("receipt-{}", q.next_receipt);
            let message = &mut q.messages[pos];
            message.content = content.to_string();
            message.pop_receipt = Some(receipt.clone());
            message.visible_at = Instant::now() + visibility_timeout;
            Ok(receipt)
        })
    }

    fn approximate_count(&self) -> StorageResult<usize> {
        self.with_queue(|q| Ok(q.messages.len()))
    }

    fn clear(&self) -> StorageResult<()> {
        self.with_queue(|q| {
            q.messages.clear();
            Ok(())
        })
    }
}

// ============================================================================
// FakeTableClient
// ============================================================================

/// One `execute_batch` call as the fake received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    pub operation: TableOperation,
    pub partition_keys: BTreeSet<String>,
    pub row_keys: Vec<String>,
    pub succeeded: bool,
}

impl RecordedBatch {
    #[must_use]
    pub fn size(&self) -> usize {
        self.row_keys.len()
    }
}

type EntityKey = (String, String);

#[derive(Default)]
struct TableState {
    created: bool,
    entities: BTreeMap<EntityKey, EntityRecord>,
    single_calls: usize,
    batches: Vec<RecordedBatch>,
    batch_failures: HashMap<usize, StorageError>,
}

fn apply(
    entities: &mut BTreeMap<EntityKey, EntityRecord>,
    operation: TableOperation,
    record: EntityRecord,
) -> StorageResult<()> {
    let key = (record.partition_key.clone(), record.row_key.clone());
    match operation {
        TableOperation::Insert => {
            if entities.contains_key(&key) {
                return Err(StorageError::new(
                    ErrorKind::AlreadyExists,
                    format!("The specified entity ({}, {}) already exists", key.0, key.1),
                ));
            }
            entities.insert(key, record);
        }
        TableOperation::InsertOrReplace => {
            entities.insert(key, record);
        }
        TableOperation::InsertOrMerge => match entities.get_mut(&key) {
            Some(stored) => stored.properties.extend(record.properties),
            None => {
                entities.insert(key, record);
            }
        },
        TableOperation::Delete => {
            if entities.remove(&key).is_none() {
                return Err(StorageError::new(
                    ErrorKind::NotFound,
                    format!("The specified entity ({}, {}) does not exist", key.0, key.1),
                ));
            }
        }
    }
    Ok(())
}

fn check_batch_shape(records: &[EntityRecord]) -> StorageResult<()> {
    let rejected = |why: String| {
        Err(StorageError::new(
            ErrorKind::InvalidInput,
            format!("The batch request was rejected: {why}"),
        ))
    };
    if records.is_empty() || records.len() > MAX_BATCH_SIZE {
        return rejected(format!("{} operations", records.len()));
    }
    let partitions: BTreeSet<&str> = records.iter().map(|r| r.partition_key.as_str()).collect();
    if partitions.len() > 1 {
        return rejected(format!("{} partition keys", partitions.len()));
    }
    let mut rows = BTreeSet::new();
    if let Some(dup) = records.iter().find(|r| !rows.insert(r.row_key.as_str())) {
        return rejected(format!("row key '{}' appears more than once", dup.row_key));
    }
    Ok(())
}

#[derive(Clone)]
pub struct FakeTableClient {
    name: String,
    state: Shared<TableState>,
    retry: RetrySlot,
}

impl FakeTableClient {
    fn with_table<R>(&self, f: impl FnOnce(&mut TableState) -> StorageResult<R>) -> StorageResult<R> {
        let mut state = self.state.lock().expect("table mutex poisoned");
        if !state.created {
            return Err(missing("table", &self.name));
        }
        f(&mut *state)
    }

    /// Make the `call`-th `execute_batch` request (0-based, counted over the
    /// client's lifetime) fail with `error` without applying anything.
    ///
    /// # Panics
    ///
    /// Panics if the table mutex is poisoned.
    pub fn fail_batch_call(&self, call: usize, error: StorageError) {
        self.state
            .lock()
            .expect("table mutex poisoned")
            .batch_failures
            .insert(call, error);
    }

    /// Every `execute_batch` call received so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the table mutex is poisoned.
    #[must_use]
    pub fn batch_calls(&self) -> Vec<RecordedBatch> {
        self.state.lock().expect("table mutex poisoned").batches.clone()
    }

    /// Number of single-entity `execute` calls received so far.
    ///
    /// # Panics
    ///
    /// Panics if the table mutex is poisoned.
    #[must_use]
    pub fn single_calls(&self) -> usize {
        self.state.lock().expect("table mutex poisoned").single_calls
    }

    /// Number of stored entities.
    ///
    /// # Panics
    ///
    /// Panics if the table mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("table mutex poisoned").entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The retry policy most recently installed on this client.
    ///
    /// # Panics
    ///
    /// Panics if the retry mutex is poisoned.
    #[must_use]
    pub fn retry_policy(&self) -> Option<Arc<dyn RetryPolicy>> {
        self.retry.lock().expect("retry mutex poisoned").clone()
    }
}

impl TableClient for FakeTableClient {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn create_if_not_exists(&self) -> StorageResult<()> {
        self.state.lock().expect("table mutex poisoned").created = true;
        Ok(())
    }

    fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>) {
        *self.retry.lock().expect("retry mutex poisoned") = Some(policy);
    }

    fn execute(&self, operation: TableOperation, entity: EntityRecord) -> StorageResult<()> {
        self.with_table(|t| {
            t.single_calls += 1;
            apply(&mut t.entities, operation, entity)
        })
    }

    fn execute_batch(
        &self,
        operation: TableOperation,
        entities: Vec<EntityRecord>,
    ) -> StorageResult<()> {
        self.with_table(|t| {
            let call = t.batches.len();
            let mut recorded = RecordedBatch {
                operation,
                partition_keys: entities.iter().map(|e| e.partition_key.clone()).collect(),
                row_keys: entities.iter().map(|e| e.row_key.clone()).collect(),
                succeeded: false,
            };

            let outcome = check_batch_shape(&entities).and_then(|()| {
                if let Some(err) = t.batch_failures.remove(&call) {
                    return Err(err);
                }
                // Stage on a copy so a failing entity leaves the table untouched
                let mut staged = t.entities.clone();
                for entity in entities {
                    apply(&mut staged, operation, entity)?;
                }
                t.entities = staged;
                Ok(())
            });

            recorded.succeeded = outcome.is_ok();
            t.batches.push(recorded);
            outcome
        })
    }

    fn query(&self, query: &TableQuery) -> StorageResult<Vec<EntityRecord>> {
        self.with_table(|t| {
            let matching = t.entities.values().filter(|r| query.matches(r)).cloned();
            Ok(match query.take {
                Some(n) => matching.take(n).collect(),
                None => matching.collect(),
            })
        })
    }
}
