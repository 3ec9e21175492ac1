//! Typed access to a message queue.
//!
//! A [`QueueMessage`] starts out *unbound*: it has a body and no lease. It can
//! be sent with [`Queue::add_message`]. Messages returned by
//! [`Queue::get_message`] or [`Queue::get_messages`] are *leased*. They carry a
//! [`Lease`] (message id plus pop receipt) and stay invisible to other
//! consumers for the queue's visibility timeout. Only a leased message can be
//! passed to [`Queue::delete_message`] or [`Queue::update_message`]. The
//! message does not remember which queue it came from; the caller passes the
//! queue handle explicitly.
//!
//! ```
//! use ironstore::{FakeStorageAccount, Queue};
//!
//! # fn main() -> ironstore::StorageResult<()> {
//! let account = FakeStorageAccount::new();
//! let queue: Queue<String, _> = Queue::new(account.queue_client("jobs"))?;
//!
//! for i in 0..50 {
//!     queue.add_message(&format!("job-{i}"))?;
//! }
//! let leased = queue.get_messages(40)?;
//! assert_eq!(leased.len(), 40);
//! for message in &leased {
//!     queue.delete_message(message)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod retrieve;

pub use retrieve::{MAX_MESSAGES_PER_REQUEST, Rounds, fetch_in_rounds, plan_rounds};

use crate::backend::traits::{QueueClient, RawMessage, StorageError, StorageResult};
use crate::codec::{Codec, JsonCodec};
use crate::config::StorageConfig;
use crate::retry::RetryPolicy;
use crate::validation::validate_queue_name;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Backend handle proving the holder currently leases a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub message_id: String,
    pub pop_receipt: String,
    pub dequeue_count: u32,
    pub insertion_time: Option<DateTime<Utc>>,
}

/// A queue payload plus its lease, when it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage<T> {
    pub body: T,
    lease: Option<Lease>,
}

impl<T> QueueMessage<T> {
    /// An unbound message, ready to be sent.
    pub const fn new(body: T) -> Self {
        Self { body, lease: None }
    }

    pub const fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    pub const fn is_leased(&self) -> bool {
        self.lease.is_some()
    }

    pub fn into_body(self) -> T {
        self.body
    }

    fn require_lease(&self) -> StorageResult<&Lease> {
        self.lease.as_ref().ok_or_else(|| {
            StorageError::invalid_input(
                "Message has no lease; only messages returned by a fetch can be deleted or updated",
            )
        })
    }
}

impl<T> From<T> for QueueMessage<T> {
    fn from(body: T) -> Self {
        Self::new(body)
    }
}

pub struct Queue<T, C, K = JsonCodec> {
    client: C,
    codec: K,
    visibility_timeout: Duration,
    _t: PhantomData<fn() -> T>,
}

impl<T, C> Queue<T, C>
where
    T: Serialize + DeserializeOwned,
    C: QueueClient,
{
    /// Open a queue with the default configuration and JSON payloads.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid queue name, or any error from
    /// creating the queue
    pub fn new(client: C) -> StorageResult<Self> {
        Self::with_config(client, &StorageConfig::default())
    }

    /// # Errors
    ///
    /// See [`Queue::new`]
    pub fn with_config(client: C, config: &StorageConfig) -> StorageResult<Self> {
        Self::with_codec(client, config, JsonCodec)
    }
}

impl<T, C, K> Queue<T, C, K>
where
    T: Serialize + DeserializeOwned,
    C: QueueClient,
    K: Codec,
{
    /// Open a queue: validate its name, install the configured retry policy
    /// and create the queue if it is missing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid queue name, or any error from
    /// creating the queue
    pub fn with_codec(client: C, config: &StorageConfig, codec: K) -> StorageResult<Self> {
        validate_queue_name(client.queue_name())?;
        client.set_retry_policy(config.retry.build());
        client.create_if_not_exists()?;
        debug!(
            queue = client.queue_name(),
            visibility_timeout_secs = config.visibility_timeout_secs,
            "opened queue"
        );
        Ok(Self {
            client,
            codec,
            visibility_timeout: config.visibility_timeout(),
            _t: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.client.queue_name()
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    pub const fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    pub fn set_retry_policy(&self, policy: Arc<dyn RetryPolicy>) {
        self.client.set_retry_policy(policy);
    }

    /// Serialize and enqueue `body`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the body cannot be encoded, or the backend's error
    pub fn add_message(&self, body: &T) -> StorageResult<()> {
        let content = self.codec.encode(body)?;
        self.client.enqueue(&content)
    }

    /// Lease the next visible message, if there is one.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or `Serialization` if the payload does not decode
    pub fn get_message(&self) -> StorageResult<Option<QueueMessage<T>>> {
        self.client
            .fetch_one(self.visibility_timeout)?
            .map(|raw| self.leased(raw))
            .transpose()
    }

    /// Lease up to `count` messages, issuing as many fetch calls as the
    /// per-request limit requires. Fewer than `count` messages come back when
    /// the queue runs dry.
    ///
    /// If a fetch call fails partway, the messages already leased by earlier
    /// calls are dropped and become visible again after the visibility timeout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `count` is zero, the first backend error, or
    /// `Serialization` if a payload does not decode
    pub fn get_messages(&self, count: usize) -> StorageResult<Vec<QueueMessage<T>>> {
        let raw = fetch_in_rounds(count, |n| {
            self.client.fetch_many(n, self.visibility_timeout)
        })?;
        raw.into_iter().map(|m| self.leased(m)).collect()
    }

    /// Delete a leased message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the message holds no lease (no backend call
    /// is made), otherwise the backend's error
    pub fn delete_message(&self, message: &QueueMessage<T>) -> StorageResult<()> {
        let lease = message.require_lease()?;
        self.client
            .delete_leased(&lease.message_id, &lease.pop_receipt)
    }

    /// Write the message's current body back and restart its visibility
    /// timeout, in one backend call. The lease is refreshed in place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the message holds no lease (no backend call
    /// is made), `Serialization` if the body cannot be encoded, otherwise the
    /// backend's error
    pub fn update_message(&self, message: &mut QueueMessage<T>) -> StorageResult<()> {
        let lease = message.require_lease()?;
        let content = self.codec.encode(&message.body)?;
        let receipt = self.client.update_leased(
            &lease.message_id,
            &lease.pop_receipt,
            &content,
            self.visibility_timeout,
        )?;
        if let Some(lease) = message.lease.as_mut() {
            lease.pop_receipt = receipt;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the backend's error
    pub fn approximate_message_count(&self) -> StorageResult<usize> {
        self.client.approximate_count()
    }

    /// Remove every message from the queue.
    ///
    /// # Errors
    ///
    /// Returns the backend's error
    pub fn clear(&self) -> StorageResult<()> {
        self.client.clear()
    }

    fn leased(&self, raw: RawMessage) -> StorageResult<QueueMessage<T>> {
        let body = self.codec.decode(&raw.content)?;
        Ok(QueueMessage {
            body,
            lease: Some(Lease {
                message_id: raw.id,
                pop_receipt: raw.pop_receipt,
                dequeue_count: raw.dequeue_count,
                insertion_time: raw.insertion_time,
            }),
        })
    }
}
