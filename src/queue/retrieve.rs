//! Chunked retrieval of queue messages.
//!
//! The queue service hands out at most [`MAX_MESSAGES_PER_REQUEST`] messages
//! per call. [`fetch_in_rounds`] serves larger requests with repeated calls:
//! each round asks for `min(MAX_MESSAGES_PER_REQUEST, remaining)`. It stops
//! once the requested count is reached, or as soon as a round comes back
//! short, which means the queue has no more visible messages.
//!
//! A failed round aborts the whole retrieval. Messages leased in earlier rounds
//! are not returned; they become visible again when their lease expires.

use crate::backend::traits::{RawMessage, StorageError, StorageResult};
use tracing::{debug, warn};

/// Maximum number of messages per fetch call. Fixed by the queue service.
pub const MAX_MESSAGES_PER_REQUEST: usize = 32;

/// Per-round request sizes for `count` messages, assuming every round comes
/// back full. Sizes are produced lazily, so any `count` is cheap.
#[derive(Debug, Clone)]
pub struct Rounds {
    remaining: usize,
}

impl Iterator for Rounds {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let requested = self.remaining.min(MAX_MESSAGES_PER_REQUEST);
        self.remaining -= requested;
        Some(requested)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.div_ceil(MAX_MESSAGES_PER_REQUEST);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Rounds {}

/// Plan the rounds needed for `count` messages.
///
/// # Errors
///
/// Returns `InvalidInput` if `count` is zero
pub fn plan_rounds(count: usize) -> StorageResult<Rounds> {
    if count < 1 {
        return Err(StorageError::invalid_input(
            "You need to ask for at least 1 queue message",
        ));
    }
    Ok(Rounds { remaining: count })
}

/// Fetch up to `count` messages through `fetch`, which is called with the
/// size of each round and must never be asked for more than
/// [`MAX_MESSAGES_PER_REQUEST`].
///
/// Messages are returned in the order the rounds produced them.
///
/// # Errors
///
/// Returns `InvalidInput` if `count` is zero, or the first error `fetch`
/// returns
pub fn fetch_in_rounds<F>(count: usize, mut fetch: F) -> StorageResult<Vec<RawMessage>>
where
    F: FnMut(usize) -> StorageResult<Vec<RawMessage>>,
{
    let rounds = plan_rounds(count)?;
    debug!(count, max_rounds = rounds.len(), "fetching queue messages");

    let mut messages = Vec::with_capacity(count.min(MAX_MESSAGES_PER_REQUEST));
    for (round, requested) in rounds.enumerate() {
        let batch = match fetch(requested) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    round,
                    dropped = messages.len(),
                    error = %err,
                    "queue fetch failed partway; leased messages will reappear after their timeout"
                );
                return Err(err);
            }
        };
        let received = batch.len();
        messages.extend(batch);
        if received < requested {
            debug!(round, requested, received, "queue exhausted");
            break;
        }
    }

    Ok(messages)
}
