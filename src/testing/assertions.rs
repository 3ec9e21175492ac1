//! Assertion functions over the calls recorded by the fake clients.

use crate::backend::fake::{FakeQueueClient, FakeTableClient};
use crate::backend::traits::{ErrorKind, StorageResult};
use crate::queue::MAX_MESSAGES_PER_REQUEST;
use crate::table::MAX_BATCH_SIZE;
use std::fmt::Debug;

/// Assert that every batch the client received was one the table service
/// accepts: 1 to [`MAX_BATCH_SIZE`] entities, all in one partition.
///
/// # Panics
///
/// Panics on the first batch that breaks a limit.
pub fn assert_batches_respect_limits(client: &FakeTableClient) {
    for (i, batch) in client.batch_calls().iter().enumerate() {
        assert!(
            (1..=MAX_BATCH_SIZE).contains(&batch.size()),
            "Batch {i} has {} entities, expected 1..={MAX_BATCH_SIZE}",
            batch.size()
        );
        assert_eq!(
            batch.partition_keys.len(),
            1,
            "Batch {i} spans partitions {:?}",
            batch.partition_keys
        );
    }
}

/// Assert the exact sequence of batch sizes the client received.
///
/// # Panics
///
/// Panics if the sizes differ.
pub fn assert_batch_sizes(client: &FakeTableClient, expected: &[usize]) {
    let actual: Vec<usize> = client.batch_calls().iter().map(|b| b.size()).collect();
    assert_eq!(
        actual, expected,
        "Batch size mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert the exact sequence of fetch sizes the client received, and that
/// none exceeded [`MAX_MESSAGES_PER_REQUEST`].
///
/// # Panics
///
/// Panics if the sizes differ or a request was oversized.
pub fn assert_fetch_rounds(client: &FakeQueueClient, expected: &[usize]) {
    let actual = client.fetch_requests();
    assert!(
        actual.iter().all(|n| *n <= MAX_MESSAGES_PER_REQUEST),
        "Fetch requested more than {MAX_MESSAGES_PER_REQUEST} messages: {actual:?}"
    );
    assert_eq!(
        actual, expected,
        "Fetch round mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that `result` failed with `kind`.
///
/// # Panics
///
/// Panics if `result` is `Ok` or failed with another kind.
///
/// # Example
///
/// ```
/// use ironstore::testing::assert_error_kind;
/// use ironstore::{ErrorKind, StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::invalid_input("empty"));
/// assert_error_kind(&result, ErrorKind::InvalidInput);
/// ```
pub fn assert_error_kind<T: Debug>(result: &StorageResult<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {kind:?} error, got Ok({value:?})"),
        Err(err) => assert_eq!(err.kind, kind, "Unexpected error: {err}"),
    }
}
