//! Batch partitioning for bulk table writes.
//!
//! The table service only accepts a batch whose entities all share one
//! partition key, and caps a batch at [`MAX_BATCH_SIZE`] entities. A bulk
//! write is therefore split in two steps:
//!
//! 1. [`group_by_partition`] groups entities by partition key, keeping each
//!    group in input order. Groups are emitted in order of first appearance.
//! 2. Each group is cut into consecutive chunks of at most `MAX_BATCH_SIZE`.
//!    Each chunk becomes one atomic [`Batch`].
//!
//! All batches are planned and validated before the first one is sent. A bad
//! key anywhere in the input therefore fails the call without touching the
//! backend. Batches then run one at a time. If one fails, the batches before
//! it stay committed and the rest are not attempted; the error is returned
//! unchanged.

use crate::backend::traits::{
    EntityRecord, StorageError, StorageResult, TableClient, TableOperation,
};
use crate::table::entity::TableEntity;
use crate::validation::require_non_empty;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Maximum number of entities in one batch. Fixed by the table service.
pub const MAX_BATCH_SIZE: usize = 100;

/// Entities sharing one partition key, in input order.
#[derive(Debug)]
pub struct PartitionGroup<'a, T> {
    pub partition_key: &'a str,
    pub entities: Vec<&'a T>,
}

impl<'a, T> PartitionGroup<'a, T> {
    /// Consecutive slices of at most [`MAX_BATCH_SIZE`] entities.
    pub fn chunks(&self) -> std::slice::Chunks<'_, &'a T> {
        self.entities.chunks(MAX_BATCH_SIZE)
    }

    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.entities.len().div_ceil(MAX_BATCH_SIZE)
    }
}

/// Group entities by partition key.
///
/// Within a group, entities keep their relative input order. Groups come out
/// in order of each key's first appearance.
pub fn group_by_partition<T: TableEntity>(entities: &[T]) -> Vec<PartitionGroup<'_, T>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<PartitionGroup<'_, T>> = Vec::new();

    for entity in entities {
        let key = entity.partition_key();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(PartitionGroup {
                partition_key: key,
                entities: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].entities.push(entity);
    }

    groups
}

/// One atomic backend batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub partition_key: String,
    pub records: Vec<EntityRecord>,
}

/// What a completed bulk operation sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSummary {
    pub batches: usize,
    pub entities: usize,
}

/// Check the invariants of a single batch: 1..=`MAX_BATCH_SIZE` records, one
/// partition key.
///
/// # Errors
///
/// Returns `InvalidInput` if the batch is empty, oversized, or mixes
/// partition keys
pub fn validate_batch(records: &[EntityRecord]) -> StorageResult<()> {
    require_non_empty(records, "batch operation")?;
    if records.len() > MAX_BATCH_SIZE {
        return Err(StorageError::invalid_input(format!(
            "Number of batch entities cannot exceed {MAX_BATCH_SIZE}, got {}",
            records.len()
        )));
    }
    let first = &records[0].partition_key;
    if let Some(other) = records.iter().find(|r| &r.partition_key != first) {
        return Err(StorageError::invalid_input(format!(
            "All partition keys of the batch items need to be the same, found '{first}' and '{}'",
            other.partition_key
        )));
    }
    Ok(())
}

/// Split `entities` into the minimal list of valid batches.
///
/// # Errors
///
/// Returns `InvalidInput` if `entities` is empty or any entity has an invalid
/// key, and `Serialization` if an entity cannot be encoded
pub fn plan_batches<T: TableEntity>(entities: &[T]) -> StorageResult<Vec<Batch>> {
    require_non_empty(entities, "bulk operation")?;

    let groups = group_by_partition(entities);
    let mut batches = Vec::with_capacity(groups.iter().map(PartitionGroup::batch_count).sum());

    for group in &groups {
        for chunk in group.chunks() {
            let records = chunk
                .iter()
                .map(|e| EntityRecord::from_entity(*e))
                .collect::<StorageResult<Vec<_>>>()?;
            validate_batch(&records)?;
            batches.push(Batch {
                partition_key: group.partition_key.to_string(),
                records,
            });
        }
    }

    debug!(
        entities = entities.len(),
        partitions = groups.len(),
        batches = batches.len(),
        "planned table batches"
    );
    Ok(batches)
}

/// Send planned batches one after another.
///
/// # Errors
///
/// Returns the first backend error unchanged. Batches before the failing one
/// remain applied.
pub fn execute_batches<C: TableClient + ?Sized>(
    client: &C,
    operation: TableOperation,
    batches: Vec<Batch>,
) -> StorageResult<BulkSummary> {
    let total = batches.len();
    let mut summary = BulkSummary {
        batches: 0,
        entities: 0,
    };

    for batch in batches {
        let size = batch.records.len();
        trace!(
            table = client.table_name(),
            partition_key = %batch.partition_key,
            size,
            ?operation,
            "executing batch"
        );
        if let Err(err) = client.execute_batch(operation, batch.records) {
            warn!(
                table = client.table_name(),
                partition_key = %batch.partition_key,
                committed_batches = summary.batches,
                skipped_batches = total - summary.batches,
                error = %err,
                "bulk table operation stopped partway"
            );
            return Err(err);
        }
        summary.batches += 1;
        summary.entities += size;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SampleEntity, entities_in_partition};

    fn record(pk: &str, rk: &str) -> EntityRecord {
        EntityRecord::from_entity(&SampleEntity::new(pk, rk, "x", 1)).unwrap()
    }

    #[test]
    fn test_grouping_is_order_stable_per_key() {
        let entities = vec![
            SampleEntity::new("b", "1", "x", 1),
            SampleEntity::new("a", "1", "x", 1),
            SampleEntity::new("b", "2", "x", 1),
            SampleEntity::new("a", "2", "x", 1),
            SampleEntity::new("b", "3", "x", 1),
        ];
        let groups = group_by_partition(&entities);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].partition_key, "b");
        let rows: Vec<&str> = groups[0].entities.iter().map(|e| e.row_key()).collect();
        assert_eq!(rows, vec!["1", "2", "3"]);
        assert_eq!(groups[1].partition_key, "a");
        assert_eq!(groups[1].entities.len(), 2);
    }

    #[test]
    fn test_plan_single_partition_of_150() {
        let entities = entities_in_partition("pk", 150);
        let batches = plan_batches(&entities).unwrap();

        let sizes: Vec<usize> = batches.iter().map(|b| b.records.len()).collect();
        assert_eq!(sizes, vec![100, 50]);
        assert_eq!(batches[1].records[0].row_key, entities[100].row_key);
    }

    #[test]
    fn test_plan_exact_multiple_has_no_empty_tail() {
        let entities = entities_in_partition("pk", 200);
        let batches = plan_batches(&entities).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.records.len() == MAX_BATCH_SIZE));
    }

    #[test]
    fn test_plan_rejects_empty_input() {
        let err = plan_batches::<SampleEntity>(&[]).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_plan_rejects_bad_key_anywhere() {
        let mut entities = entities_in_partition("pk", 120);
        entities[110].row_key.clear();
        assert!(plan_batches(&entities).unwrap_err().is_precondition());
    }

    #[test]
    fn test_validate_batch_limits() {
        assert!(validate_batch(&[]).unwrap_err().is_precondition());

        let mixed = vec![record("a", "1"), record("b", "1")];
        assert!(validate_batch(&mixed).unwrap_err().is_precondition());

        let oversized: Vec<EntityRecord> = (0..=MAX_BATCH_SIZE)
            .map(|i| record("a", &format!("{i:04}")))
            .collect();
        assert!(validate_batch(&oversized).unwrap_err().is_precondition());

        let full: Vec<EntityRecord> = (0..MAX_BATCH_SIZE)
            .map(|i| record("a", &format!("{i:04}")))
            .collect();
        assert!(validate_batch(&full).is_ok());
    }
}
