//! Pre-built test data for tables, queues and object containers.

use crate::table::TableEntity;
use serde::{Deserialize, Serialize};

/// Catalogue item stored in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEntity {
    pub partition_key: String,
    pub row_key: String,
    pub name: String,
    pub price: i64,
}

impl SampleEntity {
    #[must_use]
    pub fn new(partition_key: &str, row_key: &str, name: &str, price: i64) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
            name: name.to_string(),
            price,
        }
    }
}

impl TableEntity for SampleEntity {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// Generate `count` entities sharing `partition_key`, with row keys
/// `row-0000`, `row-0001`, and so on.
///
/// # Example
///
/// ```
/// use ironstore::testing::entities_in_partition;
///
/// let items = entities_in_partition("eu", 3);
/// assert_eq!(items[2].row_key, "row-0002");
/// ```
#[must_use]
pub fn entities_in_partition(partition_key: &str, count: usize) -> Vec<SampleEntity> {
    (0..count)
        .map(|i| {
            let price = i64::try_from(i).unwrap_or(i64::MAX);
            SampleEntity::new(partition_key, &format!("row-{i:04}"), &format!("item {i}"), price)
        })
        .collect()
}

/// Entities for several partitions, laid out partition after partition.
///
/// ```
/// use ironstore::testing::entities_across_partitions;
///
/// let items = entities_across_partitions(&[("a", 2), ("b", 1)]);
/// assert_eq!(items.len(), 3);
/// ```
#[must_use]
pub fn entities_across_partitions(layout: &[(&str, usize)]) -> Vec<SampleEntity> {
    layout
        .iter()
        .flat_map(|(pk, count)| entities_in_partition(pk, *count))
        .collect()
}

/// Like [`entities_across_partitions`], but round-robins between partitions
/// so that no two neighbours share a key.
#[must_use]
pub fn interleaved_entities(layout: &[(&str, usize)]) -> Vec<SampleEntity> {
    let mut per_partition: Vec<std::vec::IntoIter<SampleEntity>> = layout
        .iter()
        .map(|(pk, count)| entities_in_partition(pk, *count).into_iter())
        .collect();
    let mut out = Vec::new();
    loop {
        let before = out.len();
        for items in &mut per_partition {
            out.extend(items.next());
        }
        if out.len() == before {
            return out;
        }
    }
}

/// Work item sent through a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMessage {
    pub job_id: u64,
    pub action: String,
    pub attempts: u32,
}

impl SampleMessage {
    #[must_use]
    pub fn new(job_id: u64, action: &str) -> Self {
        Self {
            job_id,
            action: action.to_string(),
            attempts: 0,
        }
    }
}

/// `count` messages with consecutive job ids starting at 1.
#[must_use]
pub fn sample_messages(count: u64) -> Vec<SampleMessage> {
    (1..=count).map(|id| SampleMessage::new(id, "process")).collect()
}

/// Document stored in an object container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDocument {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

impl SampleDocument {
    #[must_use]
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }
}
