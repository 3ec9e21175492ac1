//! Precondition checks shared by the blob, queue and table wrappers.
//!
//! Every check here runs before any backend call and fails with an
//! [`ErrorKind::InvalidInput`](crate::ErrorKind::InvalidInput) error.

use crate::backend::traits::{StorageError, StorageResult};
use regex::Regex;
use std::sync::LazyLock;

static CONTAINER_OR_QUEUE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid regex"));

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{2,62}$").expect("valid regex"));

/// Characters the table service refuses in partition and row keys.
const FORBIDDEN_KEY_CHARS: [char; 4] = ['/', '\\', '#', '?'];

/// Reject an empty collection.
///
/// # Errors
///
/// Returns `InvalidInput` if `items` is empty
pub fn require_non_empty<T>(items: &[T], what: &str) -> StorageResult<()> {
    if items.is_empty() {
        return Err(StorageError::invalid_input(format!(
            "The {what} should contain at least one item"
        )));
    }
    Ok(())
}

/// Validate a partition key or row key.
///
/// # Errors
///
/// Returns `InvalidInput` if the key is empty or contains a forbidden character
pub fn validate_entity_key(field: &str, key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_input(format!(
            "{field} cannot be empty"
        )));
    }
    if let Some(c) = key
        .chars()
        .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
    {
        return Err(StorageError::invalid_input(format!(
            "{field} '{key}' contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

fn validate_dashed_name(kind: &str, name: &str) -> StorageResult<()> {
    if !(3..=63).contains(&name.len()) {
        return Err(StorageError::invalid_input(format!(
            "{kind} name '{name}' must be between 3 and 63 characters"
        )));
    }
    if !CONTAINER_OR_QUEUE_NAME.is_match(name) {
        return Err(StorageError::invalid_input(format!(
            "{kind} name '{name}' may only contain lowercase letters, digits and single dashes"
        )));
    }
    Ok(())
}

/// Validate a blob container name.
///
/// # Errors
///
/// Returns `InvalidInput` if the name breaks the container naming rules
pub fn validate_container_name(name: &str) -> StorageResult<()> {
    validate_dashed_name("Container", name)
}

/// Validate a queue name.
///
/// # Errors
///
/// Returns `InvalidInput` if the name breaks the queue naming rules
pub fn validate_queue_name(name: &str) -> StorageResult<()> {
    validate_dashed_name("Queue", name)
}

/// Validate a table name.
///
/// # Errors
///
/// Returns `InvalidInput` if the name is not 3-63 alphanumerics starting with a letter
pub fn validate_table_name(name: &str) -> StorageResult<()> {
    if !TABLE_NAME.is_match(name) {
        return Err(StorageError::invalid_input(format!(
            "Table name '{name}' must be 3-63 alphanumeric characters starting with a letter"
        )));
    }
    Ok(())
}
