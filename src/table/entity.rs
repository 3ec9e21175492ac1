//! Typed table entities and their wire form.

use crate::backend::traits::{EntityRecord, ErrorKind, StorageError, StorageResult};
use crate::validation::validate_entity_key;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// A record stored in a table, identified by its partition key and row key.
///
/// Every serialized field becomes a table property, so the type must
/// serialize to a JSON object.
///
/// # Example
/// ```
/// use ironstore::TableEntity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Customer {
///     region: String,
///     id: String,
///     name: String,
/// }
///
/// impl TableEntity for Customer {
///     fn partition_key(&self) -> &str { &self.region }
///     fn row_key(&self) -> &str { &self.id }
/// }
/// ```
pub trait TableEntity: Serialize + DeserializeOwned {
    fn partition_key(&self) -> &str;
    fn row_key(&self) -> &str;
}

impl EntityRecord {
    /// Convert a typed entity into its wire form, checking both keys.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or malformed key, or
    /// `Serialization` if the entity does not encode to a JSON object
    pub fn from_entity<T: TableEntity>(entity: &T) -> StorageResult<Self> {
        validate_entity_key("PartitionKey", entity.partition_key())?;
        validate_entity_key("RowKey", entity.row_key())?;

        match serde_json::to_value(entity)? {
            Value::Object(properties) => Ok(Self {
                partition_key: entity.partition_key().to_string(),
                row_key: entity.row_key().to_string(),
                properties,
            }),
            other => Err(StorageError::new(
                ErrorKind::Serialization,
                format!("table entity must serialize to a JSON object, got {other}"),
            )),
        }
    }

    /// Decode the stored properties back into a typed entity.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the properties do not match `T`
    pub fn into_entity<T: TableEntity>(self) -> StorageResult<T> {
        Ok(serde_json::from_value(Value::Object(self.properties))?)
    }
}
