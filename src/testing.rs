//! Testing utilities for code built on the storage wrappers.
//!
//! This module provides:
//!
//! - **Fixtures**: sample entities, messages and documents
//! - **Assertions**: checks over the calls a fake client recorded
//! - **Config files**: temporary JSON config files for loader tests
//!
//! Pair these with [`FakeStorageAccount`](crate::FakeStorageAccount).
//!
//! # Quick Start
//!
//! ```
//! use ironstore::testing::*;
//! use ironstore::{FakeStorageAccount, Table};
//!
//! # fn main() -> ironstore::StorageResult<()> {
//! let account = FakeStorageAccount::new();
//! let client = account.table_client("inventory");
//! let table = Table::new(client.clone())?;
//!
//! table.insert_all(&entities_in_partition("warehouse-a", 230))?;
//! assert_batches_respect_limits(&client);
//! assert_batch_sizes(&client, &[100, 100, 30]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod config_file;
pub mod fixtures;

pub use assertions::*;
pub use config_file::*;
pub use fixtures::*;
