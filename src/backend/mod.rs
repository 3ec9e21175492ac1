//! Storage backend abstractions.
//!
//! The typed wrappers in this crate never talk to a storage service directly.
//! They go through the client traits in [`traits`]: [`BlobClient`],
//! [`QueueClient`] and [`TableClient`]. Those traits mirror the operations of a
//! hosted storage account. [`fake`] provides in-memory implementations for
//! tests and local development.

pub mod fake;
pub mod traits;

pub use fake::*;
pub use traits::*;
