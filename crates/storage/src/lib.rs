//! Storage abstractions for the ocean data pipeline.
//!
//! Provides a unified object storage client (S3, MinIO, or in-memory)
//! and the key layout used for uploaded chunks.

pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, StoragePath};
