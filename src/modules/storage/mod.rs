//! Storage module for X-ray objects
//!
//! Provides the MinIO/S3-compatible client and the `ObjectStorage` seam the
//! upload pipeline is written against.

#[cfg(test)]
pub mod memory;
mod minio_client;
mod sigv4;

pub use minio_client::{FileVisibility, MinIOClient};
pub use sigv4::{signing_key, SigV4Request};

use async_trait::async_trait;

use crate::core::error::AppError;

/// Minimal object storage surface used by the upload pipeline
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Build a full object key under the visibility prefix
    fn generate_key(&self, visibility: FileVisibility, path: &str) -> String;

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Direct URL for public keys, internal URL otherwise
    fn file_url(&self, key: &str) -> String;

    async fn presigned_url(&self, key: &str) -> Result<String, AppError>;
}
