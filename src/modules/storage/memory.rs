//! In-process storage double for pipeline and router tests

use async_trait::async_trait;
use std::sync::Mutex;

use super::{FileVisibility, ObjectStorage};
use crate::core::error::AppError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<Vec<StoredObject>>,
    deleted: Mutex<Vec<String>>,
    /// Uploads under this prefix fail
    fail_prefix: Option<String>,
    /// Uploads whose key contains this fail
    fail_fragment: Option<String>,
}

impl InMemoryStorage {
    pub fn failing_under(prefix: &str) -> Self {
        Self {
            fail_prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_fragment: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    fn generate_key(&self, visibility: FileVisibility, path: &str) -> String {
        match visibility {
            FileVisibility::Public => format!("public/{}", path),
            FileVisibility::Private => format!("private/{}", path),
        }
    }

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        if self
            .fail_prefix
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix))
            || self
                .fail_fragment
                .as_deref()
                .is_some_and(|fragment| key.contains(fragment))
        {
            return Err(AppError::Internal(format!("upload of '{}' refused", key)));
        }
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size: data.len(),
        });
        Ok(key.to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().retain(|o| o.key != key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn file_url(&self, key: &str) -> String {
        format!("http://storage.test/bucket/{}", key)
    }

    async fn presigned_url(&self, key: &str) -> Result<String, AppError> {
        Ok(format!("http://storage.test/bucket/{}?signature=test", key))
    }
}
