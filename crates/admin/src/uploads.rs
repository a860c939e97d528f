//! Store for product images picked in the form but not yet saved.
//!
//! Each file is parked under a random id until the product is saved or the
//! entry expires. The draft only keeps the id and file metadata, so the
//! session stays small.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::api::ImageUpload;
use crate::product_form::PendingUpload;

/// How long an unsaved upload is kept.
const UPLOAD_TTL: Duration = Duration::from_secs(30 * 60);

/// Most files held at once.
const MAX_UPLOADS: u64 = 500;

/// Accepted image content types.
pub const ACCEPTED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// In-memory pending upload store.
#[derive(Clone)]
pub struct UploadStore {
    cache: Cache<String, Arc<ImageUpload>>,
}

impl Default for UploadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_UPLOADS)
                .time_to_idle(UPLOAD_TTL)
                .build(),
        }
    }

    /// Park a file and describe it for the draft.
    pub async fn insert(&self, upload: ImageUpload) -> PendingUpload {
        let upload_id = Uuid::new_v4().to_string();
        let pending = PendingUpload {
            upload_id: upload_id.clone(),
            file_name: upload.file_name.clone(),
            content_type: upload.content_type.clone(),
            size: upload.bytes.len(),
        };
        self.cache.insert(upload_id, Arc::new(upload)).await;
        pending
    }

    pub async fn get(&self, upload_id: &str) -> Option<Arc<ImageUpload>> {
        self.cache.get(upload_id).await
    }

    /// Files for `pending`, in order. `None` if any has expired.
    pub async fn collect(&self, pending: &[PendingUpload]) -> Option<Vec<Arc<ImageUpload>>> {
        let mut files = Vec::with_capacity(pending.len());
        for upload in pending {
            files.push(self.get(&upload.upload_id).await?);
        }
        Some(files)
    }

    /// Drop files once their product is saved.
    pub async fn remove_all(&self, pending: &[PendingUpload]) {
        for upload in pending {
            self.cache.invalidate(&upload.upload_id).await;
        }
    }
}

/// Whether `content_type` is an image type the API accepts.
#[must_use]
pub fn is_accepted_image(content_type: &str) -> bool {
    ACCEPTED_TYPES.contains(&content_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn image(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_owned(),
            content_type: "image/png".to_owned(),
            bytes: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_collect_in_order() {
        let store = UploadStore::new();
        let a = store.insert(image("a.png")).await;
        let b = store.insert(image("b.png")).await;
        assert_eq!(a.size, 3);

        let files = store.collect(&[b.clone(), a.clone()]).await.unwrap();
        assert_eq!(files[0].file_name, "b.png");
        assert_eq!(files[1].file_name, "a.png");

        store.remove_all(&[a.clone()]).await;
        assert!(store.get(&a.upload_id).await.is_none());
        assert!(store.collect(&[a, b]).await.is_none());
    }

    #[test]
    fn test_accepted_types() {
        assert!(is_accepted_image("image/webp"));
        assert!(!is_accepted_image("image/svg+xml"));
    }
}
