//! Reading `multipart/form-data` bodies into text pairs and image files.

use axum::extract::Multipart;

use crate::api::ImageUpload;
use crate::error::{AppError, Result};
use crate::uploads::is_accepted_image;

/// A parsed multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Text fields in body order; repeated names appear repeatedly.
    pub fields: Vec<(String, String)>,
    /// Accepted image files from `file_field` parts.
    pub files: Vec<ImageUpload>,
    /// Files that were skipped, with the reason.
    pub rejected: Vec<String>,
}

impl MultipartForm {
    /// Read every part. Files larger than `max_file_bytes` or not an
    /// accepted image type are listed in `rejected`; empty file inputs are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` if the body is not valid multipart.
    pub async fn read(
        mut multipart: Multipart,
        file_field: &str,
        max_file_bytes: usize,
    ) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_owned();

            if name == file_field && field.file_name().is_some() {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;

                if bytes.is_empty() {
                    continue;
                }
                if !is_accepted_image(&content_type) {
                    form.rejected
                        .push(format!("{file_name}: only JPEG, PNG, WebP and GIF images are accepted"));
                } else if bytes.len() > max_file_bytes {
                    form.rejected.push(format!(
                        "{file_name}: larger than {} MB",
                        max_file_bytes / (1024 * 1024)
                    ));
                } else {
                    form.files.push(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            form.fields.push((name, value));
        }

        Ok(form)
    }
}
