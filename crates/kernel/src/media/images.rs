//! Image upload, metadata and deletion.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use super::filter::{FilterSpec, FilterSpecError};
use super::rendition::{MAX_INPUT_SIZE, RenditionService};
use super::storage::FileStorage;
use crate::content::error::{ContentError, ContentResult};
use crate::content::validation::ErrorCode;
use crate::models::{CustomImage, CustomRendition, ImageMeta};
use crate::store::ContentStore;

/// Folder originals are written under.
const ORIGINAL_FOLDER: &str = "original_images";

/// Image service.
#[derive(Clone)]
pub struct ImageService {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn FileStorage>,
    renditions: RenditionService,
}

impl ImageService {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn FileStorage>) -> Self {
        let renditions = RenditionService::new(store.clone(), storage.clone());
        Self {
            store,
            storage,
            renditions,
        }
    }

    /// Store an uploaded image and its metadata.
    pub async fn upload(
        &self,
        meta: ImageMeta,
        filename: &str,
        data: Vec<u8>,
    ) -> ContentResult<CustomImage> {
        let meta = meta.clean()?;
        check_image_bytes(&data)?;

        let probe = data.clone();
        let (width, height) = tokio::task::spawn_blocking(move || image_dimensions(&probe))
            .await
            .context("image probe task panicked")??;

        let uri = self.storage.generate_uri(ORIGINAL_FOLDER, filename);
        self.storage.write(&uri, &data).await?;

        let mut image = CustomImage {
            id: Uuid::now_v7(),
            title: meta.title,
            file: uri.clone(),
            width: width as i32,
            height: height as i32,
            file_size: data.len() as i64,
            file_hash: sha256_hex(&data),
            focal_point_x: None,
            focal_point_y: None,
            focal_point_width: None,
            focal_point_height: None,
            alt: meta.alt,
            created: chrono::Utc::now().timestamp(),
        };
        image.set_focal_point(meta.focal_point);

        match self.store.insert_image(image).await {
            Ok(image) => {
                info!(image_id = %image.id, width, height, "image uploaded");
                Ok(image)
            }
            Err(e) => {
                self.storage.delete(&uri).await?;
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> ContentResult<Option<CustomImage>> {
        self.store.get_image(id).await
    }

    pub async fn require(&self, id: Uuid) -> ContentResult<CustomImage> {
        self.get(id)
            .await?
            .ok_or_else(|| ContentError::not_found("image", id))
    }

    pub async fn list(&self) -> ContentResult<Vec<CustomImage>> {
        self.store.list_images().await
    }

    /// Replace title, alt text and focal point.
    pub async fn update_meta(&self, id: Uuid, meta: ImageMeta) -> ContentResult<CustomImage> {
        let meta = meta.clean()?;
        let mut image = self.require(id).await?;
        image.title = meta.title;
        image.alt = meta.alt;
        image.set_focal_point(meta.focal_point);
        self.store.update_image(image).await
    }

    /// Delete an image, its renditions and their files.
    pub async fn delete(&self, id: Uuid) -> ContentResult<bool> {
        let Some(deleted) = self.store.delete_image(id).await? else {
            return Ok(false);
        };
        self.storage.delete(&deleted.image.file).await?;
        self.renditions.remove_files(&deleted.renditions).await?;
        info!(
            image_id = %id,
            renditions = deleted.renditions.len(),
            "image deleted"
        );
        Ok(true)
    }

    /// Return the rendition for `filter_spec`, creating it on first use.
    pub async fn rendition(&self, id: Uuid, filter_spec: &str) -> ContentResult<CustomRendition> {
        let spec: FilterSpec = filter_spec.parse().map_err(|e: FilterSpecError| {
            ContentError::field("filter_spec", ErrorCode::Invalid, e.to_string())
        })?;
        let image = self.require(id).await?;
        self.renditions.get_or_create(&image, &spec).await
    }

    pub async fn renditions(&self, id: Uuid) -> ContentResult<Vec<CustomRendition>> {
        self.store.list_renditions(id).await
    }

    /// Public URL of a stored file.
    pub fn url(&self, uri: &str) -> String {
        self.storage.public_url(uri)
    }
}

impl std::fmt::Debug for ImageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageService").finish()
    }
}

/// Reject empty, oversized and non-image uploads.
fn check_image_bytes(data: &[u8]) -> ContentResult<()> {
    if data.is_empty() {
        return Err(ContentError::field("file", ErrorCode::Required, "No file was submitted."));
    }
    if data.len() > MAX_INPUT_SIZE {
        return Err(ContentError::field(
            "file",
            ErrorCode::Invalid,
            format!("The file exceeds the {MAX_INPUT_SIZE} byte upload limit."),
        ));
    }
    let is_image = infer::get(data).is_some_and(|t| t.matcher_type() == infer::MatcherType::Image);
    if !is_image {
        return Err(ContentError::field(
            "file",
            ErrorCode::Invalid,
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        ));
    }
    Ok(())
}

fn image_dimensions(data: &[u8]) -> ContentResult<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .context("failed to read image header")?;
    reader.into_dimensions().map_err(|_| {
        ContentError::field(
            "file",
            ErrorCode::Invalid,
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        )
    })
}

/// SHA-256 of `data`, hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn non_images_rejected() {
        let err = check_image_bytes(b"%PDF-1.4 not an image").unwrap_err();
        assert!(err.validation_errors().unwrap().has("file", ErrorCode::Invalid));
        let err = check_image_bytes(b"").unwrap_err();
        assert!(err.validation_errors().unwrap().has("file", ErrorCode::Required));
    }

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
