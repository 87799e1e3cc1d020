//! On-demand image renditions.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Context;
use image::ImageFormat;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::filter::FilterSpec;
use super::storage::FileStorage;
use crate::content::error::{ContentError, ContentResult};
use crate::models::image::FocalPoint;
use crate::models::{CustomImage, CustomRendition};
use crate::store::ContentStore;

/// Maximum concurrent image processing operations.
const MAX_CONCURRENT_PROCESSING: usize = 4;

/// Maximum input file size for image processing (50 MB).
pub const MAX_INPUT_SIZE: usize = 50 * 1024 * 1024;

/// Folder rendition files are written under.
const RENDITION_FOLDER: &str = "images";

/// Creates and caches renditions.
#[derive(Clone)]
pub struct RenditionService {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn FileStorage>,
    processing_semaphore: Arc<Semaphore>,
}

impl RenditionService {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            store,
            storage,
            processing_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_PROCESSING)),
        }
    }

    /// Return the rendition of `image` for `spec`, creating it if needed.
    ///
    /// Concurrent callers may both render; the first insert wins and the
    /// loser returns the stored row.
    pub async fn get_or_create(
        &self,
        image: &CustomImage,
        spec: &FilterSpec,
    ) -> ContentResult<CustomRendition> {
        let filter_spec = spec.to_string();
        let focal_point = if spec.uses_focal_point() {
            image.focal_point()
        } else {
            None
        };
        let focal_point_key = focal_point.map(|p| p.key()).unwrap_or_default();

        if let Some(existing) = self
            .store
            .find_rendition(image.id, &filter_spec, &focal_point_key)
            .await?
        {
            return Ok(existing);
        }

        let _permit = self
            .processing_semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("image processing semaphore closed"))?;

        let original = self.storage.read(&image.file).await?;
        let spec_owned = spec.clone();
        let (data, width, height, extension) =
            tokio::task::spawn_blocking(move || render(&original, &spec_owned, focal_point.as_ref()))
                .await
                .context("rendition task panicked")??;

        let filename = format!(
            "{}.{}.{extension}",
            file_stem(&image.file),
            filter_spec.replace('|', ".")
        );
        let uri = self.storage.generate_uri(RENDITION_FOLDER, &filename);
        self.storage.write(&uri, &data).await?;

        let lookup = (filter_spec.clone(), focal_point_key.clone());
        let rendition = CustomRendition {
            id: Uuid::now_v7(),
            image_id: image.id,
            filter_spec,
            focal_point_key,
            file: uri.clone(),
            width: width as i32,
            height: height as i32,
            created: chrono::Utc::now().timestamp(),
        };

        match self.store.insert_rendition(rendition).await {
            Ok(rendition) => {
                info!(
                    image_id = %image.id,
                    filter_spec = %rendition.filter_spec,
                    width,
                    height,
                    "rendition created"
                );
                Ok(rendition)
            }
            Err(e) if e.is_unique_violation() => {
                debug!(image_id = %image.id, "rendition created concurrently, using stored row");
                self.discard(&uri).await;
                let (filter_spec, focal_point_key) = lookup;
                self.store
                    .find_rendition(image.id, &filter_spec, &focal_point_key)
                    .await?
                    .ok_or(e)
            }
            Err(e) => {
                self.discard(&uri).await;
                Err(e)
            }
        }
    }

    /// Remove a rendition file that has no row. Failures only leave an orphan.
    async fn discard(&self, uri: &str) {
        if let Err(e) = self.storage.delete(uri).await {
            warn!(uri = %uri, error = %e, "failed to remove unused rendition file");
        }
    }

    /// Delete rendition files after their rows are gone.
    pub async fn remove_files(&self, renditions: &[CustomRendition]) -> ContentResult<()> {
        for rendition in renditions {
            self.storage.delete(&rendition.file).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RenditionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenditionService")
            .field("available_permits", &self.processing_semaphore.available_permits())
            .finish()
    }
}

fn file_stem(uri: &str) -> &str {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    name.split('.').next().filter(|s| !s.is_empty()).unwrap_or("image")
}

/// Decode, transform and re-encode an image. PNG and GIF sources stay PNG;
/// everything else is written as JPEG.
fn render(
    original: &[u8],
    spec: &FilterSpec,
    focal_point: Option<&FocalPoint>,
) -> ContentResult<(Vec<u8>, u32, u32, &'static str)> {
    if original.len() > MAX_INPUT_SIZE {
        return Err(ContentError::Other(anyhow::anyhow!(
            "image too large: {} bytes exceeds {MAX_INPUT_SIZE} byte limit",
            original.len()
        )));
    }
    let source_format = image::guess_format(original).context("unknown image format")?;
    let img = image::load_from_memory(original).context("failed to load image")?;
    let out = spec.apply(img, focal_point);

    let (format, extension) = match source_format {
        ImageFormat::Png | ImageFormat::Gif => (ImageFormat::Png, "png"),
        _ => (ImageFormat::Jpeg, "jpg"),
    };
    let out = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(out.to_rgb8())
    } else {
        out
    };

    let mut buf = Cursor::new(Vec::new());
    out.write_to(&mut buf, format)
        .context("failed to encode rendition")?;
    Ok((buf.into_inner(), out.width(), out.height(), extension))
}
