//! Document upload and serving.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::images::sha256_hex;
use super::storage::{FileStorage, sanitize_filename};
use crate::content::error::{ContentError, ContentResult};
use crate::content::validation::ErrorCode;
use crate::models::{CustomDocument, DocumentMeta};
use crate::store::ContentStore;

/// Folder documents are written under.
const DOCUMENT_FOLDER: &str = "documents";

/// Maximum document upload size (100 MB).
pub const MAX_DOCUMENT_SIZE: usize = 100 * 1024 * 1024;

/// Document service.
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn ContentStore>,
    storage: Arc<dyn FileStorage>,
}

impl DocumentService {
    pub fn new(store: Arc<dyn ContentStore>, storage: Arc<dyn FileStorage>) -> Self {
        Self { store, storage }
    }

    pub async fn upload(
        &self,
        meta: DocumentMeta,
        filename: &str,
        data: Vec<u8>,
    ) -> ContentResult<CustomDocument> {
        let meta = meta.clean()?;
        if data.is_empty() {
            return Err(ContentError::field("file", ErrorCode::Required, "No file was submitted."));
        }
        if data.len() > MAX_DOCUMENT_SIZE {
            return Err(ContentError::field(
                "file",
                ErrorCode::Invalid,
                format!("The file exceeds the {MAX_DOCUMENT_SIZE} byte upload limit."),
            ));
        }

        let mime_type = infer::get(&data)
            .map(|t| t.mime_type())
            .unwrap_or("application/octet-stream")
            .to_string();
        let uri = self.storage.generate_uri(DOCUMENT_FOLDER, filename);
        self.storage.write(&uri, &data).await?;

        let document = CustomDocument {
            id: Uuid::now_v7(),
            title: meta.title.clone(),
            file: uri.clone(),
            filename: sanitize_filename(filename),
            mime_type,
            file_size: data.len() as i64,
            file_hash: sha256_hex(&data),
            collection: meta.collection().to_string(),
            tags: meta.tags,
            created: chrono::Utc::now().timestamp(),
        };

        match self.store.insert_document(document).await {
            Ok(document) => {
                info!(document_id = %document.id, size = document.file_size, "document uploaded");
                Ok(document)
            }
            Err(e) => {
                self.storage.delete(&uri).await?;
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> ContentResult<Option<CustomDocument>> {
        self.store.get_document(id).await
    }

    pub async fn list(&self) -> ContentResult<Vec<CustomDocument>> {
        self.store.list_documents().await
    }

    /// Load a document and its bytes for serving.
    pub async fn open(&self, id: Uuid) -> ContentResult<(CustomDocument, Vec<u8>)> {
        let document = self
            .get(id)
            .await?
            .ok_or_else(|| ContentError::not_found("document", id))?;
        let data = self.storage.read(&document.file).await?;
        Ok((document, data))
    }

    pub async fn delete(&self, id: Uuid) -> ContentResult<bool> {
        let Some(document) = self.store.delete_document(id).await? else {
            return Ok(false);
        };
        self.storage.delete(&document.file).await?;
        info!(document_id = %id, "document deleted");
        Ok(true)
    }

    pub fn url(&self, document: &CustomDocument) -> String {
        format!("/back/documents/{}/{}", document.id, document.filename)
    }
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::media::storage::MemoryFileStorage;
    use crate::store::MemoryContentStore;

    fn service() -> (DocumentService, Arc<MemoryFileStorage>) {
        let storage = Arc::new(MemoryFileStorage::new("/media"));
        let service = DocumentService::new(Arc::new(MemoryContentStore::new()), storage.clone());
        (service, storage)
    }

    #[tokio::test]
    async fn upload_open_delete() {
        let (service, storage) = service();
        let meta = DocumentMeta {
            title: "Planos".into(),
            ..Default::default()
        };
        let doc = service
            .upload(meta, "planos casa.pdf", b"%PDF-1.4 ...".to_vec())
            .await
            .unwrap();
        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(doc.filename, "planos_casa.pdf");
        assert_eq!(service.url(&doc), format!("/back/documents/{}/planos_casa.pdf", doc.id));

        let (_, data) = service.open(doc.id).await.unwrap();
        assert_eq!(data, b"%PDF-1.4 ...");

        assert!(service.delete(doc.id).await.unwrap());
        assert!(storage.is_empty());
        assert!(!service.delete(doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn empty_upload_rejected() {
        let (service, storage) = service();
        let meta = DocumentMeta {
            title: "Vacío".into(),
            ..Default::default()
        };
        let err = service.upload(meta, "a.txt", Vec::new()).await.unwrap_err();
        assert!(err.validation_errors().unwrap().has("file", ErrorCode::Required));
        assert!(storage.is_empty());
    }
}
