//! Server-side JSON document storage.
//!
//! Documents are stored per organization, one file per collection:
//! ```text
//! <DATA_DIR>/
//!   <org_id>/
//!     invoices.json
//!     students.json
//!     ...
//! ```
//!
//! Each file is a JSON object mapping document id to document. Access to one
//! organization's files is serialized through that organization's lock.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::Collection;

type DocumentMap = BTreeMap<String, Value>;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    Io(PathBuf, io::Error),
    /// A collection file that is not a valid document map.
    Json(PathBuf, serde_json::Error),
    /// Invalid organization ID (e.g., contains path separators).
    InvalidOrganization(String),
    /// Not one of the known collections.
    InvalidCollection(String),
    InvalidDocumentId(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::Io(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::Json(path, e) => {
                write!(f, "Corrupt collection file {}: {}", path.display(), e)
            }
            ServerStorageError::InvalidOrganization(id) => {
                write!(f, "Invalid organization ID: {}", id)
            }
            ServerStorageError::InvalidCollection(name) => {
                write!(f, "Unknown collection: {}", name)
            }
            ServerStorageError::InvalidDocumentId(id) => {
                write!(f, "Invalid document ID: {}", id)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::Io(_, e) => Some(e),
            ServerStorageError::Json(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Server-side storage for synced documents.
#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ServerStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn lock_org(&self, org_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(org_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Rejects anything that could escape the data directory.
    fn validate_segment(value: &str) -> bool {
        !(value.is_empty()
            || value.contains('/')
            || value.contains('\\')
            || value.contains("..")
            || value.starts_with('.')
            || value.chars().any(char::is_control))
    }

    fn validate_org(org_id: &str) -> Result<(), ServerStorageError> {
        if !Self::validate_segment(org_id) {
            return Err(ServerStorageError::InvalidOrganization(org_id.to_string()));
        }
        Ok(())
    }

    fn validate_id(id: &str) -> Result<(), ServerStorageError> {
        if !Self::validate_segment(id) {
            return Err(ServerStorageError::InvalidDocumentId(id.to_string()));
        }
        Ok(())
    }

    fn collection(name: &str) -> Result<Collection, ServerStorageError> {
        Collection::parse(name).ok_or_else(|| ServerStorageError::InvalidCollection(name.to_string()))
    }

    fn collection_path(&self, org_id: &str, collection: Collection) -> PathBuf {
        self.data_dir
            .join(org_id)
            .join(format!("{}.json", collection.path()))
    }

    async fn read_map(&self, org_id: &str, collection: Collection) -> Result<DocumentMap, ServerStorageError> {
        let path = self.collection_path(org_id, collection);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ServerStorageError::Json(path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DocumentMap::new()),
            Err(e) => Err(ServerStorageError::Io(path, e)),
        }
    }

    /// Writes the whole collection through a temp file and a rename.
    async fn write_map(
        &self,
        org_id: &str,
        collection: Collection,
        documents: &DocumentMap,
    ) -> Result<(), ServerStorageError> {
        let org_dir = self.data_dir.join(org_id);
        tokio::fs::create_dir_all(&org_dir)
            .await
            .map_err(|e| ServerStorageError::Io(org_dir.clone(), e))?;

        let path = self.collection_path(org_id, collection);
        let bytes = serde_json::to_vec_pretty(documents).map_err(|e| ServerStorageError::Json(path.clone(), e))?;
        let temp_path = path.with_extension("json.tmp");

        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| ServerStorageError::Io(temp_path.clone(), e))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| ServerStorageError::Io(path, e))?;
        Ok(())
    }

    /// All documents of a collection, ordered by id. An organization with no
    /// file yet has an empty collection.
    pub async fn list(&self, org_id: &str, collection: &str) -> Result<Vec<Value>, ServerStorageError> {
        Self::validate_org(org_id)?;
        let collection = Self::collection(collection)?;
        let _guard = self.lock_org(org_id).await;
        Ok(self.read_map(org_id, collection).await?.into_values().collect())
    }

    pub async fn get(&self, org_id: &str, collection: &str, id: &str) -> Result<Option<Value>, ServerStorageError> {
        Self::validate_org(org_id)?;
        let collection = Self::collection(collection)?;
        Self::validate_id(id)?;
        let _guard = self.lock_org(org_id).await;
        Ok(self.read_map(org_id, collection).await?.remove(id))
    }

    /// Inserts or replaces a document.
    pub async fn put(
        &self,
        org_id: &str,
        collection: &str,
        id: &str,
        document: Value,
    ) -> Result<(), ServerStorageError> {
        Self::validate_org(org_id)?;
        let collection = Self::collection(collection)?;
        Self::validate_id(id)?;
        let _guard = self.lock_org(org_id).await;
        let mut documents = self.read_map(org_id, collection).await?;
        documents.insert(id.to_string(), document);
        self.write_map(org_id, collection, &documents).await
    }

    /// Returns false if there was nothing to delete.
    pub async fn delete(&self, org_id: &str, collection: &str, id: &str) -> Result<bool, ServerStorageError> {
        Self::validate_org(org_id)?;
        let collection = Self::collection(collection)?;
        Self::validate_id(id)?;
        let _guard = self.lock_org(org_id).await;
        let mut documents = self.read_map(org_id, collection).await?;
        if documents.remove(id).is_none() {
            return Ok(false);
        }
        self.write_map(org_id, collection, &documents).await?;
        Ok(true)
    }
}
