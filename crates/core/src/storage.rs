//! Object storage access and media staging.

use crate::error::{ToolError, ToolResult};
use crate::media::{GcsUri, MediaReference};
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const STAGING_PREFIX: &str = "genmedia-staging";

/// Object storage abstraction used for inputs and generated artifacts
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write an object, replacing any existing one
    async fn put(&self, uri: &GcsUri, data: Bytes) -> ToolResult<()>;

    /// Read a whole object
    async fn get(&self, uri: &GcsUri) -> ToolResult<Bytes>;
}

enum Backend {
    Gcs,
    Memory(Arc<InMemory>),
}

/// `object_store`-backed storage. Buckets are resolved per call, so one
/// instance serves every bucket a request names.
pub struct ObjectStoreStorage {
    backend: Backend,
}

impl ObjectStoreStorage {
    /// Google Cloud Storage with credentials discovered from the environment.
    pub fn gcs() -> Self {
        Self {
            backend: Backend::Gcs,
        }
    }

    /// In-process storage (tests, local development).
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(InMemory::new())),
        }
    }

    fn locate(&self, uri: &GcsUri) -> ToolResult<(Arc<dyn ObjectStore>, ObjectPath)> {
        if uri.object.is_empty() {
            return Err(ToolError::storage(format!("{} does not name an object", uri)));
        }
        match &self.backend {
            Backend::Gcs => {
                let store = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(&uri.bucket)
                    .build()
                    .map_err(|e| {
                        ToolError::storage(format!("cannot open bucket {}: {}", uri.bucket, e))
                    })?;
                let store: Arc<dyn ObjectStore> = Arc::new(store);
                Ok((store, ObjectPath::from(uri.object.as_str())))
            }
            Backend::Memory(store) => {
                let key = format!("{}/{}", uri.bucket, uri.object);
                let store: Arc<dyn ObjectStore> = store.clone();
                Ok((store, ObjectPath::from(key)))
            }
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put(&self, uri: &GcsUri, data: Bytes) -> ToolResult<()> {
        let (store, path) = self.locate(uri)?;
        store
            .put(&path, data.into())
            .await
            .map_err(|e| ToolError::storage(format!("failed to write {}: {}", uri, e)))?;
        Ok(())
    }

    async fn get(&self, uri: &GcsUri) -> ToolResult<Bytes> {
        let (store, path) = self.locate(uri)?;
        let result = match store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(ToolError::storage(format!("object not found: {}", uri)));
            }
            Err(e) => {
                return Err(ToolError::storage(format!("failed to read {}: {}", uri, e)));
            }
        };
        result
            .bytes()
            .await
            .map_err(|e| ToolError::storage(format!("failed to read {}: {}", uri, e)))
    }
}

/// Moves media between the local filesystem and object storage.
#[derive(Clone)]
pub struct MediaStager {
    storage: Arc<dyn ObjectStorage>,
}

impl MediaStager {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Make a reference addressable by a remote API. Local files are copied
    /// to a temporary object under `bucket`.
    pub async fn stage(
        &self,
        reference: &MediaReference,
        bucket: Option<&str>,
    ) -> ToolResult<GcsUri> {
        match reference {
            MediaReference::ObjectStorage(uri) => Ok(uri.clone()),
            MediaReference::LocalPath(path) => {
                let bucket = bucket.ok_or_else(|| {
                    ToolError::storage(format!(
                        "no bucket configured to stage local file {}",
                        path.display()
                    ))
                })?;
                let data = tokio::fs::read(path).await.map_err(|e| {
                    ToolError::storage(format!("cannot read {}: {}", path.display(), e))
                })?;
                let name = reference.file_name().unwrap_or_else(|| "input".to_string());
                let target = GcsUri::parse_location(bucket)?.join(&format!(
                    "{}/{}/{}",
                    STAGING_PREFIX,
                    uuid::Uuid::new_v4(),
                    name
                ));
                tracing::debug!(source = %path.display(), target = %target, "staging local input");
                self.storage.put(&target, Bytes::from(data)).await?;
                Ok(target)
            }
        }
    }

    /// Make a reference readable from the local filesystem. Remote objects
    /// are downloaded into `workdir`; local paths are returned as given.
    pub async fn localize(
        &self,
        reference: &MediaReference,
        workdir: &Path,
    ) -> ToolResult<PathBuf> {
        match reference {
            MediaReference::LocalPath(path) => Ok(path.clone()),
            MediaReference::ObjectStorage(uri) => {
                let data = self.storage.get(uri).await?;
                let name = uri.file_name().unwrap_or("download");
                // Keep names unique when several inputs share a file name.
                let target = workdir.join(format!("{}-{}", uuid::Uuid::new_v4().simple(), name));
                tokio::fs::write(&target, &data).await.map_err(|e| {
                    ToolError::storage(format!("cannot write {}: {}", target.display(), e))
                })?;
                tracing::debug!(source = %uri, target = %target.display(), "downloaded input");
                Ok(target)
            }
        }
    }

    /// Upload a local artifact to `location` and return its URI.
    pub async fn publish(&self, file: &Path, location: &GcsUri) -> ToolResult<GcsUri> {
        let data = tokio::fs::read(file)
            .await
            .map_err(|e| ToolError::storage(format!("cannot read {}: {}", file.display(), e)))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ToolError::storage(format!("{} has no file name", file.display())))?;
        let target = location.join(&name);
        self.storage.put(&target, Bytes::from(data)).await?;
        tracing::info!(target = %target, "published artifact");
        Ok(target)
    }

    /// Download an object into memory.
    pub async fn fetch(&self, uri: &GcsUri) -> ToolResult<Bytes> {
        self.storage.get(uri).await
    }
}

/// Write bytes to `dir/name`, creating the directory if needed.
pub async fn save_file(dir: &Path, name: &str, data: &[u8]) -> ToolResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ToolError::storage(format!("cannot create {}: {}", dir.display(), e)))?;
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ToolError::storage(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn stager() -> MediaStager {
        MediaStager::new(Arc::new(ObjectStoreStorage::in_memory()))
    }

    #[tokio::test]
    async fn test_in_memory_put_get() {
        let storage = ObjectStoreStorage::in_memory();
        let uri = GcsUri::parse("gs://bucket/a/b.txt").unwrap();

        storage.put(&uri, Bytes::from("hello")).await.unwrap();
        assert_eq!(storage.get(&uri).await.unwrap(), Bytes::from("hello"));

        let missing = GcsUri::parse("gs://other/a/b.txt").unwrap();
        let err = storage.get(&missing).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageAccessError);
    }

    #[tokio::test]
    async fn test_stage_local_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("cat.png");
        std::fs::write(&file, b"\x89PNG fake").unwrap();

        let stager = stager();
        let reference = MediaReference::LocalPath(file);
        let staged = stager.stage(&reference, Some("gs://staging")).await.unwrap();

        assert_eq!(staged.bucket, "staging");
        assert!(staged.object.starts_with("genmedia-staging/"));
        assert!(staged.object.ends_with("/cat.png"));
        assert_eq!(stager.fetch(&staged).await.unwrap(), Bytes::from_static(b"\x89PNG fake"));
    }

    #[tokio::test]
    async fn test_stage_passes_remote_through() {
        let reference: MediaReference = "gs://in/photo.jpg".parse().unwrap();
        let staged = stager().stage(&reference, None).await.unwrap();
        assert_eq!(staged.to_string(), "gs://in/photo.jpg");
    }

    #[tokio::test]
    async fn test_stage_without_bucket_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("x.png");
        std::fs::write(&file, b"x").unwrap();

        let err = stager()
            .stage(&MediaReference::LocalPath(file), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageAccessError);
    }

    #[tokio::test]
    async fn test_localize_and_publish() {
        let temp_dir = TempDir::new().unwrap();
        let stager = stager();
        let uri = GcsUri::parse("gs://in/audio/take.wav").unwrap();
        stager.storage().put(&uri, Bytes::from("RIFF")).await.unwrap();

        let local = stager
            .localize(&MediaReference::ObjectStorage(uri), temp_dir.path())
            .await
            .unwrap();
        assert!(local.starts_with(temp_dir.path()));
        assert!(local.to_string_lossy().ends_with("take.wav"));
        assert_eq!(std::fs::read(&local).unwrap(), b"RIFF");

        let published = stager
            .publish(&local, &GcsUri::parse_location("gs://out/renders").unwrap())
            .await
            .unwrap();
        assert_eq!(published.bucket, "out");
        assert!(published.object.starts_with("renders/"));
        assert_eq!(stager.fetch(&published).await.unwrap(), Bytes::from("RIFF"));
    }

    #[tokio::test]
    async fn test_localize_keeps_local_paths() {
        let path = PathBuf::from("/does/not/exist.mp4");
        let local = stager()
            .localize(&MediaReference::LocalPath(path.clone()), Path::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(local, path);
    }

    #[tokio::test]
    async fn test_save_file_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested/out");
        let path = save_file(&dir, "a.wav", b"data").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"data");
    }
}
