//! Artifact store
//!
//! Maps a local id to a directory holding the job's metadata record, its
//! downloaded artifact and, for image jobs, a copy of the source image:
//!
//! ```text
//! <root>/<local_id>/metadata.json
//! <root>/<local_id>/<artifact>.mp4
//! <root>/<local_id>/input.png
//! ```
//!
//! Record updates and claim changes are read-modify-write sequences. Each
//! runs under an exclusive advisory lock on `<local_id>/.lock`, so writers in
//! other threads or processes never interleave with it.

use async_trait::async_trait;
use clipjob_core::domain::job::LocalId;
use clipjob_core::domain::record::{JobRecord, RECORD_VERSION};
use clipjob_core::source::ByteSource;
use fd_lock::RwLock;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Name of the metadata record inside a job directory
pub const METADATA_FILE: &str = "metadata.json";

/// Marker held while an artifact is being materialized
pub const CLAIM_FILE: &str = ".materializing";

/// Lock file serializing record updates and claims for one job
pub const LOCK_FILE: &str = ".lock";

/// Artifact name used when the caller gives none
pub const DEFAULT_ARTIFACT_NAME: &str = "video";

/// A persisted artifact
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    /// File name relative to the job directory
    pub file_name: String,
    /// Absolute location of the artifact
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Storage for job records and artifacts, keyed by local id
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Generates a local id not yet used in this store
    ///
    /// Nothing is written; the job directory appears with the first record.
    fn allocate(&self) -> LocalId;

    /// Directory holding everything stored for `id`
    fn job_dir(&self, id: &LocalId) -> PathBuf;

    /// Whether a record has been persisted for `id`
    async fn exists(&self, id: &LocalId) -> bool;

    /// Reads the record for `id`; a missing record reads as empty
    async fn read_record(&self, id: &LocalId) -> Result<JobRecord, StoreError>;

    /// Merges `update` into the stored record and returns the result
    ///
    /// The read, merge and write happen as one step with respect to other
    /// writers of the same job.
    async fn write_record(&self, id: &LocalId, update: JobRecord)
    -> Result<JobRecord, StoreError>;

    /// Finds the job that was submitted as `remote_id`
    ///
    /// This is a linear scan over every stored record, O(n) in the number
    /// of jobs. Records that cannot be read are skipped.
    async fn find_local_id_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<LocalId>, StoreError>;

    /// Streams `source` to disk as the job's artifact
    ///
    /// Writing twice for the same job replaces the first artifact; callers
    /// gate this with [`ArtifactStore::try_claim`].
    async fn store_artifact(
        &self,
        id: &LocalId,
        source: &mut dyn ByteSource,
        suggested_name: &str,
    ) -> Result<StoredArtifact, StoreError>;

    /// Copies the source image of an image job next to its record
    async fn store_input(&self, id: &LocalId, image: &Path) -> Result<String, StoreError>;

    /// Atomically claims the right to materialize the artifact
    ///
    /// Returns `false` when another caller holds a claim younger than `ttl`.
    async fn try_claim(&self, id: &LocalId, ttl: Duration) -> Result<bool, StoreError>;

    /// Drops a claim taken with [`ArtifactStore::try_claim`]
    async fn release_claim(&self, id: &LocalId) -> Result<(), StoreError>;
}

/// Filesystem implementation of [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, id: &LocalId) -> PathBuf {
        self.job_dir(id).join(METADATA_FILE)
    }

    fn claim_path(&self, id: &LocalId) -> PathBuf {
        self.job_dir(id).join(CLAIM_FILE)
    }

    /// Runs `f` on the job directory while holding the job's exclusive lock
    ///
    /// `f` runs on the blocking pool, so waiting for the lock never stalls
    /// the async runtime.
    async fn with_job_lock<T, F>(&self, id: &LocalId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let dir = self.job_dir(id);
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            std::fs::create_dir_all(&dir)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(dir.join(LOCK_FILE))?;
            let mut lock = RwLock::new(file);
            let _guard = lock.write()?;
            f(&dir)
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

/// Reads a record from disk; a missing record reads as empty
fn load_record(path: &Path) -> Result<JobRecord, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(JobRecord::default()),
        Err(e) => Err(e.into()),
    }
}

/// Creates the claim file; `false` when it already exists
fn create_claim(path: &Path) -> Result<bool, StoreError> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            let stamp = chrono::Utc::now().to_rfc3339();
            file.write_all(stamp.as_bytes())?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Reduces a caller-supplied name to a plain file name
fn sanitize_name(suggested: &str) -> String {
    Path::new(suggested.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && !name.starts_with('.'))
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn allocate(&self) -> LocalId {
        loop {
            let id = LocalId::generate();
            if !self.job_dir(&id).exists() {
                return id;
            }
            debug!("Local id {} already taken, generating another", id);
        }
    }

    fn job_dir(&self, id: &LocalId) -> PathBuf {
        self.root.join(id.as_str())
    }

    async fn exists(&self, id: &LocalId) -> bool {
        fs::try_exists(self.metadata_path(id))
            .await
            .unwrap_or(false)
    }

    async fn read_record(&self, id: &LocalId) -> Result<JobRecord, StoreError> {
        match fs::read(self.metadata_path(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(JobRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(
        &self,
        id: &LocalId,
        update: JobRecord,
    ) -> Result<JobRecord, StoreError> {
        let path = self.metadata_path(id);
        self.with_job_lock(id, move |dir| {
            let mut record = load_record(&path)?;
            record.merge(update);
            record.version = RECORD_VERSION;

            let json = serde_json::to_vec_pretty(&record)?;
            let tmp = dir.join(format!("{}.{}.tmp", METADATA_FILE, uuid::Uuid::new_v4().simple()));
            std::fs::write(&tmp, &json)?;
            if let Err(e) = std::fs::rename(&tmp, &path) {
                let _ = std::fs::remove_file(&tmp);
                return Err(e.into());
            }

            Ok(record)
        })
        .await
    }

    async fn find_local_id_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<LocalId>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| LocalId::parse(name).ok())
            else {
                continue;
            };

            match self.read_record(&id).await {
                Ok(record) if record.remote_id.as_deref() == Some(remote_id) => {
                    return Ok(Some(id));
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable record {}: {}", id, e),
            }
        }

        Ok(None)
    }

    async fn store_artifact(
        &self,
        id: &LocalId,
        source: &mut dyn ByteSource,
        suggested_name: &str,
    ) -> Result<StoredArtifact, StoreError> {
        let dir = self.job_dir(id);
        fs::create_dir_all(&dir).await?;

        let file_name = sanitize_name(suggested_name);
        let path = dir.join(&file_name);
        let partial = dir.join(format!("{}.part", file_name));

        let mut file = fs::File::create(&partial).await?;
        let mut size_bytes = 0u64;
        let written: std::io::Result<()> = async {
            while let Some(chunk) = source.next_chunk().await? {
                file.write_all(&chunk).await?;
                size_bytes += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        fs::rename(&partial, &path).await?;

        debug!("Stored {} bytes for job {} at {}", size_bytes, id, path.display());
        Ok(StoredArtifact {
            file_name,
            path,
            size_bytes,
        })
    }

    async fn store_input(&self, id: &LocalId, image: &Path) -> Result<String, StoreError> {
        let dir = self.job_dir(id);
        fs::create_dir_all(&dir).await?;

        let ext = image
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "img".to_string());
        let file_name = format!("input.{}", ext);
        fs::copy(image, dir.join(&file_name)).await?;
        Ok(file_name)
    }

    async fn try_claim(&self, id: &LocalId, ttl: Duration) -> Result<bool, StoreError> {
        let path = self.claim_path(id);
        let job = id.clone();
        self.with_job_lock(id, move |_| {
            if create_claim(&path)? {
                return Ok(true);
            }

            let age = match std::fs::metadata(&path) {
                Ok(meta) => meta
                    .modified()
                    .ok()
                    .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                    .unwrap_or_default(),
                // Released between our attempt and now
                Err(e) if e.kind() == ErrorKind::NotFound => return create_claim(&path),
                Err(e) => return Err(e.into()),
            };

            if age < ttl {
                return Ok(false);
            }

            warn!("Taking over stale materialization claim for job {} ({:?} old)", job, age);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            create_claim(&path)
        })
        .await
    }

    async fn release_claim(&self, id: &LocalId) -> Result<(), StoreError> {
        match fs::remove_file(self.claim_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipjob_core::domain::job::JobStatus;
    use clipjob_core::domain::outcome::ProviderStatus;
    use clipjob_core::source::MemorySource;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().join("artifacts"));
        (dir, store)
    }

    fn submitted(remote_id: &str) -> JobRecord {
        JobRecord {
            remote_id: Some(remote_id.to_string()),
            status: Some(JobStatus::Submitted),
            parameters: json!({ "prompt": "a cat" }).as_object().cloned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_record_reads_as_empty() {
        let (_dir, store) = store();
        let id = store.allocate();

        assert!(!store.exists(&id).await);
        assert!(store.read_record(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_merges_partial_updates() {
        let (_dir, store) = store();
        let id = store.allocate();

        store.write_record(&id, submitted("pred-1")).await.unwrap();
        store
            .write_record(
                &id,
                JobRecord {
                    error: Some("still warming up".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.read_record(&id).await.unwrap();
        assert_eq!(record.version, RECORD_VERSION);
        assert_eq!(record.remote_id.as_deref(), Some("pred-1"));
        assert_eq!(record.error.as_deref(), Some("still warming up"));
        assert_eq!(record.parameters.unwrap()["prompt"], json!("a cat"));
        assert!(store.exists(&id).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_never_lose_a_success() {
        let (_dir, store) = store();
        let store = Arc::new(store);

        for _ in 0..100 {
            let id = store.allocate();
            store.write_record(&id, submitted("pred-1")).await.unwrap();

            let running = {
                let (store, id) = (store.clone(), id.clone());
                tokio::spawn(async move {
                    let update = JobRecord {
                        remote_status: Some(ProviderStatus::Processing),
                        ..Default::default()
                    };
                    store.write_record(&id, update).await
                })
            };
            let succeeded = {
                let (store, id) = (store.clone(), id.clone());
                tokio::spawn(async move {
                    let update = JobRecord {
                        status: Some(JobStatus::Succeeded),
                        output_path: Some("video.mp4".into()),
                        ..Default::default()
                    };
                    store.write_record(&id, update).await
                })
            };
            running.await.unwrap().unwrap();
            succeeded.await.unwrap().unwrap();

            let record = store.read_record(&id).await.unwrap();
            assert_eq!(record.status, Some(JobStatus::Succeeded));
            assert_eq!(record.output_path.as_deref(), Some("video.mp4"));
        }
    }

    #[tokio::test]
    async fn test_find_by_remote_id_scans_records() {
        let (_dir, store) = store();
        let first = store.allocate();
        let second = store.allocate();
        store.write_record(&first, submitted("pred-1")).await.unwrap();
        store.write_record(&second, submitted("pred-2")).await.unwrap();
        fs::create_dir_all(store.root().join("not a job")).await.unwrap();

        assert_eq!(
            store.find_local_id_by_remote_id("pred-2").await.unwrap(),
            Some(second)
        );
        assert_eq!(store.find_local_id_by_remote_id("pred-9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_on_empty_store_misses() {
        let (_dir, store) = store();
        assert_eq!(store.find_local_id_by_remote_id("pred-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_artifact_streams_to_disk() {
        let (_dir, store) = store();
        let id = store.allocate();
        let mut source = MemorySource::from_chunks(vec![vec![1u8; 10], vec![2u8; 5]]);

        let stored = store
            .store_artifact(&id, &mut source, "../../escape.mp4")
            .await
            .unwrap();

        assert_eq!(stored.file_name, "escape.mp4");
        assert_eq!(stored.size_bytes, 15);
        assert_eq!(stored.path, store.job_dir(&id).join("escape.mp4"));
        assert_eq!(fs::read(&stored.path).await.unwrap().len(), 15);
        assert!(!store.job_dir(&id).join("escape.mp4.part").exists());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_released() {
        let (_dir, store) = store();
        let id = store.allocate();
        let ttl = Duration::from_secs(600);

        assert!(store.try_claim(&id, ttl).await.unwrap());
        assert!(!store.try_claim(&id, ttl).await.unwrap());

        store.release_claim(&id).await.unwrap();
        assert!(store.try_claim(&id, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_claim_is_taken_over() {
        let (_dir, store) = store();
        let id = store.allocate();

        assert!(store.try_claim(&id, Duration::from_secs(600)).await.unwrap());
        assert!(store.try_claim(&id, Duration::ZERO).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stale_claim_has_one_new_owner() {
        let (_dir, store) = store();
        let store = Arc::new(store);
        let id = store.allocate();
        let ttl = Duration::from_secs(600);

        assert!(store.try_claim(&id, ttl).await.unwrap());
        let abandoned = std::fs::OpenOptions::new()
            .write(true)
            .open(store.claim_path(&id))
            .unwrap();
        abandoned
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
        drop(abandoned);

        let contenders: Vec<_> = (0..8)
            .map(|_| {
                let (store, id) = (store.clone(), id.clone());
                tokio::spawn(async move { store.try_claim(&id, ttl).await })
            })
            .collect();

        let mut owners = 0;
        for contender in contenders {
            if contender.await.unwrap().unwrap() {
                owners += 1;
            }
        }
        assert_eq!(owners, 1);
    }

    #[tokio::test]
    async fn test_store_input_copies_image() {
        let (dir, store) = store();
        let id = store.allocate();
        let image = dir.path().join("Photo.PNG");
        fs::write(&image, b"png").await.unwrap();

        let name = store.store_input(&id, &image).await.unwrap();

        assert_eq!(name, "input.png");
        assert_eq!(fs::read(store.job_dir(&id).join(name)).await.unwrap(), b"png");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("clip.webm"), "clip.webm");
        assert_eq!(sanitize_name("a/b/clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_name(".."), DEFAULT_ARTIFACT_NAME);
        assert_eq!(sanitize_name(""), DEFAULT_ARTIFACT_NAME);
    }
}
