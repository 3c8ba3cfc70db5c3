use tracing::info;

use crate::config::{self, StorageKind};
use crate::error::{StorageError, StorageResult};
use crate::models::{Paste, PasteMetadata};

pub mod file;
#[cfg(feature = "s3")]
pub mod s3;
pub mod select;

pub use file::FileStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Persistence for pastes. Backends know nothing about expiry; callers decide
/// what an expired record means.
#[allow(async_fn_in_trait)]
pub trait Storage {
    /// Insert or replace a paste by id.
    async fn save(&self, paste: &Paste) -> StorageResult<()>;

    /// Get a paste by id. Missing, partial or unreadable records are `None`.
    async fn get(&self, id: &str) -> StorageResult<Option<Paste>>;

    /// Delete a paste by id. Deleting an unknown id succeeds.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    /// Metadata of every readable paste, in no particular order.
    async fn list(&self) -> StorageResult<Vec<PasteMetadata>>;
}

#[derive(Clone)]
pub enum AnyStorage {
    File(FileStorage),
    #[cfg(feature = "s3")]
    S3(S3Storage),
}

impl AnyStorage {
    /// Build the backend selected by `config`, failing before any I/O on
    /// missing mandatory settings.
    pub async fn connect(config: &config::Storage) -> StorageResult<Self> {
        match config.kind {
            StorageKind::File => {
                let storage = FileStorage::new(&config.file.dir).await?;
                info!("using file storage at {}", storage.dir().display());
                Ok(storage.into())
            }
            #[cfg(feature = "s3")]
            StorageKind::S3 => {
                let storage = S3Storage::new(&config.s3).await?;
                info!("using S3 storage in bucket '{}'", storage.bucket());
                Ok(storage.into())
            }
            #[cfg(not(feature = "s3"))]
            StorageKind::S3 => Err(StorageError::config(
                "S3 storage selected but this build lacks the `s3` feature",
            )),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            AnyStorage::File(_) => StorageKind::File,
            #[cfg(feature = "s3")]
            AnyStorage::S3(_) => StorageKind::S3,
        }
    }
}

impl Storage for AnyStorage {
    async fn save(&self, paste: &Paste) -> StorageResult<()> {
        match self {
            AnyStorage::File(file) => file.save(paste).await,
            #[cfg(feature = "s3")]
            AnyStorage::S3(s3) => s3.save(paste).await,
        }
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Paste>> {
        match self {
            AnyStorage::File(file) => file.get(id).await,
            #[cfg(feature = "s3")]
            AnyStorage::S3(s3) => s3.get(id).await,
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        match self {
            AnyStorage::File(file) => file.delete(id).await,
            #[cfg(feature = "s3")]
            AnyStorage::S3(s3) => s3.delete(id).await,
        }
    }

    async fn list(&self) -> StorageResult<Vec<PasteMetadata>> {
        match self {
            AnyStorage::File(file) => file.list().await,
            #[cfg(feature = "s3")]
            AnyStorage::S3(s3) => s3.list().await,
        }
    }
}

impl From<FileStorage> for AnyStorage {
    fn from(value: FileStorage) -> Self {
        AnyStorage::File(value)
    }
}

#[cfg(feature = "s3")]
impl From<S3Storage> for AnyStorage {
    fn from(value: S3Storage) -> Self {
        AnyStorage::S3(value)
    }
}

fn check_id(id: &str) -> StorageResult<()> {
    if crate::models::valid_id(id) {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_owned()))
    }
}

/// Behaviour every backend must share. Run against each backend so results
/// stay observationally equivalent.
#[cfg(test)]
pub(crate) async fn check_contract(storage: &impl Storage, prefix: &str) {
    use chrono::{DurationRound, Utc};

    // millisecond precision is what the object store keeps
    let now = Utc::now()
        .duration_trunc(chrono::Duration::milliseconds(1))
        .unwrap();
    let id = format!("{prefix}-abc123");
    let other_id = format!("{prefix}-def456");
    let missing_id = format!("{prefix}-nonexistent");

    let paste = Paste {
        id: id.clone(),
        language_id: "python".into(),
        data: "print(1)\n".into(),
        created_at: now,
        updated_at: now,
        expires_at: None,
    };
    let other = Paste {
        id: other_id.clone(),
        language_id: "plaintext".into(),
        data: "héllo wörld ✓".into(),
        created_at: now,
        updated_at: now,
        expires_at: Some(now + chrono::Duration::hours(1)),
    };

    storage.save(&paste).await.unwrap();
    storage.save(&other).await.unwrap();

    assert_eq!(storage.get(&id).await.unwrap(), Some(paste.clone()));
    assert_eq!(storage.get(&other_id).await.unwrap(), Some(other.clone()));

    // saving again is an upsert
    storage.save(&paste).await.unwrap();
    assert_eq!(storage.get(&id).await.unwrap(), Some(paste.clone()));

    assert_eq!(storage.get(&missing_id).await.unwrap(), None);
    assert_eq!(storage.get(&missing_id).await.unwrap(), None);
    storage.delete(&missing_id).await.unwrap();

    let listed = storage.list().await.unwrap();
    assert!(listed.contains(&paste.metadata()));
    assert!(listed.contains(&other.metadata()));

    storage.delete(&id).await.unwrap();
    assert_eq!(storage.get(&id).await.unwrap(), None);
    let listed = storage.list().await.unwrap();
    assert!(listed.iter().all(|meta| meta.id != id));
    assert!(listed.contains(&other.metadata()));

    storage.delete(&id).await.unwrap();
    storage.delete(&other_id).await.unwrap();
}
