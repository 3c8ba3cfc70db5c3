use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::{check_id, Storage};
use crate::error::{StorageError, StorageResult};
use crate::models::{valid_id, Paste, PasteMetadata};

const METADATA_FILE: &str = "metadata.json";
const CONTENT_FILE: &str = "content.txt";

/// Stores each paste as `<dir>/<id>/metadata.json` plus `<dir>/<id>/content.txt`.
#[derive(Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub async fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir: PathBuf = dir.into();

        if dir.exists() && !dir.is_dir() {
            return Err(StorageError::config(format!(
                "storage path {} is not a directory",
                dir.display()
            )));
        }

        fs::create_dir_all(&dir).await?;

        Ok(FileStorage { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paste_dir(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }
}

impl Storage for FileStorage {
    async fn save(&self, paste: &Paste) -> StorageResult<()> {
        check_id(&paste.id)?;

        let dir = self.paste_dir(&paste.id);
        fs::create_dir_all(&dir).await?;

        let metadata = serde_json::to_vec_pretty(&paste.metadata())?;
        write_replace(&dir.join(METADATA_FILE), &metadata).await?;
        write_replace(&dir.join(CONTENT_FILE), paste.data.as_bytes()).await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Paste>> {
        if !valid_id(id) {
            return Ok(None);
        }

        let dir = self.paste_dir(id);
        let Some(metadata) = read_metadata(&dir, id).await? else {
            return Ok(None);
        };

        match fs::read_to_string(dir.join(CONTENT_FILE)).await {
            Ok(data) => Ok(Some(Paste::from_parts(metadata, data))),
            Err(e) if reads_as_absent(&e) => {
                debug!("paste '{id}' has unreadable content: {e}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        if !valid_id(id) {
            return Ok(());
        }

        match fs::remove_dir_all(self.paste_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<PasteMetadata>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pastes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_dir = match entry.file_type().await {
                Ok(file_type) => file_type.is_dir(),
                Err(e) => {
                    warn!("skipping {}: {e}", entry.path().display());
                    continue;
                }
            };
            if !is_dir {
                continue;
            }

            let name = entry.file_name();
            let Some(id) = name.to_str().filter(|id| valid_id(id)) else {
                debug!("skipping non-paste directory {}", entry.path().display());
                continue;
            };

            match read_metadata(&entry.path(), id).await {
                Ok(Some(metadata)) => pastes.push(metadata),
                Ok(None) => {}
                Err(e) => warn!("skipping paste '{id}': {e}"),
            }
        }

        Ok(pastes)
    }
}

/// Read and parse the metadata of the paste stored in `dir`. Missing or
/// corrupted metadata is `None`.
async fn read_metadata(dir: &Path, id: &str) -> StorageResult<Option<PasteMetadata>> {
    let raw = match fs::read_to_string(dir.join(METADATA_FILE)).await {
        Ok(raw) => raw,
        Err(e) if reads_as_absent(&e) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<PasteMetadata>(&raw) {
        Ok(metadata) if metadata.id == id => Ok(Some(metadata)),
        Ok(metadata) => {
            debug!(
                "paste '{id}' has metadata for '{other}'",
                other = metadata.id
            );
            Ok(None)
        }
        Err(e) => {
            debug!("paste '{id}' has corrupted metadata: {e}");
            Ok(None)
        }
    }
}

/// Replace `path` with `data` so readers see either the old or the new file.
async fn write_replace(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await
}

/// A stray file where the paste directory belongs, or a directory where a
/// paste file belongs, is as good as missing.
fn reads_as_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound
            | io::ErrorKind::InvalidData
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::IsADirectory
    )
}
