use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub port: u16,
    pub storage: Storage,
    pub limits: Limits,
    pub word_lists: WordLists,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: "http://localhost:3000".into(),
            port: 3000,
            storage: Storage::default(),
            limits: Limits::default(),
            word_lists: WordLists::default(),
        }
    }
}

impl Config {
    /// Read the config file if it exists, then apply storage overrides from
    /// the environment.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text).context("failed to deserialize config")?
        } else {
            Config::default()
        };
        config.storage.apply_env();
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub kind: StorageKind,
    pub file: FileStorage,
    pub s3: S3Storage,
}

impl Storage {
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Overlay storage settings from `lookup`, which maps variable names to
    /// values. Empty values count as unset.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(kind) = var("STORAGE_TYPE") {
            self.kind = if kind.trim().eq_ignore_ascii_case("s3") {
                StorageKind::S3
            } else {
                StorageKind::File
            };
        }
        if let Some(dir) = var("STORAGE_DIR") {
            self.file.dir = dir.into();
        }

        let s3 = &mut self.s3;
        for (name, slot) in [
            ("AWS_BUCKET_NAME", &mut s3.bucket),
            ("AWS_REGION", &mut s3.region),
            ("AWS_ENDPOINT", &mut s3.endpoint),
            ("AWS_ACCESS_KEY_ID", &mut s3.access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &mut s3.secret_access_key),
        ] {
            if let Some(value) = var(name) {
                *slot = Some(value);
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileStorage {
    pub dir: PathBuf,
}

impl Default for FileStorage {
    fn default() -> Self {
        FileStorage {
            dir: PathBuf::from("files"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3Storage {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Storage {
    fn default() -> Self {
        S3Storage {
            bucket: None,
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: true,
        }
    }
}

impl S3Storage {
    /// The mandatory bucket and region, or a configuration error naming what
    /// is missing.
    pub fn bucket_and_region(&self) -> StorageResult<(&str, &str)> {
        let bucket = non_empty(&self.bucket);
        let region = non_empty(&self.region);
        match (bucket, region) {
            (Some(bucket), Some(region)) => Ok((bucket, region)),
            (None, Some(_)) => Err(StorageError::config("missing S3 bucket")),
            (Some(_), None) => Err(StorageError::config("missing S3 region")),
            (None, None) => Err(StorageError::config("missing S3 bucket and region")),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_upload_size: usize,
    /// Lifetime of new pastes. Unset means pastes never expire.
    pub expiration_secs: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_upload_size: 10 * 1024 * 1024,
            expiration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WordLists {
    pub adjectives_file: Option<PathBuf>,
    pub nouns_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overlay(vars: &[(&str, &str)]) -> Storage {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut storage = Storage::default();
        storage.apply_vars(|name| vars.get(name).cloned());
        storage
    }

    #[test]
    fn defaults_to_file_storage() {
        let storage = overlay(&[]);
        assert_eq!(storage.kind, StorageKind::File);
        assert_eq!(storage.file.dir, PathBuf::from("files"));
    }

    #[test]
    fn env_selects_s3() {
        let storage = overlay(&[
            ("STORAGE_TYPE", "s3"),
            ("AWS_BUCKET_NAME", "pastes"),
            ("AWS_REGION", "us-east-1"),
            ("AWS_ENDPOINT", "http://localhost:4566"),
        ]);
        assert_eq!(storage.kind, StorageKind::S3);
        assert_eq!(
            storage.s3.bucket_and_region().unwrap(),
            ("pastes", "us-east-1")
        );
        assert_eq!(storage.s3.endpoint.as_deref(), Some("http://localhost:4566"));
        assert!(storage.s3.force_path_style);
    }

    #[test]
    fn unknown_storage_type_falls_back_to_file() {
        let storage = overlay(&[("STORAGE_TYPE", "redis"), ("STORAGE_DIR", "/srv/pastes")]);
        assert_eq!(storage.kind, StorageKind::File);
        assert_eq!(storage.file.dir, PathBuf::from("/srv/pastes"));
    }

    #[test]
    fn missing_s3_identifiers_are_config_errors() {
        let storage = overlay(&[("STORAGE_TYPE", "s3"), ("AWS_REGION", "eu-west-1")]);
        assert!(matches!(
            storage.s3.bucket_and_region(),
            Err(StorageError::Config(_))
        ));

        let storage = overlay(&[("STORAGE_TYPE", "s3"), ("AWS_BUCKET_NAME", "  ")]);
        assert!(matches!(
            storage.s3.bucket_and_region(),
            Err(StorageError::Config(_))
        ));
    }

    #[test]
    fn parses_toml_with_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            base_url = "https://paste.example.com"

            [storage]
            kind = "s3"

            [storage.s3]
            bucket = "pastes"
            region = "us-east-1"
            force_path_style = false

            [limits]
            expiration_secs = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://paste.example.com");
        assert_eq!(config.port, 3000);
        assert_eq!(config.storage.kind, StorageKind::S3);
        assert!(!config.storage.s3.force_path_style);
        assert_eq!(config.limits.expiration_secs, Some(3600));
        assert_eq!(config.limits.max_upload_size, 10 * 1024 * 1024);
        assert!(config.word_lists.nouns_file.is_none());
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.port, 3000);
    }
}
