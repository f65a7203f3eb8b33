//! Storage of uploaded images and audio files.

use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Number of distinct suffix tokens tried before giving up on a name.
const TOKEN_SPACE: u64 = 10_000;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Field {0} does not contain a file")]
    MissingFile(String),

    #[error("Request too large: {0}")]
    TooLarge(String),
}

/// An uploaded file written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub path: PathBuf,
    /// Path relative to the site root, recorded on catalog entries.
    pub public_path: String,
}

pub struct UploadStore {
    root: PathBuf,
    public_prefix: String,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn init(&self) -> Result<(), UploadError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Writes `data` under a new name built from `base` and the extension of
    /// `original_name`. Existing files are never overwritten.
    pub async fn store(
        &self,
        base: &str,
        original_name: Option<&str>,
        data: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        fs::create_dir_all(&self.root).await?;
        let extension = original_name.map(sanitize_extension).unwrap_or_default();
        let first_token = Utc::now().timestamp_millis().unsigned_abs() % TOKEN_SPACE;

        for attempt in 0..TOKEN_SPACE {
            let token = (first_token + attempt) % TOKEN_SPACE;
            let file_name = format!("{}_{:04}{}", base, token, extension);
            let path = self.root.join(&file_name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            };

            let written = async {
                file.write_all(data).await?;
                file.flush().await
            }
            .await;
            if let Err(err) = written {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(err.into());
            }

            return Ok(StoredUpload {
                path,
                public_path: format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name),
            });
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free file name left for {}", base),
        )
        .into())
    }

    /// Deletes a file written earlier in a request that failed later on.
    pub async fn discard(&self, upload: &StoredUpload) {
        if let Err(err) = fs::remove_file(&upload.path).await {
            warn!("Could not remove {}: {}", upload.path.display(), err);
        }
    }
}

/// Builds the file name base from a human title: trimmed, whitespace runs
/// turned into `_`, anything but ASCII letters, digits and `_` dropped.
/// Falls back to `upload-<unix millis>` when nothing usable is left.
pub fn derive_base_name(title: Option<&str>) -> String {
    let base = title.map(sanitize_title).unwrap_or_default();
    if base.is_empty() {
        format!("upload-{}", Utc::now().timestamp_millis())
    } else {
        base
    }
}

fn sanitize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn sanitize_extension(file_name: &str) -> String {
    let extension: String = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if extension.is_empty() {
        extension
    } else {
        format!(".{}", extension)
    }
}
