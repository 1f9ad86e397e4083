//! Storage facade tying the local filesystem to the remote engines
//!
//! Commands talk to [`Storage`] for anything that touches local files or the
//! standard streams, and to the [`Session`] for purely remote work.

use std::path::{Path, PathBuf};

use tokio::fs::File;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::traits::{PutReceipt, TransferMetadata};
use crate::uri::StorageUri;

/// Local + remote transfer entry points
#[derive(Debug, Clone)]
pub struct Storage {
    session: Session,
}

impl Storage {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Upload a regular file
    pub async fn upload_file(
        &self,
        path: &Path,
        uri: &StorageUri,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt> {
        let file = File::open(path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }
        tracing::debug!(path = %path.display(), size = meta.len(), uri = %uri, "Uploading file");
        self.session
            .upload_reader(uri, file, Some(meta.len()), metadata)
            .await
    }

    /// Upload whatever arrives on stdin
    pub async fn upload_stdin(
        &self,
        uri: &StorageUri,
        metadata: &TransferMetadata,
    ) -> Result<PutReceipt> {
        self.session
            .upload_reader(uri, tokio::io::stdin(), None, metadata)
            .await
    }

    /// Download into `path`, creating parent directories
    ///
    /// Data lands in a sibling temporary file that is renamed into place on
    /// success and removed on failure, so `path` never holds a partial object.
    pub async fn download_file(&self, uri: &StorageUri, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = staging_path(path);
        let mut file = File::create(&staging).await?;
        let result = self.session.download(uri, &mut file).await;
        drop(file);

        match result {
            Ok(written) => {
                tokio::fs::rename(&staging, path).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                    tracing::warn!(path = %staging.display(), error = %cleanup, "Could not remove partial download");
                }
                Err(e)
            }
        }
    }

    /// Stream an object to stdout
    pub async fn download_stdout(&self, uri: &StorageUri) -> Result<u64> {
        let mut stdout = tokio::io::stdout();
        self.session.download(uri, &mut stdout).await
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    path.with_file_name(format!(".{name}.s6cmd-partial"))
}
