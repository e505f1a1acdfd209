// src/download.rs

//! Download collaborator for the local RPC backend binary.
//!
//! The orchestrator calls [`Downloader::download_if_not_exists`] before every
//! local launch. Fetching binaries over the network is owned by the
//! installer; [`InstalledBinary`] only verifies that the binary is in place.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::exec::BoxFuture;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("binary not found at {0:?}")]
    Missing(PathBuf),

    #[error("{0:?} exists but is not a file")]
    NotAFile(PathBuf),

    #[error("download failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Makes sure a binary is available before it is launched.
pub trait Downloader: Send + Debug {
    fn download_if_not_exists(&mut self) -> BoxFuture<'_, Result<(), DownloadError>>;
}

/// Downloader that succeeds only when the binary is already installed.
#[derive(Debug, Clone)]
pub struct InstalledBinary {
    path: PathBuf,
}

impl InstalledBinary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Downloader for InstalledBinary {
    fn download_if_not_exists(&mut self) -> BoxFuture<'_, Result<(), DownloadError>> {
        let path = self.path.clone();

        Box::pin(async move {
            let meta = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(DownloadError::Missing(path));
                }
                Err(e) => return Err(DownloadError::Io(e)),
            };

            if !meta.is_file() {
                return Err(DownloadError::NotAFile(path));
            }

            debug!(path = ?path, "binary already installed");
            Ok(())
        })
    }
}
