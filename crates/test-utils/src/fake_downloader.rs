use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chainsvc::download::{DownloadError, Downloader};
use chainsvc::exec::BoxFuture;

/// A downloader that never touches the network and counts its calls.
#[derive(Debug, Clone, Default)]
pub struct FakeDownloader {
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeDownloader {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for FakeDownloader {
    fn download_if_not_exists(&mut self) -> BoxFuture<'_, Result<(), DownloadError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.clone();
        Box::pin(async move {
            match failure {
                Some(reason) => Err(DownloadError::Failed(reason)),
                None => Ok(()),
            }
        })
    }
}
