//! Per-session staging area for uploaded attachments.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

/// Location of one staged attachment inside an [`AttachmentStore`].
///
/// The on-disk name is sequential (`file-000`, `file-001`, ...) and never
/// shown to recipients; the display name travels separately in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHandle(PathBuf);

impl StorageHandle {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Scoped temporary directory holding the bytes of a draft's attachments.
///
/// The directory and everything in it is removed by [`release`](Self::release)
/// or, failing an explicit call, when the store is dropped. The default value
/// is an already-released store.
#[derive(Debug, Default)]
pub struct AttachmentStore {
    dir: Option<TempDir>,
    count: usize,
}

impl AttachmentStore {
    /// Allocate a fresh, uniquely named temporary directory.
    pub fn open() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("listmail-")
            .tempdir()
            .map_err(|e| Error::Store(format!("could not create temporary directory: {e}")))?;
        debug!("Opened attachment store at {}", dir.path().display());
        Ok(Self {
            dir: Some(dir),
            count: 0,
        })
    }

    /// Copy the whole of `reader` into a new file and return its handle.
    ///
    /// A failed copy leaves previously staged attachments untouched.
    pub async fn put<R>(&mut self, display_name: &str, mut reader: R) -> Result<StorageHandle>
    where
        R: AsyncRead + Unpin,
    {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| Error::Store("attachment store already released".to_string()))?;
        let path = dir.path().join(format!("file-{:03}", self.count));

        let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
            Error::Store(format!("could not add attachment {display_name:?}: {e}"))
        })?;
        let size = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            Error::Store(format!("could not copy attachment {display_name:?}: {e}"))
        })?;
        file.flush().await.map_err(|e| {
            Error::Store(format!("could not close attachment {display_name:?}: {e}"))
        })?;

        self.count += 1;
        debug!("Staged attachment {display_name:?} ({size} bytes) as {}", path.display());
        Ok(StorageHandle(path))
    }

    /// Read back the bytes behind `handle`.
    pub async fn read(&self, handle: &StorageHandle) -> Result<Vec<u8>> {
        if self.dir.is_none() {
            return Err(Error::Store("attachment store already released".to_string()));
        }
        tokio::fs::read(handle.path()).await.map_err(|e| {
            Error::Store(format!("could not read {}: {e}", handle.path().display()))
        })
    }

    /// Remove the directory and every staged file. Safe to call repeatedly;
    /// cleanup errors are logged and swallowed.
    pub fn release(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!("Released attachment store {}", path.display()),
            Err(e) => warn!("Could not clean up attachment store {}: {e}", path.display()),
        }
    }

    /// Number of attachments staged so far.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Directory backing the store, `None` once released.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }
}

impl Drop for AttachmentStore {
    fn drop(&mut self) {
        self.release();
    }
}
