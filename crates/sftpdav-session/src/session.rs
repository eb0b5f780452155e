use crate::error::Result;
use crate::io::{RemoteReader, RemoteWriter};
use crate::ops::{HandleId, RemoteEntry, RemoteStat, SftpOps, WriteMode};
use bytes::Bytes;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Clonable handle to the one SFTP session backing a bridge instance.
///
/// SFTP sessions are single-channel request/response; interleaving two
/// operations corrupts the protocol stream. Every primitive call below
/// acquires the session mutex for the duration of exactly one remote round
/// trip, so concurrent WebDAV requests against the same session serialize
/// at this layer and nowhere else.
///
/// Nodes hold clones of this handle; the underlying session is owned here
/// and released when the last clone drops.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Box<dyn SftpOps>>>,
}

impl SharedSession {
    pub fn new(ops: impl SftpOps + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(ops))),
        }
    }

    pub async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.inner.lock().await.read_dir(path).await
    }

    pub async fn stat(&self, path: &str) -> Result<RemoteStat> {
        self.inner.lock().await.stat(path).await
    }

    pub async fn mkdir(&self, path: &str) -> Result<()> {
        self.inner.lock().await.mkdir(path).await
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        self.inner.lock().await.rmdir(path).await
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.inner.lock().await.rename(from, to).await
    }

    pub async fn unlink(&self, path: &str) -> Result<()> {
        self.inner.lock().await.unlink(path).await
    }

    pub async fn read_chunk(&self, handle: HandleId, count: usize) -> Result<Bytes> {
        self.inner.lock().await.read_chunk(handle, count).await
    }

    pub async fn write_chunk(&self, handle: HandleId, data: &[u8]) -> Result<()> {
        self.inner.lock().await.write_chunk(handle, data).await
    }

    pub async fn seek(&self, handle: HandleId, pos: SeekFrom) -> Result<u64> {
        self.inner.lock().await.seek(handle, pos).await
    }

    pub async fn close(&self, handle: HandleId) -> Result<()> {
        self.inner.lock().await.close(handle).await
    }

    /// Open a remote file for reading and wrap the handle in a streaming
    /// reader. The caller is responsible for closing it.
    pub async fn start_read(&self, path: &str) -> Result<RemoteReader> {
        let handle = self.inner.lock().await.open_read(path).await?;
        Ok(RemoteReader::new(self.clone(), handle))
    }

    /// Open a remote file for writing. The write is not visible as complete
    /// until the returned writer is closed.
    pub async fn start_write(&self, path: &str, mode: WriteMode) -> Result<RemoteWriter> {
        let handle = self.inner.lock().await.open_write(path, mode).await?;
        Ok(RemoteWriter::new(self.clone(), handle))
    }
}
