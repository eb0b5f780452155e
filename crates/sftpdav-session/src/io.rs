use crate::error::Result;
use crate::ops::HandleId;
use crate::session::SharedSession;
use bytes::Bytes;
use log::debug;
use std::io::SeekFrom;

/// Streaming reader over an open remote file.
///
/// Each `read` is one serialized session round trip. Close explicitly when
/// done; if the reader is dropped mid-stream (client disconnect), a
/// best-effort close of the orphaned remote handle is spawned.
pub struct RemoteReader {
    session: SharedSession,
    handle: Option<HandleId>,
}

impl RemoteReader {
    pub(crate) fn new(session: SharedSession, handle: HandleId) -> Self {
        Self {
            session,
            handle: Some(handle),
        }
    }

    pub async fn read(&mut self, count: usize) -> Result<Bytes> {
        let handle = self.handle.ok_or(crate::SftpError::StaleHandle)?;
        self.session.read_chunk(handle, count).await
    }

    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let handle = self.handle.ok_or(crate::SftpError::StaleHandle)?;
        self.session.seek(handle, pos).await
    }

    pub async fn close(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.session.close(handle).await,
            None => Ok(()),
        }
    }
}

impl Drop for RemoteReader {
    fn drop(&mut self) {
        close_orphan(&self.session, self.handle.take());
    }
}

/// Streaming writer over an open remote file.
///
/// The write only counts as succeeded once `close` returns `Ok`; callers
/// must close on the failure path too so the remote handle is released.
pub struct RemoteWriter {
    session: SharedSession,
    handle: Option<HandleId>,
    written: u64,
}

impl RemoteWriter {
    pub(crate) fn new(session: SharedSession, handle: HandleId) -> Self {
        Self {
            session,
            handle: Some(handle),
            written: 0,
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.handle.ok_or(crate::SftpError::StaleHandle)?;
        self.session.write_chunk(handle, data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn close(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.session.close(handle).await,
            None => Ok(()),
        }
    }
}

impl Drop for RemoteWriter {
    fn drop(&mut self) {
        close_orphan(&self.session, self.handle.take());
    }
}

fn close_orphan(session: &SharedSession, handle: Option<HandleId>) {
    let Some(handle) = handle else { return };
    debug!("closing orphaned remote handle {:?}", handle);
    if let Ok(rt) = tokio::runtime::Handle::try_current() {
        let session = session.clone();
        rt.spawn(async move {
            let _ = session.close(handle).await;
        });
    }
}
