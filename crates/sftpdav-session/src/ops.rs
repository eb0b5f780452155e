use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::time::SystemTime;

/// Opaque identifier for an open remote file.
///
/// The SFTP wire protocol is handle-based even though bridge resource
/// identity is path-based; handles are only meaningful to the session that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

/// How to open a remote file for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Atomic create-exclusive: fails if the path already exists.
    CreateExclusive,
    /// Truncate an existing file. The caller is responsible for checking
    /// existence first; servers that allow implicit creation are not relied
    /// upon either way.
    Truncate,
}

/// Remote stat result.
#[derive(Debug, Clone, Copy)]
pub struct RemoteStat {
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub stat: RemoteStat,
}

/// The primitive-operation boundary to one SFTP server.
///
/// Each method is exactly one remote round trip (or one open handle's worth
/// of state change). Implementations do not retry; every failure surfaces
/// immediately. Tests substitute an in-memory fake through this trait.
///
/// Methods take `&mut self`: callers go through [`SharedSession`], which
/// serializes all access behind a mutex, so no two primitive calls against
/// the same session can ever interleave on the wire.
///
/// [`SharedSession`]: crate::SharedSession
#[async_trait]
pub trait SftpOps: Send {
    /// List the entries of a remote directory, including `.` and `..` if
    /// the server reports them. Filtering is bridge policy, not transport
    /// behavior.
    async fn read_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn stat(&mut self, path: &str) -> Result<RemoteStat>;

    async fn mkdir(&mut self, path: &str) -> Result<()>;

    /// Remove a directory. Non-empty directories fail with the server's own
    /// rmdir error; no pre-check is performed.
    async fn rmdir(&mut self, path: &str) -> Result<()>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    async fn unlink(&mut self, path: &str) -> Result<()>;

    async fn open_read(&mut self, path: &str) -> Result<HandleId>;

    async fn open_write(&mut self, path: &str, mode: WriteMode) -> Result<HandleId>;

    /// Read up to `count` bytes from an open handle. An empty result means
    /// end of file.
    async fn read_chunk(&mut self, handle: HandleId, count: usize) -> Result<Bytes>;

    async fn write_chunk(&mut self, handle: HandleId, data: &[u8]) -> Result<()>;

    async fn seek(&mut self, handle: HandleId, pos: SeekFrom) -> Result<u64>;

    /// Close an open handle, flushing pending writes.
    async fn close(&mut self, handle: HandleId) -> Result<()>;
}
