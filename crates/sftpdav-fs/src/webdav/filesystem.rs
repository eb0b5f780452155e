//! WebDAV filesystem adapter over the bridge nodes.
//!
//! This module implements the `dav_server::fs::DavFileSystem` trait by
//! resolving each request path lazily, one segment at a time, from the
//! bridge root. Hidden-entry masking applies at every segment. Structured
//! bridge errors are translated to the `FsError` signalling convention of
//! the WebDAV library here and nowhere else.

use crate::error::BridgeError;
use crate::node::{DirectoryNode, FileNode, Node};
use crate::path::SftpPath;
use dav_server::davpath::DavPath;
use dav_server::fs::{
    DavDirEntry, DavFile, DavFileSystem, DavMetaData, FsError, FsFuture, FsStream, OpenOptions,
    ReadDirMeta,
};
use futures::stream;
use log::{debug, trace};
use sftpdav_session::{RemoteReader, RemoteStat, RemoteWriter, SftpError, SharedSession};
use std::io::SeekFrom;
use std::time::SystemTime;

/// WebDAV filesystem bridging to a remote SFTP server.
///
/// All traffic flows through the single shared session; nodes are
/// constructed per request and never cached.
#[derive(Clone)]
pub struct SftpDavFs {
    session: SharedSession,
    root: SftpPath,
}

impl SftpDavFs {
    /// Bind a bridge filesystem to a session and an exported root.
    pub fn new(session: SharedSession, root: SftpPath) -> Self {
        Self { session, root }
    }

    fn root_node(&self) -> DirectoryNode {
        DirectoryNode::new(self.root.clone(), self.session.clone())
    }

    /// Split a WebDAV path into its logical segments. Parent-dir segments
    /// never make it past here.
    fn segments(path: &DavPath) -> Result<Vec<String>, FsError> {
        let raw = path.as_rel_ospath().to_string_lossy().into_owned();
        let mut out = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." {
                return Err(FsError::Forbidden);
            }
            out.push(segment.to_string());
        }
        Ok(out)
    }

    /// Resolve a WebDAV path to a node, one remote check per segment.
    async fn resolve(&self, path: &DavPath) -> Result<Node, FsError> {
        let mut node = Node::Directory(self.root_node());
        for segment in Self::segments(path)? {
            let dir = node.as_directory().map_err(|e| map_bridge_error(&e))?;
            node = dir
                .resolve_child(&segment)
                .await
                .map_err(|e| map_bridge_error(&e))?;
        }
        Ok(node)
    }

    /// Resolve everything but the final segment, returning the parent
    /// directory node and the final name. Fails on the root itself.
    async fn resolve_parent(&self, path: &DavPath) -> Result<(DirectoryNode, String), FsError> {
        let mut segments = Self::segments(path)?;
        let name = segments.pop().ok_or(FsError::Forbidden)?;
        let mut dir = self.root_node();
        for segment in segments {
            let node = dir
                .resolve_child(&segment)
                .await
                .map_err(|e| map_bridge_error(&e))?;
            dir = match node {
                Node::Directory(d) => d,
                Node::File(_) => return Err(FsError::NotFound),
            };
        }
        Ok((dir, name))
    }

    /// Map a WebDAV path to its SFTP path without remote checks, applying
    /// hidden-name policy per segment. Used for MOVE destinations.
    fn logical_path(&self, path: &DavPath) -> Result<SftpPath, FsError> {
        let mut out = self.root.clone();
        for segment in Self::segments(path)? {
            out = out.child(&segment).map_err(|e| map_bridge_error(&e))?;
        }
        Ok(out)
    }
}

/// Boundary translation: structured bridge errors to the signalling
/// convention the WebDAV library expects. Hidden entries map to not-found
/// (policy-masked existence), permission failures to forbidden, everything
/// else to a generic failure.
fn map_bridge_error(err: &BridgeError) -> FsError {
    match err {
        BridgeError::Hidden(_) => FsError::NotFound,
        BridgeError::InvalidName(_) => FsError::Forbidden,
        BridgeError::NotADirectory(_) | BridgeError::NotAFile(_) => FsError::NotFound,
        BridgeError::Sftp(err) => map_sftp_error(err),
    }
}

fn map_sftp_error(err: &SftpError) -> FsError {
    match err {
        SftpError::NotFound(_) => FsError::NotFound,
        SftpError::AccessDenied(_) | SftpError::AuthFailed(_) => FsError::Forbidden,
        SftpError::Operation { .. }
        | SftpError::StaleHandle
        | SftpError::Ssh(_)
        | SftpError::Io(_) => FsError::GeneralFailure,
    }
}

impl DavFileSystem for SftpDavFs {
    fn open<'a>(&'a self, path: &'a DavPath, options: OpenOptions) -> FsFuture<'a, Box<dyn DavFile>> {
        Box::pin(async move {
            trace!("open({:?}, {:?})", path, options);

            if options.append {
                return Err(FsError::NotImplemented);
            }

            let wants_write =
                options.write || options.create || options.create_new || options.truncate;
            if wants_write {
                let (parent, name) = self.resolve_parent(path).await?;

                if options.create_new {
                    if parent.child_exists(&name).await {
                        return Err(FsError::Exists);
                    }
                    // The create-exclusive open still guards the race.
                    let writer = parent
                        .start_create_file(&name)
                        .await
                        .map_err(|e| map_bridge_error(&e))?;
                    return Ok(Box::new(SftpDavFile::write(writer)) as Box<dyn DavFile>);
                }

                match parent.resolve_child(&name).await {
                    Ok(Node::File(file)) => {
                        let writer = file
                            .start_replace()
                            .await
                            .map_err(|e| map_bridge_error(&e))?;
                        Ok(Box::new(SftpDavFile::write(writer)) as Box<dyn DavFile>)
                    }
                    Ok(Node::Directory(_)) => Err(FsError::Forbidden),
                    Err(BridgeError::Sftp(SftpError::NotFound(_))) if options.create => {
                        let writer = parent
                            .start_create_file(&name)
                            .await
                            .map_err(|e| map_bridge_error(&e))?;
                        Ok(Box::new(SftpDavFile::write(writer)) as Box<dyn DavFile>)
                    }
                    Err(err) => Err(map_bridge_error(&err)),
                }
            } else {
                let node = self.resolve(path).await?;
                let file = match node {
                    Node::File(file) => file,
                    Node::Directory(_) => return Err(FsError::Forbidden),
                };
                let stat = file.stat().await.map_err(|e| map_bridge_error(&e))?;
                let reader = file.open_read().await.map_err(|e| map_bridge_error(&e))?;
                Ok(Box::new(SftpDavFile::read(file, reader, stat)) as Box<dyn DavFile>)
            }
        })
    }

    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        _meta: ReadDirMeta,
    ) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        Box::pin(async move {
            trace!("read_dir({:?})", path);

            let node = self.resolve(path).await?;
            let dir = node.as_directory().map_err(|e| map_bridge_error(&e))?;
            let entries = dir.list_entries().await.map_err(|e| map_bridge_error(&e))?;
            debug!("read_dir {}: {} entries", dir.path(), entries.len());

            let dav_entries: Vec<Box<dyn DavDirEntry>> = entries
                .into_iter()
                .map(|(node, stat)| {
                    Box::new(SftpDavDirEntry {
                        name: node.name().to_string(),
                        stat,
                    }) as Box<dyn DavDirEntry>
                })
                .collect();
            let stream = stream::iter(dav_entries.into_iter().map(Ok));
            Ok(Box::pin(stream) as FsStream<Box<dyn DavDirEntry>>)
        })
    }

    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        Box::pin(async move {
            trace!("metadata({:?})", path);

            let node = self.resolve(path).await?;
            match node {
                Node::Directory(dir) => {
                    let stat = self
                        .session
                        .stat(dir.path().as_str())
                        .await
                        .map_err(|e| map_sftp_error(&e))?;
                    Ok(Box::new(SftpDavMetaData::from_stat(&stat, None)) as Box<dyn DavMetaData>)
                }
                Node::File(file) => {
                    let stat = file.stat().await.map_err(|e| map_bridge_error(&e))?;
                    // Full-content hash, one remote read per call.
                    let etag = file.etag().await.map_err(|e| map_bridge_error(&e))?;
                    Ok(Box::new(SftpDavMetaData::from_stat(&stat, Some(etag)))
                        as Box<dyn DavMetaData>)
                }
            }
        })
    }

    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            trace!("create_dir({:?})", path);

            let (parent, name) = self.resolve_parent(path).await?;
            parent
                .create_subdirectory(&name)
                .await
                .map_err(|e| map_bridge_error(&e))?;
            Ok(())
        })
    }

    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            trace!("remove_dir({:?})", path);

            let node = self.resolve(path).await?;
            let dir = node.as_directory().map_err(|e| map_bridge_error(&e))?;
            dir.delete().await.map_err(|e| map_bridge_error(&e))
        })
    }

    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            trace!("remove_file({:?})", path);

            let node = self.resolve(path).await?;
            let file = node.as_file().map_err(|e| map_bridge_error(&e))?;
            file.delete().await.map_err(|e| map_bridge_error(&e))
        })
    }

    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            trace!("rename({:?}, {:?})", from, to);

            let node = self.resolve(from).await?;
            let dest = self.logical_path(to)?;
            node.move_to(&dest).await.map_err(|e| map_bridge_error(&e))
        })
    }
}

/// Open WebDAV file: either a streaming read or a streaming write over one
/// remote handle.
struct SftpDavFile {
    inner: SftpDavFileInner,
}

enum SftpDavFileInner {
    Read {
        node: FileNode,
        reader: Option<RemoteReader>,
        stat: RemoteStat,
        // Computed once per open file; node-level etag() still recomputes.
        etag: Option<String>,
    },
    Write {
        writer: Option<RemoteWriter>,
    },
}

impl SftpDavFile {
    fn read(node: FileNode, reader: RemoteReader, stat: RemoteStat) -> Self {
        Self {
            inner: SftpDavFileInner::Read {
                node,
                reader: Some(reader),
                stat,
                etag: None,
            },
        }
    }

    fn write(writer: RemoteWriter) -> Self {
        Self {
            inner: SftpDavFileInner::Write {
                writer: Some(writer),
            },
        }
    }
}

impl std::fmt::Debug for SftpDavFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            SftpDavFileInner::Read { node, .. } => {
                write!(f, "SftpDavFile::Read({})", node.path())
            }
            SftpDavFileInner::Write { .. } => write!(f, "SftpDavFile::Write"),
        }
    }
}

impl DavFile for SftpDavFile {
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        Box::pin(async move {
            match &mut self.inner {
                SftpDavFileInner::Read {
                    node,
                    stat,
                    etag,
                    ..
                } => {
                    if etag.is_none() {
                        *etag = Some(node.etag().await.map_err(|e| map_bridge_error(&e))?);
                    }
                    Ok(Box::new(SftpDavMetaData::from_stat(stat, etag.clone()))
                        as Box<dyn DavMetaData>)
                }
                SftpDavFileInner::Write { writer } => {
                    let len = writer.as_ref().map(|w| w.written()).unwrap_or(0);
                    Ok(Box::new(SftpDavMetaData {
                        is_dir: false,
                        len,
                        modified: SystemTime::now(),
                        etag: None,
                    }) as Box<dyn DavMetaData>)
                }
            }
        })
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, bytes::Bytes> {
        Box::pin(async move {
            match &mut self.inner {
                SftpDavFileInner::Read { reader, .. } => {
                    let reader = reader.as_mut().ok_or(FsError::GeneralFailure)?;
                    reader.read(count).await.map_err(|e| map_sftp_error(&e))
                }
                SftpDavFileInner::Write { .. } => Err(FsError::Forbidden),
            }
        })
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64> {
        Box::pin(async move {
            match &mut self.inner {
                SftpDavFileInner::Read { reader, .. } => {
                    let reader = reader.as_mut().ok_or(FsError::GeneralFailure)?;
                    reader.seek(pos).await.map_err(|e| map_sftp_error(&e))
                }
                // PUT bodies stream sequentially; a repositioned write would
                // silently corrupt the upload, so refuse it outright.
                SftpDavFileInner::Write { .. } => Err(FsError::NotImplemented),
            }
        })
    }

    fn write_buf(&mut self, mut buf: Box<dyn bytes::Buf + Send>) -> FsFuture<'_, ()> {
        Box::pin(async move {
            match &mut self.inner {
                SftpDavFileInner::Write { writer } => {
                    let writer = writer.as_mut().ok_or(FsError::GeneralFailure)?;
                    while buf.has_remaining() {
                        let chunk = buf.chunk();
                        if chunk.is_empty() {
                            break;
                        }
                        writer
                            .write(chunk)
                            .await
                            .map_err(|e| map_sftp_error(&e))?;
                        let len = chunk.len();
                        buf.advance(len);
                    }
                    Ok(())
                }
                SftpDavFileInner::Read { .. } => Err(FsError::Forbidden),
            }
        })
    }

    fn write_bytes(&mut self, buf: bytes::Bytes) -> FsFuture<'_, ()> {
        Box::pin(async move {
            match &mut self.inner {
                SftpDavFileInner::Write { writer } => {
                    let writer = writer.as_mut().ok_or(FsError::GeneralFailure)?;
                    writer.write(&buf).await.map_err(|e| map_sftp_error(&e))
                }
                SftpDavFileInner::Read { .. } => Err(FsError::Forbidden),
            }
        })
    }

    fn flush(&mut self) -> FsFuture<'_, ()> {
        Box::pin(async move {
            match &mut self.inner {
                SftpDavFileInner::Write { writer } => match writer.take() {
                    Some(writer) => writer.close().await.map_err(|e| map_sftp_error(&e)),
                    None => Ok(()),
                },
                SftpDavFileInner::Read { reader, .. } => match reader.take() {
                    Some(reader) => reader.close().await.map_err(|e| map_sftp_error(&e)),
                    None => Ok(()),
                },
            }
        })
    }
}

struct SftpDavDirEntry {
    name: String,
    stat: RemoteStat,
}

impl DavDirEntry for SftpDavDirEntry {
    fn name(&self) -> Vec<u8> {
        self.name.as_bytes().to_vec()
    }

    fn metadata(&self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        // No etag here: hashing every file in a directory on PROPFIND
        // depth 1 would read the whole directory's content remotely.
        let meta = SftpDavMetaData::from_stat(&self.stat, None);
        Box::pin(async move { Ok(Box::new(meta) as Box<dyn DavMetaData>) })
    }
}

#[derive(Clone, Debug)]
struct SftpDavMetaData {
    is_dir: bool,
    len: u64,
    modified: SystemTime,
    etag: Option<String>,
}

impl SftpDavMetaData {
    fn from_stat(stat: &RemoteStat, etag: Option<String>) -> Self {
        Self {
            is_dir: stat.is_dir,
            len: stat.size,
            modified: stat.modified.unwrap_or(SystemTime::UNIX_EPOCH),
            etag,
        }
    }
}

impl DavMetaData for SftpDavMetaData {
    fn len(&self) -> u64 {
        self.len
    }

    fn modified(&self) -> Result<SystemTime, FsError> {
        Ok(self.modified)
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn etag(&self) -> Option<String> {
        self.etag.clone()
    }
}
