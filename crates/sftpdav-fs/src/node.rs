//! Directory and file nodes: live, stateless views of the remote server.
//!
//! A node is `{path, session}` and nothing else. Nodes are constructed on
//! each path resolution, never cached, and every query goes back to the
//! remote server; there is no open/closed lifecycle beyond the transient
//! read/write streams created per operation.

use crate::error::{BridgeError, Result};
use crate::path::{is_hidden, SftpPath};
use log::{debug, warn};
use sftpdav_session::{RemoteReader, RemoteStat, RemoteWriter, SftpError, SharedSession, WriteMode};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Chunk size for stream copies and etag hashing.
const COPY_CHUNK: usize = 64 * 1024;

/// One remote entry, directory or regular file, with the shared capability
/// set on the enum and variant-specific operations on the variants.
#[derive(Debug, Clone)]
pub enum Node {
    Directory(DirectoryNode),
    File(FileNode),
}

impl Node {
    fn from_stat(path: SftpPath, is_dir: bool, session: SharedSession) -> Self {
        if is_dir {
            Node::Directory(DirectoryNode::new(path, session))
        } else {
            Node::File(FileNode::new(path, session))
        }
    }

    pub fn name(&self) -> &str {
        self.path().base_name()
    }

    pub fn path(&self) -> &SftpPath {
        match self {
            Node::Directory(d) => d.path(),
            Node::File(f) => f.path(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    pub async fn delete(&self) -> Result<()> {
        match self {
            Node::Directory(d) => d.delete().await,
            Node::File(f) => f.delete().await,
        }
    }

    /// Rename to an arbitrary destination path (WebDAV MOVE).
    pub async fn move_to(&self, dest: &SftpPath) -> Result<()> {
        match self {
            Node::Directory(d) => d.move_to(dest).await,
            Node::File(f) => f.move_to(dest).await,
        }
    }

    pub fn as_directory(&self) -> Result<&DirectoryNode> {
        match self {
            Node::Directory(d) => Ok(d),
            Node::File(f) => Err(BridgeError::NotADirectory(f.path().to_string())),
        }
    }

    pub fn as_file(&self) -> Result<&FileNode> {
        match self {
            Node::File(f) => Ok(f),
            Node::Directory(d) => Err(BridgeError::NotAFile(d.path().to_string())),
        }
    }
}

/// A live view of one remote directory.
#[derive(Clone)]
pub struct DirectoryNode {
    path: SftpPath,
    session: SharedSession,
}

impl std::fmt::Debug for DirectoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryNode")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl DirectoryNode {
    pub fn new(path: SftpPath, session: SharedSession) -> Self {
        Self { path, session }
    }

    pub fn path(&self) -> &SftpPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.base_name()
    }

    /// List the visible children of this directory with their stats.
    ///
    /// Any listing failure is reported as not-found: a directory that
    /// cannot be listed (removed concurrently, or access denied) does not
    /// exist as far as the protocol layer is concerned. Every entry whose
    /// name begins with the hidden marker is filtered out; this covers the
    /// `.`/`..` pseudo-entries and dotfiles, and is bridge policy rather
    /// than an SFTP artifact.
    pub async fn list_entries(&self) -> Result<Vec<(Node, RemoteStat)>> {
        let entries = match self.session.read_dir(self.path.as_str()).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!("listing {} failed: {}", self.path, err);
                return Err(SftpError::NotFound(self.path.to_string()).into());
            }
        };

        let mut children = Vec::new();
        for entry in entries {
            if is_hidden(&entry.name) {
                continue;
            }
            match self.path.child(&entry.name) {
                Ok(child) => {
                    children.push((
                        Node::from_stat(child, entry.stat.is_dir, self.session.clone()),
                        entry.stat,
                    ));
                }
                Err(err) => {
                    // Entry name the resolver refuses (embedded separator).
                    warn!("skipping unresolvable entry in {}: {}", self.path, err);
                }
            }
        }
        Ok(children)
    }

    /// List the visible children as nodes.
    pub async fn list_children(&self) -> Result<Vec<Node>> {
        Ok(self
            .list_entries()
            .await?
            .into_iter()
            .map(|(node, _)| node)
            .collect())
    }

    /// Resolve one named child. Hidden names always report not-found, even
    /// when the entry exists; otherwise a remote stat decides the variant.
    pub async fn resolve_child(&self, name: &str) -> Result<Node> {
        let child = self.path.child(name)?;
        let stat = self.session.stat(child.as_str()).await?;
        Ok(Node::from_stat(child, stat.is_dir, self.session.clone()))
    }

    /// True if a stat of the named child succeeds. A stat failure, for any
    /// reason including permission, is `false` — causes are not
    /// distinguished here.
    pub async fn child_exists(&self, name: &str) -> bool {
        match self.path.child(name) {
            Ok(child) => self.session.stat(child.as_str()).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Remove this directory. No emptiness pre-check: a non-empty directory
    /// fails with the remote server's own rmdir error.
    pub async fn delete(&self) -> Result<()> {
        Ok(self.session.rmdir(self.path.as_str()).await?)
    }

    /// Rename within the same parent directory.
    pub async fn rename(&self, new_name: &str) -> Result<()> {
        let dest = self.path.sibling(new_name)?;
        self.move_to(&dest).await
    }

    pub async fn move_to(&self, dest: &SftpPath) -> Result<()> {
        Ok(self
            .session
            .rename(self.path.as_str(), dest.as_str())
            .await?)
    }

    pub async fn create_subdirectory(&self, name: &str) -> Result<DirectoryNode> {
        let child = self.path.child(name)?;
        self.session.mkdir(child.as_str()).await?;
        Ok(DirectoryNode::new(child, self.session.clone()))
    }

    /// Open a new file under this directory for writing.
    ///
    /// Uses the atomic create-exclusive open, so a concurrent creation of
    /// the same path fails at the remote server instead of racing a
    /// check-then-create. An existing file fails the open untouched.
    pub async fn start_create_file(&self, name: &str) -> Result<RemoteWriter> {
        let child = self.path.child(name)?;
        Ok(self
            .session
            .start_write(child.as_str(), WriteMode::CreateExclusive)
            .await?)
    }

    /// Create a new file from a stream and return its node.
    pub async fn create_file<R>(&self, name: &str, reader: &mut R) -> Result<FileNode>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let child = self.path.child(name)?;
        let writer = self
            .session
            .start_write(child.as_str(), WriteMode::CreateExclusive)
            .await?;
        copy_to_remote(reader, writer).await?;
        Ok(FileNode::new(child, self.session.clone()))
    }
}

/// A live view of one remote regular file.
#[derive(Clone)]
pub struct FileNode {
    path: SftpPath,
    session: SharedSession,
}

impl std::fmt::Debug for FileNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNode")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileNode {
    pub fn new(path: SftpPath, session: SharedSession) -> Self {
        Self { path, session }
    }

    pub fn path(&self) -> &SftpPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.base_name()
    }

    /// Open the remote file for reading. The caller closes the reader.
    pub async fn open_read(&self) -> Result<RemoteReader> {
        Ok(self.session.start_read(self.path.as_str()).await?)
    }

    /// Stat-derived size in bytes. Undefined while the file is concurrently
    /// modified; there is no locking at this layer.
    pub async fn size(&self) -> Result<u64> {
        Ok(self.session.stat(self.path.as_str()).await?.size)
    }

    pub async fn stat(&self) -> Result<RemoteStat> {
        Ok(self.session.stat(self.path.as_str()).await?)
    }

    /// Content-identity tag: the quoted hash over the entire remote file
    /// content, recomputed on every call.
    ///
    /// This is a full remote read — O(file size) — and deliberately not a
    /// cheap metadata lookup, despite appearing as one in the protocol
    /// contract.
    pub async fn etag(&self) -> Result<String> {
        let mut reader = self.open_read().await?;
        let mut hasher = blake3::Hasher::new();
        loop {
            match reader.read(COPY_CHUNK).await {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => {
                    hasher.update(&chunk);
                }
                Err(err) => {
                    let _ = reader.close().await;
                    return Err(err.into());
                }
            }
        }
        reader.close().await?;
        Ok(format!("\"{}\"", hasher.finalize().to_hex()))
    }

    /// Open for truncate-write. Replace, not create: a missing target is a
    /// not-found failure and the file is not created.
    pub async fn start_replace(&self) -> Result<RemoteWriter> {
        self.session.stat(self.path.as_str()).await?;
        Ok(self
            .session
            .start_write(self.path.as_str(), WriteMode::Truncate)
            .await?)
    }

    /// Replace the whole content from a stream. Both the remote handle and
    /// the input stream are released on every path, success or failure.
    pub async fn replace_content<R>(&self, reader: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let writer = self.start_replace().await?;
        copy_to_remote(reader, writer).await
    }

    /// Best-effort MIME type from the file extension.
    pub fn content_type(&self) -> &'static str {
        guess_content_type(self.name())
    }

    pub async fn delete(&self) -> Result<()> {
        Ok(self.session.unlink(self.path.as_str()).await?)
    }

    pub async fn rename(&self, new_name: &str) -> Result<()> {
        let dest = self.path.sibling(new_name)?;
        self.move_to(&dest).await
    }

    pub async fn move_to(&self, dest: &SftpPath) -> Result<()> {
        Ok(self
            .session
            .rename(self.path.as_str(), dest.as_str())
            .await?)
    }
}

/// Copy a whole input stream into a remote writer, closing the remote
/// handle on both the success and the failure path.
async fn copy_to_remote<R>(reader: &mut R, mut writer: RemoteWriter) -> Result<u64>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                let _ = writer.close().await;
                return Err(SftpError::Io(err).into());
            }
        };
        if n == 0 {
            break;
        }
        if let Err(err) = writer.write(&buf[..n]).await {
            let _ = writer.close().await;
            return Err(err.into());
        }
    }
    let written = writer.written();
    writer.close().await?;
    Ok(written)
}

/// Extension-based content-type guess with a generic fallback.
pub(crate) fn guess_content_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "html" | "htm" => "text/html",
        "md" => "text/markdown",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
