//! Production [`SftpOps`] implementation over `russh` + `russh-sftp`.
//!
//! One `SftpClient` is one authenticated SSH connection with one open
//! `sftp` subsystem channel. Serialization of primitive calls happens in
//! [`SharedSession`](crate::SharedSession); this type only owns the
//! connection and the table of open remote handles.

use crate::error::{remote_error, Result, SftpError};
use crate::ops::{HandleId, RemoteEntry, RemoteStat, SftpOps, WriteMode};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use russh::client;
use russh::keys::ssh_key;
use russh_sftp::client::fs::File as RemoteFile;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Connection timeout for the SSH handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Inactivity timeout for established SSH sessions.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Parameters for establishing one SFTP session.
///
/// Username and password come verbatim from the HTTP Basic credentials of
/// the inbound WebDAV request.
#[derive(Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// SSH client handler. Host key verification is delegated to the deployment
/// environment (the transport is a collaborator, not part of the bridge), so
/// every presented key is accepted and logged.
struct BridgeHandler;

impl client::Handler for BridgeHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        debug!(
            "accepting SSH host key ({})",
            server_public_key.algorithm().as_str()
        );
        Ok(true)
    }
}

/// An authenticated SSH connection with an open SFTP channel.
pub struct SftpClient {
    sftp: SftpSession,
    handles: HashMap<HandleId, RemoteFile>,
    next_handle: u64,
    // Keep the SSH handle alive so the channel isn't dropped.
    _ssh: client::Handle<BridgeHandler>,
}

/// Establish a new SSH connection, authenticate with password, and open the
/// SFTP subsystem. Failed authentication is reported as
/// [`SftpError::AuthFailed`] so the HTTP layer can answer 401.
pub async fn connect(config: &SftpConfig) -> Result<SftpClient> {
    let ssh_config = Arc::new(client::Config {
        inactivity_timeout: Some(INACTIVITY_TIMEOUT),
        ..Default::default()
    });

    let addr = (config.host.as_str(), config.port);
    let mut ssh = tokio::time::timeout(
        CONNECT_TIMEOUT,
        client::connect(ssh_config, addr, BridgeHandler),
    )
    .await
    .map_err(|_| SftpError::Operation {
        op: "connect",
        path: format!("{}:{}", config.host, config.port),
        message: format!("SSH connect timed out after {}s", CONNECT_TIMEOUT.as_secs()),
    })??;

    let auth = ssh
        .authenticate_password(&config.username, &config.password)
        .await?;
    if !auth.success() {
        return Err(SftpError::AuthFailed(config.username.clone()));
    }

    let channel = ssh.channel_open_session().await?;
    channel.request_subsystem(true, "sftp").await?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| remote_error("session init", &config.host, e))?;

    debug!(
        "SFTP session established for {}@{}:{}",
        config.username, config.host, config.port
    );

    Ok(SftpClient {
        sftp,
        handles: HashMap::new(),
        next_handle: 0,
        _ssh: ssh,
    })
}

impl SftpClient {
    fn register(&mut self, file: RemoteFile) -> HandleId {
        self.next_handle += 1;
        let id = HandleId(self.next_handle);
        self.handles.insert(id, file);
        id
    }

    fn file_mut(&mut self, handle: HandleId) -> Result<&mut RemoteFile> {
        self.handles.get_mut(&handle).ok_or(SftpError::StaleHandle)
    }
}

fn stat_from_attrs(attrs: &FileAttributes) -> RemoteStat {
    RemoteStat {
        is_dir: attrs.file_type().is_dir(),
        size: attrs.size.unwrap_or(0),
        modified: attrs
            .mtime
            .map(|t| UNIX_EPOCH + Duration::from_secs(u64::from(t))),
    }
}

#[async_trait]
impl SftpOps for SftpClient {
    async fn read_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        let entries = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| remote_error("readdir", path, e))?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let stat = stat_from_attrs(&entry.metadata());
                RemoteEntry {
                    name: entry.file_name(),
                    stat,
                }
            })
            .collect())
    }

    async fn stat(&mut self, path: &str) -> Result<RemoteStat> {
        let attrs = self
            .sftp
            .metadata(path)
            .await
            .map_err(|e| remote_error("stat", path, e))?;
        Ok(stat_from_attrs(&attrs))
    }

    async fn mkdir(&mut self, path: &str) -> Result<()> {
        self.sftp
            .create_dir(path)
            .await
            .map_err(|e| remote_error("mkdir", path, e))
    }

    async fn rmdir(&mut self, path: &str) -> Result<()> {
        self.sftp
            .remove_dir(path)
            .await
            .map_err(|e| remote_error("rmdir", path, e))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.sftp
            .rename(from, to)
            .await
            .map_err(|e| remote_error("rename", from, e))
    }

    async fn unlink(&mut self, path: &str) -> Result<()> {
        self.sftp
            .remove_file(path)
            .await
            .map_err(|e| remote_error("unlink", path, e))
    }

    async fn open_read(&mut self, path: &str) -> Result<HandleId> {
        let file = self
            .sftp
            .open_with_flags(path, OpenFlags::READ)
            .await
            .map_err(|e| remote_error("open-read", path, e))?;
        Ok(self.register(file))
    }

    async fn open_write(&mut self, path: &str, mode: WriteMode) -> Result<HandleId> {
        let flags = match mode {
            WriteMode::CreateExclusive => {
                OpenFlags::CREATE | OpenFlags::WRITE | OpenFlags::EXCLUDE
            }
            WriteMode::Truncate => OpenFlags::WRITE | OpenFlags::TRUNCATE,
        };
        let file = self
            .sftp
            .open_with_flags(path, flags)
            .await
            .map_err(|e| remote_error("open-write", path, e))?;
        Ok(self.register(file))
    }

    async fn read_chunk(&mut self, handle: HandleId, count: usize) -> Result<Bytes> {
        let file = self.file_mut(handle)?;
        let mut buf = vec![0u8; count];
        let mut total = 0;
        while total < count {
            let n = file.read(&mut buf[total..]).await?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        Ok(Bytes::from(buf))
    }

    async fn write_chunk(&mut self, handle: HandleId, data: &[u8]) -> Result<()> {
        let file = self.file_mut(handle)?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn seek(&mut self, handle: HandleId, pos: SeekFrom) -> Result<u64> {
        let file = self.file_mut(handle)?;
        Ok(file.seek(pos).await?)
    }

    async fn close(&mut self, handle: HandleId) -> Result<()> {
        let mut file = self.handles.remove(&handle).ok_or(SftpError::StaleHandle)?;
        file.flush().await?;
        file.shutdown().await?;
        Ok(())
    }
}
