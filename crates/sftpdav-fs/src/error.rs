use sftpdav_session::SftpError;
use thiserror::Error;

/// Errors surfaced by the bridge core.
///
/// Every failure is structured (operation + path travel inside
/// [`SftpError::Operation`]); translation to the signalling convention of
/// the WebDAV library happens only at the boundary adapter.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The name refers to a hidden entry. Reported to the protocol layer as
    /// not-found even when the entry exists.
    #[error("hidden entry: {0}")]
    Hidden(String),

    /// The name is empty or contains a separator or NUL.
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    /// A directory operation was issued against a file path.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file operation was issued against a directory path.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Remote session failure.
    #[error(transparent)]
    Sftp(#[from] SftpError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
