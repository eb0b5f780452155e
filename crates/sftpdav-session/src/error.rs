use thiserror::Error;

/// Errors surfaced by the SFTP session layer.
///
/// The transport reports failures both as SFTP status codes and as I/O
/// errors; everything is normalized into this enum so callers never have to
/// care which side of the boundary a failure came from.
#[derive(Debug, Error)]
pub enum SftpError {
    /// The remote path does not exist.
    #[error("remote path not found: {0}")]
    NotFound(String),

    /// The remote server denied the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// SFTP authentication was rejected for the given user.
    #[error("SFTP authentication failed for user '{0}'")]
    AuthFailed(String),

    /// A remote primitive call failed. Carries the operation name and the
    /// path it was issued against.
    #[error("SFTP {op} failed for '{path}': {message}")]
    Operation {
        op: &'static str,
        path: String,
        message: String,
    },

    /// A read/write/seek/close was issued against a handle this session
    /// does not know (already closed, or from another session).
    #[error("stale or unknown remote file handle")]
    StaleHandle,

    /// SSH transport failure (connect, key exchange, channel setup).
    #[error("SSH transport error: {0}")]
    Ssh(#[from] russh::Error),

    /// I/O failure on an open remote file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for session-layer operations.
pub type Result<T> = std::result::Result<T, SftpError>;

/// Map a `russh-sftp` client error into the session taxonomy.
pub(crate) fn remote_error(
    op: &'static str,
    path: &str,
    err: russh_sftp::client::error::Error,
) -> SftpError {
    use russh_sftp::client::error::Error;
    use russh_sftp::protocol::StatusCode;

    match &err {
        Error::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => SftpError::NotFound(path.to_string()),
            StatusCode::PermissionDenied => SftpError::AccessDenied(path.to_string()),
            _ => SftpError::Operation {
                op,
                path: path.to_string(),
                message: err.to_string(),
            },
        },
        _ => SftpError::Operation {
            op,
            path: path.to_string(),
            message: err.to_string(),
        },
    }
}
