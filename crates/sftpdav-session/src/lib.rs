//! # sftpdav-session
//!
//! SFTP session layer for the sftpdav bridge.
//!
//! This crate provides:
//! - The [`SftpOps`] primitive-operation boundary (list, stat, open, chunked
//!   read/write, mkdir, rmdir, rename, unlink)
//! - [`SharedSession`], the serialized, clonable handle that every bridge
//!   node funnels through — exactly one per WebDAV server instance and
//!   authenticated identity
//! - [`SftpClient`], the production implementation over `russh` +
//!   `russh-sftp` with password authentication
//! - [`RemoteReader`] / [`RemoteWriter`] streaming wrappers for GET and PUT
//!   bodies
//!
//! ## Example
//!
//! ```ignore
//! use sftpdav_session::{connect, SftpConfig, SharedSession};
//!
//! let client = connect(&SftpConfig {
//!     host: "sftp.example.com".into(),
//!     port: 22,
//!     username: "alice".into(),
//!     password: "secret".into(),
//! })
//! .await?;
//! let session = SharedSession::new(client);
//!
//! for entry in session.read_dir("/").await? {
//!     println!("{} ({} bytes)", entry.name, entry.stat.size);
//! }
//! ```

mod client;
mod error;
mod io;
mod ops;
mod session;

pub use client::{connect, SftpClient, SftpConfig};
pub use error::{Result, SftpError};
pub use io::{RemoteReader, RemoteWriter};
pub use ops::{HandleId, RemoteEntry, RemoteStat, SftpOps, WriteMode};
pub use session::SharedSession;
