//! # sftpdav-fs
//!
//! WebDAV bridge filesystem over a shared SFTP session.
//!
//! This crate provides:
//! - A path resolver for logical WebDAV paths with hidden-entry exclusion
//! - Directory and file nodes: live, non-caching views of the remote server
//! - A `dav_server` filesystem adapter ([`webdav::SftpDavFs`])
//! - The HTTP front end ([`webdav::serve`]) with per-identity SFTP sessions
//!
//! ## Example
//!
//! ```ignore
//! use sftpdav_fs::webdav::{serve, BridgeConfig};
//! use sftpdav_fs::SftpPath;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = BridgeConfig {
//!         sftp_host: "sftp.example.com".to_string(),
//!         sftp_port: 22,
//!         root: SftpPath::new("/export"),
//!         realm: "SFTP Bridge".to_string(),
//!     };
//!
//!     // Blocks until the process is stopped.
//!     serve(config, 4918).await
//! }
//! ```
//!
//! Clients mount `http://localhost:4918/` with their SFTP credentials;
//! hidden entries (dotfiles) are never exposed.

mod error;
mod node;
mod path;

pub mod webdav;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{BridgeError, Result};
pub use node::{DirectoryNode, FileNode, Node};
pub use path::{is_hidden, SftpPath};
