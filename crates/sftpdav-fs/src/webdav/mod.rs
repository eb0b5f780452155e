//! WebDAV front end for the SFTP bridge.
//!
//! `filesystem` adapts bridge nodes to the `dav_server` filesystem
//! contract; `server` is the hyper HTTP loop that extracts Basic
//! credentials, establishes one shared SFTP session per authenticated
//! identity, and dispatches requests to the matching handler.

mod filesystem;
mod server;

pub use filesystem::SftpDavFs;
pub use server::{serve, serve_background, BridgeConfig, BridgeServer};
