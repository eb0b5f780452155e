//! sftpdav-serve: Expose an SFTP server as a local WebDAV share.
//!
//! This binary starts a local WebDAV server that translates every request
//! into SFTP operations against the given host, enabling direct access from
//! Finder, Windows Explorer, or any WebDAV client. Clients authenticate with
//! their SFTP credentials over HTTP Basic.
//!
//! # Usage
//!
//! ```bash
//! # Start the bridge against an SFTP host
//! sftpdav-serve sftp.example.com --root /export
//!
//! # Then mount in Finder: Cmd+K → http://localhost:4918
//! ```

use clap::Parser;
use env_logger::Env;
use log::error;
use sftpdav_fs::webdav::{serve, BridgeConfig};
use sftpdav_fs::SftpPath;
use std::process;

/// Expose an SFTP server as a local WebDAV share.
///
/// Start a local WebDAV server that can be mounted from Finder (Cmd+K),
/// Windows Explorer, or any WebDAV-compatible client. Log in with your
/// SFTP username and password.
#[derive(Parser, Debug)]
#[command(name = "sftpdav-serve")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SFTP host to bridge to
    #[arg(value_name = "HOST")]
    host: String,

    /// SFTP port
    #[arg(long, default_value = "22")]
    sftp_port: u16,

    /// Remote directory exported as the WebDAV root
    #[arg(short, long, default_value = "/")]
    root: String,

    /// Port to listen on (default: 4918)
    #[arg(short, long, default_value = "4918")]
    port: u16,

    /// Realm shown in the authentication prompt
    #[arg(long, default_value = "SFTP Bridge")]
    realm: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let config = BridgeConfig {
        sftp_host: args.host,
        sftp_port: args.sftp_port,
        root: SftpPath::new(&args.root),
        realm: args.realm,
    };

    // Start WebDAV server
    if let Err(e) = serve(config, args.port).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
