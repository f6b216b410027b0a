// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup errors for the server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The directory to serve does not exist or is not a directory.
    #[error("watch directory not found: {}", .0.display())]
    MissingRoot(PathBuf),

    /// Another process already listens on the port.
    #[error("port {port} is already in use")]
    PortInUse { port: u16 },

    /// Binding failed for a reason other than a port conflict.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a whole scan cycle. Per-file errors never surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("watch root {} is unavailable: {source}", .path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}
