//! CloudProbe Common Library
//!
//! Domain types shared by the harness and the command line: resource kinds,
//! the typed view of console status labels, and resource handles.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// CloudProbe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for local SSH material
pub fn default_ssh_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".ssh")
}

/// Default private key used for instance access
pub fn default_key_path() -> std::path::PathBuf {
    default_ssh_dir().join("id_rsa")
}

/// Default ssh client configuration file
pub fn default_ssh_config_path() -> std::path::PathBuf {
    default_ssh_dir().join("config")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
