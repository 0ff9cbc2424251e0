//! Filesystem primitives for restsync
//!
//! Provides atomic, permission-aware writes and format-agnostic
//! configuration loading used by the secret store and the filesystem
//! repository.

pub mod config;
pub mod error;
pub mod io;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::OWNER_ONLY;
