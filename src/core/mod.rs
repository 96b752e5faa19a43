//! Sync engine: session/auth, asset listing, the download pipeline, and
//! the orchestrator that wires them together for a single run.

pub mod assets;
pub mod auth;
pub mod cookie_jar;
pub mod download;
pub mod error;
pub mod exif;
pub mod filename;
pub mod keyring;
pub mod orchestrator;
pub mod transport;
