//! # Aperture
//!
//! A command-line synchronizer that mirrors a cloud photo library to a
//! local directory tree.
//!
//! ## Components
//!
//! - **Session layer** ([`core::transport`], [`core::auth`]): login, 2FA /
//!   trusted-device flow, cookie persistence, opaque-error-triggered
//!   re-authentication.
//! - **Asset pipeline** ([`core::assets`], [`core::download`],
//!   [`core::orchestrator`]): paginated album listing, a worker pool of
//!   downloaders, per-asset retry policy, dedup/skip decisions, mtime
//!   restoration, EXIF timestamping, live-photo pairing, and the
//!   until-found stop heuristic.
//! - **Filename policy** ([`core::filename`]): sanitization, unicode
//!   normalization, and size-based dedup renaming.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use aperture::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod core;
pub mod libs;
