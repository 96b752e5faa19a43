//! Core library modules for the aperture application.
//!
//! Provides the infrastructure shared by the CLI layer and the sync engine:
//! configuration, platform data-directory resolution, cached credentials,
//! a clock/sleep seam for tests, and the centralized messaging system.

pub mod clock;
pub mod config;
pub mod data_storage;
pub mod messages;
pub mod secret;
