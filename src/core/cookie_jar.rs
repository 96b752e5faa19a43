//! Persistent, per-username cookie jar.
//!
//! Wraps a `reqwest::cookie::Jar` so the in-memory cookie store used for
//! live requests can be reloaded from, and flushed back to, a file under
//! `--cookie-directory`. Writes are atomic (temp file + rename) so a crash
//! mid-save never leaves a half-written jar for the next run to trip over.

use anyhow::Result;
use reqwest::cookie::Jar;
use reqwest::Url;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cookie storage for one provider account, backed by a file named after
/// the username inside the configured cookie directory.
pub struct CookieJar {
    store: Arc<Jar>,
    path: PathBuf,
    base_url: Url,
}

impl CookieJar {
    /// Loads the jar for `username` from `cookie_directory`, creating an
    /// empty one if no file exists yet.
    pub fn load(cookie_directory: &Path, username: &str, base_url: Url) -> Result<Self> {
        fs::create_dir_all(cookie_directory)?;
        let path = cookie_directory.join(format!("{username}.cookies"));

        let store = Arc::new(Jar::default());
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            for line in contents.lines() {
                if !line.trim().is_empty() {
                    store.add_cookie_str(line, &base_url);
                }
            }
        }

        Ok(Self { store, path, base_url })
    }

    pub fn store(&self) -> Arc<Jar> {
        self.store.clone()
    }

    /// Exists on disk (distinguishes "no stored session" from "empty session").
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persists the current cookie set atomically.
    pub fn save(&self, cookie_lines: &[String]) -> Result<()> {
        let tmp_path = self.path.with_extension("cookies.tmp");
        fs::write(&tmp_path, cookie_lines.join("\n"))?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
