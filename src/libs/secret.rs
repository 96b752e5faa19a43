//! Secure credential storage and management with AES encryption.
//!
//! Used to cache the provider account password locally so that interactive
//! runs (and the watch-interval loop) don't re-prompt on every invocation.
//! Cookies are handled separately by [`crate::core::cookie_jar`] — they are
//! not secrets requiring local encryption beyond file permissions.
//!
//! ## Usage
//!
//! ```rust
//! use aperture::libs::secret::Secret;
//!
//! let secret = Secret::new(".password", "Apple ID password");
//! let password = secret.get_or_prompt()?;
//! ```

use super::data_storage::DataStorage;
use aes::Aes256;
use anyhow::Result;
use base64::prelude::*;
use block_modes::block_padding::Pkcs7;
use block_modes::{BlockMode, Cbc};
use dialoguer::{theme::ColorfulTheme, Password};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

// Include generated metadata containing encryption keys
include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

type Aes256Cbc = Cbc<Aes256, Pkcs7>;

/// Secure credential storage and management system.
#[derive(Clone, Debug)]
pub struct Secret {
    /// In-memory password, set once decrypted or freshly prompted for.
    password: Option<String>,
    /// User-facing prompt text, e.g. "Apple ID password".
    prompt: String,
    /// File system path for encrypted credential storage.
    secret_file_path: PathBuf,
    /// AES-256 key, embedded at compile time.
    key: Vec<u8>,
    /// AES-CBC initialization vector, embedded at compile time.
    iv: Vec<u8>,
}

impl Secret {
    /// Creates a new `Secret`, resolving its file path within the application data directory.
    pub fn new(secret_name: &str, prompt: &str) -> Self {
        let key = APP_METADATA_ENCRYPTION_KEY.to_vec();
        let iv = APP_METADATA_ENCRYPTION_IV.to_vec();

        let secret_file_path = DataStorage::new().get_path(secret_name).unwrap_or_else(|_| PathBuf::from(secret_name));

        Self {
            password: None,
            secret_file_path,
            prompt: prompt.to_owned(),
            key,
            iv,
        }
    }

    fn set_password(&self, password: &str) -> Self {
        Self {
            password: Some(password.to_owned()),
            ..self.clone()
        }
    }

    /// Returns the cached password, decrypting the stored file if present,
    /// or prompting the user (and caching the result) otherwise.
    pub fn get_or_prompt(&self) -> Result<String> {
        if fs::metadata(&self.secret_file_path).is_ok() {
            if let Ok(password) = self.decrypt() {
                return Ok(password);
            }
            // Decryption failed — stored file may be stale or corrupted; re-prompt.
        }

        self.prompt()
    }

    /// Prompts for a password (no terminal echo) and caches it encrypted on disk.
    pub fn prompt(&self) -> Result<String> {
        let password = Password::with_theme(&ColorfulTheme::default()).with_prompt(&self.prompt).interact()?;

        self.set_password(&password).encrypt()?;

        Ok(password)
    }

    /// Clears any cached credential for this secret.
    pub fn forget(&self) -> Result<()> {
        if self.secret_file_path.exists() {
            fs::remove_file(&self.secret_file_path)?;
        }
        Ok(())
    }

    /// Encrypts and caches `password` without prompting. Used by callers
    /// that already have the plaintext in hand (e.g. `--store-in-keyring`).
    pub fn store(&self, password: &str) -> Result<()> {
        self.set_password(password).encrypt()?;
        Ok(())
    }

    /// Returns the cached password if present and decryptable, `None` if no
    /// file is stored yet. Unlike [`Secret::get_or_prompt`], never prompts.
    pub fn try_get(&self) -> Result<Option<String>> {
        if !self.secret_file_path.exists() {
            return Ok(None);
        }
        match self.decrypt() {
            Ok(password) => Ok(Some(password)),
            Err(_) => Ok(None),
        }
    }

    fn encrypt(&self) -> Result<Self> {
        let cipher = Aes256Cbc::new_from_slices(&self.key, &self.iv)?;

        let password = &self.password.clone().unwrap();
        let ciphertext = cipher.encrypt_vec(password.as_bytes());
        let encoded = BASE64_STANDARD.encode(&ciphertext);

        if let Some(parent) = self.secret_file_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let mut file = File::create(&self.secret_file_path)?;
        file.write_all(encoded.as_bytes())?;

        Ok(self.clone())
    }

    fn decrypt(&self) -> Result<String> {
        let mut file = File::open(&self.secret_file_path)?;
        let mut encoded = String::new();
        file.read_to_string(&mut encoded)?;

        let ciphertext = BASE64_STANDARD.decode(encoded)?;
        let cipher = Aes256Cbc::new_from_slices(&self.key, &self.iv)?;
        let decrypted_ciphertext = cipher.decrypt_vec(&ciphertext)?;
        let decrypted_password = String::from_utf8(decrypted_ciphertext)?;

        Ok(decrypted_password)
    }
}
