//! Auth Controller (C2): login, 2FA / trusted-device flow, session
//! validity probing, and the re-authentication retry policy shared by the
//! listing and download paths.

use crate::core::cookie_jar::CookieJar;
use crate::core::error::{ErrorClass, RunError, SessionError};
use crate::core::transport::{Transport, TransportRequest};
use crate::libs::clock::Clock;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info, msg_warning};
use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Input};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Maximum re-authentication attempts before giving up. Shared with the
/// download retry state machine.
pub const MAX_RETRIES: u32 = 5;
/// Sleep between retries; configurable so tests can set it to zero.
pub const DEFAULT_WAIT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub client_id: String,
}

/// Opaque session state: cookies plus the derived headers every
/// authenticated request needs. Workers hold this behind a shared,
/// read-mostly lock; only `authenticate`/`invalidate` write to it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub trust_token: Option<String>,
    pub session_token: Option<String>,
    pub dsid: Option<String>,
    pub web_auth_token: Option<String>,
}

impl Session {
    pub fn is_ready(&self) -> bool {
        self.session_token.is_some()
    }
}

/// Shared handle to the single active session for a run.
pub type SharedSession = Arc<RwLock<Session>>;

/// Collaborator interface for authentication. The download engine and the
/// orchestrator both depend on this trait, never on `AppleAuthController`
/// directly, so tests can substitute a fake that fails on command.
#[async_trait]
pub trait AuthController: Send + Sync {
    /// Returns a ready session, performing a validity probe or a full
    /// login as needed. `force_refresh` skips the probe and goes straight
    /// to login (used by the re-auth retry policy).
    async fn authenticate(&self, credentials: &Credentials, force_refresh: bool) -> Result<SharedSession, RunError>;

    /// Drops in-memory session state; the next `authenticate` call performs a full login.
    fn invalidate(&self);
}

pub struct AppleAuthController {
    transport: Arc<dyn Transport>,
    cookie_jar: Arc<CookieJar>,
    session: SharedSession,
    base_url: String,
    interactive: bool,
}

impl AppleAuthController {
    pub fn new(transport: Arc<dyn Transport>, cookie_jar: Arc<CookieJar>, base_url: String, interactive: bool) -> Self {
        Self {
            transport,
            cookie_jar,
            session: Arc::new(RwLock::new(Session::default())),
            base_url,
            interactive,
        }
    }

    async fn probe(&self) -> Result<bool, SessionError> {
        let request = TransportRequest::get(format!("{}/validate", self.base_url));
        match self.transport.send(request).await {
            Ok(_) => Ok(true),
            Err(SessionError::Api(api)) if api.classify() == ErrorClass::SessionInvalid => Ok(false),
            Err(other) => Err(other),
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), RunError> {
        let body = serde_json::json!({
            "apple_id": credentials.username,
            "password": credentials.password,
        });
        let request = TransportRequest::post(format!("{}/signin", self.base_url), body);

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(SessionError::Api(api)) if api.reason.contains("Invalid") => {
                msg_error!(Message::LoginRejected);
                return Err(RunError::LoginRejected);
            }
            Err(other) => return Err(RunError::Other(other.into())),
        };

        let requires_2fa = response.json.as_ref().and_then(|v| v.get("hsaChallengeRequired")).and_then(|v| v.as_bool()).unwrap_or(false);
        let trusted_device_required = response
            .json
            .as_ref()
            .and_then(|v| v.get("trustedDeviceRequired"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if requires_2fa || trusted_device_required {
            if !self.interactive {
                msg_error!(Message::RequiresInteractiveLogin);
                return Err(RunError::RequiresInteractive);
            }
            let prompt = if trusted_device_required {
                Message::PromptTrustedDeviceCode
            } else {
                Message::Prompt2faCode
            };
            let code: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt.to_string())
                .interact_text()
                .map_err(|e| RunError::Other(e.into()))?;

            self.verify_code(&code).await?;
            self.trust_device().await?;
        }

        {
            let mut session = self.session.write();
            session.dsid = response.header("x-apple-dsid").map(str::to_string);
            session.session_token = Some("authenticated".to_string());
        }

        self.cookie_jar.save(&response.set_cookies).map_err(|e| RunError::Other(e))?;
        msg_debug!(Message::CookieJarSaved);

        msg_info!(Message::AuthenticationSucceeded);
        Ok(())
    }

    async fn verify_code(&self, code: &str) -> Result<(), RunError> {
        let body = serde_json::json!({ "securityCode": { "code": code } });
        let request = TransportRequest::post(format!("{}/verify/trusteddevice/securitycode", self.base_url), body);
        self.transport.send(request).await.map_err(|e| RunError::Other(e.into()))?;
        Ok(())
    }

    async fn trust_device(&self) -> Result<(), RunError> {
        let request = TransportRequest::get(format!("{}/trust", self.base_url));
        match self.transport.send(request).await {
            Ok(response) => {
                let mut session = self.session.write();
                session.trust_token = response.header("x-apple-twosv-trust-token").map(str::to_string);
                Ok(())
            }
            Err(e) => {
                msg_warning!(Message::TrustDeviceFailed(e.to_string()));
                Ok(())
            }
        }
    }
}

#[async_trait]
impl AuthController for AppleAuthController {
    async fn authenticate(&self, credentials: &Credentials, force_refresh: bool) -> Result<SharedSession, RunError> {
        if !force_refresh && self.cookie_jar.exists() {
            match self.probe().await {
                Ok(true) => {
                    msg_info!(Message::SessionValidated);
                    self.session.write().session_token = Some("authenticated".to_string());
                    return Ok(self.session.clone());
                }
                Ok(false) => {
                    msg_info!(Message::SessionInvalidProbe);
                }
                Err(e) => return Err(RunError::Other(e.into())),
            }
        }

        self.login(credentials).await?;
        Ok(self.session.clone())
    }

    fn invalidate(&self) {
        let mut session = self.session.write();
        *session = Session::default();
    }
}

/// Shared re-authentication policy: up to [`MAX_RETRIES`] attempts, no
/// sleep before the first, `wait_seconds` between the rest. Used both by
/// the download engine (on a `SessionInvalid` error mid-download) and the
/// orchestrator (on a `SessionInvalid` error mid-listing).
pub async fn reauthenticate_with_retry(
    auth: &dyn AuthController,
    credentials: &Credentials,
    clock: &dyn Clock,
    wait_seconds: u64,
) -> Result<SharedSession, RunError> {
    let mut last_err = None;
    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            clock.sleep(Duration::from_secs(wait_seconds)).await;
        }
        match auth.authenticate(credentials, true).await {
            Ok(session) => return Ok(session),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or(RunError::ReauthExhausted))
}
