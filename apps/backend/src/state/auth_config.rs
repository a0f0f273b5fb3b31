//! Immutable authentication configuration.
//!
//! Built once at process start and threaded explicitly into every component;
//! nothing in the auth subsystem reads the process environment at call sites.

/// Secrets keying the HMAC operations of the auth subsystem.
///
/// An empty value means "not configured": initData validation requires the
/// bot token, session tokens require a session secret (which falls back to
/// the bot token when unset, matching how deployments key both schemes off a
/// single secret).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    bot_token: String,
    session_secret: String,
}

impl AuthConfig {
    pub fn new(bot_token: impl Into<String>, session_secret: Option<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            session_secret: session_secret.unwrap_or_default(),
        }
    }

    /// Read `TELEGRAM_BOT_TOKEN` and `AUTH_SESSION_SECRET` from the
    /// environment. Missing variables yield an unconfigured (fail-closed)
    /// config rather than an error.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            std::env::var("AUTH_SESSION_SECRET").ok(),
        )
    }

    /// Bot token used to derive the initData secret key, or None when not
    /// configured.
    pub fn bot_token(&self) -> Option<&str> {
        if self.bot_token.is_empty() {
            None
        } else {
            Some(&self.bot_token)
        }
    }

    /// Secret keying session-token signatures. Falls back to the bot token
    /// when no dedicated session secret is set; None when neither exists.
    pub fn session_secret(&self) -> Option<&[u8]> {
        if !self.session_secret.is_empty() {
            Some(self.session_secret.as_bytes())
        } else if !self.bot_token.is_empty() {
            Some(self.bot_token.as_bytes())
        } else {
            None
        }
    }
}
