//! Ordered credential strategies.
//!
//! Each supported credential scheme is an [`Authenticator`]; the chain tries
//! them in a fixed order and stops at the first success. Precedence is a
//! property of the list, so reordering schemes is a one-line change.

use std::sync::Arc;
use std::time::SystemTime;

use actix_web::http::header::{self, HeaderMap};
use async_trait::async_trait;
use tracing::debug;

use crate::auth::claims::AuthenticatedUser;
use crate::auth::external::ExternalIdentityResolver;
use crate::auth::{init_data, session_token};
use crate::state::auth_config::AuthConfig;

/// Header carrying the Telegram Mini App initData blob.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// Credentials lifted off an incoming request before authentication.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub init_data: Option<String>,
    pub bearer: Option<String>,
}

impl RequestCredentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let init_data = headers
            .get(INIT_DATA_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer);

        Self { init_data, bearer }
    }
}

/// Parse "Bearer <token>"; anything else is no credential.
fn parse_bearer(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 2 || parts[0] != "Bearer" || parts[1].is_empty() {
        return None;
    }
    Some(parts[1].to_string())
}

/// One credential scheme. Failure is always "no identity", never an error.
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn authenticate(&self, credentials: &RequestCredentials) -> Option<AuthenticatedUser>;
}

struct InitDataAuthenticator {
    config: AuthConfig,
}

#[async_trait]
impl Authenticator for InitDataAuthenticator {
    fn name(&self) -> &'static str {
        "initdata"
    }

    async fn authenticate(&self, credentials: &RequestCredentials) -> Option<AuthenticatedUser> {
        let init_data = credentials.init_data.as_deref()?;
        init_data::validate(&self.config, init_data, SystemTime::now())
    }
}

struct SessionTokenAuthenticator {
    config: AuthConfig,
}

#[async_trait]
impl Authenticator for SessionTokenAuthenticator {
    fn name(&self) -> &'static str {
        "session-token"
    }

    async fn authenticate(&self, credentials: &RequestCredentials) -> Option<AuthenticatedUser> {
        let token = credentials.bearer.as_deref()?;
        session_token::verify(&self.config, token, SystemTime::now())
    }
}

struct ExternalJwtAuthenticator {
    resolver: ExternalIdentityResolver,
}

#[async_trait]
impl Authenticator for ExternalJwtAuthenticator {
    fn name(&self) -> &'static str {
        "external-jwt"
    }

    async fn authenticate(&self, credentials: &RequestCredentials) -> Option<AuthenticatedUser> {
        let token = credentials.bearer.as_deref()?;
        self.resolver.resolve(token).await
    }
}

/// The fixed-precedence list of credential schemes.
#[derive(Clone)]
pub struct AuthChain {
    authenticators: Arc<Vec<Box<dyn Authenticator>>>,
}

impl AuthChain {
    /// initData always wins over bearer tokens, and the locally verifiable
    /// session token is tried before the network-dependent external path.
    pub fn new(config: AuthConfig, resolver: ExternalIdentityResolver) -> Self {
        Self {
            authenticators: Arc::new(vec![
                Box::new(InitDataAuthenticator {
                    config: config.clone(),
                }),
                Box::new(SessionTokenAuthenticator { config }),
                Box::new(ExternalJwtAuthenticator { resolver }),
            ]),
        }
    }

    /// Try each scheme in order; terminal on first match.
    pub async fn authenticate(
        &self,
        credentials: &RequestCredentials,
    ) -> Option<AuthenticatedUser> {
        for authenticator in self.authenticators.iter() {
            if let Some(user) = authenticator.authenticate(credentials).await {
                debug!(method = authenticator.name(), user_id = user.id, "request authenticated");
                return Some(user);
            }
        }
        None
    }
}
