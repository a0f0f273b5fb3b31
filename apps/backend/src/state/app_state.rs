use crate::auth::chain::AuthChain;
use crate::auth::external::ExternalIdentityResolver;
use crate::state::auth_config::AuthConfig;

/// Application state containing shared resources.
///
/// Immutable after startup; every field is safe for unlimited concurrent
/// reads across requests.
#[derive(Clone)]
pub struct AppState {
    /// Authentication secrets
    pub auth: AuthConfig,
    /// Ordered credential schemes run by the auth gate
    pub auth_chain: AuthChain,
}

impl AppState {
    pub fn new(auth: AuthConfig, resolver: ExternalIdentityResolver) -> Self {
        let auth_chain = AuthChain::new(auth.clone(), resolver);
        Self { auth, auth_chain }
    }

    /// State without an external identity provider; bearer tokens then only
    /// verify as backend session tokens.
    pub fn without_external(auth: AuthConfig) -> Self {
        Self::new(auth, ExternalIdentityResolver::disabled())
    }
}
