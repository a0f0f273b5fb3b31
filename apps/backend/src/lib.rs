#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod trace_ctx;

// Re-exports for public API
pub use auth::chain::{AuthChain, RequestCredentials, INIT_DATA_HEADER};
pub use auth::claims::{AuthMethod, AuthenticatedUser};
pub use auth::external::{ExternalIdentityResolver, ExternalTokenVerifier, UserDirectory};
pub use error::AppError;
pub use extractors::auth_token::AuthToken;
pub use extractors::current_user::{CurrentUser, MaybeUser};
pub use middleware::auth_gate::AuthGate;
pub use middleware::cors::cors_middleware;
pub use middleware::request_trace::RequestTrace;
pub use state::app_state::AppState;
pub use state::auth_config::AuthConfig;

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}
