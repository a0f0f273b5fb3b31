//! External identity-provider resolution.
//!
//! Delegates bearer tokens that are not backend session tokens to an external
//! verification capability, then maps the returned subject id to an internal
//! user id. Both capabilities are constructor-injected so the resolver never
//! reaches for ambient services, and every upstream failure collapses to "no
//! identity" rather than an error: an unverifiable token is simply
//! unauthenticated.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::auth::claims::{AuthMethod, AuthenticatedUser};
use crate::error::AppError;

/// Subject claim returned by the external identity provider.
#[derive(Debug, Clone)]
pub struct ExternalSubject {
    pub subject_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Verifies an opaque external token out of process.
#[async_trait]
pub trait ExternalTokenVerifier: Send + Sync {
    /// Ok(None) means the provider rejected the token or returned no subject.
    async fn verify(&self, token: &str) -> Result<Option<ExternalSubject>, AppError>;
}

/// Internal user record linked to an external subject id.
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Looks up the internal user linked to an external subject id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<DirectoryUser>, AppError>;
}

/// Resolves external bearer tokens to internal identities.
#[derive(Clone)]
pub struct ExternalIdentityResolver {
    verifier: Arc<dyn ExternalTokenVerifier>,
    directory: Arc<dyn UserDirectory>,
}

impl ExternalIdentityResolver {
    pub fn new(verifier: Arc<dyn ExternalTokenVerifier>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            verifier,
            directory,
        }
    }

    /// Resolver that authenticates nothing, for deployments without an
    /// external provider configured.
    pub fn disabled() -> Self {
        Self::new(Arc::new(Disabled), Arc::new(Disabled))
    }

    /// Resolve a bearer token to an internal identity.
    ///
    /// Returns None when the provider rejects the token, when no internal
    /// user is linked to the subject, or when either upstream call fails.
    pub async fn resolve(&self, token: &str) -> Option<AuthenticatedUser> {
        let subject = match self.verifier.verify(token).await {
            Ok(Some(subject)) => subject,
            Ok(None) => {
                debug!("external token rejected by provider");
                return None;
            }
            Err(e) => {
                warn!("external token verification failed: {e}");
                return None;
            }
        };

        let record = match self.directory.find_by_subject(&subject.subject_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("external identity has no linked user row");
                return None;
            }
            Err(e) => {
                warn!("user lookup for external identity failed: {e}");
                return None;
            }
        };
        if record.user_id <= 0 {
            warn!("external identity mapped to an invalid user id");
            return None;
        }

        // Directory fields win over provider profile fields.
        Some(AuthenticatedUser {
            id: record.user_id,
            telegram_id: None,
            username: record.username,
            first_name: record.first_name.or(subject.first_name),
            last_name: record.last_name.or(subject.last_name),
            language_code: None,
            is_premium: None,
            auth_method: AuthMethod::ExternalJwt,
        })
    }
}

struct Disabled;

#[async_trait]
impl ExternalTokenVerifier for Disabled {
    async fn verify(&self, _token: &str) -> Result<Option<ExternalSubject>, AppError> {
        Ok(None)
    }
}

#[async_trait]
impl UserDirectory for Disabled {
    async fn find_by_subject(&self, _subject_id: &str) -> Result<Option<DirectoryUser>, AppError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticVerifier(Option<ExternalSubject>);

    #[async_trait]
    impl ExternalTokenVerifier for StaticVerifier {
        async fn verify(&self, _token: &str) -> Result<Option<ExternalSubject>, AppError> {
            Ok(self.0.clone())
        }
    }

    struct FailingVerifier;

    #[async_trait]
    impl ExternalTokenVerifier for FailingVerifier {
        async fn verify(&self, _token: &str) -> Result<Option<ExternalSubject>, AppError> {
            Err(AppError::upstream("provider timed out".to_string()))
        }
    }

    struct StaticDirectory(Option<DirectoryUser>);

    #[async_trait]
    impl UserDirectory for StaticDirectory {
        async fn find_by_subject(
            &self,
            _subject_id: &str,
        ) -> Result<Option<DirectoryUser>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn subject() -> ExternalSubject {
        ExternalSubject {
            subject_id: "6f1c2b9a".to_string(),
            first_name: Some("Provider".to_string()),
            last_name: Some("Name".to_string()),
        }
    }

    #[tokio::test]
    async fn resolves_linked_identity_with_directory_fields_winning() {
        let resolver = ExternalIdentityResolver::new(
            Arc::new(StaticVerifier(Some(subject()))),
            Arc::new(StaticDirectory(Some(DirectoryUser {
                user_id: 31,
                username: Some("dir-name".to_string()),
                first_name: Some("Directory".to_string()),
                last_name: None,
            }))),
        );

        let user = resolver.resolve("token").await.expect("should resolve");
        assert_eq!(user.id, 31);
        assert_eq!(user.auth_method, AuthMethod::ExternalJwt);
        assert_eq!(user.username.as_deref(), Some("dir-name"));
        assert_eq!(user.first_name.as_deref(), Some("Directory"));
        // Missing directory field falls back to the provider claim.
        assert_eq!(user.last_name.as_deref(), Some("Name"));
    }

    #[tokio::test]
    async fn unlinked_subject_is_unauthenticated() {
        let resolver = ExternalIdentityResolver::new(
            Arc::new(StaticVerifier(Some(subject()))),
            Arc::new(StaticDirectory(None)),
        );
        assert!(resolver.resolve("token").await.is_none());
    }

    #[tokio::test]
    async fn provider_rejection_is_unauthenticated() {
        let resolver = ExternalIdentityResolver::new(
            Arc::new(StaticVerifier(None)),
            Arc::new(StaticDirectory(None)),
        );
        assert!(resolver.resolve("token").await.is_none());
    }

    #[tokio::test]
    async fn upstream_failure_is_unauthenticated_not_fatal() {
        let resolver = ExternalIdentityResolver::new(
            Arc::new(FailingVerifier),
            Arc::new(StaticDirectory(None)),
        );
        assert!(resolver.resolve("token").await.is_none());
    }

    #[tokio::test]
    async fn disabled_resolver_authenticates_nothing() {
        assert!(ExternalIdentityResolver::disabled()
            .resolve("token")
            .await
            .is_none());
    }
}
