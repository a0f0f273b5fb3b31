//! Supabase-backed implementations of the external auth collaborators.
//!
//! Two REST calls back this module: `GET /auth/v1/user` verifies a caller's
//! bearer token and returns the provider subject, and a `users` table query
//! maps that subject (`auth_id`) to the internal numeric user id. Request
//! timeouts live on the HTTP client; the auth subsystem itself never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::auth::external::{DirectoryUser, ExternalSubject, ExternalTokenVerifier, UserDirectory};
use crate::error::AppError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub base_url: String,
    pub service_key: String,
}

impl SupabaseConfig {
    /// Read `SUPABASE_URL` and `SUPABASE_SERVICE_KEY`; None when either is
    /// missing, in which case the external auth path stays disabled.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok().filter(|s| !s.is_empty())?;
        let service_key = std::env::var("SUPABASE_SERVICE_KEY")
            .ok()
            .filter(|s| !s.is_empty())?;
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }
}

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

#[derive(Debug, Deserialize)]
struct AuthUserResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Deserialize, Default)]
struct UserMetadata {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ExternalTokenVerifier for SupabaseClient {
    async fn verify(&self, token: &str) -> Result<Option<ExternalSubject>, AppError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.config.base_url))
            .header("apikey", &self.config.service_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("supabase rejected bearer token");
                return Ok(None);
            }
            status if !status.is_success() => {
                return Err(AppError::upstream(format!(
                    "supabase auth endpoint answered {status}"
                )));
            }
            _ => {}
        }

        let user: AuthUserResponse = response.json().await?;
        if user.id.is_empty() {
            return Ok(None);
        }

        Ok(Some(ExternalSubject {
            subject_id: user.id,
            first_name: user.user_metadata.first_name,
            last_name: user.user_metadata.last_name,
        }))
    }
}

#[async_trait]
impl UserDirectory for SupabaseClient {
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<DirectoryUser>, AppError> {
        let response = self
            .http
            .get(format!("{}/rest/v1/users", self.config.base_url))
            .query(&[
                ("auth_id", format!("eq.{subject_id}")),
                (
                    "select",
                    "user_id,username,first_name,last_name".to_string(),
                ),
            ])
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::upstream(format!(
                "supabase users query answered {}",
                response.status()
            )));
        }

        let rows: Vec<UserRow> = response.json().await?;
        Ok(rows.into_iter().next().map(|row| DirectoryUser {
            user_id: row.user_id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        }))
    }
}
