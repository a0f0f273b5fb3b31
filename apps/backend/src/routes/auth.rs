use std::time::SystemTime;

use actix_web::{web, HttpResponse, Result};
use serde::{Deserialize, Serialize};

use crate::auth::claims::AuthenticatedUser;
use crate::auth::{init_data, session_token};
use crate::error::AppError;
use crate::state::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    #[serde(default)]
    pub init_data: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: AuthenticatedUser,
}

/// Exchange a valid initData blob for a long-lived session token, so the
/// Mini App can keep calling the API after the blob's replay window closes.
async fn create_session(
    req: web::Json<SessionRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.init_data.trim().is_empty() {
        return Err(AppError::bad_request(
            "INVALID_INIT_DATA",
            "initData cannot be empty".to_string(),
        ));
    }

    let user = init_data::validate(&app_state.auth, &req.init_data, SystemTime::now())
        .ok_or_else(AppError::unauthorized)?;

    let issued = session_token::issue(
        &app_state.auth,
        user.id,
        user.telegram_id.unwrap_or(user.id),
        user.username.as_deref(),
        user.first_name.as_deref(),
        None,
        SystemTime::now(),
    )?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/telegram/session").route(web::post().to(create_session)));
}
