use actix_web::web;
use serde::Serialize;

use crate::error::AppError;
use crate::extractors::MaybeUser;

#[derive(Debug, Serialize)]
struct FeedResponse {
    /// Internal id of the viewer when the request carried a valid
    /// credential; anonymous viewers get the public feed.
    viewer_id: Option<i64>,
    items: Vec<serde_json::Value>,
}

/// Public feed endpoint behind the optional gate: anonymous requests pass
/// through, authenticated ones are personalized.
async fn list_feed(user: MaybeUser) -> Result<web::Json<FeedResponse>, AppError> {
    Ok(web::Json(FeedResponse {
        viewer_id: user.into_inner().map(|u| u.id),
        items: Vec::new(),
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_feed));
}
