use actix_web::web;

use crate::auth::claims::AuthenticatedUser;
use crate::error::AppError;
use crate::extractors::CurrentUser;

/// Echo the identity the auth gate bound to this request.
async fn me(user: CurrentUser) -> Result<web::Json<AuthenticatedUser>, AppError> {
    Ok(web::Json(user.into_inner()))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/me", web::get().to(me));
}
