use actix_web::web;

use crate::middleware::AuthGate;

pub mod auth;
pub mod feed;
pub mod health;
pub mod user;

/// Configure application routes.
///
/// Protected scopes wrap the required auth gate; public-but-personalized
/// scopes wrap the optional one. Health and login stay outside any gate.
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Liveness: /api/health
    cfg.service(web::scope("/api/health").configure(health::configure_routes));

    // Session issuance: /api/auth/**
    cfg.service(web::scope("/api/auth").configure(auth::configure_routes));

    // Protected user surface: /api/user/**
    cfg.service(
        web::scope("/api/user")
            .wrap(AuthGate::required())
            .configure(user::configure_routes),
    );

    // Public feed, personalized when authenticated: /api/feed
    cfg.service(
        web::scope("/api/feed")
            .wrap(AuthGate::optional())
            .configure(feed::configure_routes),
    );
}
