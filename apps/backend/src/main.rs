use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use backend::middleware::cors::cors_middleware;
use backend::middleware::request_trace::RequestTrace;
use backend::routes;
use backend::services::supabase::{SupabaseClient, SupabaseConfig};
use backend::state::app_state::AppState;
use backend::state::auth_config::AuthConfig;
use backend::ExternalIdentityResolver;
use tracing::warn;

mod telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    // Environment variables must be set by the runtime environment:
    // - Docker: Set via docker-compose env_file or docker run --env-file
    // - Local dev: Source env files manually (e.g., set -a; . ./.env; set +a)
    let host = std::env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("BACKEND_PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            eprintln!("BACKEND_PORT must be a valid port number");
            std::process::exit(1);
        });

    let auth_config = AuthConfig::from_env();
    if auth_config.bot_token().is_none() {
        // Fail closed rather than refusing to start: every initData and
        // session-token check will answer 401 until the token is configured.
        warn!("TELEGRAM_BOT_TOKEN is not set; Telegram authentication is disabled");
    }

    let resolver = match SupabaseConfig::from_env() {
        Some(config) => match SupabaseClient::new(config) {
            Ok(client) => {
                let client = Arc::new(client);
                ExternalIdentityResolver::new(client.clone(), client)
            }
            Err(e) => {
                eprintln!("Failed to build Supabase client: {e}");
                std::process::exit(1);
            }
        },
        None => {
            warn!("SUPABASE_URL/SUPABASE_SERVICE_KEY not set; external JWT authentication is disabled");
            ExternalIdentityResolver::disabled()
        }
    };

    let data = web::Data::new(AppState::new(auth_config, resolver));

    println!("Starting backend on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(cors_middleware())
            .wrap(RequestTrace)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
