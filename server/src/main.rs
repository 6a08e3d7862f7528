mod handlers;
mod routes;
mod state;

use std::{env, sync::Arc, time::Duration};

use axum::{
    http::{header, Method},
    Router,
};
use oneview_scraper_cli::scraper::{FormState, PortalClient, PortalConfig, DEFAULT_PORTAL_URL};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use routes::result::result_routes;
use state::{AppState, DEFAULT_CACHE_TTL};

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default))
}

fn portal_config() -> PortalConfig {
    PortalConfig {
        url: env_or("ONEVIEW_URL", DEFAULT_PORTAL_URL),
        timeout: env_secs("ONEVIEW_TIMEOUT_SECS", 30),
        max_retry: env_secs("ONEVIEW_MAX_RETRY_SECS", 60),
        form: FormState {
            view_state: env_or("ONEVIEW_VIEWSTATE", ""),
            view_state_generator: env_or("ONEVIEW_VIEWSTATE_GENERATOR", ""),
            event_validation: env_or("ONEVIEW_EVENT_VALIDATION", ""),
        },
        session_cookie: env::var("ONEVIEW_COOKIE").ok(),
        ..PortalConfig::default()
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = match PortalClient::new(portal_config()) {
        Ok(client) => client,
        Err(e) => {
            error!("could not configure the portal client: {}", e);
            std::process::exit(1);
        }
    };
    let cache_ttl = env_secs("ONEVIEW_CACHE_TTL_SECS", DEFAULT_CACHE_TTL.as_secs());
    let state = AppState::new(Arc::new(client), cache_ttl);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .nest("/api", result_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let port = env_or("PORT", "3001");
    let addr = format!("0.0.0.0:{}", port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("could not bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!("server stopped: {}", e);
    }
}
