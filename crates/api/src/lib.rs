pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .settings
        .app
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods(Any)
    .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me));

    let room_routes = Router::new()
        .route("/", post(routes::room::create))
        .route("/current", get(routes::room::current))
        .route("/join", post(routes::room::join))
        .route("/{code}", get(routes::room::get))
        .route("/{code}/leave", post(routes::room::leave))
        .route(
            "/{code}/destination",
            put(routes::room::set_destination).delete(routes::room::clear_destination),
        )
        .route("/{code}/location", put(routes::room::update_location))
        .route("/{code}/member", get(routes::room::members))
        .route("/{code}/overview", get(routes::room::overview))
        .route("/{code}/route", get(routes::room::route));

    let geo_routes = Router::new().route("/search", get(routes::geo::search));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/room", room_routes)
        .nest("/geo", geo_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws/room/{code}", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
