mod docs;
mod error;
mod middleware;
mod state;
mod util;

pub mod routes;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::{ApiSettings, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings().body_limit_bytes;
    let media = ServeDir::new(&state.settings().media_root);

    let router = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/status", get(routes::health::status))
        // Auth routes
        .route("/api/auth/signup", post(routes::auth::signup))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/check", get(routes::auth::check))
        .route("/api/auth/logout", post(routes::auth::logout))
        // Message routes
        .route(
            "/api/messages/users",
            get(routes::messages::list_sidebar_users),
        )
        .route(
            "/api/messages/:user_id",
            get(routes::messages::get_conversation),
        )
        .route(
            "/api/messages/mark/:user_id",
            put(routes::messages::mark_read),
        )
        .route(
            "/api/messages/send/:user_id",
            post(routes::messages::send_message),
        )
        // WebSocket route
        .route("/ws", get(routes::websocket::websocket_handler))
        .nest_service("/media", media)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    with_docs(router)
}

#[cfg(debug_assertions)]
fn with_docs(router: Router) -> Router {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(not(debug_assertions))]
fn with_docs(router: Router) -> Router {
    router
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, HeaderName::from_static("token")])
}
