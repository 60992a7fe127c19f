use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::status,
        crate::routes::auth::signup,
        crate::routes::auth::login,
        crate::routes::auth::check,
        crate::routes::auth::logout,
        crate::routes::messages::list_sidebar_users,
        crate::routes::messages::get_conversation,
        crate::routes::messages::mark_read,
        crate::routes::messages::send_message,
        crate::routes::websocket::websocket_handler
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::health::StatusResponse,
            crate::routes::auth::SignupRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::SessionResponse,
            crate::routes::models::UserResponse,
            crate::routes::models::SidebarUser,
            crate::routes::models::SidebarResponse,
            crate::routes::models::MessageResponse,
            crate::routes::models::MessagesResponse,
            crate::routes::models::MarkReadResponse,
            crate::routes::models::SendMessageBody
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Accounts and session tokens"),
        (name = "Messages", description = "Direct messages, read state and the contact list"),
        (name = "WebSocket", description = "Presence and live message stream")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("Bearer".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}
