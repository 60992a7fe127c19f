use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    response::{IntoResponse, Response},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::BodyExt;
use parley_auth::Authenticator;
use parley_backend_api::{build_router, ApiError, ApiSettings, AppState};
use parley_config::AppConfig;
use parley_database::MessageRepository;
use parley_media::LocalBlobStore;
use parley_realtime::{
    ConnectionHandle, DeliveryDispatcher, MessageService, PresenceRegistry, ServerEvent,
};
use serde_json::{json, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRpixels";

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    registry: Arc<PresenceRegistry>,
    state: AppState,
}

struct Account {
    id: String,
    token: String,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        Self::with_config(AppConfig::default()).await
    }

    async fn with_config(mut config: AppConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("backend_api.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        config.media.root_dir = temp_dir.path().join("media");

        let authenticator = Authenticator::new(pool.clone(), config.auth.clone());
        let repository = MessageRepository::new(pool.clone());
        let registry = Arc::new(PresenceRegistry::new());
        let messages = MessageService::new(
            Arc::new(repository.clone()),
            Arc::new(LocalBlobStore::new(&config.media)),
            DeliveryDispatcher::new(Arc::clone(&registry)),
        );
        let state = AppState::new(
            authenticator,
            repository,
            messages,
            ApiSettings::from_config(&config),
        );

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            registry,
            state,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn request(&self, request: Request<Body>) -> TestResult<Response> {
        Ok(self.router().oneshot(request).await?)
    }

    async fn signup(&self, name: &str) -> TestResult<Account> {
        let response = self
            .request(json_request(
                Method::POST,
                "/api/auth/signup",
                None,
                json!({
                    "email": format!("{name}@example.com"),
                    "password": "hunter22",
                    "full_name": name,
                    "bio": format!("hi, I'm {name}"),
                }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);

        let payload = read_json(response).await?;
        Ok(Account {
            id: payload["user"]["id"].as_str().unwrap_or_default().to_owned(),
            token: payload["token"].as_str().unwrap_or_default().to_owned(),
        })
    }

    async fn send_text(&self, from: &Account, to: &Account, text: &str) -> TestResult<Value> {
        let response = self
            .request(json_request(
                Method::POST,
                &format!("/api/messages/send/{}", to.id),
                Some(&from.token),
                json!({ "text": text }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json(response).await
    }

    /// Registers a bare handle for `user_id` and returns its drained queue.
    fn go_online(&self, user_id: &str) -> mpsc::Receiver<ServerEvent> {
        let (tx, mut rx) = mpsc::channel(8);
        self.registry
            .register(Arc::new(ConnectionHandle::new(user_id, tx)));
        while rx.try_recv().is_ok() {}
        rx
    }
}

fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> TestResult<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(serde_json::to_vec(&body)?))?)
}

fn authed(method: Method, uri: &str, token: &str) -> TestResult<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?)
}

async fn read_json(response: Response) -> TestResult<Value> {
    let body = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

mod router_tests {
    use super::*;

    #[tokio::test]
    async fn health_and_status_respond() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .request(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await?["status"], "ok");

        let _alice = ctx.go_online("alice");
        let response = ctx
            .request(Request::builder().uri("/api/status").body(Body::empty())?)
            .await?;
        let payload = read_json(response).await?;
        assert_eq!(payload["online_users"], 1);
        assert_eq!(payload["connections"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served_in_debug_builds() -> TestResult {
        if !cfg!(debug_assertions) {
            return Ok(());
        }
        let ctx = TestContext::new().await?;
        let response = ctx
            .request(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let doc = read_json(response).await?;
        assert!(doc["paths"]["/api/messages/send/{user_id}"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn cors_preflight_allows_token_header() -> TestResult {
        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/messages/users")
            .header(ORIGIN, "https://example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization, token")
            .body(Body::empty())?;

        let response = ctx.request(request).await?;
        assert!(matches!(
            response.status(),
            StatusCode::NO_CONTENT | StatusCode::OK
        ));

        let allow_origin = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert_eq!(allow_origin, "*");

        let allow_headers = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allow_headers.contains("authorization") && allow_headers.contains("token"));
        Ok(())
    }

    #[tokio::test]
    async fn api_error_into_response_sets_status_and_body() -> TestResult {
        let response = ApiError::bad_request("missing payload").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await?["error"], "missing payload");
        Ok(())
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn signup_then_check_returns_the_same_user() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        assert!(!alice.token.is_empty());

        let response = ctx
            .request(authed(Method::GET, "/api/auth/check", &alice.token)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let user = read_json(response).await?;
        assert_eq!(user["id"], alice.id.as_str());
        assert_eq!(user["email"], "alice@example.com");
        assert!(user.get("password_hash").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn check_accepts_the_token_header() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;

        let response = ctx
            .request(
                Request::builder()
                    .uri("/api/auth/check")
                    .header("token", &alice.token)
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_signup_is_a_bad_request() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.signup("alice").await?;

        let response = ctx
            .request(json_request(
                Method::POST,
                "/api/auth/signup",
                None,
                json!({
                    "email": "ALICE@example.com",
                    "password": "another-pass",
                    "full_name": "Alice Again",
                    "bio": "second try",
                }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.signup("alice").await?;

        let wrong = ctx
            .request(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "nope-nope" }),
            )?)
            .await?;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = ctx
            .request(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": "alice@example.com", "password": "hunter22" }),
            )?)
            .await?;
        assert_eq!(right.status(), StatusCode::OK);
        assert!(read_json(right).await?["token"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn logout_revokes_the_session() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;

        let response = ctx
            .request(authed(Method::POST, "/api/auth/logout", &alice.token)?)
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = ctx
            .request(authed(Method::GET, "/api/auth/check", &alice.token)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthorized() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .request(Request::builder().uri("/api/messages/users").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(read_json(response).await?["error"].is_string());
        Ok(())
    }
}

mod message_tests {
    use super::*;

    #[tokio::test]
    async fn send_persists_and_pushes_to_online_receiver() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;
        let mut bob_rx = ctx.go_online(&bob.id);

        let sent = ctx.send_text(&alice, &bob, "hi").await?;
        assert_eq!(sent["sender_id"], alice.id.as_str());
        assert_eq!(sent["receiver_id"], bob.id.as_str());
        assert_eq!(sent["text"], "hi");
        assert!(sent.get("image_url").is_none());

        match bob_rx.try_recv()? {
            ServerEvent::NewMessage { message } => {
                assert_eq!(Some(message.id), sent["id"].as_i64());
            }
            other => panic!("expected new_message, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn send_requires_exactly_one_payload() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;
        let uri = format!("/api/messages/send/{}", bob.id);

        for body in [
            json!({}),
            json!({ "text": "   " }),
            json!({ "text": "hi", "image_url": "/media/x.png" }),
        ] {
            let response = ctx
                .request(json_request(Method::POST, &uri, Some(&alice.token), body)?)
                .await?;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&ctx.pool)
            .await?;
        assert_eq!(count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn send_to_unknown_user_is_not_found() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;

        let response = ctx
            .request(json_request(
                Method::POST,
                "/api/messages/send/nobody",
                Some(&alice.token),
                json!({ "text": "hello?" }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn conversation_is_ascending_and_clears_unseen_count() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;

        ctx.send_text(&alice, &bob, "one").await?;
        ctx.send_text(&bob, &alice, "two").await?;
        ctx.send_text(&alice, &bob, "three").await?;

        let sidebar = read_json(
            ctx.request(authed(Method::GET, "/api/messages/users", &bob.token)?)
                .await?,
        )
        .await?;
        assert_eq!(sidebar["unseen_messages"][alice.id.as_str()], 2);

        let response = ctx
            .request(authed(
                Method::GET,
                &format!("/api/messages/{}", alice.id),
                &bob.token,
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let texts: Vec<String> = read_json(response).await?["messages"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|message| message["text"].as_str().unwrap_or_default().to_owned())
            .collect();
        assert_eq!(texts, ["one", "two", "three"]);

        let sidebar = read_json(
            ctx.request(authed(Method::GET, "/api/messages/users", &bob.token)?)
                .await?,
        )
        .await?;
        assert!(sidebar["unseen_messages"].get(alice.id.as_str()).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sidebar_lists_others_with_presence() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;
        let carol = ctx.signup("carol").await?;
        let _bob_rx = ctx.go_online(&bob.id);

        let sidebar = read_json(
            ctx.request(authed(Method::GET, "/api/messages/users", &alice.token)?)
                .await?,
        )
        .await?;
        let users = sidebar["users"].as_array().cloned().unwrap_or_default();
        let entries: Vec<(String, bool)> = users
            .iter()
            .map(|user| {
                (
                    user["id"].as_str().unwrap_or_default().to_owned(),
                    user["online"].as_bool().unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(entries, vec![(bob.id, true), (carol.id, false)]);
        Ok(())
    }

    #[tokio::test]
    async fn mark_read_moves_the_cursor() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;

        let sent = ctx.send_text(&alice, &bob, "read me").await?;
        let response = ctx
            .request(authed(
                Method::PUT,
                &format!("/api/messages/mark/{}", alice.id),
                &bob.token,
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await?["last_read_id"], sent["id"]);
        Ok(())
    }

    #[tokio::test]
    async fn conversation_with_unknown_user_is_not_found() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;

        let response = ctx
            .request(authed(Method::GET, "/api/messages/nobody", &alice.token)?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn inline_image_is_stored_and_served() -> TestResult {
        let ctx = TestContext::new().await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;

        let response = ctx
            .request(json_request(
                Method::POST,
                &format!("/api/messages/send/{}", bob.id),
                Some(&alice.token),
                json!({ "image": format!("data:image/png;base64,{}", STANDARD.encode(PNG_BYTES)) }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        let sent = read_json(response).await?;
        assert!(sent.get("text").is_none());
        let url = sent["image_url"].as_str().unwrap_or_default().to_owned();
        assert!(url.starts_with("/media/") && url.ends_with(".png"), "{url}");

        let response = ctx
            .request(Request::builder().uri(&url).body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await?.to_bytes();
        assert_eq!(&body[..], PNG_BYTES);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_image_is_rejected() -> TestResult {
        let mut config = AppConfig::default();
        config.media.max_image_bytes = 8;
        let ctx = TestContext::with_config(config).await?;
        let alice = ctx.signup("alice").await?;
        let bob = ctx.signup("bob").await?;
        let mut image = PNG_BYTES.to_vec();
        image.extend_from_slice(&[0u8; 64]);

        let response = ctx
            .request(json_request(
                Method::POST,
                &format!("/api/messages/send/{}", bob.id),
                Some(&alice.token),
                json!({ "image": STANDARD.encode(&image) }),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        Ok(())
    }
}
