use axum::http::Request;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

use super::auth::require_admin;
use super::handlers;
use super::ApiState;

pub fn build_router(state: ApiState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/giftcode", post(handlers::legacy_add_gift_code))
        .route("/add_user", post(handlers::legacy_add_user));

    if state.auth.is_some() {
        let protected = Router::new()
            .route("/users", get(handlers::list_users).post(handlers::add_user))
            .route("/users/{fid}/codes", get(handlers::user_codes))
            .route("/tasks", get(handlers::list_tasks).post(handlers::add_task))
            .route("/tasks/completed", get(handlers::completed_tasks))
            .route("/tasks/{code}", delete(handlers::delete_task))
            .route("/notifications", get(handlers::list_notifications))
            .route("/redeem", post(handlers::redeem))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

        let admin = Router::new()
            .route("/login", post(handlers::login))
            .merge(protected);
        app = app.nest("/api/admin", admin);
    }

    app.with_state(state).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http().make_span_with(
            |req: &Request<_>| {
                info_span!(
                    "http",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %Uuid::new_v4(),
                )
            },
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    use giftbot_common::models::GiftCodeStatus;
    use giftbot_common::traits::repository_traits::{GiftCodeRepository, TaskRepository};
    use giftbot_core::captcha::{OcrPool, OcrProvider};
    use giftbot_core::giftcode::{CaptchaData, GameApi, PlayerData, RedeemResponse, SessionContext};
    use giftbot_core::repositories::{
        SqliteGiftCodeRepository, SqliteNotificationRepository, SqlitePlayerRepository,
        SqliteTaskRepository,
    };
    use giftbot_core::services::RedemptionEngine;
    use giftbot_core::{Database, Error};
    use crate::api::AdminAuth;
    use crate::config::AdminConfig;

    struct HappyGame;

    #[async_trait]
    impl GameApi for HappyGame {
        async fn player_info(&self, player_id: &str) -> Result<PlayerData, Error> {
            Ok(PlayerData {
                fid: player_id.parse().unwrap_or_default(),
                nickname: format!("p{}", player_id),
                kid: 7,
                avatar_image: String::new(),
            })
        }

        async fn captcha(&self, _player_id: &str) -> Result<CaptchaData, Error> {
            Ok(CaptchaData { img: "QUJD".into() })
        }

        async fn redeem(&self, _player_id: &str, _code: &str, _captcha: &str) -> Result<RedeemResponse, Error> {
            Ok(RedeemResponse { code: 0, msg: "SUCCESS".into(), ..Default::default() })
        }
    }

    struct StaticOcr;

    #[async_trait]
    impl OcrProvider for StaticOcr {
        fn name(&self) -> &str {
            "static"
        }

        async fn solve(&self, _image_base64: &str) -> Result<String, Error> {
            Ok("ab12".into())
        }
    }

    struct TestApp {
        router: Router,
        tasks: Arc<SqliteTaskRepository>,
        gift_codes: Arc<SqliteGiftCodeRepository>,
    }

    async fn app(with_admin: bool) -> TestApp {
        let db = Database::new_in_memory().await.unwrap();
        db.migrate().await.unwrap();

        let players = Arc::new(SqlitePlayerRepository::new(db.pool().clone()));
        let tasks = Arc::new(SqliteTaskRepository::new(db.pool().clone()));
        let gift_codes = Arc::new(SqliteGiftCodeRepository::new(db.pool().clone()));
        let notifications = Arc::new(SqliteNotificationRepository::new(db.pool().clone()));

        let providers: Vec<Arc<dyn OcrProvider>> = vec![Arc::new(StaticOcr)];
        let ocr = Arc::new(OcrPool::new(providers).unwrap());
        let ctx = Arc::new(SessionContext::new(Arc::new(HappyGame), ocr, players.clone()));
        let engine = Arc::new(RedemptionEngine::new(ctx, gift_codes.clone(), tasks.clone()));

        let auth = with_admin.then(|| {
            Arc::new(AdminAuth::new(&AdminConfig {
                username: "admin".into(),
                password_hash: bcrypt::hash("hunter2", 4).unwrap(),
                token_secret: "k".repeat(32),
                token_duration_secs: 600,
            }))
        });

        let state = ApiState {
            db,
            engine,
            players,
            tasks: tasks.clone(),
            gift_codes: gift_codes.clone(),
            notifications,
            auth,
            batch_concurrency: 2,
        };
        TestApp { router: build_router(state), tasks, gift_codes }
    }

    async fn send(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        router.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn token(router: &Router) -> String {
        let resp = send(
            router,
            Method::POST,
            "/api/admin/login",
            None,
            Some(serde_json::json!({"username": "admin", "password": "hunter2"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(false).await;
        let resp = send(&app.router, Method::GET, "/health", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_absent_without_auth() {
        let app = app(false).await;
        let resp = send(&app.router, Method::GET, "/api/admin/tasks", None, None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_failure_and_missing_token() {
        let app = app(true).await;
        let resp = send(
            &app.router,
            Method::POST,
            "/api/admin/login",
            None,
            Some(serde_json::json!({"username": "admin", "password": "wrong"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = send(&app.router, Method::GET, "/api/admin/tasks", None, None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let resp = send(&app.router, Method::GET, "/api/admin/tasks", Some("garbage"), None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_task_conflict() {
        let app = app(true).await;
        let token = token(&app.router).await;
        let body = serde_json::json!({"code": "VIP888"});

        let resp = send(&app.router, Method::POST, "/api/admin/tasks", Some(&token), Some(body.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["code"], "VIP888");

        let resp = send(&app.router, Method::POST, "/api/admin/tasks", Some(&token), Some(body)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"]["code"], "ALREADY_EXISTS");

        let resp = send(&app.router, Method::GET, "/api/admin/tasks", Some(&token), None).await;
        assert_eq!(body_json(resp).await["data"]["tasks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_task_statuses() {
        let app = app(true).await;
        let token = token(&app.router).await;
        app.tasks.create_task("VIP888").await.unwrap();
        app.gift_codes
            .save_gift_code_record("1001", "VIP888", GiftCodeStatus::Redeemed, "redeemed")
            .await
            .unwrap();

        let resp = send(&app.router, Method::DELETE, "/api/admin/tasks/%20", Some(&token), None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&app.router, Method::DELETE, "/api/admin/tasks/GHOST", Some(&token), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app.router, Method::DELETE, "/api/admin/tasks/VIP888", Some(&token), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(app.tasks.get_task_by_code("VIP888").await.is_err());
        assert!(!app.gift_codes.is_gift_code_recorded("1001", "VIP888").await.unwrap());
    }

    #[tokio::test]
    async fn test_redeem_and_user_codes() {
        let app = app(true).await;
        let token = token(&app.router).await;

        let resp = send(
            &app.router,
            Method::POST,
            "/api/admin/redeem",
            Some(&token),
            Some(serde_json::json!({"code": "VIP888", "fids": ["1001", "1002"]})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let results = body["data"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["fid"], "1001");
        assert_eq!(results[0]["success"], true);

        let resp = send(
            &app.router,
            Method::POST,
            "/api/admin/redeem",
            Some(&token),
            Some(serde_json::json!({"code": "GIFT2", "fids": ["1003", " 1003", "1003"]})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let resp = send(&app.router, Method::GET, "/api/admin/users/1002/codes", Some(&token), None).await;
        let body = body_json(resp).await;
        assert_eq!(body["data"]["records"][0]["code"], "VIP888");

        let resp = send(
            &app.router,
            Method::POST,
            "/api/admin/redeem",
            Some(&token),
            Some(serde_json::json!({"code": "  "})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_legacy_routes() {
        let app = app(false).await;

        let resp = send(&app.router, Method::POST, "/giftcode?code=ABC", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(app.tasks.get_task_by_code("ABC").await.is_ok());

        let resp = send(&app.router, Method::POST, "/giftcode", None, None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&app.router, Method::POST, "/add_user?fid=x1", None, None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&app.router, Method::POST, "/add_user?fid=1001", None, None).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
