use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::auth::api_key::require_api_key;
use crate::config::StorageConfig;
use crate::state::AppState;
use crate::storage::LOCAL_FILES_ROUTE;
use crate::{auth, files, users};

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(files::router())
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let mut app = Router::new().nest("/v1", api);
    if let StorageConfig::Local { dir } = &state.config.storage {
        app = app.nest_service(LOCAL_FILES_ROUTE, ServeDir::new(dir));
    }

    app.with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod router_tests {
    use super::*;
    use crate::auth::services::hash_password;
    use crate::users::repo_types::NewUser;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn authed_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// App with one staff account (id 1) and a token for it.
    async fn app_with_admin() -> (Router, String) {
        let state = AppState::fake();
        let admin = state
            .users
            .create(NewUser {
                name: "Root".into(),
                email: "root@example.com".into(),
                password_hash: hash_password("pa55word").unwrap(),
                role_id: 1,
                ..NewUser::default()
            })
            .await
            .unwrap();
        let token = state.tokens.encode(admin.id).unwrap();
        (build_app(state), token)
    }

    async fn register(app: &Router, name: &str, email: &str, phone: &str) -> (StatusCode, Value) {
        call(
            app,
            post_json(
                "/v1/auth/register",
                json!({"name": name, "email": email, "password": "pa55word", "phone": phone}),
            ),
        )
        .await
    }

    async fn login_token(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            post_json(
                "/v1/auth/login/user",
                json!({"emailorphone": email, "password": "pa55word"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_login_and_list() {
        let (app, admin) = app_with_admin().await;
        for (i, name) in ["John Doe", "Johnny B", "Mary Jane"].iter().enumerate() {
            let (status, body) =
                register(&app, name, &format!("u{i}@example.com"), &format!("08{i}")).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["data"]["role_id"], 3);
            assert_eq!(body["data"]["status"], 0);
            assert!(body["data"].get("password_hash").is_none());
        }
        login_token(&app, "u0@example.com").await;

        let (status, body) = call(
            &app,
            authed(
                "GET",
                "/v1/user?role_id=3&search=JOHN&limit=1&sort=name&order=desc",
                &admin,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let page = &body["data"];
        assert_eq!(page["total_count"], 3);
        assert_eq!(page["filtered_count"], 2);
        assert_eq!(page["last_page"], 2);
        assert_eq!(page["items"][0]["name"], "Johnny B");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (app, _) = app_with_admin().await;
        register(&app, "A", "dup@example.com", "0811").await;
        let (status, body) = register(&app, "B", "dup@example.com", "0812").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Email already exists");

        let (status, _) = register(&app, "C", "other@example.com", "0811").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn end_user_cannot_use_admin_login() {
        let (app, _) = app_with_admin().await;
        register(&app, "A", "a@example.com", "").await;
        let (status, body) = call(
            &app,
            post_json(
                "/v1/auth/login/admin",
                json!({"emailorphone": "a@example.com", "password": "pa55word"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], 403);
    }

    #[tokio::test]
    async fn end_user_cannot_escalate_or_administer() {
        let (app, _) = app_with_admin().await;
        register(&app, "Eve", "eve@example.com", "0801").await;
        let eve = login_token(&app, "eve@example.com").await;

        let (status, _) = call(
            &app,
            authed_json("PUT", "/v1/user/2", &eve, json!({"role_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            post_json(
                "/v1/auth/login/admin",
                json!({"emailorphone": "eve@example.com", "password": "pa55word"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for (method, uri) in [
            ("GET", "/v1/user"),
            ("GET", "/v1/user/all"),
            ("GET", "/v1/user/1"),
            ("DELETE", "/v1/user/1"),
            ("PUT", "/v1/auth/activate-account/2"),
        ] {
            let (status, _) = call(&app, authed(method, uri, &eve)).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        }

        let (status, body) = call(
            &app,
            authed_json("PUT", "/v1/user/2", &eve, json!({"address": "Jl. Baru"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["address"], "Jl. Baru");
        assert_eq!(body["data"]["role_id"], 3);

        let (status, _) = call(&app, authed("GET", "/v1/user/2", &eve)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn password_reset_requires_staff() {
        let (app, admin) = app_with_admin().await;
        register(&app, "A", "a@example.com", "").await;
        let user = login_token(&app, "a@example.com").await;
        let body = json!({"new_password": "owned123", "new_password_confirm": "owned123"});

        let anonymous = Request::put("/v1/auth/reset-password/2")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _) = call(&app, anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            authed_json("PUT", "/v1/auth/reset-password/1", &user, body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            authed_json("PUT", "/v1/auth/reset-password/2", &admin, body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            post_json(
                "/v1/auth/login/user",
                json!({"emailorphone": "a@example.com", "password": "owned123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn user_routes_require_a_token() {
        let (app, _) = app_with_admin().await;
        let (status, _) = call(&app, Request::get("/v1/user").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, authed("GET", "/v1/user", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "incorrect token format");
    }

    #[tokio::test]
    async fn update_and_soft_delete() {
        let (app, admin) = app_with_admin().await;
        register(&app, "A", "a@example.com", "0801").await;
        register(&app, "B", "b@example.com", "0802").await;

        let (status, _) = call(
            &app,
            authed_json("PUT", "/v1/user/3", &admin, json!({"phone": "0801"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            authed_json("PUT", "/v1/user/3", &admin, json!({"name": "Bee", "is_verify": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Bee");
        assert_eq!(body["data"]["status"], 1);

        let (status, _) = call(&app, authed("DELETE", "/v1/user/3", &admin)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, authed("GET", "/v1/user/3", &admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn force_delete_purges_soft_deleted_row() {
        let (app, admin) = app_with_admin().await;
        register(&app, "A", "a@example.com", "0801").await;

        let (status, _) = call(&app, authed("DELETE", "/v1/user/2", &admin)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, authed("DELETE", "/v1/user/2?force=true", &admin)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let (status, _) = call(&app, authed("DELETE", "/v1/user/2?force=true", &admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_rejects_disguised_file() {
        let (app, _) = app_with_admin().await;
        register(&app, "A", "a@example.com", "").await;
        let token = login_token(&app, "a@example.com").await;

        let boundary = "X-BOUNDARY";
        let upload = |bytes: &[u8]| {
            let mut body = format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"pic.png\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(bytes);
            body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
            Request::post("/v1/file/upload")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap()
        };

        let (status, _) = call(&app, upload(b"<?php echo 1; ?>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, upload(b"\x89PNG\r\n\x1a\n0000")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["data"].as_str().unwrap().ends_with("_pic.png"));
    }

    #[tokio::test]
    async fn api_key_gate() {
        let app = build_app(AppState::fake_with(Some("k3y")));
        let (status, _) = call(&app, Request::get("/v1/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let hashed = hash_password("k3y").unwrap();
        let req = Request::get("/v1/health")
            .header("X-API-KEY", hashed)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
