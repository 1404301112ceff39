use std::net::SocketAddr;
use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;
use crate::error::AppError;
use crate::state::AppState;
use crate::{auth, cookies, tasks};

pub fn build_app(state: AppState) -> Router {
    let secure_cookies = state.config.session.cookie_secure;
    let app = Router::new()
        .merge(auth::router())
        .merge(tasks::router())
        .route("/health", get(|| async { "ok" }))
        .fallback(|| async { AppError::NotFound })
        .with_state(state);

    let app = if secure_cookies {
        app.layer(middleware::map_response(cookies::mark_secure))
    } else {
        app
    };

    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    let latency_ms = latency.as_millis() as u64;
                    if status.is_server_error() {
                        tracing::error!(%status, latency_ms, "response");
                    } else {
                        tracing::info!(%status, latency_ms, "response");
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
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    const FORM: &str = "application/x-www-form-urlencoded";

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.expect("infallible")
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut b = Request::builder().uri(uri);
        if let Some(c) = cookie {
            b = b.header(header::COOKIE, c);
        }
        b.body(Body::empty()).unwrap()
    }

    fn post(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut b = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, FORM);
        if let Some(c) = cookie {
            b = b.header(header::COOKIE, c);
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn location(res: &Response) -> &str {
        res.headers()[header::LOCATION].to_str().unwrap()
    }

    fn session_cookie(res: &Response) -> Option<String> {
        res.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("taskbook_session=") && !v.contains("Max-Age=0;"))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn signed_in(app: &Router, username: &str) -> String {
        let res = send(
            app,
            post("/register", None, &format!("username={}&password=Abc123%21%40", username)),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");

        let res = send(
            app,
            post("/login", None, &format!("username={}&password=Abc123%21%40", username)),
        )
        .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        session_cookie(&res).expect("session cookie")
    }

    #[tokio::test]
    async fn health_and_unknown_paths() {
        let app = build_app(AppState::fake().await);
        let res = send(&app, get("/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "ok");

        let res = send(&app, get("/nope", None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn protected_pages_redirect_to_login_with_next() {
        let app = build_app(AppState::fake().await);
        for path in ["/", "/profile", "/todo/create", "/todo/1", "/todo/1/edit"] {
            let res = send(&app, get(path, None)).await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{}", path);
            let expected = format!(
                "/login?{}",
                serde_urlencoded::to_string([("next", path)]).unwrap()
            );
            assert_eq!(location(&res), expected);
        }

        let res = send(&app, post("/todo/1/toggle", None, "")).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert!(location(&res).starts_with("/login?next="));
    }

    #[tokio::test]
    async fn login_returns_to_next_and_rejects_bad_credentials() {
        let app = build_app(AppState::fake().await);
        signed_in(&app, "alice").await;

        let res = send(
            &app,
            post("/login?next=%2Ftodo%2Fcreate", None, "username=alice&password=Abc123%21%40"),
        )
        .await;
        assert_eq!(location(&res), "/todo/create");

        let res = send(
            &app,
            post("/login?next=%2F%2Fevil.example", None, "username=alice&password=Abc123%21%40"),
        )
        .await;
        assert_eq!(location(&res), "/");

        let res = send(&app, post("/login", None, "username=alice&password=wrong")).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert!(location(&res).starts_with("/login"));
        assert!(session_cookie(&res).is_none());
    }

    #[tokio::test]
    async fn register_errors_go_back_to_form() {
        let app = build_app(AppState::fake().await);
        let res = send(&app, post("/register", None, "username=bob&password=abc12345")).await;
        assert_eq!(location(&res), "/register");
        let flash = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(flash.starts_with("taskbook_flash=level=error"));

        signed_in(&app, "bob").await;
        let res = send(
            &app,
            post("/register", None, "username=bob&password=Xyz789%23%24"),
        )
        .await;
        assert_eq!(location(&res), "/register");
    }

    #[tokio::test]
    async fn task_lifecycle_through_http() {
        let app = build_app(AppState::fake().await);
        let cookie = signed_in(&app, "alice").await;
        let c = Some(cookie.as_str());

        let res = send(
            &app,
            post("/todo/create", c, "title=Buy+milk&deadline=2024-01-15+09%3A30&priority="),
        )
        .await;
        assert_eq!(location(&res), "/");

        let res = send(&app, post("/todo/create", c, "title=Bad&deadline=not-a-date")).await;
        assert_eq!(location(&res), "/todo/create");

        let res = send(&app, get("/", c)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("Buy milk"));
        assert!(html.contains("2024-01-15 09:30"));
        assert!(!html.contains(">Bad<"));

        let res = send(&app, get("/todo/1", c)).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(
            &app,
            post("/todo/1/edit", c, "title=Buy+oat+milk&deadline=&priority=high"),
        )
        .await;
        assert_eq!(location(&res), "/todo/1");

        let res = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/todo/1/toggle")
                .header(header::COOKIE, cookie.as_str())
                .header(header::REFERER, "http://localhost/todo/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(location(&res), "/todo/1");

        let res = send(&app, post("/todo/1/toggle", c, "")).await;
        assert_eq!(location(&res), "/");

        let res = send(&app, post("/todo/1/delete", c, "")).await;
        assert_eq!(location(&res), "/");
        let res = send(&app, get("/todo/1", c)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_tasks_are_404() {
        let app = build_app(AppState::fake().await);
        let alice = signed_in(&app, "alice").await;
        let mallory = signed_in(&app, "mallory").await;

        send(&app, post("/todo/create", Some(alice.as_str()), "title=Secret")).await;

        let m = Some(mallory.as_str());
        assert_eq!(send(&app, get("/todo/1", m)).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(&app, get("/todo/1/edit", m)).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            send(&app, post("/todo/1/edit", m, "title=Mine")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            send(&app, post("/todo/1/toggle", m, "")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            send(&app, post("/todo/1/delete", m, "")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(send(&app, get("/todo/abc", m)).await.status(), StatusCode::NOT_FOUND);

        let html = body_text(send(&app, get("/", m)).await).await;
        assert!(!html.contains("Secret"));
        let html = body_text(send(&app, get("/todo/1", Some(alice.as_str()))).await).await;
        assert!(html.contains("Secret"));
    }

    #[tokio::test]
    async fn flash_is_shown_once_and_cleared() {
        let app = build_app(AppState::fake().await);
        let cookie = signed_in(&app, "alice").await;
        let with_flash = format!("{}; taskbook_flash=level=success&message=Task+created", cookie);

        let res = send(&app, get("/", Some(with_flash.as_str()))).await;
        let cleared = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("taskbook_flash=;"));
        assert!(cleared);
        assert!(body_text(res).await.contains("Task created"));

        let res = send(&app, get("/", Some(cookie.as_str()))).await;
        assert!(res.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn secure_flag_reaches_session_and_flash_cookies() {
        let mut state = AppState::fake().await;
        std::sync::Arc::make_mut(&mut state.config).session.cookie_secure = true;
        let app = build_app(state);

        let cookie = signed_in(&app, "alice").await;
        let res = send(&app, post("/login", None, "username=alice&password=Abc123%21%40")).await;
        let cookies: Vec<&str> = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.ends_with("; Secure")));

        let res = send(&app, post("/todo/create", Some(cookie.as_str()), "title=")).await;
        let flash = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(flash.starts_with("taskbook_flash=level=error"));
        assert!(flash.ends_with("; Secure"));
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = build_app(AppState::fake().await);
        let res = send(&app, get("/logout", None)).await;
        assert_eq!(location(&res), "/login");
        let cleared = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("taskbook_session=;"));
        assert!(cleared);
    }

    #[tokio::test]
    async fn profile_update_via_form() {
        let app = build_app(AppState::fake().await);
        let cookie = signed_in(&app, "alice").await;
        let c = Some(cookie.as_str());

        let res = send(&app, post("/profile", c, "phone=123")).await;
        assert_eq!(location(&res), "/profile");
        assert!(res.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("level=error"));

        let res = send(&app, post("/profile", c, "phone=09123456789")).await;
        assert!(res.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("level=success"));

        let html = body_text(send(&app, get("/profile", c)).await).await;
        assert!(html.contains(r#"value="09123456789""#));
    }
}
