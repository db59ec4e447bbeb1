//! End-to-end tests driving the full router against a mock backend.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use url::Url;

use tally::config::ProjectConfig;
use tally::{AppState, app_router};

/// Binds a mock backend on an ephemeral port and serves it in the background.
async fn spawn_backend(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn test_config(backend: SocketAddr) -> ProjectConfig {
    let mut config = ProjectConfig::dev_default();
    config.debug = false;
    config.backend_url = Url::parse(&format!("http://{backend}/")).unwrap();
    config
}

async fn app(backend_router: axum::Router) -> (axum::Router, AppState) {
    let backend = spawn_backend(backend_router).await;
    let state = AppState::from_config(test_config(backend)).unwrap();
    (app_router(state.clone()), state)
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("")
        .to_owned()
}

fn page_with_title(title: &str) -> serde_json::Value {
    json!({
        "items": [{"id": 1, "title": title, "description": "", "amount": 1.0}],
        "total": 1, "page": 1, "size": 10, "pages": 1,
    })
}

fn empty_page() -> serde_json::Value {
    json!({"items": [], "total": 0, "page": 1, "size": 10, "pages": 0})
}

/// A backend that accepts one fixed credential pair and serves empty
/// collections.
fn happy_backend() -> axum::Router {
    axum::Router::new()
        .route(
            "/auth/bearer/login",
            post(|body: axum::extract::RawForm| async move {
                let fields: Vec<(String, String)> = form_urlencoded::parse(&body.0)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                let ok = fields.iter().any(|(k, v)| k == "username" && v == "user@example.com")
                    && fields.iter().any(|(k, v)| k == "password" && v == "correct horse");
                if ok {
                    Json(json!({"access_token": "token-1", "user_id": "42"})).into_response()
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"detail": "LOGIN_BAD_CREDENTIALS"})),
                    )
                        .into_response()
                }
            }),
        )
        .route("/expenses/first", get(|| async { StatusCode::NOT_FOUND }))
        .route("/invoices/first", get(|| async { StatusCode::NOT_FOUND }))
        .route("/expenses", get(|| async { Json(empty_page()) }))
        .route("/invoices", get(|| async { Json(empty_page()) }))
}

fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

fn cookie_pair(response: &Response<Body>) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("expected a Set-Cookie header")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_owned()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn login_sets_session_and_unlocks_the_dashboard() {
    let (router, _state) = app(happy_backend()).await;

    let response = router
        .clone()
        .oneshot(form_request(
            "/login",
            "email=user%40example.com&password=correct+horse",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/dashboard");
    let cookie = cookie_pair(&response);
    assert!(cookie.starts_with("_auth_session="));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Dashboard"));
}

#[tokio::test]
async fn login_preserves_the_requested_path() {
    let (router, _state) = app(happy_backend()).await;

    let response = router
        .oneshot(form_request(
            "/login?next=%2Fdashboard%2Fincome",
            "email=user%40example.com&password=correct+horse",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "/dashboard/income"
    );
}

#[tokio::test]
async fn bad_credentials_render_field_errors_without_a_session() {
    let (router, _state) = app(happy_backend()).await;

    let response = router
        .oneshot(form_request(
            "/login",
            "email=user%40example.com&password=wrong",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.headers().contains_key(SET_COOKIE));
    let body = body_text(response).await;
    assert!(body.contains("Wrong email or password"));
}

#[tokio::test]
async fn invalid_login_form_never_reaches_the_backend() {
    // No login route registered: a backend call would 404 and surface as an
    // error instead of the validation page.
    let (router, _state) = app(axum::Router::new()).await;

    let response = router
        .oneshot(form_request("/login", "email=not-an-address&password=", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    assert!(body.contains("valid email address"));
    assert!(body.contains("Password is required"));
}

#[tokio::test]
async fn anonymous_and_tampered_sessions_redirect_to_login() {
    let (router, state) = app(happy_backend()).await;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/login?next="));

    let cookie = state.sessions().create("42", "token-1");
    let pair = cookie.as_str().split(';').next().unwrap().to_owned();
    // Payload is hex-encoded JSON, so it always starts with "7b". Flip it.
    let (name, value) = pair.split_once('=').unwrap();
    let tampered = format!("{name}=8{}", &value[1..]);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(COOKIE, tampered)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    // The bad cookie is cleared on the way to the login page.
    assert!(cookie_pair(&response).ends_with('='));
}

#[tokio::test]
async fn concurrent_requests_carry_their_own_credentials() {
    // The mock echoes each request's bearer token back as the record title,
    // so a response rendered with the other user's token would be visible.
    let backend = axum::Router::new().route(
        "/expenses",
        get(|headers: HeaderMap| async move { Json(page_with_title(&bearer(&headers))) }),
    );
    let (router, state) = app(backend).await;

    let cookie_a = state.sessions().create("1", "token-a");
    let cookie_b = state.sessions().create("2", "token-b");
    let request = |cookie: &str| {
        Request::builder()
            .uri("/dashboard/expenses")
            .header(COOKIE, cookie.split(';').next().unwrap().to_owned())
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..20 {
        let (response_a, response_b) = tokio::join!(
            router.clone().oneshot(request(cookie_a.as_str())),
            router.clone().oneshot(request(cookie_b.as_str())),
        );
        let body_a = body_text(response_a.unwrap()).await;
        let body_b = body_text(response_b.unwrap()).await;
        assert!(body_a.contains("token-a") && !body_a.contains("token-b"));
        assert!(body_b.contains("token-b") && !body_b.contains("token-a"));
    }
}

#[tokio::test]
async fn create_emits_exactly_one_refresh_signal() {
    let backend = axum::Router::new().route(
        "/expenses",
        post(|| async {
            Json(json!({"id": 7, "title": "Lunch", "description": "", "amount": 12.5}))
        }),
    );
    let (router, state) = app(backend).await;

    let cookie = state.sessions().create("42", "token-1");
    let mut subscription = state.notifier().subscribe("42");

    let response = router
        .oneshot(form_request(
            "/dashboard/expenses",
            "title=Lunch&amount=12.5",
            Some(cookie.as_str().split(';').next().unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "/dashboard/expenses"
    );

    assert_eq!(subscription.recv().await, Some(()));
    let second = tokio::time::timeout(Duration::from_millis(50), subscription.recv()).await;
    assert!(second.is_err(), "only one signal per mutation");
}

#[tokio::test]
async fn detail_page_shows_the_record_and_its_history() {
    let backend = axum::Router::new()
        .route(
            "/expenses/{id}",
            get(|| async {
                Json(json!({"id": 7, "title": "Rent", "description": "March", "amount": 1200.0}))
            }),
        )
        .route(
            "/expense_logs",
            get(|| async { Json(page_with_title("Rent updated")) }),
        );
    let (router, state) = app(backend).await;
    let cookie = state.sessions().create("42", "token-1");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/dashboard/expenses/7")
                .header(COOKIE, cookie.as_str().split(';').next().unwrap().to_owned())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Rent"));
    assert!(body.contains("Rent updated"));
    assert!(body.contains("action=\"/dashboard/expenses/7\""));
}

#[tokio::test]
async fn signup_bounces_a_logged_in_visitor() {
    let (router, state) = app(axum::Router::new()).await;
    let cookie = state.sessions().create("42", "token-1");
    let pair = cookie.as_str().split(';').next().unwrap().to_owned();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/signup")
                .header(COOKIE, &pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/dashboard");

    let response = router
        .oneshot(form_request(
            "/signup",
            "email=user%40example.com&password=long+enough&password_confirm=long+enough",
            Some(&pair),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/dashboard");
}

#[tokio::test]
async fn invalid_record_form_is_rejected_before_the_backend() {
    let (router, state) = app(axum::Router::new()).await;
    let cookie = state.sessions().create("42", "token-1");

    let response = router
        .oneshot(form_request(
            "/dashboard/expenses",
            "title=&amount=-3",
            Some(cookie.as_str().split(';').next().unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    assert!(body.contains("Invalid title"));
    assert!(body.contains("Invalid amount"));
}

#[tokio::test]
async fn failed_mutation_redirects_with_a_toast_shown_once() {
    let backend = axum::Router::new().route(
        "/expenses",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }).get(|| async { Json(empty_page()) }),
    );
    let (router, state) = app(backend).await;

    let cookie = state.sessions().create("42", "token-1");
    let response = router
        .clone()
        .oneshot(form_request(
            "/dashboard/expenses",
            "title=Lunch&amount=12.5",
            Some(cookie.as_str().split(';').next().unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let toast_cookie = cookie_pair(&response);

    let list = |cookie: String| {
        Request::builder()
            .uri("/dashboard/expenses")
            .header(COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    };
    let response = router.clone().oneshot(list(toast_cookie)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // The list response re-commits the session without the toast.
    let recommitted = cookie_pair(&response);
    let body = body_text(response).await;
    assert!(body.contains("Something went wrong. Please, try again later."));

    let response = router.oneshot(list(recommitted)).await.unwrap();
    let body = body_text(response).await;
    assert!(!body.contains("Something went wrong. Please, try again later."));
}

#[tokio::test]
async fn logout_clears_the_session_even_when_the_backend_fails() {
    let backend = axum::Router::new().route(
        "/auth/bearer/logout",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let (router, state) = app(backend).await;
    let cookie = state.sessions().create("42", "token-1");

    let response = router
        .oneshot(form_request(
            "/logout",
            "",
            Some(cookie.as_str().split(';').next().unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/");
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn events_requires_a_login() {
    let (router, _state) = app(axum::Router::new()).await;

    let response = router
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/login?next="));
}

#[tokio::test]
async fn backend_failures_render_a_generic_page_outside_debug_mode() {
    let backend = axum::Router::new()
        .route("/expenses/first", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/invoices/first", get(|| async { StatusCode::NOT_FOUND }));
    let (router, state) = app(backend).await;
    let cookie = state.sessions().create("42", "token-1");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(COOKIE, cookie.as_str().split(';').next().unwrap().to_owned())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_text(response).await;
    assert!(body.contains("Something went wrong"));
    assert!(!body.contains("error-detail"));
    assert!(!body.contains("backend failed"));
}

#[tokio::test]
async fn debug_mode_includes_the_error_detail() {
    let backend_router = axum::Router::new()
        .route("/expenses/first", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/invoices/first", get(|| async { StatusCode::NOT_FOUND }));
    let backend = spawn_backend(backend_router).await;
    let mut config = test_config(backend);
    config.debug = true;
    let state = AppState::from_config(config).unwrap();
    let router = app_router(state.clone());
    let cookie = state.sessions().create("42", "token-1");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(COOKIE, cookie.as_str().split(';').next().unwrap().to_owned())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_text(response).await;
    assert!(body.contains("error-detail"));
    assert!(body.contains("backend failed with status 500"));
}

#[tokio::test]
async fn stale_credentials_send_the_user_back_to_login() {
    let backend = axum::Router::new()
        .route("/expenses", get(|| async { StatusCode::UNAUTHORIZED }));
    let (router, state) = app(backend).await;
    let cookie = state.sessions().create("42", "expired-token");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/dashboard/expenses")
                .header(COOKIE, cookie.as_str().split(';').next().unwrap().to_owned())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers().get(LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/login?next=%2Fdashboard%2Fexpenses"));
    assert!(cookie_pair(&response).ends_with('='));
}
