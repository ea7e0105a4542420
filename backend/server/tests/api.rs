use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{
    app,
    config::Config,
    models::{NewFoodTest, ResultStatus},
    provider::{
        NO_ROWS_CODE, Provider, ProviderError,
        memory::{MemoryProvider, Operation},
    },
    state::AppState,
    upload::MAX_FILE_SIZE,
};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "purity-boundary";

struct Harness {
    app: Router,
    provider: Arc<MemoryProvider>,
}

struct Account {
    token: String,
    id: Uuid,
}

fn config() -> Config {
    Config {
        analysis_delay: Duration::ZERO,
        public_base_url: "https://cdn.example.com".to_string(),
        ..Config::default()
    }
}

fn harness() -> Harness {
    let provider = Arc::new(MemoryProvider::new("https://cdn.example.com", "food-images"));
    let shared: Arc<dyn Provider> = provider.clone();
    let state = AppState::new(config(), Some(shared)).unwrap();

    Harness {
        app: app(state),
        provider,
    }
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    request.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut request = Request::builder().method(Method::GET).uri(uri);

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    request.body(Body::empty()).unwrap()
}

fn upload(token: Option<&str>, file: Option<(&str, &str, Vec<u8>)>, item: &str) -> Request<Body> {
    let mut body = Vec::new();

    for (name, value) in [("category", "milk-dairy"), ("itemName", item)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );

    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    request.body(Body::from(body)).unwrap()
}

fn png(size: usize) -> Option<(&'static str, &'static str, Vec<u8>)> {
    Some(("sample.png", "image/png", vec![7u8; size]))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn account(app: &Router, email: &str) -> Account {
    let credentials = json!({ "email": email, "password": "secret123" });

    let (status, _) = send(
        app,
        json_request(Method::POST, "/api/auth/signup", None, credentials.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        json_request(Method::POST, "/api/auth/signin", None, credentials),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    Account {
        token: body["session"]["accessToken"].as_str().unwrap().to_string(),
        id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
    }
}

fn analyze_body(image_url: &str) -> Value {
    json!({
        "imageUrl": image_url,
        "category": "milk-dairy",
        "itemName": "milk",
        "testType": "visual_analysis",
    })
}

fn test_body(status: &str, confidence: i64) -> Value {
    json!({
        "category": "spices",
        "itemName": "turmeric",
        "testType": "manual",
        "imageUrl": "https://cdn.example.com/t.jpg",
        "resultStatus": status,
        "confidenceScore": confidence,
        "recommendations": "Safe for consumption; Good quality product",
    })
}

fn new_test(status: ResultStatus) -> NewFoodTest {
    NewFoodTest {
        category: "honey".to_string(),
        item_name: "raw-honey".to_string(),
        test_type: "manual".to_string(),
        image_url: "https://cdn.example.com/h.jpg".to_string(),
        result_status: status,
        confidence_score: Some(80),
        adulterants_detected: Vec::new(),
        recommendations: Vec::new(),
    }
}

#[tokio::test]
async fn test_upload_then_analyze() {
    let Harness { app, provider } = harness();
    let user = account(&app, "asha@example.com").await;

    let (status, uploaded) = send(&app, upload(Some(&user.token), png(64), "milk")).await;
    assert_eq!(status, StatusCode::OK);

    let file_name = uploaded["fileName"].as_str().unwrap();
    let image_url = uploaded["imageUrl"].as_str().unwrap();
    assert!(file_name.starts_with(&format!("{}/", user.id)));
    assert!(file_name.ends_with(".png"));
    assert!(image_url.contains(&user.id.to_string()));
    assert_eq!(
        provider.object(file_name).unwrap().content_type,
        "image/png"
    );

    let (status, verdict) = send(
        &app,
        json_request(
            Method::POST,
            "/api/analyze",
            Some(&user.token),
            analyze_body(image_url),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(verdict.get("warning").is_none());

    let test_id: Uuid = verdict["testId"].as_str().unwrap().parse().unwrap();
    let rows = provider.tests();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, test_id);
    assert_eq!(rows[0].user_id, user.id);
    assert_eq!(rows[0].result_status.as_str(), verdict["status"]);
    assert_eq!(
        rows[0].confidence_score,
        verdict["confidence"].as_u64().map(|c| c as u8)
    );

    let (status, history) = send(&app, get("/api/tests", Some(&user.token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["tests"][0]["id"], json!(test_id));
    assert_eq!(history["tests"][0]["itemName"], json!("milk"));
}

#[tokio::test]
async fn test_analyze_is_deterministic() {
    let Harness { app, .. } = harness();
    let user = account(&app, "ravi@example.com").await;

    // 10 + 4 + 9 characters
    let request = || json_request(Method::POST, "/api/analyze", Some(&user.token), analyze_body("https://x"));

    let (_, first) = send(&app, request()).await;
    let (_, second) = send(&app, request()).await;

    assert_eq!(first["status"], json!("pure"));
    assert_eq!(first["confidence"], json!(96));
    assert_eq!(first["message"], second["message"]);
    assert_ne!(first["testId"], second["testId"]);
}

#[tokio::test]
async fn test_owner_is_always_caller() {
    let Harness { app, provider } = harness();
    let user = account(&app, "meera@example.com").await;

    let mut body = test_body("pure", 90);
    body["userId"] = json!(Uuid::new_v4());

    let (status, created) = send(
        &app,
        json_request(Method::POST, "/api/tests", Some(&user.token), body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["test"]["userId"], json!(user.id));
    assert_eq!(
        created["test"]["recommendations"],
        json!(["Safe for consumption", "Good quality product"])
    );
    assert_eq!(provider.tests()[0].user_id, user.id);
}

#[tokio::test]
async fn test_unauthenticated_is_401() {
    let Harness { app, .. } = harness();

    let requests = |token: Option<&str>| {
        vec![
            get("/api/profile", token),
            json_request(Method::PUT, "/api/profile", token, json!({ "fullName": "A" })),
            get("/api/tests", token),
            json_request(Method::POST, "/api/tests", token, test_body("pure", 50)),
            get("/api/tests/stats", token),
            json_request(Method::POST, "/api/analyze", token, analyze_body("https://x")),
            upload(token, png(8), "milk"),
        ]
    };

    for request in requests(None).into_iter().chain(requests(Some("forged"))) {
        let uri = request.uri().to_string();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_duplicate_sign_up() {
    let Harness { app, .. } = harness();
    account(&app, "dup@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "dup@example.com", "password": "another1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("An account with this email already exists"));
}

#[tokio::test]
async fn test_sign_in_failures() {
    let Harness { app, provider } = harness();
    account(&app, "lock@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "lock@example.com", "password": "wrong-one" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid email or password"));

    provider.inject(
        Operation::SignIn,
        ProviderError::rejected("Too many requests, retry later"),
    );
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "lock@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/auth/signin", None, json!({ "email": "lock@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile() {
    let Harness { app, .. } = harness();
    let user = account(&app, "priya@example.com").await;

    let (status, body) = send(&app, get("/api/profile", Some(&user.token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["fullName"], json!("priya"));
    assert_eq!(body["user"]["id"], json!(user.id));

    let (status, _) = send(
        &app,
        json_request(Method::PUT, "/api/profile", Some(&user.token), json!({ "fullName": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/profile",
            Some(&user.token),
            json!({ "fullName": "Priya Nair", "phone": "+91 98765 43210" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["fullName"], json!("Priya Nair"));
    assert_eq!(body["profile"]["phone"], json!("+91 98765 43210"));
}

#[tokio::test]
async fn test_limit_bounds() {
    let Harness { app, .. } = harness();
    let user = account(&app, "limits@example.com").await;

    for limit in ["1", "100"] {
        let (status, _) = send(&app, get(&format!("/api/tests?limit={limit}"), Some(&user.token))).await;
        assert_eq!(status, StatusCode::OK, "limit {limit}");
    }

    for limit in ["0", "101", "many"] {
        let (status, body) = send(&app, get(&format!("/api/tests?limit={limit}"), Some(&user.token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit {limit}");
        assert_eq!(body["error"], json!("Limit must be between 1 and 100"));
    }
}

#[tokio::test]
async fn test_history_order_and_filter() {
    let Harness { app, provider } = harness();
    let user = account(&app, "order@example.com").await;
    let other = account(&app, "other@example.com").await;

    let now = Utc::now();
    let oldest = provider.insert_at(user.id, new_test(ResultStatus::Pure), now - chrono::Duration::days(3));
    let newest = provider.insert_at(user.id, new_test(ResultStatus::Adulterated), now);
    provider.insert_at(other.id, new_test(ResultStatus::Pure), now);

    let mut spices = new_test(ResultStatus::Pure);
    spices.category = "spices".to_string();
    let spiced = provider.insert_at(user.id, spices, now - chrono::Duration::days(1));

    let (_, body) = send(&app, get("/api/tests", Some(&user.token))).await;
    let ids: Vec<Value> = body["tests"].as_array().unwrap().iter().map(|t| t["id"].clone()).collect();
    assert_eq!(ids, vec![json!(newest.id), json!(spiced.id), json!(oldest.id)]);

    let (_, body) = send(&app, get("/api/tests?limit=1", Some(&user.token))).await;
    assert_eq!(body["tests"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, get("/api/tests?category=spices", Some(&user.token))).await;
    assert_eq!(body["tests"].as_array().unwrap().len(), 1);
    assert_eq!(body["tests"][0]["id"], json!(spiced.id));
}

#[tokio::test]
async fn test_create_test_bounds() {
    let Harness { app, .. } = harness();
    let user = account(&app, "bounds@example.com").await;

    for confidence in [0, 100] {
        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/tests", Some(&user.token), test_body("pure", confidence)),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "confidence {confidence}");
    }

    for confidence in [-1, 150] {
        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/tests", Some(&user.token), test_body("pure", confidence)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "confidence {confidence}");
    }

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/tests", Some(&user.token), test_body("rotten", 50)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid result status"));
}

#[tokio::test]
async fn test_upload_bounds() {
    let Harness { app, .. } = harness();
    let user = account(&app, "uploads@example.com").await;

    let (status, body) = send(
        &app,
        upload(Some(&user.token), Some(("anim.gif", "image/gif", vec![1u8; 8])), "milk"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Only JPEG, PNG, and WebP images are allowed"));

    let (status, _) = send(&app, upload(Some(&user.token), png(MAX_FILE_SIZE), "milk")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, upload(Some(&user.token), png(MAX_FILE_SIZE + 1), "milk")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, upload(Some(&user.token), None, "milk")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("No file provided"));

    let (status, _) = send(&app, upload(Some(&user.token), png(8), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_collaborator_errors() {
    let Harness { app, provider } = harness();
    let user = account(&app, "bucket@example.com").await;

    for (message, expected) in [
        ("The resource already exists", StatusCode::CONFLICT),
        ("Bucket not found", StatusCode::INTERNAL_SERVER_ERROR),
        ("File size limit exceeded", StatusCode::PAYLOAD_TOO_LARGE),
        ("new row violates policy: permission denied", StatusCode::FORBIDDEN),
        ("something odd", StatusCode::BAD_REQUEST),
    ] {
        provider.inject(Operation::Upload, ProviderError::rejected(message));

        let (status, _) = send(&app, upload(Some(&user.token), png(8), "milk")).await;
        assert_eq!(status, expected, "{message}");
    }
}

#[tokio::test]
async fn test_soft_persistence_failure() {
    let Harness { app, provider } = harness();
    let user = account(&app, "soft@example.com").await;

    provider.inject(
        Operation::InsertTest,
        ProviderError::rejected("connection reset by peer"),
    );

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/analyze", Some(&user.token), analyze_body("https://x")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["testId"], Value::Null);
    assert_eq!(body["warning"], json!("Analysis completed but could not be saved to history"));
    assert_eq!(body["status"], json!("pure"));
    assert!(provider.tests().is_empty());
}

#[tokio::test]
async fn test_hard_persistence_failures() {
    let Harness { app, provider } = harness();
    let user = account(&app, "hard@example.com").await;

    for (message, expected) in [
        ("permission denied for table food_tests", StatusCode::FORBIDDEN),
        ("violates foreign key constraint", StatusCode::BAD_REQUEST),
        ("relation \"public.food_tests\" does not exist", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        provider.inject(Operation::InsertTest, ProviderError::rejected(message));

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/analyze", Some(&user.token), analyze_body("https://x")),
        )
        .await;

        assert_eq!(status, expected, "{message}");
        assert!(body.get("status").is_none());
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_stats() {
    let Harness { app, provider } = harness();
    let user = account(&app, "stats@example.com").await;
    let other = account(&app, "noise@example.com").await;

    let now = Utc::now();
    provider.insert_at(user.id, new_test(ResultStatus::Pure), now - chrono::Duration::days(10));
    provider.insert_at(user.id, new_test(ResultStatus::Pure), now - chrono::Duration::days(1));
    provider.insert_at(user.id, new_test(ResultStatus::Adulterated), now);
    provider.insert_at(user.id, new_test(ResultStatus::Inconclusive), now);
    provider.insert_at(other.id, new_test(ResultStatus::Adulterated), now);

    let (status, body) = send(&app, get("/api/tests/stats", Some(&user.token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "totalTests": 4, "recentTests": 3, "pureCount": 2, "adulteratedCount": 1 })
    );

    provider.inject(
        Operation::CountTests,
        ProviderError::rejected("relation \"public.food_tests\" does not exist"),
    );
    let (status, body) = send(&app, get("/api/tests/stats", Some(&user.token))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("totalTests").is_none());
}

#[tokio::test]
async fn test_catalogue() {
    let Harness { app, .. } = harness();

    let (status, body) = send(&app, get("/api/categories", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"].as_array().unwrap().len(), 6);

    let (status, body) = send(&app, get("/api/categories/spices", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"]["id"], json!("spices"));

    let (status, body) = send(&app, get("/api/categories/milk-dairy/items/milk/guide", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["guide"]["steps"].as_array().unwrap().is_empty());

    for uri in ["/api/categories/candy", "/api/categories/spices/items/saffron/guide"] {
        let (status, _) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_malformed_bodies() {
    let Harness { app, .. } = harness();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid request format"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("file"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid file upload format"));
}

#[tokio::test]
async fn test_unconfigured_collaborator() {
    let app = app(AppState::new(config(), None).unwrap());
    let credentials = json!({ "email": "a@example.com", "password": "secret123" });

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/api/auth/signup", None, credentials.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("Service temporarily unavailable. Please try again later"));

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/api/auth/signin", None, credentials),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

fn request_for(operation: Operation, token: &str) -> Request<Body> {
    let token = Some(token);

    match operation {
        Operation::SignUp => json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "fresh@example.com", "password": "secret123" }),
        ),
        Operation::SignIn => json_request(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": "maps@example.com", "password": "secret123" }),
        ),
        Operation::GetProfile => get("/api/profile", token),
        Operation::UpdateProfile => json_request(
            Method::PUT,
            "/api/profile",
            token,
            json!({ "fullName": "Maps" }),
        ),
        Operation::InsertTest => {
            json_request(Method::POST, "/api/tests", token, test_body("pure", 70))
        }
        Operation::ListTests => get("/api/tests", token),
        Operation::CountTests => get("/api/tests/stats", token),
        Operation::GetUser => get("/api/tests", token),
        Operation::Upload => upload(token, png(8), "milk"),
    }
}

#[tokio::test]
async fn test_collaborator_error_mapping() {
    let Harness { app, provider } = harness();
    let user = account(&app, "maps@example.com").await;

    let missing_table = "relation \"public.food_tests\" does not exist";
    let cases = [
        (
            Operation::SignUp,
            ProviderError::rejected("Unable to validate email address: invalid email format"),
            StatusCode::BAD_REQUEST,
            "Please provide a valid email address",
        ),
        (
            Operation::SignUp,
            ProviderError::rejected("Password should contain symbols: weak password"),
            StatusCode::BAD_REQUEST,
            "Password is too weak. Please choose a stronger password",
        ),
        (
            Operation::SignUp,
            ProviderError::rejected("Signups not allowed for this instance"),
            StatusCode::BAD_REQUEST,
            "Signups not allowed for this instance",
        ),
        (
            Operation::SignUp,
            ProviderError::Unreachable("connection refused".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable. Please try again later",
        ),
        (
            Operation::SignIn,
            ProviderError::rejected("Email not confirmed"),
            StatusCode::UNAUTHORIZED,
            "Please check your email and confirm your account",
        ),
        (
            Operation::SignIn,
            ProviderError::rejected(""),
            StatusCode::BAD_REQUEST,
            "Failed to sign in",
        ),
        (
            Operation::GetUser,
            ProviderError::rejected("invalid JWT: token is expired"),
            StatusCode::UNAUTHORIZED,
            "Authentication failed",
        ),
        (
            Operation::GetProfile,
            ProviderError::with_code(
                NO_ROWS_CODE,
                "JSON object requested, multiple (or no) rows returned",
            ),
            StatusCode::NOT_FOUND,
            "Profile not found",
        ),
        (
            Operation::GetProfile,
            ProviderError::rejected("permission denied for table profiles"),
            StatusCode::FORBIDDEN,
            "Access denied",
        ),
        (
            Operation::GetProfile,
            ProviderError::rejected("statement timeout"),
            StatusCode::BAD_REQUEST,
            "Failed to fetch profile",
        ),
        (
            Operation::UpdateProfile,
            ProviderError::rejected("duplicate key value violates unique constraint \"profiles_phone_key\""),
            StatusCode::CONFLICT,
            "Profile data conflicts with existing record",
        ),
        (
            Operation::UpdateProfile,
            ProviderError::with_code(NO_ROWS_CODE, "no rows"),
            StatusCode::NOT_FOUND,
            "Profile not found",
        ),
        (
            Operation::InsertTest,
            ProviderError::rejected("violates foreign key constraint \"food_tests_user_id_fkey\""),
            StatusCode::BAD_REQUEST,
            "Invalid user reference",
        ),
        (
            Operation::InsertTest,
            ProviderError::rejected("new row violates check constraint \"food_tests_confidence_check\""),
            StatusCode::BAD_REQUEST,
            "Invalid data format",
        ),
        (
            Operation::InsertTest,
            ProviderError::rejected("permission denied for table food_tests"),
            StatusCode::FORBIDDEN,
            "Access denied",
        ),
        (
            Operation::InsertTest,
            ProviderError::rejected("value too long"),
            StatusCode::BAD_REQUEST,
            "Failed to create test record",
        ),
        (
            Operation::ListTests,
            ProviderError::rejected("permission denied for table food_tests"),
            StatusCode::FORBIDDEN,
            "Access denied",
        ),
        (
            Operation::ListTests,
            ProviderError::rejected(missing_table),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database table not found. Please run database setup",
        ),
        (
            Operation::ListTests,
            ProviderError::rejected("statement timeout"),
            StatusCode::BAD_REQUEST,
            "Failed to fetch tests",
        ),
        (
            Operation::CountTests,
            ProviderError::rejected(missing_table),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database table not found. Please run database setup",
        ),
        (
            Operation::CountTests,
            ProviderError::rejected("statement timeout"),
            StatusCode::BAD_REQUEST,
            "Failed to fetch test statistics",
        ),
        (
            Operation::Upload,
            ProviderError::rejected("The resource already exists"),
            StatusCode::CONFLICT,
            "File already exists",
        ),
    ];

    for (operation, error, status, message) in cases {
        provider.inject(operation, error.clone());

        let (actual, body) = send(&app, request_for(operation, &user.token)).await;

        assert_eq!(actual, status, "{operation:?}: {error}");
        assert_eq!(body["error"], json!(message), "{operation:?}: {error}");
    }
}

#[tokio::test]
async fn test_invalid_email_from_collaborator() {
    let Harness { app, .. } = harness();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "email": "not-an-email", "password": "secret123" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Please provide a valid email address"));
}

#[tokio::test]
async fn test_analysis_stores_trimmed_fields() {
    let Harness { app, provider } = harness();
    let user = account(&app, "trim@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/analyze",
            Some(&user.token),
            json!({
                "imageUrl": "https://x/🍯",
                "category": "honey",
                "itemName": " raw-honey ",
                "testType": "visual_analysis",
            }),
        ),
    )
    .await;

    // 5 + 11 + 12 UTF-16 units, the padded item name counts
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confidence"], json!(96));

    let row = &provider.tests()[0];
    assert_eq!(row.item_name, "raw-honey");
    assert_eq!(row.image_url, "https://x/🍯");
}
