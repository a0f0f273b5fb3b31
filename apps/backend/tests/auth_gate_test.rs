mod common;

use std::collections::HashMap;

use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use backend::{routes, AuthGate, RequestTrace, INIT_DATA_HEADER};
use backend_test_support::problem_details::assert_problem_details;
use backend_test_support::telegram;
use serde_json::{json, Value};

async fn echo_body(body: web::Json<Value>) -> web::Json<Value> {
    body
}

async fn echo_query(
    query: web::Query<HashMap<String, String>>,
) -> web::Json<HashMap<String, String>> {
    web::Json(query.into_inner())
}

/// Full route table plus an echo scope behind the required gate, so tests
/// can observe what the gate left in the body and query.
macro_rules! gate_app {
    () => {
        test::init_service(
            App::new()
                .wrap(RequestTrace)
                .app_data(common::test_state())
                .configure(routes::configure)
                .service(
                    web::scope("/api/echo")
                        .wrap(AuthGate::required())
                        .route("/body", web::post().to(echo_body))
                        .route("/query", web::get().to(echo_query)),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn health_is_public() {
    let app = gate_app!();

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn missing_credential_is_rejected() {
    let app = gate_app!();

    let req = test::TestRequest::get().uri("/api/user/me").to_request();
    let resp = test::call_service(&app, req).await;

    assert_problem_details(
        resp,
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        Some("Authentication required"),
    )
    .await;
}

#[actix_web::test]
async fn malformed_bearer_is_rejected() {
    let app = gate_app!();

    let req = test::TestRequest::get()
        .uri("/api/user/me")
        .insert_header((header::AUTHORIZATION, "Bearer not-a-real-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_problem_details(resp, StatusCode::UNAUTHORIZED, "UNAUTHORIZED", None).await;
}

#[actix_web::test]
async fn session_token_binds_identity() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::get()
        .uri("/api/user/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["id"], json!(42));
    assert_eq!(me["telegram_id"], json!(1042));
    assert_eq!(me["username"], json!("ada"));
    assert_eq!(me["auth_method"], json!("session-token"));
}

#[actix_web::test]
async fn init_data_binds_identity() {
    let app = gate_app!();
    let blob = telegram::signed_init_data_for_user(common::BOT_TOKEN, 8675309, common::now_secs());

    let req = test::TestRequest::get()
        .uri("/api/user/me")
        .insert_header((INIT_DATA_HEADER, blob))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["id"], json!(8675309));
    assert_eq!(me["username"], json!("testuser"));
    assert_eq!(me["auth_method"], json!("initdata"));
}

#[actix_web::test]
async fn init_data_wins_over_bearer() {
    let app = gate_app!();
    let blob = telegram::signed_init_data_for_user(common::BOT_TOKEN, 1001, common::now_secs());
    let token = common::session_token_for(42);

    let req = test::TestRequest::get()
        .uri("/api/user/me")
        .insert_header((INIT_DATA_HEADER, blob))
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["id"], json!(1001));
    assert_eq!(me["auth_method"], json!("initdata"));
}

#[actix_web::test]
async fn conflicting_header_is_rejected() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::get()
        .uri("/api/user/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .insert_header(("x-user-id", "43"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_problem_details(
        resp,
        StatusCode::FORBIDDEN,
        "IDENTITY_MISMATCH",
        Some("header.x-user-id"),
    )
    .await;
}

#[actix_web::test]
async fn conflicting_body_field_is_rejected() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::post()
        .uri("/api/echo/body")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .set_json(json!({"user_id": 43}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_problem_details(
        resp,
        StatusCode::FORBIDDEN,
        "IDENTITY_MISMATCH",
        Some("body.user_id"),
    )
    .await;
}

#[actix_web::test]
async fn conflicting_query_field_is_rejected() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::get()
        .uri("/api/echo/query?user_id=43")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_problem_details(
        resp,
        StatusCode::FORBIDDEN,
        "IDENTITY_MISMATCH",
        Some("query.user_id"),
    )
    .await;
}

#[actix_web::test]
async fn matching_body_field_passes() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::post()
        .uri("/api/echo/body")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .set_json(json!({"user_id": 42, "prompt": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let echoed: Value = test::read_body_json(resp).await;
    assert_eq!(echoed["user_id"], json!(42));
    assert_eq!(echoed["prompt"], json!("hello"));
}

#[actix_web::test]
async fn absent_body_ids_are_backfilled() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::post()
        .uri("/api/echo/body")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .set_json(json!({"prompt": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let echoed: Value = test::read_body_json(resp).await;
    assert_eq!(echoed["user_id"], json!(42));
    assert_eq!(echoed["userId"], json!(42));
    // followerId's absence stays meaningful downstream.
    assert!(echoed.get("followerId").is_none());
}

#[actix_web::test]
async fn blank_follower_id_is_backfilled() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::post()
        .uri("/api/echo/body")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .set_json(json!({"followerId": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let echoed: Value = test::read_body_json(resp).await;
    assert_eq!(echoed["followerId"], json!(42));
}

#[actix_web::test]
async fn absent_query_user_id_is_backfilled() {
    let app = gate_app!();
    let token = common::session_token_for(42);

    let req = test::TestRequest::get()
        .uri("/api/echo/query?foo=bar")
        .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let echoed: HashMap<String, String> = test::read_body_json(resp).await;
    assert_eq!(echoed.get("user_id").map(String::as_str), Some("42"));
    assert_eq!(echoed.get("foo").map(String::as_str), Some("bar"));
}
