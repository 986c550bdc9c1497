mod common;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use common::spawn_backend;
use serde_json::{Value, json};
use solace::register::{self, RegisterError, RegistrationForm};
use solace::{AgentClient, ClientConfig, RegisterRequestError};
use std::sync::{Arc, Mutex};

fn form() -> RegistrationForm {
    RegistrationForm {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: "grace@example.org".into(),
        age: 45,
        gender: "female".into(),
        privacy_policy: true,
    }
}

#[tokio::test]
async fn posts_form_with_chat_id() {
    let received: Arc<Mutex<Option<Value>>> = Arc::default();
    let app = Router::new()
        .route(
            "/api/v0/user/register",
            post(
                |State(received): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                    *received.lock().unwrap() = Some(body);
                    Json(json!({"status": true, "message": "You are registered"}))
                },
            ),
        )
        .with_state(received.clone());
    let base_url = spawn_backend(app).await;
    let client = AgentClient::new(ClientConfig::new(base_url, "secret"));

    let confirmation = register::submit(&client, Some("777"), form()).await.unwrap();
    assert!(confirmation.status);
    assert_eq!(confirmation.message, "You are registered");

    let body = received.lock().unwrap().clone().unwrap();
    assert_eq!(
        body,
        json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@example.org",
            "age": 45,
            "gender": "female",
            "privacyPolicy": true,
            "chatId": "777",
        })
    );
}

#[tokio::test]
async fn rejection_message_is_passed_through() {
    let app = Router::new().route(
        "/api/v0/user/register",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": false, "message": "Already registered"})),
            )
        }),
    );
    let base_url = spawn_backend(app).await;
    let client = AgentClient::new(ClientConfig::new(base_url, "secret"));

    let confirmation = register::submit(&client, Some("1"), form()).await.unwrap();
    assert!(!confirmation.status);
    assert_eq!(confirmation.message, "Already registered");
}

#[tokio::test]
async fn unparseable_response_is_an_error() {
    let app = Router::new().route(
        "/api/v0/user/register",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let base_url = spawn_backend(app).await;
    let client = AgentClient::new(ClientConfig::new(base_url, "secret"));

    let err = register::submit(&client, Some("1"), form()).await.unwrap_err();
    match err {
        RegisterError::Request(RegisterRequestError::Status { status, body }) => {
            assert_eq!(status.as_u16(), 502);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn invalid_form_is_not_sent() {
    let client = AgentClient::new(ClientConfig::new("http://127.0.0.1:9", "secret"));
    let bad = RegistrationForm {
        email: "nope".into(),
        ..form()
    };
    let err = register::submit(&client, Some("1"), bad).await.unwrap_err();
    let RegisterError::Invalid(errors) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "email");
    assert!(err.confirmation().is_some());
}
