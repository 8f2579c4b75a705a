#![allow(dead_code)]

use actix_middleware::Claims;
use actix_web::{
    body::{to_bytes, MessageBody},
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, App,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use setlist_chat_service::{
    config::Config,
    repository::{ChatStore, MemoryStore},
    routes,
    state::AppState,
};
use std::sync::Arc;

pub const SECRET: &str = "integration-test-secret";

pub fn test_state() -> AppState {
    let config = Arc::new(Config::for_secret(SECRET));
    let jwt = Arc::new(config.jwt.verifier().expect("verifier"));
    let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new());
    AppState::new(store, config, jwt)
}

pub async fn init_app(
    state: &AppState,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    let state = state.clone();
    test::init_service(App::new().configure(move |cfg| routes::configure_routes(cfg, &state)))
        .await
}

pub fn token(sub: &str, name: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: chrono::Utc::now().timestamp() + 3600,
        iat: None,
        name: Some(name.to_string()),
        nickname: None,
        email: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("sign token")
}

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Call the app, turning middleware errors into their HTTP responses
pub async fn send<S, B>(app: &S, req: actix_http::Request) -> (StatusCode, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            let body = test::read_body(resp).await;
            (status, parse(&body))
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let body = to_bytes(resp.into_body()).await.expect("error body");
            (status, parse(&body))
        }
    }
}

pub fn get(uri: &str, token: &str) -> actix_http::Request {
    test::TestRequest::get()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request()
}

pub fn post(uri: &str, token: &str, body: Value) -> actix_http::Request {
    test::TestRequest::post()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(body)
        .to_request()
}

pub fn post_empty(uri: &str, token: &str) -> actix_http::Request {
    test::TestRequest::post()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request()
}

pub fn put(uri: &str, token: &str, body: Option<Value>) -> actix_http::Request {
    let req = test::TestRequest::put()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")));
    match body {
        Some(body) => req.set_json(body).to_request(),
        None => req.to_request(),
    }
}

pub fn delete(uri: &str, token: &str) -> actix_http::Request {
    test::TestRequest::delete()
        .uri(uri)
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request()
}

/// A user known to the service, with a token for it
pub struct TestUser {
    pub id: String,
    pub token: String,
    pub name: String,
}

pub async fn sign_up<S, B>(app: &S, sub: &str, name: &str) -> TestUser
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let token = token(sub, name);
    let (status, body) = send(app, get("/api/users/me", &token)).await;
    assert_eq!(status, StatusCode::OK, "sign up failed: {body}");
    TestUser {
        id: body["id"].as_str().expect("user id").to_string(),
        token,
        name: name.to_string(),
    }
}

/// Create (or fetch) the conversation between two users, returning its id
pub async fn open_conversation<S, B>(app: &S, from: &TestUser, to: &TestUser) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = send(
        app,
        post(
            "/api/conversations",
            &from.token,
            serde_json::json!({ "recipientId": to.id }),
        ),
    )
    .await;
    assert!(
        status == StatusCode::CREATED || status == StatusCode::OK,
        "open conversation failed: {status} {body}"
    );
    body["id"].as_str().expect("conversation id").to_string()
}

pub async fn send_text<S, B>(app: &S, user: &TestUser, conversation_id: &str, text: &str) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = send(
        app,
        post(
            &format!("/api/messages/{conversation_id}"),
            &user.token,
            serde_json::json!({ "text": text }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "send failed: {body}");
    body
}
