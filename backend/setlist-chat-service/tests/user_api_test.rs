mod common;

use actix_web::http::StatusCode;
use common::*;
use serde_json::json;
use uuid::Uuid;

#[actix_web::test]
async fn test_me_is_created_on_first_request() {
    let state = test_state();
    let app = init_app(&state).await;

    let tok = token("auth0|fan", "Jamie Fan");
    let (status, first) = send(&app, get("/api/users/me", &tok)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["auth0Id"], "auth0|fan");
    assert_eq!(first["profile"]["displayName"], "Jamie Fan");
    assert_eq!(first["blockedUsers"], json!([]));

    let (_, second) = send(&app, get("/api/users/me", &tok)).await;
    assert_eq!(first["id"], second["id"]);
}

#[actix_web::test]
async fn test_profile_update_validation() {
    let state = test_state();
    let app = init_app(&state).await;
    let jamie = sign_up(&app, "auth0|fan", "Jamie").await;

    let (status, body) = send(
        &app,
        put(
            "/api/users/me/profile",
            &jamie.token,
            Some(json!({ "displayName": "  Jamie K  ", "bio": "Phish tour 2019" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["displayName"], "Jamie K");
    assert_eq!(body["profile"]["bio"], "Phish tour 2019");

    let (status, _) = send(
        &app,
        put("/api/users/me/profile", &jamie.token, Some(json!({ "displayName": "   " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        put(
            "/api/users/me/profile",
            &jamie.token,
            Some(json!({ "bio": "x".repeat(501) })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        put(
            "/api/users/me/profile",
            &token("auth0|ghost", "Ghost"),
            Some(json!({ "bio": "hi" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_public_profile_projection() {
    let state = test_state();
    let app = init_app(&state).await;
    let jamie = sign_up(&app, "auth0|fan", "Jamie").await;
    let sam = sign_up(&app, "auth0|sam", "Sam").await;

    send(
        &app,
        put(
            "/api/users/me/profile",
            &jamie.token,
            Some(json!({ "bio": "secret", "isPublic": false })),
        ),
    )
    .await;

    let (status, body) = send(&app, get(&format!("/api/users/{}", jamie.id), &sam.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Jamie");
    assert!(body.get("bio").is_none());
    assert!(body.get("auth0Id").is_none());

    let (status, _) = send(&app, get(&format!("/api/users/{}", Uuid::new_v4()), &sam.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/users/12345", &sam.token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid id");
}

#[actix_web::test]
async fn test_block_and_unblock() {
    let state = test_state();
    let app = init_app(&state).await;
    let jamie = sign_up(&app, "auth0|fan", "Jamie").await;
    let sam = sign_up(&app, "auth0|sam", "Sam").await;
    let block_uri = format!("/api/users/{}/block", sam.id);

    let (status, _) = send(&app, post_empty(&block_uri, &jamie.token)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, post_empty(&block_uri, &jamie.token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, blocked) = send(&app, get("/api/users/me/blocked", &jamie.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blocked.as_array().unwrap().len(), 1);
    assert_eq!(blocked[0]["userId"], sam.id.as_str());
    assert_eq!(blocked[0]["displayName"], "Sam");

    let (status, _) = send(
        &app,
        post_empty(&format!("/api/users/{}/block", jamie.id), &jamie.token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_empty(&format!("/api/users/{}/block", Uuid::new_v4()), &jamie.token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, delete(&block_uri, &jamie.token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, delete(&block_uri, &jamie.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BLOCK_NOT_FOUND");
    assert_eq!(body["message"], "User is not blocked");

    // Unblocked users can talk again.
    let conversation_id = open_conversation(&app, &sam, &jamie).await;
    send_text(&app, &sam, &conversation_id, "thanks").await;
}

#[actix_web::test]
async fn test_ws_requires_token() {
    let state = test_state();
    let app = init_app(&state).await;

    let req = actix_web::test::TestRequest::get().uri("/ws").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = actix_web::test::TestRequest::get()
        .uri("/ws?token=bogus")
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
