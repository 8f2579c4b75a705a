use crate::error::AppError;
use crate::models::ProfileUpdate;
use crate::services::relationship_service::BlockOutcome;
use crate::services::{RelationshipService, UserService};
use crate::state::AppState;
use actix_middleware::AuthSubject;
use actix_web::{delete, get, post, put, web, HttpResponse};
use uuid::Uuid;

/// GET /api/users/me, creating the user on first use
#[get("/users/me")]
pub async fn get_me(
    state: web::Data<AppState>,
    subject: AuthSubject,
) -> Result<HttpResponse, AppError> {
    let user = UserService::ensure_user(state.store.as_ref(), &subject).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/users/me/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    subject: AuthSubject,
    body: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let user =
        UserService::update_profile(state.store.as_ref(), &subject.subject, body.into_inner())
            .await?;
    Ok(HttpResponse::Ok().json(user))
}

#[get("/users/me/blocked")]
pub async fn get_blocked_users(
    state: web::Data<AppState>,
    subject: AuthSubject,
) -> Result<HttpResponse, AppError> {
    let blocked = RelationshipService::blocked_users(state.store.as_ref(), &subject.subject).await?;
    Ok(HttpResponse::Ok().json(blocked))
}

#[get("/users/{id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    _subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::public_profile(state.store.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /api/users/{id}/block: 201 when newly blocked, 200 when already blocked
#[post("/users/{id}/block")]
pub async fn block_user(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let outcome =
        RelationshipService::block(state.store.as_ref(), &subject.subject, path.into_inner())
            .await?;

    match outcome {
        BlockOutcome::Blocked => Ok(HttpResponse::Created().json(serde_json::json!({
            "message": "User blocked"
        }))),
        BlockOutcome::AlreadyBlocked => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "User already blocked"
        }))),
    }
}

#[delete("/users/{id}/block")]
pub async fn unblock_user(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    RelationshipService::unblock(state.store.as_ref(), &subject.subject, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "User unblocked" })))
}
