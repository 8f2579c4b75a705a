use crate::error::AppError;
use crate::middleware::guards::ConversationAccess;
use crate::services::MessageService;
use crate::state::AppState;
use actix_middleware::AuthSubject;
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
    pub before: Option<String>,
}

/// GET /api/messages/{conversation_id}?limit=&before=
#[get("/messages/{conversation_id}")]
pub async fn get_messages(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let access =
        ConversationAccess::verify(state.store.as_ref(), &subject.subject, path.into_inner())
            .await?;
    let limit = state.page_limits().resolve(query.limit.as_deref());

    let messages =
        MessageService::fetch(state.store.as_ref(), &access, limit, query.before.as_deref())
            .await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// POST /api/messages/{conversation_id} with `{text}`
///
/// The body is optional at extraction so access is decided before content;
/// a missing or unreadable body is treated as a missing `text`.
#[post("/messages/{conversation_id}")]
pub async fn send_message(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
    body: Option<web::Json<Value>>,
) -> Result<HttpResponse, AppError> {
    let access = ConversationAccess::verify_unblocked(
        state.store.as_ref(),
        &subject.subject,
        path.into_inner(),
    )
    .await?;

    let message = MessageService::send(
        state.store.as_ref(),
        &state.notifier,
        access,
        body.as_ref().and_then(|b| b.get("text")),
    )
    .await?;
    Ok(HttpResponse::Created().json(message))
}

#[put("/messages/{conversation_id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let access =
        ConversationAccess::verify(state.store.as_ref(), &subject.subject, path.into_inner())
            .await?;
    let count = MessageService::mark_read(state.store.as_ref(), &access).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Messages marked as read",
        "count": count
    })))
}

#[delete("/messages/{message_id}")]
pub async fn delete_message(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    MessageService::delete(
        state.store.as_ref(),
        &state.notifier,
        &subject.subject,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Message deleted" })))
}
