use crate::error::AppError;
use crate::middleware::guards::{ConversationAccess, UnblockedPair};
use crate::services::ConversationService;
use crate::state::AppState;
use actix_middleware::AuthSubject;
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub recipient_id: Option<String>,
}

/// Parse an id given in a request body
pub(crate) fn parse_body_id(raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| AppError::BadRequest("Invalid id".into())),
    }
}

#[get("/conversations")]
pub async fn get_conversations(
    state: web::Data<AppState>,
    subject: AuthSubject,
) -> Result<HttpResponse, AppError> {
    let list = ConversationService::list_for_user(state.store.as_ref(), &subject.subject).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// POST /api/conversations: 201 when created, 200 when the pair already had one
#[post("/conversations")]
pub async fn create_conversation(
    state: web::Data<AppState>,
    subject: AuthSubject,
    body: Option<web::Json<CreateConversationRequest>>,
) -> Result<HttpResponse, AppError> {
    let raw = body.as_ref().and_then(|b| b.recipient_id.as_deref());
    let recipient = parse_body_id(raw)?;
    let pair = UnblockedPair::verify(state.store.as_ref(), &subject.subject, recipient).await?;

    let (conversation, created) =
        ConversationService::create_or_get(state.store.as_ref(), pair).await?;

    if created {
        Ok(HttpResponse::Created().json(conversation))
    } else {
        Ok(HttpResponse::Ok().json(conversation))
    }
}

#[get("/conversations/{id}")]
pub async fn get_conversation(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let access =
        ConversationAccess::verify(state.store.as_ref(), &subject.subject, path.into_inner())
            .await?;
    Ok(HttpResponse::Ok().json(access.conversation))
}

#[delete("/conversations/{id}")]
pub async fn delete_conversation(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let access =
        ConversationAccess::verify(state.store.as_ref(), &subject.subject, path.into_inner())
            .await?;
    ConversationService::delete(state.store.as_ref(), access).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Conversation deleted successfully"
    })))
}

#[put("/conversations/{id}/archive")]
pub async fn archive_conversation(
    state: web::Data<AppState>,
    subject: AuthSubject,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let access =
        ConversationAccess::verify(state.store.as_ref(), &subject.subject, path.into_inner())
            .await?;
    ConversationService::archive(state.store.as_ref(), access).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Conversation archived"
    })))
}
