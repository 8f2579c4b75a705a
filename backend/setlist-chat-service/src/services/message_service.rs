use crate::error::{AppError, AppResult};
use crate::middleware::guards::ConversationAccess;
use crate::models::{next_timestamp, LastMessage, Message, MessageView};
use crate::repository::ChatStore;
use error_types::error_codes;
use crate::services::UserService;
use crate::websocket::Notifier;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Page size bounds for history fetches
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default: i64,
    pub max: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: 50,
            max: 200,
        }
    }
}

impl PageLimits {
    /// Unparseable or non-positive values fall back to the default
    pub fn resolve(&self, requested: Option<&str>) -> i64 {
        requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.default)
            .min(self.max)
    }
}

/// Validate the `text` field of a send request and return it trimmed.
pub fn validate_text(raw: Option<&Value>) -> AppResult<String> {
    match raw {
        None | Some(Value::Null) => Err(AppError::BadRequest("Message text is required".into())),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Err(AppError::BadRequest("Message text is required".into()))
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(_) => Err(AppError::BadRequest(
            "Message text must be a string".into(),
        )),
    }
}

pub struct MessageService;

impl MessageService {
    /// Persist a message, then refresh the conversation cache and notify.
    ///
    /// The two writes are separate store calls; a failure between them leaves
    /// the cached last message and unread counters behind the history.
    pub async fn send(
        store: &dyn ChatStore,
        notifier: &Notifier,
        access: ConversationAccess,
        raw_text: Option<&Value>,
    ) -> AppResult<MessageView> {
        let text = validate_text(raw_text)?;
        let ConversationAccess { user, conversation } = access;

        let message = Message::new(conversation.id, user.id, text);
        store.insert_message(&message).await?;

        let last = LastMessage {
            message_id: message.id,
            text: message.text.clone(),
            sender: user.id,
            sent_at: message.created_at,
        };
        store.record_message_sent(conversation.id, &last).await?;

        tracing::info!(
            conversation_id = %conversation.id,
            user_id = %user.id,
            message_id = %message.id,
            "message sent"
        );

        let view = MessageView::new(message, user.profile.display_name.clone());
        notifier.message_created(&conversation, &view);
        Ok(view)
    }

    /// Chronological page of history.
    ///
    /// `before` narrows the page to messages strictly older than that message;
    /// a cursor that does not resolve within this conversation is ignored.
    pub async fn fetch(
        store: &dyn ChatStore,
        access: &ConversationAccess,
        limit: i64,
        before: Option<&str>,
    ) -> AppResult<Vec<MessageView>> {
        let conversation = &access.conversation;

        let cursor = match before.and_then(|raw| Uuid::parse_str(raw.trim()).ok()) {
            Some(id) => store
                .find_message(id)
                .await?
                .filter(|m| m.conversation_id == conversation.id)
                .map(|m| m.created_at),
            None => None,
        };

        let mut page = store
            .recent_messages(conversation.id, cursor, limit)
            .await?;
        page.reverse();

        // Sender display names: current profile, then the participant snapshot.
        let mut names: HashMap<Uuid, String> = HashMap::new();
        let mut views = Vec::with_capacity(page.len());
        for message in page {
            if !names.contains_key(&message.sender) {
                let name = match store.find_user(message.sender).await? {
                    Some(u) => u.profile.display_name,
                    None => conversation
                        .participant(message.sender)
                        .map(|p| p.display_name.clone())
                        .unwrap_or_else(|| "Unknown user".to_string()),
                };
                names.insert(message.sender, name);
            }
            let name = names.get(&message.sender).cloned().unwrap_or_default();
            views.push(MessageView::new(message, name));
        }
        Ok(views)
    }

    /// Add the caller's read receipt where missing and reset their unread count
    pub async fn mark_read(store: &dyn ChatStore, access: &ConversationAccess) -> AppResult<u64> {
        let conversation_id = access.conversation.id;
        let user_id = access.user.id;

        let count = store.mark_read(conversation_id, user_id, next_timestamp()).await?;
        store.reset_unread(conversation_id, user_id).await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            user_id = %user_id,
            count,
            "messages marked as read"
        );
        Ok(count)
    }

    /// Sender-only delete; repairs the conversation's last-message cache when
    /// the deleted message was the cached one.
    pub async fn delete(
        store: &dyn ChatStore,
        notifier: &Notifier,
        auth0_id: &str,
        message_id: Uuid,
    ) -> AppResult<()> {
        let user = UserService::current_user(store, auth0_id).await?;
        let message = store
            .find_message(message_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(error_codes::MESSAGE_NOT_FOUND, "Message not found")
            })?;

        if message.sender != user.id {
            return Err(AppError::forbidden(
                error_codes::NOT_MESSAGE_SENDER,
                "Only the sender can delete this message",
            ));
        }

        store.delete_message(message.id).await?;

        if let Some(conversation) = store.find_conversation(message.conversation_id).await? {
            let was_cached = conversation
                .last_message
                .as_ref()
                .is_some_and(|last| last.message_id == message.id);
            if was_cached {
                let replacement = store
                    .recent_messages(conversation.id, None, 1)
                    .await?
                    .into_iter()
                    .next()
                    .map(|m| LastMessage {
                        message_id: m.id,
                        text: m.text,
                        sender: m.sender,
                        sent_at: m.created_at,
                    });
                store.set_last_message(conversation.id, replacement).await?;
            }
            notifier.message_deleted(&conversation, message.id, user.id);
        }

        tracing::info!(
            conversation_id = %message.conversation_id,
            user_id = %user.id,
            message_id = %message.id,
            "message deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_text_trims() {
        let text = validate_text(Some(&json!("  \n\t hello 🎸 <b>x</b>\n"))).unwrap();
        assert_eq!(text, "hello 🎸 <b>x</b>");
    }

    #[test]
    fn test_validate_text_rejects_blank_and_missing() {
        for raw in [None, Some(json!(null)), Some(json!("")), Some(json!(" \n\t "))] {
            match validate_text(raw.as_ref()) {
                Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Message text is required"),
                other => panic!("expected bad request, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate_text_rejects_non_strings() {
        for raw in [json!(42), json!(true), json!(["hi"]), json!({"text": "hi"})] {
            match validate_text(Some(&raw)) {
                Err(AppError::BadRequest(msg)) => {
                    assert_eq!(msg, "Message text must be a string")
                }
                other => panic!("expected bad request, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_page_limits() {
        let limits = PageLimits::default();
        assert_eq!(limits.resolve(None), 50);
        assert_eq!(limits.resolve(Some("10")), 10);
        assert_eq!(limits.resolve(Some("abc")), 50);
        assert_eq!(limits.resolve(Some("0")), 50);
        assert_eq!(limits.resolve(Some("5000")), 200);
    }
}
