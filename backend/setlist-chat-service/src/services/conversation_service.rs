use crate::error::{AppError, AppResult};
use crate::middleware::guards::{ConversationAccess, UnblockedPair};
use crate::models::{Conversation, ConversationSummary, Participant};
use crate::repository::ChatStore;
use error_types::error_codes;
use crate::services::UserService;
use std::cmp::Ordering;

pub struct ConversationService;

impl ConversationService {
    /// Conversations of the caller, newest activity first, minus the ones the
    /// caller archived. Conversations without messages come last.
    pub async fn list_for_user(
        store: &dyn ChatStore,
        auth0_id: &str,
    ) -> AppResult<Vec<ConversationSummary>> {
        let user = UserService::current_user(store, auth0_id).await?;
        let mut conversations = store.conversations_for_user(user.id).await?;

        conversations.sort_by(compare_by_activity);

        Ok(conversations
            .into_iter()
            .filter(|c| !c.is_archived_by(user.id))
            .map(|c| ConversationSummary::for_user(c, user.id))
            .collect())
    }

    /// Find the pair's conversation or create it.
    ///
    /// Returns the conversation and whether it was created. An existing
    /// conversation archived by either side is unarchived for both.
    pub async fn create_or_get(
        store: &dyn ChatStore,
        pair: UnblockedPair,
    ) -> AppResult<(Conversation, bool)> {
        let UnblockedPair { current, other } = pair;
        if current.id == other.id {
            return Err(AppError::BadRequest(
                "Cannot start a conversation with yourself".into(),
            ));
        }

        let (mut conversation, created) =
            match store.find_conversation_between(current.id, other.id).await? {
                Some(existing) => (existing, false),
                None => {
                    let draft = Conversation::new_direct(
                        Participant {
                            user_id: current.id,
                            display_name: current.profile.display_name.clone(),
                        },
                        Participant {
                            user_id: other.id,
                            display_name: other.profile.display_name.clone(),
                        },
                    );
                    store.create_conversation(draft).await?
                }
            };

        if created {
            tracing::info!(
                conversation_id = %conversation.id,
                user_id = %current.id,
                recipient_id = %other.id,
                "conversation created"
            );
        } else if conversation.archived_by_anyone() {
            store.unarchive_all(conversation.id).await?;
            for archived in conversation.archived_by.values_mut() {
                *archived = false;
            }
            tracing::info!(conversation_id = %conversation.id, "conversation restored from archive");
        }

        Ok((conversation, created))
    }

    /// Delete the conversation and every message in it
    pub async fn delete(store: &dyn ChatStore, access: ConversationAccess) -> AppResult<()> {
        let conversation_id = access.conversation.id;
        let removed = store
            .delete_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(error_codes::CONVERSATION_NOT_FOUND, "Conversation not found")
            })?;

        tracing::info!(
            conversation_id = %conversation_id,
            user_id = %access.user.id,
            messages_removed = removed,
            "conversation deleted"
        );
        Ok(())
    }

    /// Archive for the caller only; archiving twice is a no-op
    pub async fn archive(store: &dyn ChatStore, access: ConversationAccess) -> AppResult<()> {
        let ConversationAccess { user, conversation } = access;
        if conversation.is_archived_by(user.id) {
            return Ok(());
        }
        store.set_archived(conversation.id, user.id, true).await?;
        tracing::debug!(conversation_id = %conversation.id, user_id = %user.id, "conversation archived");
        Ok(())
    }
}

/// Newest `lastMessage.sentAt` first; conversations without one sort after,
/// most recently updated first.
fn compare_by_activity(a: &Conversation, b: &Conversation) -> Ordering {
    match (a.last_activity(), b.last_activity()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.updated_at.cmp(&a.updated_at),
    }
}
