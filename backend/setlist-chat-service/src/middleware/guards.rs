//! Authorization guards shared by the conversation and message routes.
//!
//! Each guard resolves the records a handler needs and performs the checks in
//! a fixed order, so handlers receive already-verified documents instead of
//! looking them up again.

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, User};
use crate::repository::ChatStore;
use error_types::error_codes;
use crate::services::{RelationshipService, UserService};
use uuid::Uuid;

/// Caller and target user, verified to have no block between them
#[derive(Debug, Clone)]
pub struct UnblockedPair {
    pub current: User,
    pub other: User,
}

impl UnblockedPair {
    /// Order of checks: caller exists, target id given, target exists, no block.
    pub async fn verify(
        store: &dyn ChatStore,
        auth0_id: &str,
        other_id: Option<Uuid>,
    ) -> AppResult<Self> {
        let current = UserService::current_user(store, auth0_id).await?;
        let other_id = other_id
            .ok_or_else(|| AppError::BadRequest("Recipient user ID is required".into()))?;
        let other = UserService::find(store, other_id).await?;

        RelationshipService::check_block(&current, &other, None)?;

        Ok(Self { current, other })
    }
}

/// Caller verified as a participant of a conversation
#[derive(Debug, Clone)]
pub struct ConversationAccess {
    pub user: User,
    pub conversation: Conversation,
}

impl ConversationAccess {
    pub async fn verify(
        store: &dyn ChatStore,
        auth0_id: &str,
        conversation_id: Uuid,
    ) -> AppResult<Self> {
        let user = UserService::current_user(store, auth0_id).await?;
        Self::verify_member(store, user, conversation_id).await
    }

    pub async fn verify_member(
        store: &dyn ChatStore,
        user: User,
        conversation_id: Uuid,
    ) -> AppResult<Self> {
        let conversation = store
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(error_codes::CONVERSATION_NOT_FOUND, "Conversation not found")
            })?;

        if !conversation.is_participant(user.id) {
            tracing::warn!(
                user_id = %user.id,
                conversation_id = %conversation_id,
                "access denied: not a participant"
            );
            return Err(AppError::forbidden(
                error_codes::NOT_CONVERSATION_MEMBER,
                "You are not a participant in this conversation",
            ));
        }

        Ok(Self { user, conversation })
    }

    /// Participant check plus a block check against every other participant
    pub async fn verify_unblocked(
        store: &dyn ChatStore,
        auth0_id: &str,
        conversation_id: Uuid,
    ) -> AppResult<Self> {
        let access = Self::verify(store, auth0_id, conversation_id).await?;

        for participant in access.conversation.other_participants(access.user.id) {
            let Some(other) = store.find_user(participant.user_id).await? else {
                continue;
            };
            RelationshipService::check_block(
                &access.user,
                &other,
                Some(&participant.display_name),
            )?;
        }

        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockDirection;
    use crate::models::Participant;
    use crate::repository::MemoryStore;
    use chrono::Utc;

    async fn seed(store: &MemoryStore, sub: &str, name: &str) -> User {
        store.insert_user(User::new(sub, name)).await.unwrap()
    }

    #[tokio::test]
    async fn test_pair_requires_recipient_id() {
        let store = MemoryStore::new();
        seed(&store, "auth0|a", "A").await;

        let err = UnblockedPair::verify(&store, "auth0|a", None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Recipient user ID is required"));
    }

    #[tokio::test]
    async fn test_pair_unknown_caller_is_not_found() {
        let store = MemoryStore::new();
        let err = UnblockedPair::verify(&store, "auth0|ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_pair_reports_block_direction() {
        let store = MemoryStore::new();
        let a = seed(&store, "auth0|a", "A").await;
        let b = seed(&store, "auth0|b", "B").await;
        store.add_block(a.id, b.id, Utc::now()).await.unwrap();

        let from_b = UnblockedPair::verify(&store, "auth0|b", Some(a.id)).await;
        assert!(matches!(
            from_b,
            Err(AppError::Blocked { direction: BlockDirection::Incoming, .. })
        ));
        let from_a = UnblockedPair::verify(&store, "auth0|a", Some(b.id)).await;
        assert!(matches!(
            from_a,
            Err(AppError::Blocked { direction: BlockDirection::Outgoing, .. })
        ));
    }

    #[tokio::test]
    async fn test_conversation_access_checks_membership_and_blocks() {
        let store = MemoryStore::new();
        let a = seed(&store, "auth0|a", "A").await;
        let b = seed(&store, "auth0|b", "Bea").await;
        seed(&store, "auth0|c", "C").await;
        let (conv, _) = store
            .create_conversation(Conversation::new_direct(
                Participant {
                    user_id: a.id,
                    display_name: "A".into(),
                },
                Participant {
                    user_id: b.id,
                    display_name: "Bea".into(),
                },
            ))
            .await
            .unwrap();

        let outsider = ConversationAccess::verify(&store, "auth0|c", conv.id).await;
        assert!(matches!(outsider, Err(AppError::Forbidden { .. })));

        let missing = ConversationAccess::verify(&store, "auth0|a", Uuid::new_v4()).await;
        assert!(matches!(
            missing,
            Err(AppError::NotFound { code: error_codes::CONVERSATION_NOT_FOUND, .. })
        ));

        store.add_block(b.id, a.id, Utc::now()).await.unwrap();
        assert!(ConversationAccess::verify(&store, "auth0|a", conv.id).await.is_ok());
        match ConversationAccess::verify_unblocked(&store, "auth0|a", conv.id).await {
            Err(AppError::Blocked { direction, message }) => {
                assert_eq!(direction, BlockDirection::Incoming);
                assert_eq!(message, "Bea has blocked you");
            }
            other => panic!("expected block, got {other:?}"),
        }
    }
}
