//! Persistence boundary for users, conversations and messages.

use crate::error::AppResult;
use crate::models::{Conversation, LastMessage, Message, Profile, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage operations the chat services are written against.
///
/// Every method is a single logical store operation. Multi-step flows such as
/// sending a message (insert, then update the conversation cache) are composed
/// by the services and are not atomic across calls.
#[async_trait]
pub trait ChatStore: Send + Sync {
    // ---- users ----

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_user_by_auth0_id(&self, auth0_id: &str) -> AppResult<Option<User>>;

    /// Insert `user` unless one with the same `auth0_id` exists; returns the stored user
    async fn insert_user(&self, user: User) -> AppResult<User>;

    async fn update_profile(&self, user_id: Uuid, profile: Profile) -> AppResult<Option<User>>;

    /// Returns `false` when the block already existed
    async fn add_block(
        &self,
        user_id: Uuid,
        blocked_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Returns `false` when there was nothing to remove
    async fn remove_block(&self, user_id: Uuid, blocked_user_id: Uuid) -> AppResult<bool>;

    // ---- conversations ----

    async fn find_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>>;

    async fn find_conversation_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> AppResult<Option<Conversation>>;

    /// Insert a two-party conversation unless the pair already has one.
    ///
    /// Returns the stored conversation and whether it was created by this call.
    async fn create_conversation(
        &self,
        conversation: Conversation,
    ) -> AppResult<(Conversation, bool)>;

    async fn conversations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>>;

    async fn set_archived(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        archived: bool,
    ) -> AppResult<()>;

    /// Clear the archive flag of every participant
    async fn unarchive_all(&self, conversation_id: Uuid) -> AppResult<()>;

    /// Update the last-message cache, then bump the unread counter and clear
    /// the archive flag of every participant except the sender.
    async fn record_message_sent(
        &self,
        conversation_id: Uuid,
        last: &LastMessage,
    ) -> AppResult<()>;

    async fn set_last_message(
        &self,
        conversation_id: Uuid,
        last: Option<LastMessage>,
    ) -> AppResult<()>;

    async fn reset_unread(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()>;

    /// Remove the conversation together with its messages in one step.
    ///
    /// Returns the number of messages removed, or `None` when the
    /// conversation did not exist.
    async fn delete_conversation(&self, conversation_id: Uuid) -> AppResult<Option<u64>>;

    // ---- messages ----

    async fn insert_message(&self, message: &Message) -> AppResult<()>;

    async fn find_message(&self, id: Uuid) -> AppResult<Option<Message>>;

    /// Newest-first page of a conversation, optionally strictly older than `before`
    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<Message>>;

    /// Add a read receipt for `user_id` to every message in the conversation
    /// that lacks one; returns how many messages were newly marked.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    async fn delete_message(&self, id: Uuid) -> AppResult<bool>;
}
