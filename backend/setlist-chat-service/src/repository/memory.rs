use super::ChatStore;
use crate::error::AppResult;
use crate::models::{
    pair_key, BlockedUser, Conversation, LastMessage, Message, Profile, ReadReceipt, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    users_by_auth0: HashMap<String, Uuid>,
    conversations: HashMap<Uuid, Conversation>,
    /// pair key -> conversation id
    pairs: HashMap<String, Uuid>,
    /// insertion order
    messages: Vec<Message>,
}

/// In-process store used by tests and by local runs without a database.
///
/// All state sits behind one lock, so each trait call is atomic and
/// conversation creation for a pair is serialized.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_auth0_id(&self, auth0_id: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users_by_auth0
            .get(auth0_id)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn insert_user(&self, user: User) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .users_by_auth0
            .get(&user.auth0_id)
            .and_then(|id| inner.users.get(id))
        {
            return Ok(existing.clone());
        }
        inner.users_by_auth0.insert(user.auth0_id.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        debug!(user_id = %user.id, "stored user");
        Ok(user)
    }

    async fn update_profile(&self, user_id: Uuid, profile: Profile) -> AppResult<Option<User>> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.get_mut(&user_id).map(|user| {
            user.profile = profile;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn add_block(
        &self,
        user_id: Uuid,
        blocked_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if user.has_blocked(blocked_user_id) {
            return Ok(false);
        }
        user.blocked_users.push(BlockedUser {
            user_id: blocked_user_id,
            blocked_at: at,
        });
        Ok(true)
    }

    async fn remove_block(&self, user_id: Uuid, blocked_user_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = user.blocked_users.len();
        user.blocked_users.retain(|b| b.user_id != blocked_user_id);
        Ok(user.blocked_users.len() != before)
    }

    async fn find_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn find_conversation_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .pairs
            .get(&pair_key(a, b))
            .and_then(|id| inner.conversations.get(id))
            .cloned())
    }

    async fn create_conversation(
        &self,
        conversation: Conversation,
    ) -> AppResult<(Conversation, bool)> {
        let mut inner = self.inner.write().await;
        let key = conversation.pair_key().unwrap_or_else(|| conversation.id.to_string());

        if let Some(existing) = inner
            .pairs
            .get(&key)
            .and_then(|id| inner.conversations.get(id))
        {
            return Ok((existing.clone(), false));
        }

        inner.pairs.insert(key, conversation.id);
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok((conversation, true))
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect())
    }

    async fn set_archived(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        archived: bool,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(conv) = inner.conversations.get_mut(&conversation_id) {
            conv.archived_by.insert(user_id, archived);
            conv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn unarchive_all(&self, conversation_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(conv) = inner.conversations.get_mut(&conversation_id) {
            for p in &conv.participants {
                conv.archived_by.insert(p.user_id, false);
            }
            conv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_message_sent(
        &self,
        conversation_id: Uuid,
        last: &LastMessage,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(conv) = inner.conversations.get_mut(&conversation_id) {
            conv.last_message = Some(last.clone());
            let recipients: Vec<Uuid> = conv
                .other_participants(last.sender)
                .map(|p| p.user_id)
                .collect();
            for user_id in recipients {
                *conv.unread_count.entry(user_id).or_insert(0) += 1;
                conv.archived_by.insert(user_id, false);
            }
            conv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_last_message(
        &self,
        conversation_id: Uuid,
        last: Option<LastMessage>,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(conv) = inner.conversations.get_mut(&conversation_id) {
            conv.last_message = last;
            conv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn reset_unread(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(conv) = inner.conversations.get_mut(&conversation_id) {
            conv.unread_count.insert(user_id, 0);
        }
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> AppResult<Option<u64>> {
        let mut inner = self.inner.write().await;
        let Some(conv) = inner.conversations.remove(&conversation_id) else {
            return Ok(None);
        };
        if let Some(key) = conv.pair_key() {
            inner.pairs.remove(&key);
        }
        let before = inner.messages.len();
        inner.messages.retain(|m| m.conversation_id != conversation_id);
        Ok(Some((before - inner.messages.len()) as u64))
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        self.inner.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> AppResult<Option<Message>> {
        let inner = self.inner.read().await;
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let inner = self.inner.read().await;
        let mut page: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| before.map_or(true, |ts| m.created_at < ts))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        page.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        page.reverse();
        page.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(page)
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let mut marked = 0;
        for message in inner
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && !m.is_read_by(user_id))
        {
            message.read_by.push(ReadReceipt {
                user_id,
                read_at: at,
            });
            marked += 1;
        }
        Ok(marked)
    }

    async fn delete_message(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.messages.len();
        inner.messages.retain(|m| m.id != id);
        Ok(inner.messages.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use std::sync::Arc;

    fn participant(user: &User) -> Participant {
        Participant {
            user_id: user.id,
            display_name: user.profile.display_name.clone(),
        }
    }

    #[tokio::test]
    async fn test_insert_user_is_idempotent_per_subject() {
        let store = MemoryStore::new();
        let first = store.insert_user(User::new("auth0|a", "A")).await.unwrap();
        let second = store.insert_user(User::new("auth0|a", "Other")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.profile.display_name, "A");
    }

    #[tokio::test]
    async fn test_concurrent_create_yields_one_conversation() {
        let store = Arc::new(MemoryStore::new());
        let a = User::new("auth0|a", "A");
        let b = User::new("auth0|b", "B");

        let mut handles = Vec::new();
        for i in 0..3 {
            let store = store.clone();
            let (first, second) = if i % 2 == 0 {
                (participant(&a), participant(&b))
            } else {
                (participant(&b), participant(&a))
            };
            handles.push(tokio::spawn(async move {
                store
                    .create_conversation(Conversation::new_direct(first, second))
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        let mut ids = Vec::new();
        for handle in handles {
            let (conv, was_created) = handle.await.unwrap();
            created += usize::from(was_created);
            ids.push(conv.id);
        }

        assert_eq!(created, 1);
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.conversations_for_user(a.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_message_sent_updates_recipient_only() {
        let store = MemoryStore::new();
        let a = User::new("auth0|a", "A");
        let b = User::new("auth0|b", "B");
        let (conv, _) = store
            .create_conversation(Conversation::new_direct(participant(&a), participant(&b)))
            .await
            .unwrap();
        store.set_archived(conv.id, b.id, true).await.unwrap();
        store.set_archived(conv.id, a.id, true).await.unwrap();

        let message = Message::new(conv.id, a.id, "hello".into());
        let last = LastMessage {
            message_id: message.id,
            text: message.text.clone(),
            sender: a.id,
            sent_at: message.created_at,
        };
        store.record_message_sent(conv.id, &last).await.unwrap();

        let conv = store.find_conversation(conv.id).await.unwrap().unwrap();
        assert_eq!(conv.unread_for(b.id), 1);
        assert_eq!(conv.unread_for(a.id), 0);
        assert!(!conv.is_archived_by(b.id));
        assert!(conv.is_archived_by(a.id));
        assert_eq!(conv.last_message, Some(last));
    }

    #[tokio::test]
    async fn test_delete_conversation_takes_messages_with_it() {
        let store = MemoryStore::new();
        let a = User::new("auth0|a", "A");
        let b = User::new("auth0|b", "B");
        let (conv, _) = store
            .create_conversation(Conversation::new_direct(participant(&a), participant(&b)))
            .await
            .unwrap();
        let other = Uuid::new_v4();
        for (conversation_id, text) in [(conv.id, "one"), (conv.id, "two"), (other, "keep")] {
            store
                .insert_message(&Message::new(conversation_id, a.id, text.into()))
                .await
                .unwrap();
        }

        assert_eq!(store.delete_conversation(conv.id).await.unwrap(), Some(2));
        assert!(store.find_conversation(conv.id).await.unwrap().is_none());
        assert!(store.recent_messages(conv.id, None, 10).await.unwrap().is_empty());
        assert_eq!(store.recent_messages(other, None, 10).await.unwrap().len(), 1);
        assert_eq!(store.delete_conversation(conv.id).await.unwrap(), None);

        // The pair can start over afterwards.
        let (_, created) = store
            .create_conversation(Conversation::new_direct(participant(&b), participant(&a)))
            .await
            .unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn test_mark_read_counts_only_new_receipts() {
        let store = MemoryStore::new();
        let conversation_id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let reader = Uuid::new_v4();
        for text in ["one", "two"] {
            store
                .insert_message(&Message::new(conversation_id, sender, text.into()))
                .await
                .unwrap();
        }

        assert_eq!(store.mark_read(conversation_id, reader, Utc::now()).await.unwrap(), 2);
        assert_eq!(store.mark_read(conversation_id, reader, Utc::now()).await.unwrap(), 0);
        assert_eq!(store.mark_read(conversation_id, sender, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recent_messages_newest_first_with_cursor() {
        let store = MemoryStore::new();
        let conversation_id = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let mut sent = Vec::new();
        for i in 0..5 {
            let m = Message::new(conversation_id, sender, format!("m{i}"));
            store.insert_message(&m).await.unwrap();
            sent.push(m);
        }

        let page = store.recent_messages(conversation_id, None, 2).await.unwrap();
        assert_eq!(page[0].text, "m4");
        assert_eq!(page[1].text, "m3");

        let older = store
            .recent_messages(conversation_id, Some(sent[2].created_at), 10)
            .await
            .unwrap();
        let texts: Vec<_> = older.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m1", "m0"]);
    }
}
