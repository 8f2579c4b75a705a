use super::ChatStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    pair_key, BlockedUser, Conversation, LastMessage, Message, Participant, Profile, ReadReceipt,
    User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    auth0_id: String,
    display_name: String,
    bio: String,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BlockRow {
    blocked_user_id: Uuid,
    blocked_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    last_message_id: Option<Uuid>,
    last_message_text: Option<String>,
    last_message_sender: Option<Uuid>,
    last_message_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    conversation_id: Uuid,
    user_id: Uuid,
    display_name: String,
    unread_count: i32,
    archived: bool,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReadRow {
    message_id: Uuid,
    user_id: Uuid,
    read_at: DateTime<Utc>,
}

const CONVERSATION_COLUMNS: &str = "c.id, c.last_message_id, c.last_message_text, \
     c.last_message_sender, c.last_message_sent_at, c.created_at, c.updated_at";

/// PostgreSQL-backed [`ChatStore`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_user(&self, row: UserRow) -> AppResult<User> {
        let blocks = sqlx::query_as::<_, BlockRow>(
            "SELECT blocked_user_id, blocked_at FROM user_blocks \
             WHERE user_id = $1 ORDER BY blocked_at",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(User {
            id: row.id,
            auth0_id: row.auth0_id,
            profile: Profile {
                display_name: row.display_name,
                bio: row.bio,
                is_public: row.is_public,
            },
            blocked_users: blocks
                .into_iter()
                .map(|b| BlockedUser {
                    user_id: b.blocked_user_id,
                    blocked_at: b.blocked_at,
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Attach participants to conversation rows, preserving row order
    async fn load_conversations(
        &self,
        rows: Vec<ConversationRow>,
    ) -> AppResult<Vec<Conversation>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let participants = sqlx::query_as::<_, ParticipantRow>(
            "SELECT conversation_id, user_id, display_name, unread_count, archived \
             FROM conversation_participants \
             WHERE conversation_id = ANY($1) ORDER BY conversation_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_conversation: HashMap<Uuid, Vec<ParticipantRow>> = HashMap::new();
        for p in participants {
            by_conversation.entry(p.conversation_id).or_default().push(p);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let parts = by_conversation.remove(&row.id).unwrap_or_default();
                conversation_from_rows(row, parts)
            })
            .collect())
    }

    async fn attach_receipts(&self, rows: Vec<MessageRow>) -> AppResult<Vec<Message>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let reads = sqlx::query_as::<_, ReadRow>(
            "SELECT message_id, user_id, read_at FROM message_reads \
             WHERE message_id = ANY($1) ORDER BY read_at",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_message: HashMap<Uuid, Vec<ReadReceipt>> = HashMap::new();
        for r in reads {
            by_message.entry(r.message_id).or_default().push(ReadReceipt {
                user_id: r.user_id,
                read_at: r.read_at,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Message {
                read_by: by_message.remove(&row.id).unwrap_or_default(),
                id: row.id,
                conversation_id: row.conversation_id,
                sender: row.sender_id,
                text: row.text,
                created_at: row.created_at,
            })
            .collect())
    }
}

fn conversation_from_rows(
    row: ConversationRow,
    participants: Vec<ParticipantRow>,
) -> Conversation {
    let last_message = match (
        row.last_message_id,
        row.last_message_text,
        row.last_message_sender,
        row.last_message_sent_at,
    ) {
        (Some(message_id), Some(text), Some(sender), Some(sent_at)) => Some(LastMessage {
            message_id,
            text,
            sender,
            sent_at,
        }),
        _ => None,
    };

    let unread_count = participants
        .iter()
        .map(|p| (p.user_id, p.unread_count.max(0) as u32))
        .collect();
    let archived_by = participants
        .iter()
        .map(|p| (p.user_id, p.archived))
        .collect();

    Conversation {
        id: row.id,
        participants: participants
            .into_iter()
            .map(|p| Participant {
                user_id: p.user_id,
                display_name: p.display_name,
            })
            .collect(),
        last_message,
        unread_count,
        archived_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, auth0_id, display_name, bio, is_public, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_user(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_auth0_id(&self, auth0_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, auth0_id, display_name, bio, is_public, created_at, updated_at \
             FROM users WHERE auth0_id = $1",
        )
        .bind(auth0_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_user(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: User) -> AppResult<User> {
        sqlx::query(
            "INSERT INTO users (id, auth0_id, display_name, bio, is_public, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (auth0_id) DO NOTHING",
        )
        .bind(user.id)
        .bind(&user.auth0_id)
        .bind(&user.profile.display_name)
        .bind(&user.profile.bio)
        .bind(user.profile.is_public)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        self.find_user_by_auth0_id(&user.auth0_id)
            .await?
            .ok_or(AppError::Internal)
    }

    async fn update_profile(&self, user_id: Uuid, profile: Profile) -> AppResult<Option<User>> {
        let result = sqlx::query(
            "UPDATE users SET display_name = $2, bio = $3, is_public = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(&profile.display_name)
        .bind(&profile.bio)
        .bind(profile.is_public)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_user(user_id).await
    }

    async fn add_block(
        &self,
        user_id: Uuid,
        blocked_user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_blocks (user_id, blocked_user_id, blocked_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, blocked_user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(blocked_user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_block(&self, user_id: Uuid, blocked_user_id: Uuid) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM user_blocks WHERE user_id = $1 AND blocked_user_id = $2")
                .bind(user_id)
                .bind(blocked_user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_conversations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_conversation_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.pair_key = $1"
        ))
        .bind(pair_key(a, b))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_conversations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_conversation(
        &self,
        conversation: Conversation,
    ) -> AppResult<(Conversation, bool)> {
        let (first, second) = match conversation.participants.as_slice() {
            [a, b] => (a.user_id, b.user_id),
            _ => {
                return Err(AppError::BadRequest(
                    "A conversation needs exactly two participants".into(),
                ))
            }
        };

        let mut tx = self.pool.begin().await?;

        // A concurrent insert for the same pair waits here and then does nothing.
        let inserted = sqlx::query(
            "INSERT INTO conversations (id, pair_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (pair_key) DO NOTHING",
        )
        .bind(conversation.id)
        .bind(pair_key(first, second))
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            let existing = self
                .find_conversation_between(first, second)
                .await?
                .ok_or(AppError::Internal)?;
            return Ok((existing, false));
        }

        for (position, p) in conversation.participants.iter().enumerate() {
            sqlx::query(
                "INSERT INTO conversation_participants \
                 (conversation_id, user_id, display_name, position, unread_count, archived) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(conversation.id)
            .bind(p.user_id)
            .bind(&p.display_name)
            .bind(position as i16)
            .bind(conversation.unread_for(p.user_id) as i32)
            .bind(conversation.is_archived_by(p.user_id))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((conversation, true))
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c \
             JOIN conversation_participants p ON p.conversation_id = c.id \
             WHERE p.user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.load_conversations(rows).await
    }

    async fn set_archived(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        archived: bool,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE conversation_participants SET archived = $3 \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(archived)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn unarchive_all(&self, conversation_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE conversation_participants SET archived = FALSE WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_message_sent(
        &self,
        conversation_id: Uuid,
        last: &LastMessage,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE conversations SET last_message_id = $2, last_message_text = $3, \
             last_message_sender = $4, last_message_sent_at = $5, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(last.message_id)
        .bind(&last.text)
        .bind(last.sender)
        .bind(last.sent_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE conversation_participants \
             SET unread_count = unread_count + 1, archived = FALSE \
             WHERE conversation_id = $1 AND user_id <> $2",
        )
        .bind(conversation_id)
        .bind(last.sender)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_last_message(
        &self,
        conversation_id: Uuid,
        last: Option<LastMessage>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE conversations SET last_message_id = $2, last_message_text = $3, \
             last_message_sender = $4, last_message_sent_at = $5, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(last.as_ref().map(|m| m.message_id))
        .bind(last.as_ref().map(|m| m.text.clone()))
        .bind(last.as_ref().map(|m| m.sender))
        .bind(last.as_ref().map(|m| m.sent_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_unread(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE conversation_participants SET unread_count = 0 \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> AppResult<Option<u64>> {
        let mut tx = self.pool.begin().await?;
        let messages = sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        // Messages inserted after the delete above go with the row via ON DELETE CASCADE.
        let conversation = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if conversation.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(messages.rows_affected()))
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, text, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender)
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        for receipt in &message.read_by {
            sqlx::query(
                "INSERT INTO message_reads (message_id, user_id, read_at) VALUES ($1, $2, $3) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(message.id)
            .bind(receipt.user_id)
            .bind(receipt.read_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, text, created_at FROM messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_receipts(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, text, created_at FROM messages \
             WHERE conversation_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2) \
             ORDER BY created_at DESC, seq DESC LIMIT $3",
        )
        .bind(conversation_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.attach_receipts(rows).await
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "INSERT INTO message_reads (message_id, user_id, read_at) \
             SELECT m.id, $2, $3 FROM messages m WHERE m.conversation_id = $1 \
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_message(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
