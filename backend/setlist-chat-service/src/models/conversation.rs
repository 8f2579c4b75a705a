use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Participant entry with the display name captured at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: Uuid,
    pub display_name: String,
}

/// Cached copy of the newest message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub message_id: Uuid,
    pub text: String,
    pub sender: Uuid,
    pub sent_at: DateTime<Utc>,
}

/// Two-party conversation.
///
/// `unread_count` and `archived_by` are keyed by participant id and serialize
/// as JSON objects keyed by the id string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<Participant>,
    pub last_message: Option<LastMessage>,
    pub unread_count: HashMap<Uuid, u32>,
    pub archived_by: HashMap<Uuid, bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order-independent key for a pair of users
pub fn pair_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

impl Conversation {
    pub fn new_direct(first: Participant, second: Participant) -> Self {
        let now = Utc::now();
        let unread_count = [(first.user_id, 0), (second.user_id, 0)].into();
        let archived_by = [(first.user_id, false), (second.user_id, false)].into();
        Self {
            id: Uuid::new_v4(),
            participants: vec![first, second],
            last_message: None,
            unread_count,
            archived_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pair_key(&self) -> Option<String> {
        match self.participants.as_slice() {
            [a, b] => Some(pair_key(a.user_id, b.user_id)),
            _ => None,
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn other_participants(&self, user_id: Uuid) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(move |p| p.user_id != user_id)
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn unread_for(&self, user_id: Uuid) -> u32 {
        self.unread_count.get(&user_id).copied().unwrap_or(0)
    }

    pub fn is_archived_by(&self, user_id: Uuid) -> bool {
        self.archived_by.get(&user_id).copied().unwrap_or(false)
    }

    pub fn archived_by_anyone(&self) -> bool {
        self.archived_by.values().any(|archived| *archived)
    }

    /// Sort key for conversation lists: newest activity first
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.sent_at)
    }
}

/// A conversation as listed for one user: unread count projected to that user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub participants: Vec<Participant>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    pub archived_by: HashMap<Uuid, bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn for_user(conversation: Conversation, user_id: Uuid) -> Self {
        let unread_count = conversation.unread_for(user_id);
        Self {
            id: conversation.id,
            participants: conversation.participants,
            last_message: conversation.last_message,
            unread_count,
            archived_by: conversation.archived_by,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}
