use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing creation timestamp at microsecond precision.
///
/// Message order is defined by creation time alone, so two messages created
/// within the same microsecond must still get distinct timestamps.
pub fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let mut prev = LAST_TIMESTAMP_MICROS.load(Ordering::Acquire);
    loop {
        let candidate = now.max(prev + 1);
        match LAST_TIMESTAMP_MICROS.compare_exchange_weak(
            prev,
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return DateTime::from_timestamp_micros(candidate).unwrap_or_else(Utc::now),
            Err(actual) => prev = actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Uuid,
    pub text: String,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// New message, already read by its sender
    pub fn new(conversation_id: Uuid, sender: Uuid, text: String) -> Self {
        let created_at = next_timestamp();
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender,
            text,
            read_by: vec![ReadReceipt {
                user_id: sender,
                read_at: created_at,
            }],
            created_at,
        }
    }

    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.iter().any(|r| r.user_id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderView {
    pub id: Uuid,
    pub display_name: String,
}

/// Message with its sender expanded, as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: SenderView,
    pub text: String,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    pub fn new(message: Message, display_name: String) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender: SenderView {
                id: message.sender,
                display_name,
            },
            text: message.text,
            read_by: message.read_by,
            created_at: message.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut prev = next_timestamp();
        for _ in 0..1000 {
            let next = next_timestamp();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_new_message_is_read_by_sender() {
        let sender = Uuid::new_v4();
        let msg = Message::new(Uuid::new_v4(), sender, "hi".into());
        assert!(msg.is_read_by(sender));
        assert!(!msg.is_read_by(Uuid::new_v4()));
        assert_eq!(msg.read_by.len(), 1);
    }
}
