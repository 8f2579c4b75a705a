use crate::models::MessageView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent by clients over the WebSocket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "conversation:join", rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },

    #[serde(rename = "conversation:leave", rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },

    #[serde(rename = "typing:start", rename_all = "camelCase")]
    TypingStart {
        conversation_id: Uuid,
        #[serde(default)]
        display_name: Option<String>,
    },

    #[serde(rename = "typing:stop", rename_all = "camelCase")]
    TypingStop {
        conversation_id: Uuid,
        #[serde(default)]
        display_name: Option<String>,
    },
}

/// Events pushed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    #[serde(rename = "message:new")]
    MessageNew { message: MessageView },

    #[serde(rename = "message:deleted", rename_all = "camelCase")]
    MessageDeleted {
        conversation_id: Uuid,
        message_id: Uuid,
    },

    #[serde(rename = "typing:update", rename_all = "camelCase")]
    TypingUpdate {
        conversation_id: Uuid,
        user_id: Uuid,
        display_name: String,
        is_typing: bool,
    },

    #[serde(rename = "conversation:joined", rename_all = "camelCase")]
    Joined { conversation_id: Uuid },

    #[serde(rename = "error")]
    Error { message: String },
}

impl WsOutboundEvent {
    pub fn error(message: impl Into<String>) -> Self {
        WsOutboundEvent::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize websocket event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let id = Uuid::new_v4();
        let evt: WsInboundEvent =
            serde_json::from_value(json!({"type": "conversation:join", "conversationId": id}))
                .unwrap();
        assert!(matches!(evt, WsInboundEvent::JoinConversation { conversation_id } if conversation_id == id));
    }

    #[test]
    fn test_parse_typing_ignores_client_user_id() {
        let id = Uuid::new_v4();
        let evt: WsInboundEvent = serde_json::from_value(json!({
            "type": "typing:start",
            "conversationId": id,
            "userId": Uuid::new_v4(),
            "displayName": "Sam"
        }))
        .unwrap();
        match evt {
            WsInboundEvent::TypingStart { display_name, .. } => {
                assert_eq!(display_name.as_deref(), Some("Sam"))
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_typing_update_shape() {
        let evt = WsOutboundEvent::TypingUpdate {
            conversation_id: Uuid::nil(),
            user_id: Uuid::nil(),
            display_name: "Sam".into(),
            is_typing: false,
        };
        let value: serde_json::Value = serde_json::from_str(&evt.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "typing:update");
        assert_eq!(value["isTyping"], false);
        assert_eq!(value["displayName"], "Sam");
    }

    #[test]
    fn test_unknown_event_rejected() {
        let res = serde_json::from_value::<WsInboundEvent>(json!({"type": "call:start"}));
        assert!(res.is_err());
    }
}
