use super::message_types::WsOutboundEvent;
use super::PresenceRegistry;
use crate::models::{Conversation, MessageView};
use uuid::Uuid;

/// Best-effort push of conversation events to connected clients.
///
/// Delivery is spawned and never awaited by the caller; a client that is not
/// connected simply misses the push and sees the change on its next fetch.
#[derive(Clone)]
pub struct Notifier {
    registry: PresenceRegistry,
}

impl Notifier {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// `message:new` to the conversation room and to each recipient's own sessions
    pub fn message_created(&self, conversation: &Conversation, message: &MessageView) {
        let recipients: Vec<Uuid> = conversation
            .other_participants(message.sender.id)
            .map(|p| p.user_id)
            .collect();
        let event = WsOutboundEvent::MessageNew {
            message: message.clone(),
        };
        self.dispatch(conversation.id, recipients, event);
    }

    pub fn message_deleted(&self, conversation: &Conversation, message_id: Uuid, sender: Uuid) {
        let recipients: Vec<Uuid> = conversation
            .other_participants(sender)
            .map(|p| p.user_id)
            .collect();
        let event = WsOutboundEvent::MessageDeleted {
            conversation_id: conversation.id,
            message_id,
        };
        self.dispatch(conversation.id, recipients, event);
    }

    fn dispatch(&self, conversation_id: Uuid, recipients: Vec<Uuid>, event: WsOutboundEvent) {
        let Some(payload) = event.to_json() else {
            return;
        };
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let in_room = registry.broadcast_room(conversation_id, &payload).await;
            let mut direct = 0;
            for user_id in recipients {
                if registry.is_online(user_id).await {
                    direct += registry.send_to_user(user_id, &payload).await;
                }
            }
            tracing::debug!(
                conversation_id = %conversation_id,
                in_room,
                direct,
                "realtime event dispatched"
            );
        });
    }
}
