use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod message_types;

pub use events::Notifier;

/// Unique identifier for one live WebSocket session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

struct Session {
    user_id: Uuid,
    sender: UnboundedSender<String>,
    rooms: HashSet<Uuid>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    // user_id -> sessions of that user
    users: HashMap<Uuid, HashSet<SessionId>>,
    // conversation_id -> sessions joined to it
    rooms: HashMap<Uuid, HashSet<SessionId>>,
}

impl Inner {
    fn remove_session(&mut self, session_id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;

        if let Some(sessions) = self.users.get_mut(&session.user_id) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                self.users.remove(&session.user_id);
            }
        }
        for room in &session.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&session_id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(session)
    }

    /// Send to each listed session, returning the ones whose receiver is gone
    fn send_all<'a>(
        &self,
        targets: impl Iterator<Item = &'a SessionId>,
        msg: &str,
    ) -> (usize, Vec<SessionId>) {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for id in targets {
            match self.sessions.get(id) {
                Some(s) if s.sender.send(msg.to_string()).is_ok() => delivered += 1,
                _ => dead.push(*id),
            }
        }
        (delivered, dead)
    }

    fn prune(&mut self, dead: Vec<SessionId>) {
        if dead.is_empty() {
            return;
        }
        tracing::debug!("pruning {} dead websocket sessions", dead.len());
        for id in dead {
            self.remove_session(id);
        }
    }
}

/// Presence tracking for live WebSocket sessions.
///
/// A session is inserted on connect and removed on disconnect. Rooms are keyed
/// by conversation id. Message fan-out looks up recipients here; nothing in the
/// request path depends on it for correctness.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `user_id`.
    ///
    /// Returns the session id (used for cleanup) and the receiver the session
    /// reads outbound frames from.
    pub async fn connect(&self, user_id: Uuid) -> (SessionId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let session_id = SessionId::new();

        let mut guard = self.inner.write().await;
        guard.sessions.insert(
            session_id,
            Session {
                user_id,
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        guard.users.entry(user_id).or_default().insert(session_id);

        tracing::debug!(
            user_id = %user_id,
            sessions = guard.users.get(&user_id).map(|s| s.len()).unwrap_or(0),
            "websocket session registered"
        );

        (session_id, rx)
    }

    /// Remove a session and all of its room memberships
    pub async fn disconnect(&self, session_id: SessionId) {
        let mut guard = self.inner.write().await;
        if let Some(session) = guard.remove_session(session_id) {
            tracing::debug!(user_id = %session.user_id, "websocket session removed");
        }
    }

    /// Returns `false` if the session is not registered
    pub async fn join(&self, session_id: SessionId, conversation_id: Uuid) -> bool {
        let mut guard = self.inner.write().await;
        let Some(session) = guard.sessions.get_mut(&session_id) else {
            return false;
        };
        session.rooms.insert(conversation_id);
        guard
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(session_id);
        true
    }

    pub async fn leave(&self, session_id: SessionId, conversation_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(session) = guard.sessions.get_mut(&session_id) {
            session.rooms.remove(&conversation_id);
        }
        if let Some(members) = guard.rooms.get_mut(&conversation_id) {
            members.remove(&session_id);
            if members.is_empty() {
                guard.rooms.remove(&conversation_id);
            }
        }
    }

    pub async fn in_room(&self, session_id: SessionId, conversation_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard
            .rooms
            .get(&conversation_id)
            .is_some_and(|members| members.contains(&session_id))
    }

    /// Broadcast to every session in a room; returns the number of deliveries
    pub async fn broadcast_room(&self, conversation_id: Uuid, msg: &str) -> usize {
        self.broadcast_room_inner(conversation_id, None, msg).await
    }

    /// Broadcast to a room, skipping the originating session
    pub async fn broadcast_room_except(
        &self,
        conversation_id: Uuid,
        except: SessionId,
        msg: &str,
    ) -> usize {
        self.broadcast_room_inner(conversation_id, Some(except), msg)
            .await
    }

    async fn broadcast_room_inner(
        &self,
        conversation_id: Uuid,
        except: Option<SessionId>,
        msg: &str,
    ) -> usize {
        let mut guard = self.inner.write().await;
        let Some(members) = guard.rooms.get(&conversation_id) else {
            return 0;
        };
        let targets: Vec<SessionId> = members
            .iter()
            .filter(|id| Some(**id) != except)
            .copied()
            .collect();
        let (delivered, dead) = guard.send_all(targets.iter(), msg);
        guard.prune(dead);
        delivered
    }

    /// Deliver to every session of a user; returns the number of deliveries
    pub async fn send_to_user(&self, user_id: Uuid, msg: &str) -> usize {
        let mut guard = self.inner.write().await;
        let Some(sessions) = guard.users.get(&user_id) else {
            return 0;
        };
        let targets: Vec<SessionId> = sessions.iter().copied().collect();
        let (delivered, dead) = guard.send_all(targets.iter(), msg);
        guard.prune(dead);
        delivered
    }

    pub async fn send_to_session(&self, session_id: SessionId, msg: &str) -> bool {
        let mut guard = self.inner.write().await;
        let (delivered, dead) = guard.send_all(std::iter::once(&session_id), msg);
        guard.prune(dead);
        delivered == 1
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.users.contains_key(&user_id)
    }

    /// Session count for a room (for debugging)
    pub async fn room_size(&self, conversation_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.rooms.get(&conversation_id).map(|m| m.len()).unwrap_or(0)
    }
}
