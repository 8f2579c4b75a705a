use crate::error::AppError;
use crate::middleware::guards::ConversationAccess;
use crate::models::User;
use crate::services::UserService;
use crate::state::AppState;
use crate::websocket::message_types::{WsInboundEvent, WsOutboundEvent};
use crate::websocket::{PresenceRegistry, SessionId};
use actix::{Actor, ActorContext, AsyncContext, StreamHandler, WrapFuture};
use actix_middleware::{bearer_token, AuthSubject};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use error_types::error_codes;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// WebSocket actor, one per connection
struct WsSession {
    session_id: SessionId,
    user: User,
    state: AppState,
    hb: Instant,
    outbound: Option<UnboundedReceiver<String>>,
}

impl WsSession {
    fn new(
        session_id: SessionId,
        user: User,
        state: AppState,
        outbound: UnboundedReceiver<String>,
    ) -> Self {
        Self {
            session_id,
            user,
            state,
            hb: Instant::now(),
            outbound: Some(outbound),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    user_id = %act.user.id,
                    "WebSocket heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_event(&self, evt: WsInboundEvent, ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.state.clone();
        let session_id = self.session_id;
        let user_id = self.user.id;
        let display_name = self.user.display_name().to_string();

        let fut = async move {
            if let Err(e) = handle_ws_event(&state, session_id, user_id, display_name, evt).await {
                let event = WsOutboundEvent::error(e.public_message());
                reply(&state.registry, session_id, event).await;
            }
        };
        // Client frames are handled one at a time, in arrival order.
        ctx.wait(fut.into_actor(self));
    }
}

async fn reply(registry: &PresenceRegistry, session_id: SessionId, event: WsOutboundEvent) {
    if let Some(payload) = event.to_json() {
        registry.send_to_session(session_id, &payload).await;
    }
}

async fn handle_ws_event(
    state: &AppState,
    session_id: SessionId,
    user_id: Uuid,
    display_name: String,
    evt: WsInboundEvent,
) -> Result<(), AppError> {
    match evt {
        WsInboundEvent::JoinConversation { conversation_id } => {
            let user = UserService::find(state.store.as_ref(), user_id).await?;
            ConversationAccess::verify_member(state.store.as_ref(), user, conversation_id)
                .await?;
            state.registry.join(session_id, conversation_id).await;
            tracing::debug!(
                user_id = %user_id,
                conversation_id = %conversation_id,
                room_size = state.registry.room_size(conversation_id).await,
                "session joined conversation"
            );
            reply(
                &state.registry,
                session_id,
                WsOutboundEvent::Joined { conversation_id },
            )
            .await;
        }

        WsInboundEvent::LeaveConversation { conversation_id } => {
            state.registry.leave(session_id, conversation_id).await;
        }

        WsInboundEvent::TypingStart {
            conversation_id,
            display_name: shown,
        } => {
            let name = shown.unwrap_or(display_name);
            broadcast_typing(state, session_id, conversation_id, user_id, name, true).await?;
        }

        WsInboundEvent::TypingStop {
            conversation_id,
            display_name: shown,
        } => {
            let name = shown.unwrap_or(display_name);
            broadcast_typing(state, session_id, conversation_id, user_id, name, false).await?;
        }
    }
    Ok(())
}

async fn broadcast_typing(
    state: &AppState,
    session_id: SessionId,
    conversation_id: Uuid,
    user_id: Uuid,
    display_name: String,
    is_typing: bool,
) -> Result<(), AppError> {
    if !state.registry.in_room(session_id, conversation_id).await {
        return Err(AppError::forbidden(
            error_codes::ROOM_NOT_JOINED,
            "Join the conversation before sending typing events",
        ));
    }

    let event = WsOutboundEvent::TypingUpdate {
        conversation_id,
        user_id,
        display_name,
        is_typing,
    };
    if let Some(payload) = event.to_json() {
        state
            .registry
            .broadcast_room_except(conversation_id, session_id, &payload)
            .await;
    }
    Ok(())
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user.id, "WebSocket session started");
        self.hb(ctx);

        // Frames queued in the registry are written by the StreamHandler<String> impl.
        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user.id, "WebSocket session stopped");

        let registry = self.state.registry.clone();
        let session_id = self.session_id;
        actix::spawn(async move {
            registry.disconnect(session_id).await;
        });
    }
}

// Outbound frames from the presence registry
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, msg: String, ctx: &mut Self::Context) {
        ctx.text(msg);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

// WebSocket protocol messages from the client
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match serde_json::from_str::<WsInboundEvent>(&text) {
                    Ok(evt) => self.handle_event(evt, ctx),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to parse WS message");
                        if let Some(payload) =
                            WsOutboundEvent::error("Unrecognized event").to_json()
                        {
                            ctx.text(payload);
                        }
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// GET /ws?token=... (or `Authorization: Bearer`)
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(req.headers()));

    let Some(token) = token else {
        tracing::warn!("WebSocket connection rejected: no token provided");
        return Err(AppError::Unauthorized.into());
    };

    let claims = state.jwt.verify(token).map_err(|e| {
        tracing::warn!(error = %e, "WebSocket connection rejected: invalid token");
        AppError::Unauthorized
    })?;

    let user = UserService::ensure_user(state.store.as_ref(), &AuthSubject::from(claims)).await?;
    let (session_id, rx) = state.registry.connect(user.id).await;

    let session = WsSession::new(session_id, user, state.get_ref().clone(), rx);
    match ws::start(session, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            state.registry.disconnect(session_id).await;
            Err(e)
        }
    }
}
