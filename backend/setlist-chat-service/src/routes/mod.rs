pub mod conversations;
pub mod messages;
pub mod users;
pub mod wsroute;

use crate::error::AppError;
use crate::state::AppState;
use actix_middleware::JwtAuthMiddleware;
use actix_web::web;

/// Register the HTTP surface: `/health`, the authenticated `/api` scope and `/ws`.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.clone()))
        .app_data(
            web::PathConfig::default()
                .error_handler(|_, _| AppError::BadRequest("Invalid id".into()).into()),
        )
        .app_data(web::JsonConfig::default().error_handler(|err, _| {
            AppError::BadRequest(format!("Invalid request body: {err}")).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _| {
            AppError::BadRequest(format!("Invalid query: {err}")).into()
        }))
        .route("/health", web::get().to(|| async { "OK" }))
        .service(wsroute::ws_handler)
        .service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::new(state.jwt.clone()))
                // conversations
                .service(conversations::get_conversations)
                .service(conversations::create_conversation)
                .service(conversations::get_conversation)
                .service(conversations::delete_conversation)
                .service(conversations::archive_conversation)
                // messages
                .service(messages::get_messages)
                .service(messages::send_message)
                .service(messages::mark_read)
                .service(messages::delete_message)
                // users: `me` routes before `{id}`
                .service(users::get_me)
                .service(users::update_profile)
                .service(users::get_blocked_users)
                .service(users::get_user)
                .service(users::block_user)
                .service(users::unblock_user),
        );
}
