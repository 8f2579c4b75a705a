use actix_web::{App, HttpServer};
use setlist_chat_service::{
    config, db, error, logging,
    repository::{ChatStore, MemoryStore, PgStore},
    routes,
    state::AppState,
};
use std::sync::Arc;

fn build_cors(allowed_origins: &[String]) -> actix_cors::Cors {
    let cors = actix_cors::Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    let cfg = Arc::new(config::Config::from_env()?);
    logging::init_tracing(cfg.log_json);

    let store: Arc<dyn ChatStore> = match &cfg.database_url {
        Some(url) => {
            let pool = db::init_pool(url, cfg.db_max_connections)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let jwt = Arc::new(cfg.jwt.verifier()?);
    let state = AppState::new(store, cfg.clone(), jwt);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting setlist-chat-service");

    let origins = cfg.cors_allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&origins))
            .wrap(actix_middleware::Logging)
            .wrap(actix_middleware::RequestId::new())
            .configure(|cfg| routes::configure_routes(cfg, &state))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
