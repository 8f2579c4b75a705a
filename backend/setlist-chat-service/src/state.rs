use crate::{
    config::Config,
    repository::ChatStore,
    services::message_service::PageLimits,
    websocket::{Notifier, PresenceRegistry},
};
use actix_middleware::JwtVerifier;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub registry: PresenceRegistry,
    pub notifier: Notifier,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn ChatStore>, config: Arc<Config>, jwt: Arc<JwtVerifier>) -> Self {
        let registry = PresenceRegistry::new();
        Self {
            store,
            notifier: Notifier::new(registry.clone()),
            registry,
            config,
            jwt,
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default: self.config.message_page_size,
            max: self.config.message_page_max,
        }
    }
}
