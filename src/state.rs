use crate::config::AppConfig;
use crate::crypto::FieldCipher;
use crate::middleware::RateLimiter;
use crate::services::{
    access_rules::AccessRulesService, training::TrainingService, widget_settings::WidgetSettingsService,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cipher: Arc<FieldCipher>,
    pub session_key: Vec<u8>,
    pub secure_cookies: bool,
    pub access_rules: AccessRulesService,
    pub widgets: WidgetSettingsService,
    pub training: TrainingService,
    pub login_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        pool: PgPool,
        config: &AppConfig,
        cipher: FieldCipher,
        access_rules: AccessRulesService,
        widgets: WidgetSettingsService,
        training: TrainingService,
    ) -> Self {
        Self {
            pool,
            cipher: Arc::new(cipher),
            session_key: config.session_key.clone(),
            secure_cookies: config.secure_cookies,
            access_rules,
            widgets,
            training,
            // 5 sign-in attempts per minute per client
            login_limiter: RateLimiter::new(5, 60),
        }
    }
}
