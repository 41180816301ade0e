use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    pub data_backend: String,
    pub store_base_url: String,
    pub store_service_key: String,
    pub store_timeout_ms: u64,
    pub service_token: String,
    pub delivery_delay_ms: i64,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub worker_poll_interval_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("store_base_url", "http://127.0.0.1:54321")?
            .set_default("store_service_key", "")?
            .set_default("store_timeout_ms", 5_000)?
            .set_default("service_token", "")?
            .set_default("delivery_delay_ms", 900_000)?
            .set_default("email_api_url", "https://api.resend.com/emails")?
            .set_default("email_api_key", "")?
            .set_default("email_from", "SeaDrift <noreply@seadrift.app>")?
            .set_default("worker_poll_interval_ms", 60_000)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}
