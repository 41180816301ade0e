use std::sync::Arc;

use seadrift_domain::delivery::DeliveryService;
use seadrift_domain::entitlements::EntitlementService;
use seadrift_domain::matching::MatchingService;
use seadrift_infra::config::AppConfig;
use seadrift_infra::email::EmailClient;
use seadrift_infra::repositories::Repositories;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub matching: MatchingService,
    pub delivery: DeliveryService,
    pub entitlements: EntitlementService,
    pub email: Arc<EmailClient>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let repositories = Repositories::from_config(&config)?;
        Self::with_repositories(config, repositories)
    }

    pub fn with_repositories(
        config: AppConfig,
        repositories: Repositories,
    ) -> anyhow::Result<Self> {
        let matching = MatchingService::new(
            repositories.outbox.clone(),
            repositories.profiles.clone(),
            repositories.fanout.clone(),
            repositories.delivery_queue.clone(),
            repositories.distance.clone(),
            config.delivery_delay_ms,
        );
        let delivery = DeliveryService::new(
            repositories.delivery_queue.clone(),
            repositories.sent_bottles.clone(),
            repositories.daily_counter.clone(),
        );
        let entitlements = EntitlementService::new(repositories.entitlements.clone());
        let email = Arc::new(EmailClient::new(&config)?);

        Ok(Self {
            config,
            matching,
            delivery,
            entitlements,
            email,
        })
    }
}
