use std::sync::Arc;

use seadrift_domain::ports::delivery::{DeliveryQueueRepository, SentBottleRepository};
use seadrift_domain::ports::entitlements::EntitlementRepository;
use seadrift_domain::ports::fanout::FanoutRepository;
use seadrift_domain::ports::outbox::OutboxRepository;
use seadrift_domain::ports::profiles::ProfileRepository;
use seadrift_domain::ports::rpc::{DailyCounterRpc, DistanceRpc};

use crate::config::AppConfig;
use crate::rest::RestClient;

pub mod memory;
pub mod rest;

/// Every port the matching and delivery services need, behind one bundle so
/// the api and worker binaries share construction.
#[derive(Clone)]
pub struct Repositories {
    pub outbox: Arc<dyn OutboxRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub fanout: Arc<dyn FanoutRepository>,
    pub delivery_queue: Arc<dyn DeliveryQueueRepository>,
    pub sent_bottles: Arc<dyn SentBottleRepository>,
    pub distance: Arc<dyn DistanceRpc>,
    pub daily_counter: Arc<dyn DailyCounterRpc>,
    pub entitlements: Arc<dyn EntitlementRepository>,
}

impl Repositories {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match config.data_backend.as_str() {
            "rest" => {
                let client = Arc::new(RestClient::new(config)?);
                Ok(Self {
                    outbox: Arc::new(rest::RestOutboxRepository::new(client.clone())),
                    profiles: Arc::new(rest::RestProfileRepository::new(client.clone())),
                    fanout: Arc::new(rest::RestFanoutRepository::new(client.clone())),
                    delivery_queue: Arc::new(rest::RestDeliveryQueueRepository::new(
                        client.clone(),
                    )),
                    sent_bottles: Arc::new(rest::RestSentBottleRepository::new(client.clone())),
                    distance: Arc::new(rest::RestDistanceRpc::new(client.clone())),
                    daily_counter: Arc::new(rest::RestDailyCounterRpc::new(client.clone())),
                    entitlements: Arc::new(rest::RestEntitlementRepository::new(client)),
                })
            }
            "memory" => Ok(MemoryBackend::new().repositories()),
            other => anyhow::bail!("unknown data backend: {other}"),
        }
    }
}

/// Concrete in-memory repositories, kept accessible so tests can seed rows
/// and inspect writes.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub outbox: Arc<memory::InMemoryOutboxRepository>,
    pub profiles: Arc<memory::InMemoryProfileRepository>,
    pub fanout: Arc<memory::InMemoryFanoutRepository>,
    pub delivery_queue: Arc<memory::InMemoryDeliveryQueueRepository>,
    pub sent_bottles: Arc<memory::InMemorySentBottleRepository>,
    pub distance: Arc<memory::InMemoryDistanceRpc>,
    pub daily_counter: Arc<memory::InMemoryDailyCounterRpc>,
    pub entitlements: Arc<memory::InMemoryEntitlementRepository>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            outbox: self.outbox.clone(),
            profiles: self.profiles.clone(),
            fanout: self.fanout.clone(),
            delivery_queue: self.delivery_queue.clone(),
            sent_bottles: self.sent_bottles.clone(),
            distance: self.distance.clone(),
            daily_counter: self.daily_counter.clone(),
            entitlements: self.entitlements.clone(),
        }
    }
}
