use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use seadrift_domain::capsule::{
    CapsuleMatch, DeliveryQueueItem, OutboxEntry, ReceivedMessage, SentBottle, SentBottleStatus,
};
use seadrift_domain::entitlements::Entitlement;
use seadrift_domain::error::DomainError;
use seadrift_domain::ports::delivery::{DeliveryQueueRepository, SentBottleRepository};
use seadrift_domain::ports::entitlements::EntitlementRepository;
use seadrift_domain::ports::fanout::FanoutRepository;
use seadrift_domain::ports::outbox::OutboxRepository;
use seadrift_domain::ports::profiles::ProfileRepository;
use seadrift_domain::ports::rpc::{DailyCounterRpc, DistanceRpc, RpcError};
use seadrift_domain::ports::BoxFuture;
use seadrift_domain::profile::{CandidateProfile, GeoPoint};
use seadrift_domain::DomainResult;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Default)]
pub struct InMemoryOutboxRepository {
    entries: Arc<RwLock<Vec<OutboxEntry>>>,
    fail_reads: AtomicBool,
}

impl InMemoryOutboxRepository {
    pub async fn push(&self, entry: OutboxEntry) {
        self.entries.write().await.push(entry);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Vec<OutboxEntry> {
        self.entries.read().await.clone()
    }
}

impl OutboxRepository for InMemoryOutboxRepository {
    fn list_unprocessed(&self) -> BoxFuture<'_, DomainResult<Vec<OutboxEntry>>> {
        let entries = self.entries.clone();
        let fail = self.fail_reads.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                return Err(DomainError::Unavailable("outbox read failed".into()));
            }
            let entries = entries.read().await;
            let mut unprocessed: Vec<_> = entries
                .iter()
                .filter(|entry| entry.processed_at_ms.is_none())
                .cloned()
                .collect();
            unprocessed.sort_by_key(|entry| entry.created_at_ms);
            Ok(unprocessed)
        })
    }

    fn mark_processed(
        &self,
        outbox_id: &str,
        processed_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let outbox_id = outbox_id.to_string();
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut entries = entries.write().await;
            let entry = entries
                .iter_mut()
                .find(|entry| entry.id == outbox_id)
                .ok_or(DomainError::NotFound)?;
            entry.processed_at_ms = Some(processed_at_ms);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: Arc<RwLock<HashMap<String, CandidateProfile>>>,
}

impl InMemoryProfileRepository {
    pub async fn upsert(&self, profile: CandidateProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }
}

impl ProfileRepository for InMemoryProfileRepository {
    fn list_candidates(
        &self,
        exclude_sender_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<CandidateProfile>>> {
        let exclude_sender_id = exclude_sender_id.to_string();
        let profiles = self.profiles.clone();
        Box::pin(async move {
            let profiles = profiles.read().await;
            let mut candidates: Vec<_> = profiles
                .values()
                .filter(|profile| profile.receive_bottles && profile.id != exclude_sender_id)
                .cloned()
                .collect();
            candidates.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(candidates)
        })
    }

    fn location(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<GeoPoint>>> {
        let user_id = user_id.to_string();
        let profiles = self.profiles.clone();
        Box::pin(async move {
            let profiles = profiles.read().await;
            Ok(profiles
                .get(&user_id)
                .and_then(CandidateProfile::location))
        })
    }
}

#[derive(Default)]
pub struct InMemoryFanoutRepository {
    matches: Arc<RwLock<HashMap<(String, String), CapsuleMatch>>>,
    messages: Arc<RwLock<Vec<ReceivedMessage>>>,
}

impl InMemoryFanoutRepository {
    pub async fn matches_snapshot(&self) -> Vec<CapsuleMatch> {
        self.matches.read().await.values().cloned().collect()
    }

    pub async fn messages_snapshot(&self) -> Vec<ReceivedMessage> {
        self.messages.read().await.clone()
    }
}

impl FanoutRepository for InMemoryFanoutRepository {
    fn create_match(&self, capsule_match: &CapsuleMatch) -> BoxFuture<'_, DomainResult<()>> {
        let capsule_match = capsule_match.clone();
        let matches = self.matches.clone();
        Box::pin(async move {
            let key = (
                capsule_match.outbox_id.clone(),
                capsule_match.recipient_id.clone(),
            );
            let mut matches = matches.write().await;
            if matches.contains_key(&key) {
                return Err(DomainError::Conflict);
            }
            matches.insert(key, capsule_match);
            Ok(())
        })
    }

    fn create_received_message(
        &self,
        message: &ReceivedMessage,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let message = message.clone();
        let messages = self.messages.clone();
        Box::pin(async move {
            messages.write().await.push(message);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct InMemoryDeliveryQueueRepository {
    items: Arc<RwLock<HashMap<String, DeliveryQueueItem>>>,
}

impl InMemoryDeliveryQueueRepository {
    pub async fn push(&self, item: DeliveryQueueItem) {
        self.items.write().await.insert(item.id.clone(), item);
    }

    pub async fn snapshot(&self) -> Vec<DeliveryQueueItem> {
        self.items.read().await.values().cloned().collect()
    }
}

impl DeliveryQueueRepository for InMemoryDeliveryQueueRepository {
    fn enqueue(&self, item: &DeliveryQueueItem) -> BoxFuture<'_, DomainResult<()>> {
        let item = item.clone();
        let items = self.items.clone();
        Box::pin(async move {
            let mut items = items.write().await;
            if items.contains_key(&item.id) {
                return Err(DomainError::Conflict);
            }
            items.insert(item.id.clone(), item);
            Ok(())
        })
    }

    fn list_due(&self, now_ms: i64) -> BoxFuture<'_, DomainResult<Vec<DeliveryQueueItem>>> {
        let items = self.items.clone();
        Box::pin(async move {
            let items = items.read().await;
            let mut due: Vec<_> = items
                .values()
                .filter(|item| !item.delivered && item.scheduled_delivery_at_ms <= now_ms)
                .cloned()
                .collect();
            due.sort_by_key(|item| item.scheduled_delivery_at_ms);
            Ok(due)
        })
    }

    fn mark_delivered(
        &self,
        item_id: &str,
        delivered_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let item_id = item_id.to_string();
        let items = self.items.clone();
        Box::pin(async move {
            let mut items = items.write().await;
            let item = items.get_mut(&item_id).ok_or(DomainError::NotFound)?;
            item.delivered = true;
            item.delivered_at_ms = Some(delivered_at_ms);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct InMemorySentBottleRepository {
    bottles: Arc<RwLock<HashMap<String, SentBottle>>>,
    fail_updates: AtomicBool,
}

impl InMemorySentBottleRepository {
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, bottle_id: &str) -> Option<SentBottle> {
        self.bottles.read().await.get(bottle_id).cloned()
    }
}

impl SentBottleRepository for InMemorySentBottleRepository {
    fn mark_delivered(
        &self,
        bottle_id: &str,
        delivered_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let bottle_id = bottle_id.to_string();
        let bottles = self.bottles.clone();
        let fail = self.fail_updates.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                return Err(DomainError::Store("sent bottle update failed".into()));
            }
            let mut bottles = bottles.write().await;
            let bottle = bottles.entry(bottle_id.clone()).or_insert(SentBottle {
                id: bottle_id,
                status: SentBottleStatus::Pending,
                delivered_at_ms: None,
            });
            bottle.status = SentBottleStatus::Delivered;
            bottle.delivered_at_ms = Some(delivered_at_ms);
            Ok(())
        })
    }
}

/// Local stand-in for the store-side `haversine_km` RPC.
#[derive(Default)]
pub struct InMemoryDistanceRpc;

pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

impl DistanceRpc for InMemoryDistanceRpc {
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<f64, RpcError>> {
        Box::pin(async move { Ok(haversine_km(from, to)) })
    }
}

#[derive(Default)]
pub struct InMemoryDailyCounterRpc {
    counts: Arc<RwLock<HashMap<String, u64>>>,
    fail_increments: AtomicBool,
}

impl InMemoryDailyCounterRpc {
    pub fn set_fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    pub async fn count_for(&self, user_id: &str) -> u64 {
        self.counts
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }
}

impl DailyCounterRpc for InMemoryDailyCounterRpc {
    fn increment_daily_received(&self, user_id: &str) -> BoxFuture<'_, Result<(), RpcError>> {
        let user_id = user_id.to_string();
        let counts = self.counts.clone();
        let fail = self.fail_increments.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                return Err(RpcError::Operation("counter increment failed".into()));
            }
            *counts.write().await.entry(user_id).or_insert(0) += 1;
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct InMemoryEntitlementRepository {
    entitlements: Arc<RwLock<HashMap<String, Entitlement>>>,
}

impl InMemoryEntitlementRepository {
    pub async fn get(&self, user_id: &str) -> Option<Entitlement> {
        self.entitlements.read().await.get(user_id).cloned()
    }
}

impl EntitlementRepository for InMemoryEntitlementRepository {
    fn upsert(&self, entitlement: &Entitlement) -> BoxFuture<'_, DomainResult<()>> {
        let entitlement = entitlement.clone();
        let entitlements = self.entitlements.clone();
        Box::pin(async move {
            entitlements
                .write()
                .await
                .insert(entitlement.user_id.clone(), entitlement);
            Ok(())
        })
    }
}
