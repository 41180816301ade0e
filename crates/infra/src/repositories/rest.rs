use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use seadrift_domain::capsule::{CapsuleMatch, DeliveryQueueItem, OutboxEntry, ReceivedMessage};
use seadrift_domain::entitlements::Entitlement;
use seadrift_domain::error::DomainError;
use seadrift_domain::ports::delivery::{DeliveryQueueRepository, SentBottleRepository};
use seadrift_domain::ports::entitlements::EntitlementRepository;
use seadrift_domain::ports::fanout::FanoutRepository;
use seadrift_domain::ports::outbox::OutboxRepository;
use seadrift_domain::ports::profiles::ProfileRepository;
use seadrift_domain::ports::rpc::{DailyCounterRpc, DistanceRpc, RpcError};
use seadrift_domain::ports::BoxFuture;
use seadrift_domain::profile::{CandidateProfile, Gender, GeoPoint};
use seadrift_domain::util::{format_ms_rfc3339, parse_rfc3339_ms};
use seadrift_domain::DomainResult;

use crate::rest::{RestClient, RestError};

const TABLE_OUTBOX: &str = "messages_outbox";
const TABLE_PROFILES: &str = "profiles";
const TABLE_MATCHES: &str = "matches";
const TABLE_RECEIVED: &str = "received_bottles";
const TABLE_QUEUE: &str = "bottle_delivery_queue";
const TABLE_SENT: &str = "sent_bottles";
const TABLE_ENTITLEMENTS: &str = "entitlements";

const RPC_DISTANCE: &str = "haversine_km";
const RPC_DAILY_COUNTER: &str = "increment_bottles_received";

fn store_error(err: RestError) -> DomainError {
    if err.is_conflict() {
        return DomainError::Conflict;
    }
    match err {
        RestError::Transport(message) | RestError::Configuration(message) => {
            DomainError::Unavailable(message)
        }
        other => DomainError::Store(other.to_string()),
    }
}

fn rpc_error(err: RestError) -> RpcError {
    match err {
        RestError::Transport(message) | RestError::Configuration(message) => {
            RpcError::Unavailable(message)
        }
        other => RpcError::Operation(other.to_string()),
    }
}

fn decode_rows<T: for<'de> Deserialize<'de>>(value: Value) -> DomainResult<Vec<T>> {
    serde_json::from_value(value).map_err(|err| DomainError::Store(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct OutboxRow {
    id: String,
    sender_id: String,
    text: String,
    target_gender: Option<String>,
    min_age: Option<i32>,
    max_age: Option<i32>,
    max_distance_km: Option<f64>,
    created_at: String,
    processed_at: Option<String>,
}

impl From<OutboxRow> for OutboxEntry {
    fn from(row: OutboxRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            text: row.text,
            target_gender: row.target_gender.as_deref().and_then(|raw| raw.parse().ok()),
            min_age: row.min_age,
            max_age: row.max_age,
            max_distance_km: row.max_distance_km,
            created_at_ms: parse_rfc3339_ms(&row.created_at).unwrap_or_default(),
            processed_at_ms: row.processed_at.as_deref().and_then(parse_rfc3339_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    lat: Option<f64>,
    lng: Option<f64>,
    birth_year: Option<i32>,
    gender: Option<String>,
    #[serde(default)]
    receive_bottles: bool,
}

impl From<ProfileRow> for CandidateProfile {
    fn from(row: ProfileRow) -> Self {
        let gender = row.gender.as_deref().map(|raw| match raw {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Other,
        });
        Self {
            id: row.id,
            lat: row.lat,
            lng: row.lng,
            birth_year: row.birth_year,
            gender,
            receive_bottles: row.receive_bottles,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueueRow {
    id: String,
    sent_bottle_id: String,
    recipient_id: String,
    scheduled_delivery_at: String,
    delivered: bool,
    delivered_at: Option<String>,
}

impl From<QueueRow> for DeliveryQueueItem {
    fn from(row: QueueRow) -> Self {
        Self {
            id: row.id,
            sent_bottle_id: row.sent_bottle_id,
            recipient_id: row.recipient_id,
            scheduled_delivery_at_ms: parse_rfc3339_ms(&row.scheduled_delivery_at)
                .unwrap_or_default(),
            delivered: row.delivered,
            delivered_at_ms: row.delivered_at.as_deref().and_then(parse_rfc3339_ms),
        }
    }
}

pub struct RestOutboxRepository {
    client: Arc<RestClient>,
}

impl RestOutboxRepository {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl OutboxRepository for RestOutboxRepository {
    fn list_unprocessed(&self) -> BoxFuture<'_, DomainResult<Vec<OutboxEntry>>> {
        Box::pin(async move {
            let rows = self
                .client
                .select(&format!(
                    "{TABLE_OUTBOX}?processed_at=is.null&order=created_at.asc"
                ))
                .await
                .map_err(store_error)?;
            let rows: Vec<OutboxRow> = decode_rows(rows)?;
            Ok(rows.into_iter().map(OutboxEntry::from).collect())
        })
    }

    fn mark_processed(
        &self,
        outbox_id: &str,
        processed_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let outbox_id = outbox_id.to_string();
        Box::pin(async move {
            self.client
                .update(
                    &format!("{TABLE_OUTBOX}?id=eq.{outbox_id}"),
                    &json!({ "processed_at": format_ms_rfc3339(processed_at_ms) }),
                )
                .await
                .map_err(store_error)
        })
    }
}

pub struct RestProfileRepository {
    client: Arc<RestClient>,
}

impl RestProfileRepository {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl ProfileRepository for RestProfileRepository {
    fn list_candidates(
        &self,
        exclude_sender_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<CandidateProfile>>> {
        let exclude_sender_id = exclude_sender_id.to_string();
        Box::pin(async move {
            let rows = self
                .client
                .select(&format!(
                    "{TABLE_PROFILES}?receive_bottles=eq.true&id=neq.{exclude_sender_id}&select=id,lat,lng,birth_year,gender,receive_bottles"
                ))
                .await
                .map_err(store_error)?;
            let rows: Vec<ProfileRow> = decode_rows(rows)?;
            Ok(rows.into_iter().map(CandidateProfile::from).collect())
        })
    }

    fn location(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<GeoPoint>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let rows = self
                .client
                .select(&format!("{TABLE_PROFILES}?id=eq.{user_id}&select=lat,lng"))
                .await
                .map_err(store_error)?;

            #[derive(Debug, Deserialize)]
            struct LocationRow {
                lat: Option<f64>,
                lng: Option<f64>,
            }

            let rows: Vec<LocationRow> = decode_rows(rows)?;
            Ok(rows.into_iter().next().and_then(|row| match (row.lat, row.lng) {
                (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
                _ => None,
            }))
        })
    }
}

pub struct RestFanoutRepository {
    client: Arc<RestClient>,
}

impl RestFanoutRepository {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl FanoutRepository for RestFanoutRepository {
    fn create_match(&self, capsule_match: &CapsuleMatch) -> BoxFuture<'_, DomainResult<()>> {
        let body = json!({
            "outbox_id": capsule_match.outbox_id,
            "recipient_id": capsule_match.recipient_id,
            "created_at": format_ms_rfc3339(capsule_match.created_at_ms),
        });
        Box::pin(async move {
            self.client
                .insert(TABLE_MATCHES, &body)
                .await
                .map_err(store_error)
        })
    }

    fn create_received_message(
        &self,
        message: &ReceivedMessage,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let body = json!({
            "receiver_id": message.receiver_id,
            "sender_id": message.sender_id,
            "content_type": message.content_type,
            "message": message.message,
            "is_read": message.is_read,
            "is_replied": message.is_replied,
        });
        Box::pin(async move {
            self.client
                .insert(TABLE_RECEIVED, &body)
                .await
                .map_err(store_error)
        })
    }
}

pub struct RestDeliveryQueueRepository {
    client: Arc<RestClient>,
}

impl RestDeliveryQueueRepository {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl DeliveryQueueRepository for RestDeliveryQueueRepository {
    fn enqueue(&self, item: &DeliveryQueueItem) -> BoxFuture<'_, DomainResult<()>> {
        let body = json!({
            "id": item.id,
            "sent_bottle_id": item.sent_bottle_id,
            "recipient_id": item.recipient_id,
            "scheduled_delivery_at": format_ms_rfc3339(item.scheduled_delivery_at_ms),
            "delivered": item.delivered,
        });
        Box::pin(async move {
            self.client
                .insert(TABLE_QUEUE, &body)
                .await
                .map_err(store_error)
        })
    }

    fn list_due(&self, now_ms: i64) -> BoxFuture<'_, DomainResult<Vec<DeliveryQueueItem>>> {
        let cutoff = format_ms_rfc3339(now_ms);
        Box::pin(async move {
            let rows = self
                .client
                .select(&format!(
                    "{TABLE_QUEUE}?delivered=eq.false&scheduled_delivery_at=lte.{cutoff}"
                ))
                .await
                .map_err(store_error)?;
            let rows: Vec<QueueRow> = decode_rows(rows)?;
            Ok(rows.into_iter().map(DeliveryQueueItem::from).collect())
        })
    }

    fn mark_delivered(
        &self,
        item_id: &str,
        delivered_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let item_id = item_id.to_string();
        Box::pin(async move {
            self.client
                .update(
                    &format!("{TABLE_QUEUE}?id=eq.{item_id}"),
                    &json!({
                        "delivered": true,
                        "delivered_at": format_ms_rfc3339(delivered_at_ms),
                    }),
                )
                .await
                .map_err(store_error)
        })
    }
}

pub struct RestSentBottleRepository {
    client: Arc<RestClient>,
}

impl RestSentBottleRepository {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl SentBottleRepository for RestSentBottleRepository {
    fn mark_delivered(
        &self,
        bottle_id: &str,
        delivered_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let bottle_id = bottle_id.to_string();
        Box::pin(async move {
            self.client
                .update(
                    &format!("{TABLE_SENT}?id=eq.{bottle_id}"),
                    &json!({
                        "status": "delivered",
                        "delivered_at": format_ms_rfc3339(delivered_at_ms),
                    }),
                )
                .await
                .map_err(store_error)
        })
    }
}

pub struct RestDistanceRpc {
    client: Arc<RestClient>,
}

impl RestDistanceRpc {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl DistanceRpc for RestDistanceRpc {
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<f64, RpcError>> {
        Box::pin(async move {
            let value = self
                .client
                .rpc(
                    RPC_DISTANCE,
                    &json!({
                        "lat1": from.lat,
                        "lon1": from.lng,
                        "lat2": to.lat,
                        "lon2": to.lng,
                    }),
                )
                .await
                .map_err(rpc_error)?;
            value
                .as_f64()
                .ok_or_else(|| RpcError::Operation("distance rpc returned a non-number".into()))
        })
    }
}

pub struct RestDailyCounterRpc {
    client: Arc<RestClient>,
}

impl RestDailyCounterRpc {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl DailyCounterRpc for RestDailyCounterRpc {
    fn increment_daily_received(&self, user_id: &str) -> BoxFuture<'_, Result<(), RpcError>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            self.client
                .rpc(RPC_DAILY_COUNTER, &json!({ "user_id": user_id }))
                .await
                .map_err(rpc_error)?;
            Ok(())
        })
    }
}

pub struct RestEntitlementRepository {
    client: Arc<RestClient>,
}

impl RestEntitlementRepository {
    pub fn new(client: Arc<RestClient>) -> Self {
        Self { client }
    }
}

impl EntitlementRepository for RestEntitlementRepository {
    fn upsert(&self, entitlement: &Entitlement) -> BoxFuture<'_, DomainResult<()>> {
        let body = json!({
            "user_id": entitlement.user_id,
            "tier": entitlement.tier.as_str(),
            "source": entitlement.source,
            "expires_at": entitlement.expires_at_ms.map(format_ms_rfc3339),
            "updated_at": format_ms_rfc3339(entitlement.updated_at_ms),
        });
        Box::pin(async move {
            self.client
                .upsert(TABLE_ENTITLEMENTS, "user_id", &body)
                .await
                .map_err(store_error)
        })
    }
}
