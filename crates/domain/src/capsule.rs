use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::profile::Gender;

/// Recipients per capsule are capped regardless of candidate-pool size.
pub const FANOUT_CAP: usize = 20;

pub const DEFAULT_MIN_AGE: i32 = 18;
pub const DEFAULT_MAX_AGE: i32 = 100;
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 100.0;

pub const CONTENT_TYPE_TEXT: &str = "text";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetGender {
    Male,
    Female,
    Everyone,
}

impl TargetGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Everyone => "everyone",
        }
    }

    pub fn accepts(&self, gender: Option<Gender>) -> bool {
        match self {
            Self::Everyone => true,
            Self::Male => gender == Some(Gender::Male),
            Self::Female => gender == Some(Gender::Female),
        }
    }
}

impl FromStr for TargetGender {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "everyone" => Ok(Self::Everyone),
            _ => Err("unknown target gender"),
        }
    }
}

/// A capsule waiting in the outbox. Immutable once created; the matching
/// sweep stamps `processed_at_ms` after fan-out so an entry is consumed
/// exactly once.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutboxEntry {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    pub target_gender: Option<TargetGender>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub max_distance_km: Option<f64>,
    pub created_at_ms: i64,
    pub processed_at_ms: Option<i64>,
}

/// Targeting criteria with the defaults applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetCriteria {
    pub min_age: i32,
    pub max_age: i32,
    pub target_gender: TargetGender,
    pub max_distance_km: f64,
}

impl TargetCriteria {
    pub fn for_entry(entry: &OutboxEntry) -> Self {
        Self {
            min_age: entry.min_age.unwrap_or(DEFAULT_MIN_AGE),
            max_age: entry.max_age.unwrap_or(DEFAULT_MAX_AGE),
            target_gender: entry.target_gender.unwrap_or(TargetGender::Everyone),
            max_distance_km: entry.max_distance_km.unwrap_or(DEFAULT_MAX_DISTANCE_KM),
        }
    }
}

/// Links one capsule to one selected recipient. At most one per
/// (outbox_id, recipient_id) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CapsuleMatch {
    pub outbox_id: String,
    pub recipient_id: String,
    pub created_at_ms: i64,
}

/// The recipient-visible artifact, created in the same fan-out unit as its
/// match. Visibility is not gated on the delivery flag.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReceivedMessage {
    pub receiver_id: String,
    pub sender_id: String,
    pub content_type: String,
    pub message: String,
    pub is_read: bool,
    pub is_replied: bool,
}

/// Bridges "matched" to "visible as delivered". Transitions once from
/// delivered=false to delivered=true and never reverses.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeliveryQueueItem {
    pub id: String,
    pub sent_bottle_id: String,
    pub recipient_id: String,
    pub scheduled_delivery_at_ms: i64,
    pub delivered: bool,
    pub delivered_at_ms: Option<i64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SentBottleStatus {
    Pending,
    Delivered,
}

impl SentBottleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
        }
    }
}

impl FromStr for SentBottleStatus {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            _ => Err("unknown sent bottle status"),
        }
    }
}

/// Sender-side record of an outgoing capsule instance. Shares the capsule id,
/// so re-applying the delivered update is a no-op.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SentBottle {
    pub id: String,
    pub status: SentBottleStatus,
    pub delivered_at_ms: Option<i64>,
}
