use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::entitlements::EntitlementRepository;
use crate::util::now_ms;
use crate::DomainResult;

const ELITE_PRICE_PREFIX: &str = "price_elite_";
const SOURCE_STRIPE: &str = "stripe";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Premium,
    Elite,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Elite => "elite",
        }
    }
}

impl FromStr for Tier {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            "elite" => Ok(Self::Elite),
            _ => Err("unknown tier"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entitlement {
    pub user_id: String,
    pub tier: Tier,
    pub source: String,
    pub expires_at_ms: Option<i64>,
    pub updated_at_ms: i64,
}

/// Maps an external subscription event to an entitlement record. Events
/// without a user id are not an error; they are acknowledged and ignored.
pub fn entitlement_from_subscription_event(event: &Value) -> Option<Entitlement> {
    let data = event.get("data").and_then(|data| data.get("object"))?;
    let user_id = data
        .get("metadata")
        .and_then(|metadata| metadata.get("user_id"))
        .and_then(Value::as_str)?;

    let status = data.get("status").and_then(Value::as_str);
    let mut tier = Tier::Free;
    if matches!(status, Some("active") | Some("trialing")) {
        tier = Tier::Premium;
    }
    if let Some(items) = data.get("items").and_then(Value::as_array) {
        let price_id = items
            .first()
            .and_then(|item| item.get("price"))
            .and_then(|price| price.get("id"))
            .and_then(Value::as_str);
        if price_id.is_some_and(|id| id.starts_with(ELITE_PRICE_PREFIX)) {
            tier = Tier::Elite;
        }
    }

    let expires_at_ms = data
        .get("current_period_end")
        .and_then(Value::as_i64)
        .map(|seconds| seconds * 1_000);

    Some(Entitlement {
        user_id: user_id.to_string(),
        tier,
        source: SOURCE_STRIPE.to_string(),
        expires_at_ms,
        updated_at_ms: now_ms(),
    })
}

#[derive(Clone)]
pub struct EntitlementService {
    repository: Arc<dyn EntitlementRepository>,
}

impl EntitlementService {
    pub fn new(repository: Arc<dyn EntitlementRepository>) -> Self {
        Self { repository }
    }

    /// Applies a subscription event. Returns the upserted entitlement, or
    /// `None` when the event carries no user id.
    pub async fn apply_subscription_event(
        &self,
        event: &Value,
    ) -> DomainResult<Option<Entitlement>> {
        let Some(entitlement) = entitlement_from_subscription_event(event) else {
            return Ok(None);
        };
        self.repository.upsert(&entitlement).await?;
        Ok(Some(entitlement))
    }
}
