use thiserror::Error;

use crate::ports::BoxFuture;
use crate::profile::GeoPoint;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc unavailable: {0}")]
    Unavailable(String),
    #[error("rpc call failed: {0}")]
    Operation(String),
}

/// Great-circle distance, computed store-side.
pub trait DistanceRpc: Send + Sync {
    fn distance_km(&self, from: GeoPoint, to: GeoPoint) -> BoxFuture<'_, Result<f64, RpcError>>;
}

/// Per-recipient daily-received counter. Atomic on the store side,
/// best-effort from the scheduler's perspective.
pub trait DailyCounterRpc: Send + Sync {
    fn increment_daily_received(&self, user_id: &str) -> BoxFuture<'_, Result<(), RpcError>>;
}
