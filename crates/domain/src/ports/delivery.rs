use crate::capsule::DeliveryQueueItem;
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait DeliveryQueueRepository: Send + Sync {
    fn enqueue(&self, item: &DeliveryQueueItem) -> BoxFuture<'_, DomainResult<()>>;

    /// Undelivered items whose scheduled time has passed.
    fn list_due(&self, now_ms: i64) -> BoxFuture<'_, DomainResult<Vec<DeliveryQueueItem>>>;

    fn mark_delivered(
        &self,
        item_id: &str,
        delivered_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>>;
}

pub trait SentBottleRepository: Send + Sync {
    /// Sets status=delivered. Idempotent: re-applying the same target state
    /// is a no-op.
    fn mark_delivered(
        &self,
        bottle_id: &str,
        delivered_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>>;
}
