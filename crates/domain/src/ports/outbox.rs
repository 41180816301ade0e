use crate::capsule::OutboxEntry;
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait OutboxRepository: Send + Sync {
    /// Entries without a processed stamp, ascending by creation time.
    fn list_unprocessed(&self) -> BoxFuture<'_, DomainResult<Vec<OutboxEntry>>>;

    fn mark_processed(
        &self,
        outbox_id: &str,
        processed_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>>;
}
