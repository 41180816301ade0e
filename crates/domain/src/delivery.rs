use std::sync::Arc;

use serde::Serialize;

use crate::capsule::DeliveryQueueItem;
use crate::ports::delivery::{DeliveryQueueRepository, SentBottleRepository};
use crate::ports::rpc::DailyCounterRpc;
use crate::util::now_ms;
use crate::DomainResult;

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct DeliveryReport {
    pub checked: u64,
    pub delivered: u64,
    pub errors: u64,
}

/// Drains due, undelivered queue items. The transition is a two-step saga:
/// sent bottle first, queue item second, so a delivered queue item always
/// implies a delivered sent bottle. A failed item stays queued and is
/// retried on the next sweep; both updates re-apply the same target state.
#[derive(Clone)]
pub struct DeliveryService {
    queue: Arc<dyn DeliveryQueueRepository>,
    sent_bottles: Arc<dyn SentBottleRepository>,
    daily_counter: Arc<dyn DailyCounterRpc>,
}

impl DeliveryService {
    pub fn new(
        queue: Arc<dyn DeliveryQueueRepository>,
        sent_bottles: Arc<dyn SentBottleRepository>,
        daily_counter: Arc<dyn DailyCounterRpc>,
    ) -> Self {
        Self {
            queue,
            sent_bottles,
            daily_counter,
        }
    }

    pub async fn run(&self) -> DomainResult<DeliveryReport> {
        let now = now_ms();
        let due = self.queue.list_due(now).await?;

        let mut report = DeliveryReport {
            checked: due.len() as u64,
            ..DeliveryReport::default()
        };

        for item in &due {
            match self.deliver(item, now).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    tracing::warn!(item_id = %item.id, sent_bottle_id = %item.sent_bottle_id, error = %err, "delivery failed; item stays queued");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    async fn deliver(&self, item: &DeliveryQueueItem, now: i64) -> DomainResult<()> {
        self.sent_bottles
            .mark_delivered(&item.sent_bottle_id, now)
            .await?;
        self.queue.mark_delivered(&item.id, now).await?;

        // Best-effort: a failed counter update does not undo the delivery.
        if let Err(err) = self
            .daily_counter
            .increment_daily_received(&item.recipient_id)
            .await
        {
            tracing::warn!(recipient_id = %item.recipient_id, error = %err, "daily counter increment failed; delivery unaffected");
        }

        Ok(())
    }
}
