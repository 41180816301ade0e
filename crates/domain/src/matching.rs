use std::sync::Arc;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::capsule::{
    CapsuleMatch, DeliveryQueueItem, OutboxEntry, ReceivedMessage, TargetCriteria, CONTENT_TYPE_TEXT,
    FANOUT_CAP,
};
use crate::error::DomainError;
use crate::ports::delivery::DeliveryQueueRepository;
use crate::ports::fanout::FanoutRepository;
use crate::ports::outbox::OutboxRepository;
use crate::ports::profiles::ProfileRepository;
use crate::ports::rpc::DistanceRpc;
use crate::profile::{eligible, GeoPoint};
use crate::util::{current_utc_year, now_ms, uuid_v7_without_dashes};
use crate::DomainResult;

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct MatchReport {
    pub processed: u64,
}

#[derive(Clone, Debug)]
struct RankedCandidate {
    id: String,
    distance_km: f64,
}

/// Drains the outbox: one sweep computes eligibility, ranks by distance, and
/// fans out to a bounded random subset per entry. Only the initial outbox
/// read propagates an error; per-entry failures are logged and the sweep
/// continues.
#[derive(Clone)]
pub struct MatchingService {
    outbox: Arc<dyn OutboxRepository>,
    profiles: Arc<dyn ProfileRepository>,
    fanout: Arc<dyn FanoutRepository>,
    delivery_queue: Arc<dyn DeliveryQueueRepository>,
    distance: Arc<dyn DistanceRpc>,
    delivery_delay_ms: i64,
}

impl MatchingService {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        profiles: Arc<dyn ProfileRepository>,
        fanout: Arc<dyn FanoutRepository>,
        delivery_queue: Arc<dyn DeliveryQueueRepository>,
        distance: Arc<dyn DistanceRpc>,
        delivery_delay_ms: i64,
    ) -> Self {
        Self {
            outbox,
            profiles,
            fanout,
            delivery_queue,
            distance,
            delivery_delay_ms,
        }
    }

    pub async fn process_outbox(&self) -> DomainResult<MatchReport> {
        let entries = self.outbox.list_unprocessed().await?;
        let current_year = current_utc_year();
        let mut processed = 0u64;

        for entry in &entries {
            match self.process_entry(entry, current_year).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(outbox_id = %entry.id, error = %err, "capsule matching failed; continuing sweep");
                }
            }
        }

        Ok(MatchReport { processed })
    }

    async fn process_entry(&self, entry: &OutboxEntry, current_year: i32) -> DomainResult<bool> {
        let criteria = TargetCriteria::for_entry(entry);

        let candidates = self.profiles.list_candidates(&entry.sender_id).await?;
        if candidates.is_empty() {
            return Ok(false);
        }

        let Some(origin) = self.profiles.location(&entry.sender_id).await? else {
            tracing::debug!(outbox_id = %entry.id, sender_id = %entry.sender_id, "sender has no location; skipping capsule");
            return Ok(false);
        };

        let filtered: Vec<_> = candidates
            .into_iter()
            .filter(|candidate| eligible(candidate, &criteria, current_year))
            .collect();

        let within_range = self.rank_by_distance(origin, &filtered, &criteria).await;
        if within_range.is_empty() {
            return Ok(false);
        }

        let selected = sample_recipients(within_range, FANOUT_CAP);
        let now = now_ms();
        let scheduled_delivery_at_ms = now + self.delivery_delay_ms;

        for recipient in &selected {
            tracing::debug!(
                outbox_id = %entry.id,
                recipient_id = %recipient.id,
                distance_km = recipient.distance_km,
                "routing capsule to recipient"
            );
            self.fan_out_to(entry, &recipient.id, now, scheduled_delivery_at_ms)
                .await;
        }

        // Consume the entry so a later sweep does not re-match it. If the
        // stamp fails the per-pair match guard still prevents duplicates.
        if let Err(err) = self.outbox.mark_processed(&entry.id, now).await {
            tracing::warn!(outbox_id = %entry.id, error = %err, "failed to stamp outbox entry processed");
        }

        Ok(true)
    }

    /// Distance lookups for one entry's candidates are independent remote
    /// calls, so they run concurrently. Unknown distances are excluded.
    async fn rank_by_distance(
        &self,
        origin: GeoPoint,
        candidates: &[crate::profile::CandidateProfile],
        criteria: &TargetCriteria,
    ) -> Vec<RankedCandidate> {
        let lookups = candidates.iter().filter_map(|candidate| {
            let target = candidate.location()?;
            let id = candidate.id.clone();
            Some(async move {
                let result = self.distance.distance_km(origin, target).await;
                (id, result)
            })
        });

        let mut within = Vec::new();
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(km) if km.is_finite() && km <= criteria.max_distance_km => {
                    within.push(RankedCandidate {
                        id,
                        distance_km: km,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(candidate_id = %id, error = %err, "distance lookup failed; excluding candidate");
                }
            }
        }
        within
    }

    /// One fan-out unit per recipient: match, received message, queued
    /// delivery record. A duplicate-pair conflict means a previous sweep
    /// already routed this pair; anything else is logged and tolerated.
    async fn fan_out_to(
        &self,
        entry: &OutboxEntry,
        recipient_id: &str,
        now: i64,
        scheduled_delivery_at_ms: i64,
    ) {
        let capsule_match = CapsuleMatch {
            outbox_id: entry.id.clone(),
            recipient_id: recipient_id.to_string(),
            created_at_ms: now,
        };
        match self.fanout.create_match(&capsule_match).await {
            Ok(()) => {}
            Err(DomainError::Conflict) => {
                tracing::debug!(outbox_id = %entry.id, recipient_id, "pair already matched; skipping");
                return;
            }
            Err(err) => {
                tracing::warn!(outbox_id = %entry.id, recipient_id, error = %err, "match write failed");
                return;
            }
        }

        let message = ReceivedMessage {
            receiver_id: recipient_id.to_string(),
            sender_id: entry.sender_id.clone(),
            content_type: CONTENT_TYPE_TEXT.to_string(),
            message: entry.text.clone(),
            is_read: false,
            is_replied: false,
        };
        if let Err(err) = self.fanout.create_received_message(&message).await {
            tracing::warn!(outbox_id = %entry.id, recipient_id, error = %err, "received message write failed after match write");
            return;
        }

        let item = DeliveryQueueItem {
            id: uuid_v7_without_dashes(),
            sent_bottle_id: entry.id.clone(),
            recipient_id: recipient_id.to_string(),
            scheduled_delivery_at_ms,
            delivered: false,
            delivered_at_ms: None,
        };
        if let Err(err) = self.delivery_queue.enqueue(&item).await {
            tracing::warn!(outbox_id = %entry.id, recipient_id, error = %err, "delivery queue enqueue failed");
        }
    }
}

/// Uniform shuffle then prefix take. Input order carries no bias into the
/// selection.
fn sample_recipients(mut within: Vec<RankedCandidate>, cap: usize) -> Vec<RankedCandidate> {
    let mut rng = rand::thread_rng();
    within.shuffle(&mut rng);
    within.truncate(cap);
    within
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ranked(count: usize) -> Vec<RankedCandidate> {
        (0..count)
            .map(|index| RankedCandidate {
                id: format!("candidate-{index}"),
                distance_km: index as f64,
            })
            .collect()
    }

    #[test]
    fn sample_caps_large_pools() {
        let selected = sample_recipients(ranked(200), FANOUT_CAP);
        assert_eq!(selected.len(), FANOUT_CAP);

        let unique: HashSet<_> = selected.iter().map(|candidate| candidate.id.clone()).collect();
        assert_eq!(unique.len(), FANOUT_CAP);
    }

    #[test]
    fn sample_keeps_small_pools_whole() {
        let selected = sample_recipients(ranked(3), FANOUT_CAP);
        let ids: HashSet<_> = selected.iter().map(|candidate| candidate.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        for candidate in ranked(3) {
            assert!(ids.contains(&candidate.id));
        }
    }

    #[test]
    fn sample_is_a_subset_of_its_input() {
        let pool = ranked(50);
        let pool_ids: HashSet<_> = pool.iter().map(|candidate| candidate.id.clone()).collect();
        for candidate in sample_recipients(pool, FANOUT_CAP) {
            assert!(pool_ids.contains(&candidate.id));
        }
    }
}
