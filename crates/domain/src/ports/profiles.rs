use crate::ports::BoxFuture;
use crate::profile::{CandidateProfile, GeoPoint};
use crate::DomainResult;

pub trait ProfileRepository: Send + Sync {
    /// All opted-in profiles other than the sender.
    fn list_candidates(
        &self,
        exclude_sender_id: &str,
    ) -> BoxFuture<'_, DomainResult<Vec<CandidateProfile>>>;

    fn location(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<GeoPoint>>>;
}
