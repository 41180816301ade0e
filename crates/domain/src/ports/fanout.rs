use crate::capsule::{CapsuleMatch, ReceivedMessage};
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait FanoutRepository: Send + Sync {
    /// Returns `DomainError::Conflict` when the (outbox_id, recipient_id)
    /// pair already exists.
    fn create_match(&self, capsule_match: &CapsuleMatch) -> BoxFuture<'_, DomainResult<()>>;

    fn create_received_message(&self, message: &ReceivedMessage)
        -> BoxFuture<'_, DomainResult<()>>;
}
