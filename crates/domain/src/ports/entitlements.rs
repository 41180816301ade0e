use crate::entitlements::Entitlement;
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait EntitlementRepository: Send + Sync {
    fn upsert(&self, entitlement: &Entitlement) -> BoxFuture<'_, DomainResult<()>>;
}
