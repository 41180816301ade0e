pub mod capsule;
pub mod delivery;
pub mod entitlements;
pub mod error;
pub mod matching;
pub mod ports;
pub mod profile;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
