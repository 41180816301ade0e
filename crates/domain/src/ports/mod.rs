use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod delivery;
pub mod entitlements;
pub mod fanout;
pub mod outbox;
pub mod profiles;
pub mod rpc;
