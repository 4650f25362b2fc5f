use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod audit;
pub mod health;
pub mod idempotency;
pub mod identity;
pub mod records;
pub mod tenant;
