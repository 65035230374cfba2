//! Transaction Executor: runs a unit of work in a fresh transaction and
//! replays it when the store reports a serialization conflict.

use async_trait::async_trait;

use crate::error::FleetResult;
use crate::store::FleetTransaction;

pub mod executor;

pub use executor::{RetryPolicy, TransactionExecutor};

/// One attempt's worth of reads and writes.
///
/// `run` takes `&self` and may be invoked several times for one logical
/// call, so it must not touch anything but the transaction it is handed.
/// Request parameters live in the implementing struct.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<Self::Output>;
}
