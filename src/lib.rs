//! Transactional core of a shared-vehicle fleet: rides, vehicles and their
//! location history on top of a serializable datastore.

pub mod config;
pub mod db;
pub mod error;
pub mod fleet;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod models;
pub mod processor;
pub mod store;
pub mod txn;

pub use error::{FleetError, FleetResult, StoreError};
pub use fleet::{RegistryLimits, RideLifecycle, UserRegistry, VehicleRegistry};
pub use store::{Datastore, FleetTransaction, IsolationLevel, MemoryDatastore};
pub use txn::{RetryPolicy, TransactionExecutor, UnitOfWork};
