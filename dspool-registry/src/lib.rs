//! Named connection-pool registry built from aggregated data-source bundles.
//!
//! The `dspool-config` crate produces one property bundle per data source
//! name; this crate turns each bundle into a typed [`PoolConfig`], constructs
//! a lazily-connecting sqlx Postgres pool from it, and publishes the pool in
//! a [`PoolRegistry`] keyed by name. [`bootstrap`] wires the whole phase
//! together and fails fast on any configuration error.

mod bootstrap;
mod options;
mod registry;

pub use bootstrap::{BootstrapError, bootstrap, bootstrap_from};
pub use options::{PoolConfig, PoolConfigError};
pub use registry::{PoolRegistry, RegisteredPool};
