use std::collections::BTreeMap;

use dspool_config::PropertyTable;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::options::{POOL_NAME_KEY, PoolConfig, PoolConfigError};

/// One registered pool together with the metadata that has no sqlx
/// counterpart.
#[derive(Debug, Clone)]
pub struct RegisteredPool {
    name: String,
    pool: PgPool,
    pool_name: Option<String>,
    driver: Option<String>,
    description: Option<String>,
}

impl RegisteredPool {
    /// Name the pool is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The managed connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pool identifier, if one was configured or defaulted in.
    pub fn pool_name(&self) -> Option<&str> {
        self.pool_name.as_deref()
    }

    /// Informational driver identifier from the definition.
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Free-form description from the definition.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Named registry of managed connection pools.
///
/// Built once from the bundles of a completed discovery phase. Pools connect
/// lazily: registration never opens a connection, the first acquire does.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: BTreeMap<String, RegisteredPool>,
}

impl PoolRegistry {
    /// Builds one pool per aggregated bundle and publishes each under its
    /// data source name.
    ///
    /// With `fill_pool_name` set, a bundle without an explicit `poolName`
    /// gets one equal to its data source name before construction. Any
    /// configuration error aborts the whole build; no partial registry is
    /// returned.
    pub fn from_bundles(
        bundles: BTreeMap<String, PropertyTable>,
        fill_pool_name: bool,
    ) -> Result<Self, PoolConfigError> {
        let mut pools = BTreeMap::new();
        for (name, mut bundle) in bundles {
            if fill_pool_name && !bundle.contains_key(POOL_NAME_KEY) {
                bundle.set(POOL_NAME_KEY, name.clone());
            }

            let config = PoolConfig::from_bundle(&name, &bundle)?;
            let connect_options = config.connect_options()?;
            let pool = config.pool_options().connect_lazy_with(connect_options);

            info!(
                name = %name,
                pool_name = config.pool_name.as_deref().unwrap_or_default(),
                driver = config.driver.as_deref().unwrap_or_default(),
                "registered data source pool"
            );

            pools.insert(
                name.clone(),
                RegisteredPool {
                    name,
                    pool,
                    pool_name: config.pool_name,
                    driver: config.driver,
                    description: config.description,
                },
            );
        }
        Ok(Self { pools })
    }

    /// Returns the pool registered under `name`.
    pub fn get(&self, name: &str) -> Option<&PgPool> {
        self.pools.get(name).map(RegisteredPool::pool)
    }

    /// Returns the registered pool and its metadata.
    pub fn lookup(&self, name: &str) -> Option<&RegisteredPool> {
        self.pools.get(name)
    }

    /// Registered names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Closes the pool registered under `name`, leaving the others open.
    /// Returns false if no such pool exists.
    pub async fn close(&self, name: &str) -> bool {
        match self.pools.get(name) {
            Some(registered) => {
                registered.pool.close().await;
                debug!(name, "closed data source pool");
                true
            }
            None => false,
        }
    }

    /// Closes every registered pool.
    pub async fn close_all(&self) {
        for registered in self.pools.values() {
            registered.pool.close().await;
        }
        info!(pools = self.pools.len(), "closed all data source pools");
    }
}
