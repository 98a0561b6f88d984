use std::str::FromStr;
use std::time::Duration;

use dspool_config::{IsolationLevel, IsolationLevelError, PropertyTable};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;
use tracing::warn;

pub(crate) const POOL_NAME_KEY: &str = "poolName";

const DRIVER_KEY: &str = "dataSourceClassName";
const MAX_CONNECTIONS_KEY: &str = "maximumPoolSize";
const MIN_CONNECTIONS_KEY: &str = "minimumIdle";
const ACQUIRE_TIMEOUT_KEY: &str = "connectionTimeout";
const IDLE_TIMEOUT_KEY: &str = "idleTimeout";
const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";
const ISOLATION_KEY: &str = "transactionIsolation";
const URL_KEY: &str = "dataSource.url";
const SERVER_NAME_KEY: &str = "dataSource.serverName";
const PORT_NUMBER_KEY: &str = "dataSource.portNumber";
const DATABASE_NAME_KEY: &str = "dataSource.databaseName";
const DESCRIPTION_KEY: &str = "dataSource.description";

/// Errors raised while turning a merged bundle into pool configuration.
/// All of them are fatal to bootstrap.
#[derive(Debug, Error)]
pub enum PoolConfigError {
    /// A numeric property did not parse.
    #[error("data source `{name}`: property `{key}` has invalid numeric value `{value}`")]
    InvalidNumber {
        name: String,
        key: &'static str,
        value: String,
    },

    /// The `transactionIsolation` symbol is not one of the five known names.
    #[error("data source `{name}`: {source}")]
    Isolation {
        name: String,
        #[source]
        source: IsolationLevelError,
    },

    /// The connection URL did not parse.
    #[error("data source `{name}`: invalid connection url: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Typed view of one data source's merged property bundle.
///
/// Bundle keys are the remainders left after aggregation stripped the
/// `<name>.dataSource.` prefix: pool-level knobs at the top, standard
/// address properties under the nested `dataSource.` prefix. Keys outside
/// the recognized set are ignored.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Data source name the bundle was aggregated under.
    pub name: String,
    /// Informational driver identifier from `dataSourceClassName`.
    pub driver: Option<String>,
    /// Pool identifier; becomes the Postgres `application_name`.
    pub pool_name: Option<String>,
    /// Upper pool bound, from `maximumPoolSize`.
    pub max_connections: Option<u32>,
    /// Idle connections kept around, from `minimumIdle`.
    pub min_connections: Option<u32>,
    /// Acquire budget, from `connectionTimeout` (milliseconds).
    pub acquire_timeout: Option<Duration>,
    /// Idle retirement, from `idleTimeout` (milliseconds).
    pub idle_timeout: Option<Duration>,
    pub username: Option<String>,
    /// Redacted in debug output.
    pub password: Option<SecretString>,
    /// Session default isolation, from the `transactionIsolation` symbol.
    pub isolation: Option<IsolationLevel>,
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    /// Free-form description carried as registry metadata.
    pub description: Option<String>,
}

impl PoolConfig {
    /// Parses one merged bundle. Unparsable numerics and unknown isolation
    /// symbols abort bootstrap.
    pub fn from_bundle(name: &str, bundle: &PropertyTable) -> Result<Self, PoolConfigError> {
        let isolation = match bundle.get(ISOLATION_KEY) {
            Some(symbol) => Some(IsolationLevel::from_symbol(symbol).map_err(|source| {
                PoolConfigError::Isolation {
                    name: name.to_string(),
                    source,
                }
            })?),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            driver: bundle.get(DRIVER_KEY).map(str::to_string),
            pool_name: bundle.get(POOL_NAME_KEY).map(str::to_string),
            max_connections: parse_number(name, MAX_CONNECTIONS_KEY, bundle)?,
            min_connections: parse_number(name, MIN_CONNECTIONS_KEY, bundle)?,
            acquire_timeout: parse_number(name, ACQUIRE_TIMEOUT_KEY, bundle)?
                .map(Duration::from_millis),
            idle_timeout: parse_number(name, IDLE_TIMEOUT_KEY, bundle)?.map(Duration::from_millis),
            username: bundle.get(USERNAME_KEY).map(str::to_string),
            password: bundle
                .get(PASSWORD_KEY)
                .map(|password| SecretString::new(password.to_string())),
            isolation,
            url: bundle.get(URL_KEY).map(str::to_string),
            host: bundle.get(SERVER_NAME_KEY).map(str::to_string),
            port: parse_number(name, PORT_NUMBER_KEY, bundle)?,
            database: bundle.get(DATABASE_NAME_KEY).map(str::to_string),
            description: bundle.get(DESCRIPTION_KEY).map(str::to_string),
        })
    }

    /// Builds the sqlx connect options: the URL (if any) is parsed first and
    /// the explicit address fields overlay it.
    pub fn connect_options(&self) -> Result<PgConnectOptions, PoolConfigError> {
        let mut options = match &self.url {
            Some(url) => {
                url.parse::<PgConnectOptions>()
                    .map_err(|source| PoolConfigError::InvalidUrl {
                        name: self.name.clone(),
                        source,
                    })?
            }
            None => PgConnectOptions::new(),
        };

        if let Some(host) = &self.host {
            options = options.host(host);
        }
        if let Some(port) = self.port {
            options = options.port(port);
        }
        if let Some(database) = &self.database {
            options = options.database(database);
        }
        if let Some(username) = &self.username {
            options = options.username(username);
        }
        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }
        if let Some(isolation) = self.isolation {
            match session_isolation_setting(isolation) {
                Some(setting) => {
                    options = options.options([("default_transaction_isolation", setting)]);
                }
                None => {
                    // TRANSACTION_NONE is valid on the wire but has no
                    // Postgres session equivalent.
                    warn!(
                        name = %self.name,
                        "transaction isolation NONE has no session setting; leaving the server default"
                    );
                }
            }
        }
        if let Some(pool_name) = &self.pool_name {
            options = options.application_name(pool_name);
        }

        Ok(options)
    }

    /// Builds the sqlx pool options from the pool-bound fields, leaving
    /// everything unset at the sqlx defaults.
    pub fn pool_options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new();
        if let Some(max_connections) = self.max_connections {
            options = options.max_connections(max_connections);
        }
        if let Some(min_connections) = self.min_connections {
            options = options.min_connections(min_connections);
        }
        if let Some(acquire_timeout) = self.acquire_timeout {
            options = options.acquire_timeout(acquire_timeout);
        }
        if let Some(idle_timeout) = self.idle_timeout {
            options = options.idle_timeout(idle_timeout);
        }
        options
    }
}

/// Postgres value for `default_transaction_isolation`, or `None` for the
/// levels Postgres does not model.
fn session_isolation_setting(isolation: IsolationLevel) -> Option<&'static str> {
    match isolation {
        IsolationLevel::None => None,
        IsolationLevel::ReadUncommitted => Some("read uncommitted"),
        IsolationLevel::ReadCommitted => Some("read committed"),
        IsolationLevel::RepeatableRead => Some("repeatable read"),
        IsolationLevel::Serializable => Some("serializable"),
    }
}

fn parse_number<T: FromStr>(
    name: &str,
    key: &'static str,
    bundle: &PropertyTable,
) -> Result<Option<T>, PoolConfigError> {
    match bundle.get(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| PoolConfigError::InvalidNumber {
                name: name.to_string(),
                key,
                value: value.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(entries: &[(&str, &str)]) -> PropertyTable {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_pool_and_address_fields() {
        let config = PoolConfig::from_bundle(
            "ds1",
            &bundle(&[
                ("dataSourceClassName", "org.example.Driver"),
                ("maximumPoolSize", "10"),
                ("minimumIdle", "2"),
                ("connectionTimeout", "3000"),
                ("idleTimeout", "60000"),
                ("username", "app"),
                ("password", "secret"),
                ("transactionIsolation", "TRANSACTION_SERIALIZABLE"),
                ("dataSource.serverName", "db.internal"),
                ("dataSource.portNumber", "5433"),
                ("dataSource.databaseName", "appdb"),
                ("dataSource.description", "primary store"),
                ("poolName", "ds1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.driver.as_deref(), Some("org.example.Driver"));
        assert_eq!(config.max_connections, Some(10));
        assert_eq!(config.min_connections, Some(2));
        assert_eq!(config.acquire_timeout, Some(Duration::from_millis(3000)));
        assert_eq!(config.idle_timeout, Some(Duration::from_millis(60000)));
        assert_eq!(config.username.as_deref(), Some("app"));
        assert_eq!(config.isolation, Some(IsolationLevel::Serializable));
        assert_eq!(config.host.as_deref(), Some("db.internal"));
        assert_eq!(config.port, Some(5433));
        assert_eq!(config.database.as_deref(), Some("appdb"));
        assert_eq!(config.description.as_deref(), Some("primary store"));
        assert_eq!(config.pool_name.as_deref(), Some("ds1"));
    }

    #[test]
    fn unrecognized_keys_are_ignored() {
        let config = PoolConfig::from_bundle(
            "ds1",
            &bundle(&[("maximumPoolSize", "5"), ("somethingElse", "x")]),
        )
        .unwrap();
        assert_eq!(config.max_connections, Some(5));
    }

    #[test]
    fn invalid_numeric_value_is_fatal() {
        let err =
            PoolConfig::from_bundle("ds1", &bundle(&[("maximumPoolSize", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            PoolConfigError::InvalidNumber {
                key: "maximumPoolSize",
                ..
            }
        ));
    }

    #[test]
    fn unknown_isolation_symbol_is_fatal() {
        let err = PoolConfig::from_bundle(
            "ds1",
            &bundle(&[("transactionIsolation", "TRANSACTION_CHAOS")]),
        )
        .unwrap_err();
        assert!(matches!(err, PoolConfigError::Isolation { .. }));
    }

    #[test]
    fn explicit_address_fields_overlay_the_url() {
        let config = PoolConfig::from_bundle(
            "ds1",
            &bundle(&[
                ("dataSource.url", "postgres://urlhost:5432/urldb"),
                ("dataSource.serverName", "override.internal"),
            ]),
        )
        .unwrap();

        let options = config.connect_options().unwrap();
        assert_eq!(options.get_host(), "override.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_database(), Some("urldb"));
    }

    #[test]
    fn invalid_url_is_fatal() {
        let config =
            PoolConfig::from_bundle("ds1", &bundle(&[("dataSource.url", "::not-a-url::")]))
                .unwrap();
        assert!(matches!(
            config.connect_options(),
            Err(PoolConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_the_password() {
        let config =
            PoolConfig::from_bundle("ds1", &bundle(&[("password", "hunter2")])).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
