use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// A declarative description of one data source: its identity, pool bounds,
/// credentials, and network address.
///
/// Definitions are read-only records consumed once per discovery phase.
/// Unset fields are `None`; the mapper additionally treats empty strings as
/// absent, so a hand-written overlay that blanks a field behaves the same as
/// one that omits it.
///
/// This intentionally does not implement `Serialize` to avoid accidentally
/// leaking the password into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DataSourceDefinition {
    /// Name under which the resulting pool is registered. Required; there is
    /// no implicit name inference.
    pub name: String,
    /// Driver identifier. Carried through as informational metadata on the
    /// registered pool.
    pub class_name: String,
    /// Minimum number of idle connections the pool keeps around.
    #[serde(default)]
    pub min_pool_size: Option<u32>,
    /// Maximum number of connections in the pool.
    #[serde(default)]
    pub max_pool_size: Option<u32>,
    /// Time budget for acquiring a connection, in milliseconds. Zero means
    /// unset.
    #[serde(default)]
    pub login_timeout_ms: Option<u32>,
    /// How long a connection may sit idle before being retired, in
    /// milliseconds.
    #[serde(default)]
    pub max_idle_time_ms: Option<u32>,
    /// Username for authenticating with the database.
    #[serde(default)]
    pub user: Option<String>,
    /// Password for the specified user. Redacted in debug output.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Name of the database to connect to.
    #[serde(default)]
    pub database_name: Option<String>,
    /// Free-form description, kept as metadata on the registered pool.
    #[serde(default)]
    pub description: Option<String>,
    /// Hostname or IP address of the database server.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Port on which the database server is listening.
    #[serde(default)]
    pub port_number: Option<u16>,
    /// Connection URL. Explicit address fields overlay values parsed from it.
    #[serde(default)]
    pub url: Option<String>,
    /// JDBC-style transaction isolation code (0, 1, 2, 4 or 8). Any other
    /// value is a fatal configuration error.
    #[serde(default)]
    pub isolation_level: Option<i32>,
}

/// Raised for isolation codes or symbols outside the five recognized levels.
#[derive(Debug, Error)]
pub enum IsolationLevelError {
    /// The numeric code is not one of 0, 1, 2, 4, 8.
    #[error("unexpected isolation level code: {0}")]
    UnknownCode(i32),
    /// The symbolic name is not one of the five `TRANSACTION_*` names.
    #[error("unexpected isolation level: `{0}`")]
    UnknownSymbol(String),
}

/// Transaction isolation level of a data source.
///
/// The numeric codes and symbolic names follow the JDBC convention so that
/// property files written against the original wire format keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Parses a JDBC isolation code. Only 0, 1, 2, 4 and 8 are valid.
    pub fn from_code(code: i32) -> Result<Self, IsolationLevelError> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::ReadUncommitted),
            2 => Ok(Self::ReadCommitted),
            4 => Ok(Self::RepeatableRead),
            8 => Ok(Self::Serializable),
            other => Err(IsolationLevelError::UnknownCode(other)),
        }
    }

    /// Returns the symbolic name used on the wire.
    pub fn as_symbol(&self) -> &'static str {
        match self {
            Self::None => "TRANSACTION_NONE",
            Self::ReadUncommitted => "TRANSACTION_READ_UNCOMMITTED",
            Self::ReadCommitted => "TRANSACTION_READ_COMMITTED",
            Self::RepeatableRead => "TRANSACTION_REPEATABLE_READ",
            Self::Serializable => "TRANSACTION_SERIALIZABLE",
        }
    }

    /// Parses a symbolic name back into a level. Used for contributions that
    /// arrived through properties files rather than definitions.
    pub fn from_symbol(symbol: &str) -> Result<Self, IsolationLevelError> {
        match symbol {
            "TRANSACTION_NONE" => Ok(Self::None),
            "TRANSACTION_READ_UNCOMMITTED" => Ok(Self::ReadUncommitted),
            "TRANSACTION_READ_COMMITTED" => Ok(Self::ReadCommitted),
            "TRANSACTION_REPEATABLE_READ" => Ok(Self::RepeatableRead),
            "TRANSACTION_SERIALIZABLE" => Ok(Self::Serializable),
            other => Err(IsolationLevelError::UnknownSymbol(other.to_string())),
        }
    }
}
