use secrecy::ExposeSecret;
use thiserror::Error;

use crate::definition::{DataSourceDefinition, IsolationLevel, IsolationLevelError};
use crate::properties::PropertyTable;

/// Raised when a definition cannot be flattened into properties.
#[derive(Debug, Error)]
pub enum MapperError {
    /// The definition carries an isolation code outside the recognized set.
    #[error("data source `{name}`: {source}")]
    UnknownIsolationLevel {
        name: String,
        #[source]
        source: IsolationLevelError,
    },
}

/// Flattens one [`DataSourceDefinition`] into a [`PropertyTable`] keyed
/// `<name>.dataSource.*`.
///
/// The standard address properties (`databaseName`, `description`,
/// `portNumber`, `serverName`, `url`) are emitted under the double-nested
/// `<name>.dataSource.dataSource.*` prefix. That convention comes from the
/// pool configuration schema this wire format originated in and is relied on
/// by existing `datasource.properties` files, so it is preserved exactly.
pub fn definition_properties(
    definition: &DataSourceDefinition,
) -> Result<PropertyTable, MapperError> {
    let name = definition.name.as_str();
    let mut table = PropertyTable::new();

    let mut pool_property = |table: &mut PropertyTable, key: &str, value: String| {
        table.set(format!("{name}.dataSource.{key}"), value);
    };

    pool_property(
        &mut table,
        "dataSourceClassName",
        definition.class_name.clone(),
    );

    if let Some(min_pool_size) = definition.min_pool_size {
        pool_property(&mut table, "minimumIdle", min_pool_size.to_string());
    }
    if let Some(max_pool_size) = definition.max_pool_size {
        pool_property(&mut table, "maximumPoolSize", max_pool_size.to_string());
    }
    // Zero means unset here, matching the original wire semantics.
    if let Some(login_timeout) = definition.login_timeout_ms
        && login_timeout > 0
    {
        pool_property(&mut table, "connectionTimeout", login_timeout.to_string());
    }
    if let Some(max_idle_time) = definition.max_idle_time_ms {
        pool_property(&mut table, "idleTimeout", max_idle_time.to_string());
    }
    if let Some(password) = &definition.password {
        let password = password.expose_secret();
        if !password.is_empty() {
            pool_property(&mut table, "password", password.clone());
        }
    }
    if let Some(code) = definition.isolation_level {
        let level =
            IsolationLevel::from_code(code).map_err(|source| MapperError::UnknownIsolationLevel {
                name: name.to_string(),
                source,
            })?;
        pool_property(
            &mut table,
            "transactionIsolation",
            level.as_symbol().to_string(),
        );
    }
    // The wire key is `username`, not `user`.
    if let Some(user) = non_empty(&definition.user) {
        pool_property(&mut table, "username", user.to_string());
    }

    if let Some(database_name) = non_empty(&definition.database_name) {
        pool_property(
            &mut table,
            "dataSource.databaseName",
            database_name.to_string(),
        );
    }
    if let Some(description) = non_empty(&definition.description) {
        pool_property(&mut table, "dataSource.description", description.to_string());
    }
    if let Some(port_number) = definition.port_number {
        pool_property(
            &mut table,
            "dataSource.portNumber",
            port_number.to_string(),
        );
    }
    if let Some(server_name) = non_empty(&definition.server_name) {
        pool_property(&mut table, "dataSource.serverName", server_name.to_string());
    }
    if let Some(url) = non_empty(&definition.url) {
        pool_property(&mut table, "dataSource.url", url.to_string());
    }

    Ok(table)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
