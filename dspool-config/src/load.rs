use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::DataSourceAggregator;
use crate::definition::DataSourceDefinition;
use crate::environment::Environment;
use crate::mapper::MapperError;
use crate::properties::{PropertiesFileError, PropertyTable};

/// Directory containing settings files relative to the application root.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment settings files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between the prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// File name probed when a properties path points at a directory.
const PROPERTIES_FILE_NAME: &str = "datasource.properties";

/// Settings keys whose environment-variable overrides are parsed as lists.
const LIST_PARSE_KEYS: &[&str] = &["properties_paths"];

fn default_properties_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(PROPERTIES_FILE_NAME)]
}

fn default_fill_pool_name() -> bool {
    true
}

/// Settings driving one bootstrap discovery phase.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BootstrapSettings {
    /// Declarative data source definitions, absorbed in declaration order.
    #[serde(default)]
    pub definitions: Vec<DataSourceDefinition>,
    /// Properties files to absorb after the definitions, in listed order.
    /// Relative paths resolve against the application root; a directory
    /// entry means `<dir>/datasource.properties`.
    #[serde(default = "default_properties_paths")]
    pub properties_paths: Vec<PathBuf>,
    /// Whether bundles without an explicit `poolName` get one equal to the
    /// data source name before pool construction.
    #[serde(default = "default_fill_pool_name")]
    pub fill_pool_name: bool,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            properties_paths: default_properties_paths(),
            fill_pool_name: default_fill_pool_name(),
        }
    }
}

/// Errors that can occur while loading the bootstrap settings.
#[derive(Debug, Error)]
pub enum LoadSettingsError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `configuration` directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Could not locate the base settings file.
    #[error("could not locate base settings in `{directory}`; attempted: {attempted}")]
    BaseSettingsMissing { directory: PathBuf, attempted: String },

    /// A settings file existed but could not be parsed.
    #[error("failed to load settings from `{path}`: {source}")]
    SettingsFileLoad {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    /// Environment variable overrides failed to merge.
    #[error("failed to load settings from environment variables: {0}")]
    EnvironmentVariables(#[source] config::ConfigError),

    /// The settings parsed but deserialization failed.
    #[error("failed to deserialize settings: {0}")]
    Deserialization(#[source] config::ConfigError),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),
}

/// Errors that abort a discovery phase.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A definition could not be flattened into properties.
    #[error(transparent)]
    Mapper(#[from] MapperError),

    /// A configured properties file could not be read.
    #[error(transparent)]
    Properties(#[from] PropertiesFileError),
}

/// Loads [`BootstrapSettings`] from the current working directory.
///
/// Equivalent to [`load_settings_from`] rooted at the process working
/// directory.
pub fn load_settings() -> Result<BootstrapSettings, LoadSettingsError> {
    let base_dir = std::env::current_dir().map_err(LoadSettingsError::CurrentDir)?;
    load_settings_from(&base_dir)
}

/// Loads [`BootstrapSettings`] rooted at `base_dir`.
///
/// Settings come from `configuration/base.(yaml|yml|json)`, an optional
/// `configuration/{environment}.(yaml|yml|json)` overlay selected by
/// `APP_ENVIRONMENT`, and finally `APP_`-prefixed environment variables
/// (`__` separates nested keys, lists are comma-separated).
pub fn load_settings_from(base_dir: &Path) -> Result<BootstrapSettings, LoadSettingsError> {
    let configuration_directory = base_dir.join(CONFIGURATION_DIR);
    if !configuration_directory.is_dir() {
        return Err(LoadSettingsError::MissingConfigurationDirectory(
            configuration_directory,
        ));
    }

    let environment = Environment::load()?;

    let base_file = find_settings_file(&configuration_directory, "base").ok_or_else(|| {
        LoadSettingsError::BaseSettingsMissing {
            directory: configuration_directory.clone(),
            attempted: attempted_paths(&configuration_directory, "base"),
        }
    })?;

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .list_separator(LIST_SEPARATOR);
    for key in LIST_PARSE_KEYS {
        environment_source = environment_source.with_list_parse_key(key);
    }

    let builder = config::Config::builder().add_source(config::File::from(base_file.clone()));
    validate_settings_source(&builder, &base_file)?;

    // The overlay is optional: a deployment without environment-specific
    // settings only ships `base`.
    let builder = match find_settings_file(&configuration_directory, environment.as_str()) {
        Some(environment_file) => {
            let builder = builder.add_source(config::File::from(environment_file.clone()));
            validate_settings_source(&builder, &environment_file)?;
            builder
        }
        None => {
            debug!(
                environment = %environment,
                "no environment settings overlay found; using base settings only"
            );
            builder
        }
    };

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadSettingsError::EnvironmentVariables)?;

    settings
        .try_deserialize::<BootstrapSettings>()
        .map_err(LoadSettingsError::Deserialization)
}

/// Runs one discovery phase: absorbs every definition, then every configured
/// properties file, and freezes the result into per-name bundles.
///
/// Relative properties paths resolve against `base_dir`. Any mapper or read
/// failure aborts the phase; nothing partial is returned.
pub fn run_discovery(
    settings: &BootstrapSettings,
    base_dir: &Path,
) -> Result<BTreeMap<String, PropertyTable>, DiscoveryError> {
    let mut aggregator = DataSourceAggregator::new();

    for definition in &settings.definitions {
        aggregator.absorb_definition(definition)?;
    }

    for path in &settings.properties_paths {
        let mut resolved = if path.is_absolute() {
            path.clone()
        } else {
            base_dir.join(path)
        };
        if resolved.is_dir() {
            resolved.push(PROPERTIES_FILE_NAME);
        }
        let contributions = PropertyTable::from_path(&resolved)?;
        debug!(
            path = %resolved.display(),
            entries = contributions.len(),
            "absorbed properties file"
        );
        aggregator.absorb(&contributions);
    }

    info!(
        data_sources = aggregator.len(),
        definitions = settings.definitions.len(),
        properties_files = settings.properties_paths.len(),
        "discovery phase complete"
    );

    Ok(aggregator.into_bundles())
}

fn find_settings_file(directory: &Path, stem: &str) -> Option<PathBuf> {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

fn attempted_paths(directory: &Path, stem: &str) -> String {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| format!("`{}`", directory.join(format!("{stem}.{extension}")).display()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_settings_source(
    builder: &ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<(), LoadSettingsError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadSettingsError::SettingsFileLoad {
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::sync::Mutex;

    use tempfile::TempDir;

    // Settings loading reads the process environment, which is shared
    // across the test binary's threads; tests touching it take this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_settings_file(root: &TempDir, stem: &str, contents: &str) {
        let configuration = root.path().join(CONFIGURATION_DIR);
        fs::create_dir_all(&configuration).unwrap();
        fs::write(configuration.join(format!("{stem}.yaml")), contents).unwrap();
    }

    fn write_base_settings(root: &TempDir, contents: &str) {
        write_settings_file(root, "base", contents);
    }

    #[test]
    fn missing_configuration_directory_is_an_error() {
        let root = TempDir::new().unwrap();
        let err = load_settings_from(root.path()).unwrap_err();
        assert!(matches!(
            err,
            LoadSettingsError::MissingConfigurationDirectory(_)
        ));
    }

    #[test]
    fn missing_base_file_is_an_error() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join(CONFIGURATION_DIR)).unwrap();
        let err = load_settings_from(root.path()).unwrap_err();
        assert!(matches!(err, LoadSettingsError::BaseSettingsMissing { .. }));
    }

    #[test]
    fn loads_definitions_and_defaults() {
        let _env = ENV_LOCK.lock().unwrap();
        let root = TempDir::new().unwrap();
        write_base_settings(
            &root,
            "definitions:\n  - name: ds1\n    class_name: org.example.Driver\n    max_pool_size: 10\n",
        );

        let settings = load_settings_from(root.path()).unwrap();
        assert_eq!(settings.definitions.len(), 1);
        assert_eq!(settings.definitions[0].name, "ds1");
        assert_eq!(settings.definitions[0].max_pool_size, Some(10));
        assert_eq!(
            settings.properties_paths,
            vec![PathBuf::from("datasource.properties")]
        );
        assert!(settings.fill_pool_name);
    }

    #[test]
    fn environment_overlay_wins_over_base() {
        let _env = ENV_LOCK.lock().unwrap();
        let root = TempDir::new().unwrap();
        write_base_settings(
            &root,
            "fill_pool_name: true\nproperties_paths:\n  - base.properties\n",
        );
        // APP_ENVIRONMENT defaults to dev, so the dev overlay is picked up.
        write_settings_file(&root, "dev", "fill_pool_name: false\n");

        let settings = load_settings_from(root.path()).unwrap();
        assert!(!settings.fill_pool_name);
        // Keys the overlay does not mention keep their base values.
        assert_eq!(
            settings.properties_paths,
            vec![PathBuf::from("base.properties")]
        );
    }

    #[test]
    fn environment_variables_override_files_with_list_parsing() {
        let _env = ENV_LOCK.lock().unwrap();
        let root = TempDir::new().unwrap();
        write_base_settings(&root, "properties_paths:\n  - base.properties\n");

        unsafe {
            std::env::set_var("APP_PROPERTIES_PATHS", "first.properties,conf/second.properties");
        }
        let settings = load_settings_from(root.path());
        unsafe {
            std::env::remove_var("APP_PROPERTIES_PATHS");
        }

        let settings = settings.unwrap();
        assert_eq!(
            settings.properties_paths,
            vec![
                PathBuf::from("first.properties"),
                PathBuf::from("conf/second.properties"),
            ]
        );
    }

    #[test]
    fn discovery_merges_definitions_and_files_in_order() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("datasource.properties"),
            "ds1.dataSource.maximumPoolSize=20\n\
             ds2.dataSource.dataSource.serverName=hostA\n",
        )
        .unwrap();
        fs::write(
            root.path().join("override.properties"),
            "ds2.dataSource.dataSource.serverName=hostB\n",
        )
        .unwrap();

        let settings = BootstrapSettings {
            definitions: vec![
                serde_json::from_str(
                    r#"{"name": "ds1", "class_name": "org.example.Driver", "max_pool_size": 10}"#,
                )
                .unwrap(),
            ],
            properties_paths: vec![
                PathBuf::from("datasource.properties"),
                PathBuf::from("override.properties"),
            ],
            fill_pool_name: true,
        };

        let bundles = run_discovery(&settings, root.path()).unwrap();
        assert_eq!(bundles.len(), 2);
        // File contribution came after the definition, so it wins.
        assert_eq!(bundles["ds1"].get("maximumPoolSize"), Some("20"));
        assert_eq!(bundles["ds2"].get("dataSource.serverName"), Some("hostB"));
    }

    #[test]
    fn directory_entry_resolves_to_the_conventional_file_name() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("conf");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join(PROPERTIES_FILE_NAME),
            "ds1.dataSource.username=app\n",
        )
        .unwrap();

        let settings = BootstrapSettings {
            properties_paths: vec![PathBuf::from("conf")],
            ..Default::default()
        };

        let bundles = run_discovery(&settings, root.path()).unwrap();
        assert_eq!(bundles["ds1"].get("username"), Some("app"));
    }

    #[test]
    fn unreadable_properties_file_aborts_discovery() {
        let root = TempDir::new().unwrap();
        let settings = BootstrapSettings {
            properties_paths: vec![PathBuf::from("missing.properties")],
            ..Default::default()
        };
        let err = run_discovery(&settings, root.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Properties(_)));
    }
}
