//! Configuration model for named data-source pools.
//!
//! This crate covers everything that happens before a pool exists: the
//! declarative [`DataSourceDefinition`] record, its flattening into dotted
//! property keys, the merging of property contributions from multiple
//! sources into per-name bundles, and the loading of the bootstrap settings
//! that drive one discovery phase.

mod aggregate;
mod definition;
mod environment;
mod load;
mod mapper;
mod properties;

pub use aggregate::DataSourceAggregator;
pub use definition::{DataSourceDefinition, IsolationLevel, IsolationLevelError};
pub use environment::Environment;
pub use load::{
    BootstrapSettings, DiscoveryError, LoadSettingsError, load_settings, load_settings_from,
    run_discovery,
};
pub use mapper::{MapperError, definition_properties};
pub use properties::{PropertiesFileError, PropertyTable};
