use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::definition::DataSourceDefinition;
use crate::mapper::{MapperError, definition_properties};
use crate::properties::PropertyTable;

/// Pattern splitting a contributed key into `(data source name, remainder)`.
///
/// Keys look like `ds1.dataSource.maximumPoolSize` or
/// `ds1.dataSource.dataSource.serverName`; the remainder is everything after
/// the `dataSource.` marker. Keys that do not match are dropped, which lets
/// shared properties files carry unrelated entries.
static DATA_SOURCE_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^.]+)\.dataSource\.(.*)$").expect("pattern is valid"));

/// Accumulates property contributions into per-name bundles during one
/// discovery phase.
///
/// The aggregator is a short-lived value passed explicitly through the
/// discovery calls, not ambient state: it is created at the start of a
/// phase, fed every contribution, and consumed by [`into_bundles`].
/// Later contributions for the same `(name, remainder)` overwrite earlier
/// ones, so the caller's absorb order decides conflicts.
///
/// [`into_bundles`]: DataSourceAggregator::into_bundles
#[derive(Debug, Default)]
pub struct DataSourceAggregator {
    bundles: BTreeMap<String, PropertyTable>,
}

impl DataSourceAggregator {
    /// Creates an empty aggregator for one discovery phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one table of contributions into the per-name bundles.
    pub fn absorb(&mut self, contributions: &PropertyTable) {
        for (key, value) in contributions.iter() {
            let Some(captures) = DATA_SOURCE_KEY_PATTERN.captures(key) else {
                trace!(key, "dropping property key outside the data source namespace");
                continue;
            };
            let name = &captures[1];
            let remainder = &captures[2];
            self.bundles
                .entry(name.to_string())
                .or_default()
                .set(remainder, value);
        }
    }

    /// Flattens a definition and merges the result.
    pub fn absorb_definition(
        &mut self,
        definition: &DataSourceDefinition,
    ) -> Result<(), MapperError> {
        self.absorb(&definition_properties(definition)?);
        Ok(())
    }

    /// Number of distinct data source names seen so far.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Freezes the accumulator into per-name bundles, keyed by data source
    /// name with the `<name>.dataSource.` prefix stripped.
    pub fn into_bundles(self) -> BTreeMap<String, PropertyTable> {
        self.bundles
    }
}
