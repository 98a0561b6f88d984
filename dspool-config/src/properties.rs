use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Raised when a properties file cannot be read. Reading is all-or-nothing;
/// there is no partial load.
#[derive(Debug, Error)]
#[error("failed to read properties file `{path}`: {source}")]
pub struct PropertiesFileError {
    /// Path of the file that could not be read.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// A flat mapping from dotted string keys to string values.
///
/// Tables act as mutable accumulators while contributions are merged and are
/// logically frozen once handed to pool construction. Iteration is in sorted
/// key order, which makes downstream traversal deterministic.
///
/// Values are held in cleartext, passwords included, since that is the wire
/// format. The `Debug` impl redacts any `password` key so a logged table
/// does not leak credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PropertyTable {
    entries: BTreeMap<String, String>,
}

impl PropertyTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, overwriting any earlier value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether the table contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses the line-oriented subset of the Java properties text format.
    ///
    /// Blank lines and lines starting with `#` or `!` are skipped. The first
    /// `=` or `:` separates the key from the value; a line without either is
    /// a key with an empty value. Whitespace around keys and values is
    /// trimmed. Escape sequences and line continuations are not supported.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.find(['=', ':']) {
                Some(at) => {
                    let (key, value) = line.split_at(at);
                    table.set(key.trim_end(), value[1..].trim_start());
                }
                None => table.set(line, ""),
            }
        }
        table
    }

    /// Reads and parses one properties file. An I/O failure is fatal to the
    /// caller's bootstrap; there is no retry.
    pub fn from_path(path: &Path) -> Result<Self, PropertiesFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| PropertiesFileError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }
}

impl FromIterator<(String, String)> for PropertyTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for PropertyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            if key == "password" || key.ends_with(".password") {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines() {
        let table = PropertyTable::parse(
            "# pools for the reporting service\n\
             ds1.dataSource.maximumPoolSize=10\n\
             ds1.dataSource.dataSource.serverName = db.internal\n\
             ! trailing comment\n\
             ds1.dataSource.username: reporter\n",
        );
        assert_eq!(table.get("ds1.dataSource.maximumPoolSize"), Some("10"));
        assert_eq!(table.get("ds1.dataSource.dataSource.serverName"), Some("db.internal"));
        assert_eq!(table.get("ds1.dataSource.username"), Some("reporter"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn line_without_separator_is_a_key_with_empty_value() {
        let table = PropertyTable::parse("standalone\n");
        assert_eq!(table.get("standalone"), Some(""));
    }

    #[test]
    fn later_lines_overwrite_earlier_ones() {
        let table = PropertyTable::parse("a=1\na=2\n");
        assert_eq!(table.get("a"), Some("2"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn debug_output_redacts_password_keys() {
        let mut table = PropertyTable::new();
        table.set("ds1.dataSource.password", "hunter2");
        table.set("password", "hunter2");
        table.set("ds1.dataSource.username", "app");

        let rendered = format!("{table:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("app"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = PropertyTable::from_path(Path::new("/nonexistent/datasource.properties"))
            .unwrap_err();
        assert!(err.to_string().contains("datasource.properties"));
    }
}
