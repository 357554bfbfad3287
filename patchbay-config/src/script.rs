//! Whole-file configuration parsing with round-trip serialization.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::property::{Property, PropertyValue};

/// Errors reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A required property is missing.
    #[error("missing property `{key}`")]
    MissingProperty {
        /// The full key that was looked up.
        key: String,
    },
}

/// One line of a configuration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum ScriptLine {
    /// A comment, blank or otherwise non-pair line, preserved verbatim.
    Verbatim(String),
    /// A parsed key-value pair.
    Pair(Property),
}

/// An ordered configuration script: key-value pairs interleaved with the
/// comment lines that surround them.
///
/// `parse` followed by [`ConfigScript::to_text`] reproduces the semantic
/// key-value set; comment lines survive verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigScript {
    lines: Vec<ScriptLine>,
}

impl ConfigScript {
    /// Parse configuration text.
    ///
    /// Lines that do not form a valid `key = value` pair are preserved
    /// verbatim; genuinely malformed lines (neither pair nor comment nor
    /// blank) are kept too, with a warning.
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        for raw in text.lines() {
            match Property::parse_line(raw) {
                Some(property) => lines.push(ScriptLine::Pair(property)),
                None => {
                    let trimmed = raw.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with('#') {
                        warn!(line = raw, "ignoring malformed configuration line");
                    }
                    lines.push(ScriptLine::Verbatim(raw.to_string()));
                }
            }
        }
        Self { lines }
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Serialize back to configuration text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                ScriptLine::Verbatim(text) => out.push_str(text),
                ScriptLine::Pair(property) => out.push_str(&property.to_line()),
            }
            out.push('\n');
        }
        out
    }

    /// Iterate over the key-value pairs in file order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.lines.iter().filter_map(|line| match line {
            ScriptLine::Pair(property) => Some(property),
            ScriptLine::Verbatim(_) => None,
        })
    }

    /// Number of key-value pairs.
    pub fn len(&self) -> usize {
        self.properties().count()
    }

    /// Whether the script holds no key-value pairs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a property by its full dotted key.
    pub fn find(&self, key: &str) -> Option<&Property> {
        self.properties().find(|p| p.key.to_string() == key)
    }

    /// The value of a property by its full dotted key.
    pub fn value_of(&self, key: &str) -> Option<&PropertyValue> {
        self.find(key).map(|p| &p.value)
    }

    /// The value of a property, or a `MissingProperty` error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingProperty`] when the key is absent.
    pub fn require(&self, key: &str) -> Result<&PropertyValue, ConfigError> {
        self.value_of(key).ok_or_else(|| ConfigError::MissingProperty {
            key: key.to_string(),
        })
    }

    /// All properties whose key section matches.
    pub fn section(&self, section: &str) -> Vec<&Property> {
        self.properties()
            .filter(|p| p.key.section == section)
            .collect()
    }

    /// Update an existing property or append a new one.
    pub fn set(&mut self, property: Property) {
        for line in &mut self.lines {
            if let ScriptLine::Pair(existing) = line {
                if existing.key == property.key {
                    *existing = property;
                    return;
                }
            }
        }
        self.lines.push(ScriptLine::Pair(property));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKey, PropertyValue};

    const SAMPLE: &str = "\
# patchbay router configuration
# generated by hand

connection.address = 127.0.0.1
connection.port = 8181  # default router port

log.enable = true
log.scope.app = DEBUG | SCOPE
";

    #[test]
    fn test_parse_counts_pairs_only() {
        let script = ConfigScript::parse(SAMPLE);
        assert_eq!(script.len(), 4);
    }

    #[test]
    fn test_lookup() {
        let script = ConfigScript::parse(SAMPLE);
        assert_eq!(
            script.value_of("connection.address").map(|v| v.as_str()),
            Some("127.0.0.1")
        );
        assert_eq!(
            script.value_of("connection.port").and_then(|v| v.as_u16()),
            Some(8181)
        );
        assert_eq!(
            script.value_of("log.enable").and_then(|v| v.as_bool()),
            Some(true)
        );
        assert!(script.value_of("connection.missing").is_none());
    }

    #[test]
    fn test_require_reports_missing() {
        let script = ConfigScript::parse(SAMPLE);
        let err = script.require("connection.missing").expect_err("missing");
        assert!(matches!(err, ConfigError::MissingProperty { key } if key == "connection.missing"));
    }

    #[test]
    fn test_section_filter() {
        let script = ConfigScript::parse(SAMPLE);
        let connection = script.section("connection");
        assert_eq!(connection.len(), 2);
    }

    #[test]
    fn test_roundtrip_preserves_semantics_and_comments() {
        let script = ConfigScript::parse(SAMPLE);
        let text = script.to_text();
        let reparsed = ConfigScript::parse(&text);

        let original: Vec<&Property> = script.properties().collect();
        let roundtripped: Vec<&Property> = reparsed.properties().collect();
        assert_eq!(original, roundtripped);

        assert!(text.contains("# patchbay router configuration"));
        assert!(text.contains("# default router port"));
    }

    #[test]
    fn test_roundtrip_is_stable() {
        let once = ConfigScript::parse(SAMPLE).to_text();
        let twice = ConfigScript::parse(&once).to_text();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_updates_in_place() {
        let mut script = ConfigScript::parse(SAMPLE);
        script.set(Property::new(
            PropertyKey::parse("connection.port").expect("key"),
            PropertyValue::new("9000"),
        ));
        assert_eq!(
            script.value_of("connection.port").and_then(|v| v.as_u16()),
            Some(9000)
        );
        assert_eq!(script.len(), 4);

        script.set(Property::new(
            PropertyKey::parse("connection.timeout").expect("key"),
            PropertyValue::new("250"),
        ));
        assert_eq!(script.len(), 5);
    }

    #[test]
    fn test_malformed_lines_survive_roundtrip() {
        let text = "garbage without equals\nconnection.port = 1\n";
        let script = ConfigScript::parse(text);
        assert_eq!(script.len(), 1);
        assert!(script.to_text().contains("garbage without equals"));
    }
}
