//! Property keys, values and single-line parsing.

use serde::{Deserialize, Serialize};

use patchbay_core::{CodecError, WireDecode, WireEncode};

/// Separator between a key and its value.
pub const SYNTAX_EQUAL: char = '=';

/// Start of a comment, extending to end of line.
pub const SYNTAX_COMMENT: char = '#';

/// Separator between elements of a list value.
pub const SYNTAX_LIST: char = '|';

/// Separator between key path segments.
pub const SYNTAX_DOT: char = '.';

/// Structured property path: `section.property[.module[.position]]`.
///
/// A key is valid when it has at least a section and a property segment.
/// Any segments beyond the fourth are folded into the position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyKey {
    /// First path segment.
    pub section: String,
    /// Second path segment.
    pub property: String,
    /// Optional third segment.
    pub module: Option<String>,
    /// Optional trailing segment(s).
    pub position: Option<String>,
}

impl PropertyKey {
    /// Create a two-segment key.
    pub fn new(section: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            property: property.into(),
            module: None,
            position: None,
        }
    }

    /// Parse a dotted key path. Returns `None` when fewer than two
    /// non-empty segments are present.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(SYNTAX_DOT).map(str::trim);
        let section = parts.next().filter(|s| !s.is_empty())?.to_string();
        let property = parts.next().filter(|s| !s.is_empty())?.to_string();
        let module = parts.next().map(str::to_string);
        let rest: Vec<&str> = parts.collect();
        let position = if rest.is_empty() {
            None
        } else {
            Some(rest.join("."))
        };
        Some(Self {
            section,
            property,
            module,
            position,
        })
    }

    /// Valid when section and property are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.section.is_empty() && !self.property.is_empty()
    }

    /// Whether section and property match the given pair.
    pub fn matches(&self, section: &str, property: &str) -> bool {
        self.section == section && self.property == property
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section, self.property)?;
        if let Some(module) = &self.module {
            write!(f, ".{module}")?;
        }
        if let Some(position) = &self.position {
            write!(f, ".{position}")?;
        }
        Ok(())
    }
}

/// A property value: raw text with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyValue {
    raw: String,
}

impl PropertyValue {
    /// Create a value from raw text; surrounding whitespace is stripped.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into().trim().to_string(),
        }
    }

    /// The raw text of the value.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parse as an unsigned number.
    pub fn as_u32(&self) -> Option<u32> {
        self.raw.parse().ok()
    }

    /// Parse as a port-sized number.
    pub fn as_u16(&self) -> Option<u16> {
        self.raw.parse().ok()
    }

    /// Parse as a boolean: `true`/`false`/`1`/`0`, case-insensitive.
    pub fn as_bool(&self) -> Option<bool> {
        match self.raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Split a `|`-separated list, trimming each element.
    pub fn as_list(&self) -> Vec<&str> {
        self.raw
            .split(SYNTAX_LIST)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether the value is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for PropertyValue {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// One key-value pair with its optional inline comment.
///
/// Equality considers only the key-value pair; the comment is carried
/// for round-tripping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Property {
    /// The structured key.
    pub key: PropertyKey,
    /// The value text.
    pub value: PropertyValue,
    /// Inline comment without the leading `#`, empty when absent.
    pub comment: String,
}

impl Property {
    /// Create a property from key and value text.
    pub fn new(key: PropertyKey, value: PropertyValue) -> Self {
        Self {
            key,
            value,
            comment: String::new(),
        }
    }

    /// Attach an inline comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Parse one configuration line.
    ///
    /// Returns `None` for blank lines, comment-only lines and lines
    /// without a valid `key = value` pair before any comment.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (data, comment) = match line.find(SYNTAX_COMMENT) {
            Some(pos) => (&line[..pos], line[pos + 1..].trim().to_string()),
            None => (line, String::new()),
        };

        let (key_text, value_text) = data.split_once(SYNTAX_EQUAL)?;
        let key = PropertyKey::parse(key_text.trim())?;
        Some(Self {
            key,
            value: PropertyValue::new(value_text),
            comment,
        })
    }

    /// Serialize back to one configuration line.
    pub fn to_line(&self) -> String {
        if self.comment.is_empty() {
            format!("{} = {}", self.key, self.value)
        } else {
            format!("{} = {} # {}", self.key, self.value, self.comment)
        }
    }

    /// Valid when the key is valid.
    pub fn is_valid(&self) -> bool {
        self.key.is_valid()
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for Property {}

impl WireEncode for Property {
    fn encode(&self, out: &mut Vec<u8>) {
        self.key.to_string().encode(out);
        self.value.raw.encode(out);
        self.comment.encode(out);
    }
}

impl WireDecode for Property {
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let key_text = String::decode(input)?;
        let value = PropertyValue::new(String::decode(input)?);
        let comment = String::decode(input)?;
        let key = PropertyKey::parse(&key_text).ok_or(CodecError::Malformed {
            type_name: "PropertyKey",
        })?;
        Ok(Self {
            key,
            value,
            comment,
        })
    }
}
