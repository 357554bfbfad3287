//! # patchbay-config
//!
//! Line-oriented property configuration for the patchbay runtime.
//!
//! The file grammar is one key-value pair per line:
//!
//! ```text
//! # router connection settings
//! connection.address = 127.0.0.1
//! connection.port    = 8181      # default router port
//! logging.scope.app  = DEBUG | SCOPE
//! ```
//!
//! - `=` separates key from value
//! - `#` starts a comment extending to end of line
//! - whitespace around tokens is stripped
//! - empty lines are ignored for lookups but preserved on round-trip
//! - keys are dotted property paths, `section.property[.module[.position]]`
//!
//! Parsing a file and serializing it back reproduces the semantic
//! key-value set with comment lines intact.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

/// Property keys, values and single-line parsing.
pub mod property;

/// Whole-file parsing with round-trip serialization.
pub mod script;

pub use property::{Property, PropertyKey, PropertyValue};
pub use script::{ConfigError, ConfigScript};
