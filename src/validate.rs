//! Tool set validation.
//!
//! Pure checks over a slice of tools: no duplicate names, names within the
//! 64 character limit, characters restricted to alphanumerics, underscores,
//! and hyphens. Validation never mutates its input and never panics on any
//! tool list; failures are surfaced as a structured [`ValidationError`].

use thiserror::Error;

use crate::tool::Tool;

/// Maximum length of a tool name presented to the consumer.
pub const NAME_LEN_MAX: usize = 64;

/// A failed validation of a tool list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// One or more names appear more than once in the list.
    #[error("Duplicate tool names detected: {}", names.join(", "))]
    DuplicateNames {
        /// Each offending name, listed once, in first-occurrence order.
        names: Vec<String>,
    },

    /// A tool name exceeds [`NAME_LEN_MAX`].
    #[error("Tool name \"{name}\" exceeds {NAME_LEN_MAX} character limit")]
    NameTooLong {
        /// The offending name.
        name: String,
    },

    /// A tool name contains characters outside `[A-Za-z0-9_-]`.
    #[error("Tool name \"{name}\" contains invalid characters. Only alphanumeric, underscore, and hyphen allowed.")]
    InvalidCharacters {
        /// The offending name.
        name: String,
    },
}

impl ValidationError {
    /// Duplicate names carried by this error, if it is a duplicate failure.
    pub fn duplicates(&self) -> &[String] {
        match self {
            ValidationError::DuplicateNames { names } => names,
            _ => &[],
        }
    }
}

/// Result alias for validation.
pub type ValidationResult = Result<(), ValidationError>;

/// Whether a single character is allowed in a tool name.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Check whether a single name satisfies the consumer-facing constraints.
pub fn validate_name(name: &str) -> ValidationResult {
    if name.len() > NAME_LEN_MAX {
        return Err(ValidationError::NameTooLong {
            name: name.to_string(),
        });
    }

    if name.is_empty() || !name.chars().all(is_allowed_char) {
        return Err(ValidationError::InvalidCharacters {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Validate a tool list for uniqueness and name shape.
///
/// The duplicate check runs first over the whole list; per-tool shape checks
/// then run in list order, short-circuiting on the first failure.
pub fn validate(tools: &[Tool]) -> ValidationResult {
    let mut seen = std::collections::HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();

    for tool in tools {
        if !seen.insert(tool.name.as_str()) && !duplicates.iter().any(|d| d == &tool.name) {
            duplicates.push(tool.name.clone());
        }
    }

    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateNames { names: duplicates });
    }

    for tool in tools {
        validate_name(&tool.name)?;
    }

    Ok(())
}
