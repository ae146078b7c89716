//! Tool definitions shared across the crate.
//!
//! A [`Tool`] is a value object: it is compared and ranked by structural
//! completeness and never mutated once stored. Unknown fields from source
//! payloads are carried through the flattened `extra` map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A named, schema-described capability exposed by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name; identity within the aggregate namespace.
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema for the tool's input.
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// Opaque fields passed through from the source unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Tool {
    /// Create a tool with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
            extra: BTreeMap::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Serialized size of the input schema, in bytes.
    ///
    /// A missing schema counts as the serialization of an empty object, so
    /// tools without schemas still compare consistently.
    pub fn schema_size(&self) -> usize {
        match &self.input_schema {
            Some(schema) => serde_json::to_string(schema)
                .map(|s| s.len())
                .unwrap_or(0),
            None => "{}".len(),
        }
    }

    /// Whether `self` is a strictly more complete definition than `other`.
    ///
    /// Used wherever "pick the better duplicate" is needed: description
    /// presence wins, then schema presence, then larger serialized schema.
    /// The ordering is not transitive across chains of more than two tools;
    /// callers must fold pairwise left to right rather than sort.
    pub fn is_more_complete(&self, other: &Tool) -> bool {
        if self.description.is_some() && other.description.is_none() {
            return true;
        }

        if self.input_schema.is_some() && other.input_schema.is_none() {
            return true;
        }

        self.schema_size() > other.schema_size()
    }
}
