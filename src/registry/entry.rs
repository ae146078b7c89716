//! Registry entry and audit record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::Tool;

/// A registered tool with ownership metadata.
///
/// Owned exclusively by the registry; the `source` of an entry never changes
/// after the first successful registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    /// The registered tool definition.
    pub tool: Tool,

    /// Name of the source that won the registration.
    pub source: String,

    /// When the registration happened.
    pub timestamp: DateTime<Utc>,

    /// Namespace the tool was registered under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Outcome of a single registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    /// The tool was stored; this source now owns the name.
    Register,

    /// The name was already taken; the attempt was skipped.
    Skip,
}

impl AuditAction {
    /// String form used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "register",
            AuditAction::Skip => "skip",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the registry's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Name of the tool the attempt was for.
    pub tool: String,

    /// Whether the attempt registered or was skipped.
    pub action: AuditAction,

    /// Source that made the attempt.
    pub source: String,

    /// When the attempt happened.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_display() {
        assert_eq!(AuditAction::Register.to_string(), "register");
        assert_eq!(AuditAction::Skip.to_string(), "skip");
    }

    #[test]
    fn test_audit_record_serialization() {
        let record = AuditRecord {
            tool: "search".to_string(),
            action: AuditAction::Skip,
            source: "web".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "skip");
        // chrono's serde emits RFC 3339 timestamps.
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
