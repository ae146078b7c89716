//! Central tool registry.
//!
//! One authoritative mapping of tool name to definition and owning source,
//! with first-registration-wins semantics and an audit trail of every
//! registration attempt.
//!
//! The registry is an explicitly constructed handle, not a process-wide
//! singleton: clone it to share it, and construct a fresh one in tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolbus::registry::ToolRegistry;
//! use toolbus::tool::Tool;
//!
//! let registry = ToolRegistry::new();
//!
//! let accepted = registry.register(Tool::new("search"), "local-files", None);
//! assert!(accepted);
//!
//! // Same name from another source is skipped, not merged.
//! let accepted = registry.register(Tool::new("search"), "web", None);
//! assert!(!accepted);
//! ```

mod entry;
#[allow(clippy::module_inception)]
mod registry;

pub use entry::{AuditAction, AuditRecord, ToolEntry};
pub use registry::{RegistryStats, ToolRegistry, AUDIT_HISTORY_MAX_DEFAULT};
