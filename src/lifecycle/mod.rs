//! Tool lifecycle tracking.
//!
//! Each tool moves through `active → deprecated → removed` (or straight to
//! removed), with priority-based conflict resolution on re-registration,
//! pluggable per-name conflict handlers, usage counters, and a configurable
//! grace period between deprecation and actual removal.
//!
//! State changes are announced as typed [`LifecycleEvent`] values on a
//! broadcast channel; call [`ToolLifecycleManager::subscribe`] to observe
//! them. Events are sent synchronously with the state change that caused
//! them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolbus::lifecycle::{ToolLifecycleManager, ToolMetadata};
//! use toolbus::tool::Tool;
//!
//! let manager = ToolLifecycleManager::new();
//! let mut events = manager.subscribe();
//!
//! manager.register(Tool::new("search"), ToolMetadata::default());
//! manager.record_usage("search");
//!
//! // Soft removal with a grace period before the entry disappears.
//! manager.deprecate("search", Some("search_v2"));
//! ```

mod events;
mod manager;

pub use events::LifecycleEvent;
pub use manager::{
    ConflictContext, LifecycleEntry, LifecycleState, LifecycleStats, ToolLifecycleManager,
    ToolMetadata, GRACE_PERIOD_DEFAULT,
};
