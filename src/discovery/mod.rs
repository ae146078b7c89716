//! Multi-source tool discovery and conflict negotiation.
//!
//! Sources implement [`ToolSource`] and are queried concurrently on each
//! discovery round; a source that fails or times out is excluded from that
//! round rather than failing the whole operation. Names offered by two or
//! more sources become [`ToolConflict`]s, resolved by an ordered chain of
//! strategies: local-preferred, newest (largest schema), then a namespacing
//! fallback that always succeeds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolbus::discovery::ToolDiscovery;
//!
//! let mut discovery = ToolDiscovery::new();
//! discovery.register_source(files_source);
//! discovery.register_source(web_source);
//!
//! let discovered = discovery.discover().await;
//! let resolved = discovery.negotiate(&discovered.conflicts).await;
//! let outcome = discovery.register(&resolved.tools, &registry);
//! ```

mod conflict;
mod protocol;
mod source;

pub use conflict::{ConflictResolution, ResolutionStrategy, ResolvedTools, ToolConflict};
pub use protocol::{
    DiscoveredTools, DiscoveryReport, RegistrationResult, ToolDiscovery, SOURCE_TIMEOUT_DEFAULT,
};
pub use source::ToolSource;
