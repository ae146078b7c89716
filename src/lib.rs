//! Toolbus - Multi-source tool aggregation for LLM clients
//!
//! Toolbus merges tool definitions from many sources (local harnesses,
//! remote servers, extensions) into one clean, conflict-free set:
//!
//! - **`tool`** - The tool definition type shared by every component
//! - **`validate`** - Name and uniqueness validation for aggregated sets
//! - **`dedup`** - Order-preserving deduplication and namespacing
//! - **`registry`** - Central first-writer-wins registry with an audit trail
//! - **`lifecycle`** - Versioned registration, conflict policy, graceful removal
//! - **`discovery`** - Concurrent source discovery and conflict negotiation
//! - **`monitor`** - Periodic health checks with automatic remediation
//! - **`interceptor`** - Outgoing payload inspection and repair
//! - **`logging`** - Registration event records and duplicate analysis
//! - **`config`** - TOML configuration for the pipeline
//!
//! # Example: Discover, negotiate, register
//!
//! ```ignore
//! use toolbus::discovery::ToolDiscovery;
//! use toolbus::registry::ToolRegistry;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut discovery = ToolDiscovery::new();
//! discovery.register_source(my_source);
//!
//! let discovered = discovery.discover().await;
//! let resolved = discovery.negotiate(&discovered.conflicts).await;
//!
//! let registry = ToolRegistry::new();
//! let result = discovery.register(&resolved.tools, &registry);
//! println!("registered {}, skipped {}", result.registered, result.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Validate and repair a payload
//!
//! ```ignore
//! use toolbus::interceptor::PayloadInterceptor;
//!
//! let interceptor = PayloadInterceptor::new();
//! let mut body = serde_json::json!({ "tools": [] });
//! let outcome = interceptor.inspect(&mut body);
//! assert!(!outcome.modified);
//! ```

#![warn(missing_docs)]

/// TOML configuration for the aggregation pipeline
pub mod config;

/// Order-preserving deduplication and namespacing
pub mod dedup;

/// Source discovery and conflict negotiation
pub mod discovery;

/// Outgoing payload inspection and repair
pub mod interceptor;

/// Tool lifecycle management
pub mod lifecycle;

/// Registration event records and duplicate analysis
pub mod logging;

/// Aggregate health monitoring
pub mod monitor;

/// Central tool registry
pub mod registry;

/// Tool definition type
pub mod tool;

/// Tool set validation
pub mod validate;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ToolbusConfig;
    pub use crate::dedup::{deduplicate, namespace_tool};
    pub use crate::discovery::{ToolDiscovery, ToolSource};
    pub use crate::interceptor::PayloadInterceptor;
    pub use crate::lifecycle::{LifecycleEvent, ToolLifecycleManager, ToolMetadata};
    pub use crate::logging::{RegistrationLogger, RegistrationPhase};
    pub use crate::monitor::{HealthMonitor, HealthStatus};
    pub use crate::registry::{RegistryStats, ToolRegistry};
    pub use crate::tool::Tool;
    pub use crate::validate::{validate, ValidationError, ValidationResult};
}
