//! The source seam: anything that can report its current tool list.

use async_trait::async_trait;

use crate::tool::Tool;

/// An independent provider of tools, identified by a string name.
///
/// Implementations may fail or hang; the discovery protocol imposes a
/// timeout and excludes the source from the round on either outcome.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Unique name of this source.
    fn name(&self) -> &str;

    /// The source's current tool list.
    async fn list_tools(&self) -> anyhow::Result<Vec<Tool>>;
}
