//! Conflict and resolution types, produced per discovery round.

use serde::{Deserialize, Serialize};

use crate::tool::Tool;

/// Two or more sources offering a tool under the same name.
///
/// `sources` and `tools` are parallel vectors in query order; both always
/// have at least two elements when produced by discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConflict {
    /// The contested name.
    pub tool_name: String,

    /// Contributing sources, in query order.
    pub sources: Vec<String>,

    /// The definitions offered, parallel to `sources`.
    pub tools: Vec<Tool>,
}

/// Strategy that produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// A `local-`/`internal-` source contributed; its definition wins.
    LocalPreferred,

    /// The definition with the largest serialized schema wins.
    Newest,

    /// Definitions merged across sources. Reserved; not currently produced.
    SchemaMerge,

    /// Fallback: the first source's definition, renamed under its source's
    /// namespace.
    Namespace,
}

impl ResolutionStrategy {
    /// String form used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::LocalPreferred => "local_preferred",
            ResolutionStrategy::Newest => "newest",
            ResolutionStrategy::SchemaMerge => "schema_merge",
            ResolutionStrategy::Namespace => "namespace",
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    /// The contested name as discovered.
    pub tool_name: String,

    /// Source whose definition was selected.
    pub selected_source: String,

    /// The selected definition (possibly renamed by the namespace strategy).
    pub selected_tool: Tool,

    /// Strategy that made the selection.
    pub strategy: ResolutionStrategy,
}

/// Result of a negotiation round.
#[derive(Debug, Clone)]
pub struct ResolvedTools {
    /// Full tool set: non-conflicting tools plus resolutions overlaid.
    pub tools: Vec<Tool>,

    /// Per-conflict resolutions.
    pub resolutions: Vec<ConflictResolution>,

    /// Conflicts no strategy could resolve.
    pub failed_resolutions: Vec<ToolConflict>,
}
