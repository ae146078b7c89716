//! Discovery rounds and the negotiation strategy chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{ConflictResolution, ResolutionStrategy, ResolvedTools, ToolConflict, ToolSource};
use crate::dedup::namespace_tool;
use crate::registry::ToolRegistry;
use crate::tool::Tool;

/// Default per-source query timeout.
pub const SOURCE_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

/// Source label used when forwarding resolved tools to the registry.
const DISCOVERY_SOURCE: &str = "discovery";

/// Result of one discovery round.
#[derive(Debug, Clone)]
pub struct DiscoveredTools {
    /// Tools per responding source.
    pub servers: HashMap<String, Vec<Tool>>,

    /// Names offered by two or more sources, in first-seen order.
    pub conflicts: Vec<ToolConflict>,

    /// Count of distinct tool names across all responding sources.
    pub total_tools: usize,

    /// Number of conflicts.
    pub conflict_count: usize,
}

/// Counts from forwarding resolved tools to a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistrationResult {
    /// Tools the registry accepted.
    pub registered: usize,

    /// Tools skipped because the name was already registered.
    pub skipped: usize,
}

/// Operability snapshot of a discovery + negotiation run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    /// When the report was generated.
    pub timestamp: DateTime<Utc>,

    /// Sources that responded in the round.
    pub servers: Vec<String>,

    /// Discovery-side numbers.
    pub discovery: DiscoverySummary,

    /// Negotiation-side numbers.
    pub resolution: ResolutionSummary,
}

/// Discovery half of a [`DiscoveryReport`].
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverySummary {
    /// Distinct tool names discovered.
    pub total_tools: usize,

    /// Number of conflicting names.
    pub conflicts: usize,

    /// Per-conflict detail.
    pub conflict_details: Vec<ConflictDetail>,
}

/// One conflicting name and its contributors.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictDetail {
    /// The contested name.
    pub tool_name: String,

    /// Sources offering it.
    pub conflicting_sources: Vec<String>,
}

/// Negotiation half of a [`DiscoveryReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSummary {
    /// Conflicts a strategy resolved.
    pub resolved: usize,

    /// Conflicts no strategy resolved.
    pub failed: usize,

    /// Strategy used per resolved tool.
    pub strategies: Vec<StrategyEntry>,
}

/// Strategy attribution for one resolved tool.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyEntry {
    /// The resolved tool name.
    pub tool: String,

    /// Strategy that selected the winner.
    pub strategy: ResolutionStrategy,

    /// Source of the winning definition.
    pub source: String,
}

impl DiscoveryReport {
    /// Pretty-printed JSON for logs and operators.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Queries registered sources, detects cross-source name conflicts, and
/// resolves them through a fixed strategy chain.
///
/// Source queries run concurrently and are joined before conflict detection.
/// Query order (and therefore conflict `sources` order) is registration
/// order.
pub struct ToolDiscovery {
    sources: Vec<Arc<dyn ToolSource>>,
    source_timeout: Duration,
}

impl Default for ToolDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolDiscovery {
    /// Create a discovery protocol with the default source timeout.
    pub fn new() -> Self {
        Self::with_timeout(SOURCE_TIMEOUT_DEFAULT)
    }

    /// Create a discovery protocol with a custom per-source timeout.
    pub fn with_timeout(source_timeout: Duration) -> Self {
        Self {
            sources: Vec::new(),
            source_timeout,
        }
    }

    /// Register a source. A source with the same name is replaced in place,
    /// keeping its position in query order.
    pub fn register_source(&mut self, source: Arc<dyn ToolSource>) {
        if let Some(existing) = self.sources.iter_mut().find(|s| s.name() == source.name()) {
            *existing = source;
        } else {
            self.sources.push(source);
        }
    }

    /// Remove a source from discovery.
    pub fn unregister_source(&mut self, name: &str) {
        self.sources.retain(|s| s.name() != name);
    }

    /// Names of registered sources, in query order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Query every source and detect cross-source conflicts.
    ///
    /// A source that fails or exceeds the timeout is logged and excluded
    /// from the round; partial results are acceptable.
    pub async fn discover(&self) -> DiscoveredTools {
        let queries = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let deadline = self.source_timeout;
            async move {
                let name = source.name().to_string();
                let result = tokio::time::timeout(deadline, source.list_tools()).await;
                (name, result)
            }
        });

        let mut servers: HashMap<String, Vec<Tool>> = HashMap::new();
        let mut by_name: Vec<ToolConflict> = Vec::new();
        let mut name_index: HashMap<String, usize> = HashMap::new();

        for (source_name, result) in join_all(queries).await {
            let tools = match result {
                Ok(Ok(tools)) => tools,
                Ok(Err(err)) => {
                    error!(source = %source_name, error = %err, "Failed to query source");
                    continue;
                }
                Err(_) => {
                    error!(
                        source = %source_name,
                        timeout_ms = self.source_timeout.as_millis() as u64,
                        "Source query timed out"
                    );
                    continue;
                }
            };

            for tool in &tools {
                match name_index.get(&tool.name) {
                    Some(&i) => {
                        by_name[i].sources.push(source_name.clone());
                        by_name[i].tools.push(tool.clone());
                    }
                    None => {
                        name_index.insert(tool.name.clone(), by_name.len());
                        by_name.push(ToolConflict {
                            tool_name: tool.name.clone(),
                            sources: vec![source_name.clone()],
                            tools: vec![tool.clone()],
                        });
                    }
                }
            }

            servers.insert(source_name, tools);
        }

        let total_tools = by_name.len();
        let conflicts: Vec<ToolConflict> = by_name
            .into_iter()
            .filter(|c| c.sources.len() > 1)
            .collect();

        debug!(
            sources = servers.len(),
            total_tools,
            conflicts = conflicts.len(),
            "Discovery round complete"
        );

        DiscoveredTools {
            conflict_count: conflicts.len(),
            servers,
            conflicts,
            total_tools,
        }
    }

    /// Resolve conflicts through the fixed strategy chain, then rebuild the
    /// full tool set with resolutions overlaid.
    ///
    /// Strategies run in order: local-preferred, newest, namespace fallback.
    /// A malformed conflict is recorded as failed; nothing propagates out
    /// of negotiation.
    pub async fn negotiate(&self, conflicts: &[ToolConflict]) -> ResolvedTools {
        let mut resolutions: Vec<ConflictResolution> = Vec::new();
        let mut failed_resolutions: Vec<ToolConflict> = Vec::new();

        for conflict in conflicts {
            if conflict.sources.len() != conflict.tools.len() || conflict.sources.len() < 2 {
                warn!(tool = %conflict.tool_name, "Malformed conflict, recording as failed");
                failed_resolutions.push(conflict.clone());
                continue;
            }

            let resolution = Self::prefer_local(conflict)
                .or_else(|| Self::prefer_newest(conflict))
                .or_else(|| Self::namespace_fallback(conflict));

            match resolution {
                Some(resolution) => {
                    info!(
                        tool = %resolution.tool_name,
                        source = %resolution.selected_source,
                        strategy = %resolution.strategy,
                        "Conflict resolved"
                    );
                    resolutions.push(resolution);
                }
                None => failed_resolutions.push(conflict.clone()),
            }
        }

        // Rebuild the full set: plain first-wins merge of everything, then
        // resolutions take precedence.
        let discovery = self.discover().await;

        let mut tools: Vec<Tool> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for source_name in self.source_names() {
            let Some(source_tools) = discovery.servers.get(&source_name) else {
                continue;
            };
            for tool in source_tools {
                if !index.contains_key(&tool.name) {
                    index.insert(tool.name.clone(), tools.len());
                    tools.push(tool.clone());
                }
            }
        }

        for resolution in &resolutions {
            match index.get(&resolution.tool_name) {
                Some(&i) => tools[i] = resolution.selected_tool.clone(),
                None => tools.push(resolution.selected_tool.clone()),
            }
        }

        ResolvedTools {
            tools,
            resolutions,
            failed_resolutions,
        }
    }

    /// Strategy 1: a `local-` or `internal-` source takes precedence.
    fn prefer_local(conflict: &ToolConflict) -> Option<ConflictResolution> {
        let i = conflict
            .sources
            .iter()
            .position(|s| s.starts_with("local-") || s.starts_with("internal-"))?;

        Some(ConflictResolution {
            tool_name: conflict.tool_name.clone(),
            selected_source: conflict.sources[i].clone(),
            selected_tool: conflict.tools[i].clone(),
            strategy: ResolutionStrategy::LocalPreferred,
        })
    }

    /// Strategy 2: the definition with the largest serialized schema wins;
    /// ties keep the first encountered.
    fn prefer_newest(conflict: &ToolConflict) -> Option<ConflictResolution> {
        if conflict.tools.is_empty() {
            return None;
        }

        let mut selected = 0;
        let mut max_size = conflict.tools[0].schema_size();
        for (i, tool) in conflict.tools.iter().enumerate().skip(1) {
            let size = tool.schema_size();
            if size > max_size {
                max_size = size;
                selected = i;
            }
        }

        Some(ConflictResolution {
            tool_name: conflict.tool_name.clone(),
            selected_source: conflict.sources[selected].clone(),
            selected_tool: conflict.tools[selected].clone(),
            strategy: ResolutionStrategy::Newest,
        })
    }

    /// Strategy 3: fall back to the first source's definition, renamed under
    /// that source's namespace so it cannot collide again.
    fn namespace_fallback(conflict: &ToolConflict) -> Option<ConflictResolution> {
        let source = conflict.sources.first()?;
        let tool = conflict.tools.first()?;

        Some(ConflictResolution {
            tool_name: conflict.tool_name.clone(),
            selected_source: source.clone(),
            selected_tool: namespace_tool(tool, source),
            strategy: ResolutionStrategy::Namespace,
        })
    }

    /// Forward resolved tools to a registry.
    ///
    /// First-writer-wins skips are reported as `skipped`, not errors.
    pub fn register(&self, tools: &[Tool], registry: &ToolRegistry) -> RegistrationResult {
        let mut result = RegistrationResult {
            registered: 0,
            skipped: 0,
        };

        for tool in tools {
            if registry.register(tool.clone(), DISCOVERY_SOURCE, None) {
                result.registered += 1;
            } else {
                result.skipped += 1;
            }
        }

        info!(
            registered = result.registered,
            skipped = result.skipped,
            "Forwarded resolved tools to registry"
        );
        result
    }

    /// Run a full discovery + negotiation round and summarize it.
    pub async fn report(&self) -> DiscoveryReport {
        let discovery = self.discover().await;
        let negotiated = self.negotiate(&discovery.conflicts).await;

        DiscoveryReport {
            timestamp: Utc::now(),
            servers: discovery.servers.keys().cloned().collect(),
            discovery: DiscoverySummary {
                total_tools: discovery.total_tools,
                conflicts: discovery.conflict_count,
                conflict_details: discovery
                    .conflicts
                    .iter()
                    .map(|c| ConflictDetail {
                        tool_name: c.tool_name.clone(),
                        conflicting_sources: c.sources.clone(),
                    })
                    .collect(),
            },
            resolution: ResolutionSummary {
                resolved: negotiated.resolutions.len(),
                failed: negotiated.failed_resolutions.len(),
                strategies: negotiated
                    .resolutions
                    .iter()
                    .map(|r| StrategyEntry {
                        tool: r.tool_name.clone(),
                        strategy: r.strategy,
                        source: r.selected_source.clone(),
                    })
                    .collect(),
            },
        }
    }
}
