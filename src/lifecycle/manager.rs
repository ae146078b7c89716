//! Lifecycle state machine and conflict resolution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::LifecycleEvent;
use crate::tool::Tool;

/// Default delay between deprecation and actual removal.
pub const GRACE_PERIOD_DEFAULT: Duration = Duration::from_millis(5000);

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Metadata attached to a lifecycle registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool version, if the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Namespace the tool belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Conflict-resolution priority; higher wins, default 0.
    #[serde(default)]
    pub priority: i64,

    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Whether the tool has been deprecated.
    #[serde(default)]
    pub deprecated: bool,

    /// When the tool was deprecated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_date: Option<DateTime<Utc>>,
}

impl ToolMetadata {
    /// Metadata with only a priority set.
    pub fn with_priority(priority: i64) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }
}

/// Lifecycle state of a tracked tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Presented to the consumer.
    Active,

    /// Still tracked but no longer presented; removal is pending.
    Deprecated,

    /// Terminal; the entry is gone from the active map.
    Removed,
}

/// A tool tracked by the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEntry {
    /// The tracked tool definition.
    pub tool: Tool,

    /// Registration metadata.
    pub metadata: ToolMetadata,

    /// Current lifecycle state.
    pub state: LifecycleState,

    /// When the entry was (last) registered.
    pub registered: DateTime<Utc>,

    /// When the tool was last used, if ever.
    pub last_used: Option<DateTime<Utc>>,

    /// Number of recorded usages.
    pub usage_count: u64,
}

/// The two sides of a registration conflict, handed to custom handlers.
#[derive(Debug, Clone)]
pub struct ConflictContext {
    /// Name of the contested tool.
    pub tool_name: String,

    /// The entry currently holding the name.
    pub existing: LifecycleEntry,

    /// The tool attempting to register.
    pub incoming_tool: Tool,

    /// Metadata of the attempting registration.
    pub incoming_metadata: ToolMetadata,
}

/// Per-name conflict handler: `Ok(true)` accepts the incoming tool.
type ConflictHandler = Arc<dyn Fn(&ConflictContext) -> anyhow::Result<bool> + Send + Sync>;

/// Lifecycle statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStats {
    /// Number of active tools.
    pub total_active: usize,

    /// Number of deprecated tools awaiting removal.
    pub total_deprecated: usize,

    /// Top five most-used active tools with their counts.
    pub most_used: Vec<(String, u64)>,

    /// Active tools with zero recorded usage.
    pub never_used: Vec<String>,

    /// Mean usage count across active tools.
    pub average_usage: f64,
}

struct State {
    tools: HashMap<String, LifecycleEntry>,
    handlers: HashMap<String, ConflictHandler>,
    pending_removals: HashMap<String, JoinHandle<()>>,
    grace_period: Duration,
}

struct Shared {
    state: Mutex<State>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl Shared {
    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    /// Final removal step. Idempotent: removing an already-removed name is a
    /// no-op.
    fn remove_entry(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.pending_removals.remove(name);
        if state.tools.remove(name).is_some() {
            drop(state);
            info!(tool = %name, "Removed tool");
            self.emit(LifecycleEvent::Removed {
                tool_name: name.to_string(),
            });
        }
    }
}

/// Tracks per-tool lifecycle state with conflict resolution and graceful
/// deprecation.
///
/// The manager is a cheap-to-clone handle; clones share state and the event
/// channel. Deferred removals are abortable tasks keyed by tool name, so a
/// registration that wins a conflict during a pending grace period cancels
/// the stale timer deterministically.
#[derive(Clone)]
pub struct ToolLifecycleManager {
    shared: Arc<Shared>,
}

impl Default for ToolLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolLifecycleManager {
    /// Create a manager with the default grace period.
    pub fn new() -> Self {
        Self::with_grace_period(GRACE_PERIOD_DEFAULT)
    }

    /// Create a manager with a custom deprecation grace period.
    pub fn with_grace_period(grace_period: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    tools: HashMap::new(),
                    handlers: HashMap::new(),
                    pending_removals: HashMap::new(),
                    grace_period,
                }),
                events,
            }),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.shared.events.subscribe()
    }

    /// Change the grace period for subsequent deprecations.
    pub fn set_grace_period(&self, grace_period: Duration) {
        self.shared.state.lock().unwrap().grace_period = grace_period;
    }

    /// Install a custom conflict handler for one tool name.
    ///
    /// The handler decides whether an incoming registration replaces the
    /// existing entry. A handler that returns an error is treated as a
    /// rejection; it can never corrupt state or crash the caller.
    pub fn set_conflict_handler<F>(&self, tool_name: impl Into<String>, handler: F)
    where
        F: Fn(&ConflictContext) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.shared
            .state
            .lock()
            .unwrap()
            .handlers
            .insert(tool_name.into(), Arc::new(handler));
    }

    /// Register a tool with lifecycle tracking.
    ///
    /// First sight inserts the tool as active. An existing entry under the
    /// same name triggers conflict resolution: the custom handler for the
    /// name if one is installed, otherwise the default priority policy (the
    /// incoming tool wins only with strictly greater priority; ties keep the
    /// existing entry). Returns whether the incoming tool ended up stored.
    pub fn register(&self, tool: Tool, metadata: ToolMetadata) -> bool {
        let name = tool.name.clone();

        let conflict = {
            let state = self.shared.state.lock().unwrap();
            state.tools.get(&name).map(|existing| {
                (existing.clone(), state.handlers.get(&name).cloned())
            })
        };

        if let Some((existing, handler)) = conflict {
            self.shared.emit(LifecycleEvent::Conflict {
                tool_name: name.clone(),
            });

            let context = ConflictContext {
                tool_name: name.clone(),
                existing,
                incoming_tool: tool.clone(),
                incoming_metadata: metadata.clone(),
            };

            let accepted = match handler {
                Some(handler) => match handler(&context) {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        error!(tool = %name, error = %err, "Conflict handler failed, rejecting");
                        false
                    }
                },
                None => {
                    let accepted = metadata.priority > context.existing.metadata.priority;
                    if accepted {
                        self.shared.emit(LifecycleEvent::Replaced {
                            tool_name: name.clone(),
                        });
                    }
                    accepted
                }
            };

            if !accepted {
                debug!(tool = %name, "Conflicting registration rejected, existing entry kept");
                return false;
            }
        }

        self.insert_active(tool, metadata);
        true
    }

    fn insert_active(&self, tool: Tool, metadata: ToolMetadata) {
        let name = tool.name.clone();
        {
            let mut state = self.shared.state.lock().unwrap();
            // A fresh registration supersedes any pending grace-period
            // removal for the same name.
            if let Some(pending) = state.pending_removals.remove(&name) {
                debug!(tool = %name, "Cancelling pending removal on re-registration");
                pending.abort();
            }
            state.tools.insert(
                name.clone(),
                LifecycleEntry {
                    tool: tool.clone(),
                    metadata,
                    state: LifecycleState::Active,
                    registered: Utc::now(),
                    last_used: None,
                    usage_count: 0,
                },
            );
        }
        info!(tool = %name, "Registered tool");
        self.shared.emit(LifecycleEvent::Registered { tool });
    }

    /// Mark a tool deprecated (soft removal).
    ///
    /// The entry stays queryable but is excluded from
    /// [`active_tools`](Self::active_tools); actual removal happens after the
    /// grace period. Returns `false` when no entry exists for the name.
    ///
    /// Must be called within a tokio runtime: removal is scheduled as a task.
    pub fn deprecate(&self, tool_name: &str, replacement: Option<&str>) -> bool {
        {
            let mut state = self.shared.state.lock().unwrap();
            let Some(entry) = state.tools.get_mut(tool_name) else {
                warn!(tool = %tool_name, "Cannot deprecate non-existent tool");
                return false;
            };
            entry.state = LifecycleState::Deprecated;
            entry.metadata.deprecated = true;
            entry.metadata.deprecation_date = Some(Utc::now());
        }

        info!(tool = %tool_name, "Deprecated tool");
        self.shared.emit(LifecycleEvent::Deprecated {
            tool_name: tool_name.to_string(),
            replacement: replacement.map(str::to_string),
        });

        self.schedule_removal(tool_name);
        true
    }

    /// Unregister a tool (hard removal with the same grace period).
    ///
    /// Differs from [`deprecate`](Self::deprecate) only in the emitted event.
    /// Returns `false` when no entry exists for the name.
    pub fn unregister(&self, tool_name: &str) -> bool {
        {
            let mut state = self.shared.state.lock().unwrap();
            let Some(entry) = state.tools.get_mut(tool_name) else {
                return false;
            };
            entry.state = LifecycleState::Deprecated;
        }

        self.shared.emit(LifecycleEvent::Unregistered {
            tool_name: tool_name.to_string(),
        });

        self.schedule_removal(tool_name);
        true
    }

    fn schedule_removal(&self, tool_name: &str) {
        let name = tool_name.to_string();
        let shared = Arc::clone(&self.shared);

        let mut state = self.shared.state.lock().unwrap();
        let grace = state.grace_period;
        let handle = tokio::spawn({
            let name = name.clone();
            async move {
                tokio::time::sleep(grace).await;
                shared.remove_entry(&name);
            }
        });

        // Re-deprecation replaces the pending timer rather than stacking.
        if let Some(previous) = state.pending_removals.insert(name, handle) {
            previous.abort();
        }
    }

    /// Record a usage of a tool. Absent names are a no-op.
    pub fn record_usage(&self, tool_name: &str) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(entry) = state.tools.get_mut(tool_name) {
            entry.last_used = Some(Utc::now());
            entry.usage_count += 1;
        }
    }

    /// Entry for a name, if still tracked.
    pub fn entry(&self, tool_name: &str) -> Option<LifecycleEntry> {
        self.shared.state.lock().unwrap().tools.get(tool_name).cloned()
    }

    /// All active tools, as presented to the consumer.
    ///
    /// Deprecated entries are excluded even before their removal fires.
    pub fn active_tools(&self) -> Vec<Tool> {
        self.shared
            .state
            .lock()
            .unwrap()
            .tools
            .values()
            .filter(|e| e.state == LifecycleState::Active)
            .map(|e| e.tool.clone())
            .collect()
    }

    /// Lifecycle statistics: counts, top usage, idle tools.
    pub fn stats(&self) -> LifecycleStats {
        let state = self.shared.state.lock().unwrap();

        let active: Vec<&LifecycleEntry> = state
            .tools
            .values()
            .filter(|e| e.state == LifecycleState::Active)
            .collect();
        let total_deprecated = state
            .tools
            .values()
            .filter(|e| e.state == LifecycleState::Deprecated)
            .count();

        let mut most_used: Vec<(String, u64)> = active
            .iter()
            .map(|e| (e.tool.name.clone(), e.usage_count))
            .collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_used.truncate(5);

        let never_used: Vec<String> = active
            .iter()
            .filter(|e| e.usage_count == 0)
            .map(|e| e.tool.name.clone())
            .collect();

        let average_usage = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|e| e.usage_count).sum::<u64>() as f64 / active.len() as f64
        };

        LifecycleStats {
            total_active: active.len(),
            total_deprecated,
            most_used,
            never_used,
            average_usage,
        }
    }

    /// Drop all entries, handlers, and pending removals.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock().unwrap();
        for (_, pending) in state.pending_removals.drain() {
            pending.abort();
        }
        state.tools.clear();
        state.handlers.clear();
        info!("Cleared all lifecycle entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tool(name: &str) -> Tool {
        Tool::new(name).with_schema(json!({"type": "object"}))
    }

    #[tokio::test]
    async fn test_register_emits_registered() {
        let manager = ToolLifecycleManager::new();
        let mut events = manager.subscribe();

        assert!(manager.register(sample_tool("t"), ToolMetadata::default()));

        let event = events.try_recv().unwrap();
        assert!(matches!(event, LifecycleEvent::Registered { .. }));
        assert_eq!(event.tool_name(), "t");
    }

    #[tokio::test]
    async fn test_higher_priority_replaces() {
        let manager = ToolLifecycleManager::new();

        manager.register(sample_tool("t"), ToolMetadata::with_priority(1));
        let second = sample_tool("t").with_description("winner");
        assert!(manager.register(second.clone(), ToolMetadata::with_priority(2)));

        let entry = manager.entry("t").unwrap();
        assert_eq!(entry.tool, second);
        assert_eq!(entry.metadata.priority, 2);
        assert_eq!(entry.state, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_existing() {
        let manager = ToolLifecycleManager::new();

        let first = sample_tool("t").with_description("original");
        manager.register(first.clone(), ToolMetadata::with_priority(1));
        assert!(!manager.register(sample_tool("t"), ToolMetadata::with_priority(1)));

        assert_eq!(manager.entry("t").unwrap().tool, first);
    }

    #[tokio::test]
    async fn test_conflict_event_precedes_resolution() {
        let manager = ToolLifecycleManager::new();
        manager.register(sample_tool("t"), ToolMetadata::default());

        let mut events = manager.subscribe();
        manager.register(sample_tool("t"), ToolMetadata::with_priority(5));

        assert!(matches!(events.try_recv().unwrap(), LifecycleEvent::Conflict { .. }));
        assert!(matches!(events.try_recv().unwrap(), LifecycleEvent::Replaced { .. }));
        assert!(matches!(events.try_recv().unwrap(), LifecycleEvent::Registered { .. }));
    }

    #[tokio::test]
    async fn test_custom_handler_decides() {
        let manager = ToolLifecycleManager::new();
        manager.register(sample_tool("t"), ToolMetadata::with_priority(100));

        // Accept the newcomer despite its lower priority.
        manager.set_conflict_handler("t", |ctx| {
            Ok(ctx.incoming_tool.description.is_some())
        });

        assert!(!manager.register(sample_tool("t"), ToolMetadata::default()));
        let described = sample_tool("t").with_description("d");
        assert!(manager.register(described.clone(), ToolMetadata::default()));
        assert_eq!(manager.entry("t").unwrap().tool, described);
    }

    #[tokio::test]
    async fn test_failing_handler_rejects() {
        let manager = ToolLifecycleManager::new();
        let original = sample_tool("t");
        manager.register(original.clone(), ToolMetadata::default());

        manager.set_conflict_handler("t", |_| anyhow::bail!("handler broke"));

        assert!(!manager.register(
            sample_tool("t").with_description("d"),
            ToolMetadata::with_priority(10)
        ));
        assert_eq!(manager.entry("t").unwrap().tool, original);
    }

    #[tokio::test]
    async fn test_record_usage() {
        let manager = ToolLifecycleManager::new();
        manager.register(sample_tool("t"), ToolMetadata::default());

        manager.record_usage("t");
        manager.record_usage("t");
        manager.record_usage("missing");

        let entry = manager.entry("t").unwrap();
        assert_eq!(entry.usage_count, 2);
        assert!(entry.last_used.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deprecated_tool_hidden_then_removed() {
        let manager = ToolLifecycleManager::with_grace_period(Duration::from_millis(5000));
        manager.register(sample_tool("t"), ToolMetadata::default());

        assert!(manager.deprecate("t", Some("t_v2")));

        // Hidden from the consumer immediately, entry still queryable.
        assert!(manager.active_tools().is_empty());
        let entry = manager.entry("t").unwrap();
        assert_eq!(entry.state, LifecycleState::Deprecated);
        assert!(entry.metadata.deprecated);
        assert!(entry.metadata.deprecation_date.is_some());

        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert!(manager.entry("t").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_removes_after_grace() {
        let manager = ToolLifecycleManager::with_grace_period(Duration::from_millis(100));
        manager.register(sample_tool("t"), ToolMetadata::default());
        let mut events = manager.subscribe();

        assert!(manager.unregister("t"));
        assert!(!manager.unregister("missing"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(manager.entry("t").is_none());

        assert!(matches!(events.try_recv().unwrap(), LifecycleEvent::Unregistered { .. }));
        assert!(matches!(events.try_recv().unwrap(), LifecycleEvent::Removed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregistration_cancels_pending_removal() {
        let manager = ToolLifecycleManager::with_grace_period(Duration::from_millis(1000));
        manager.register(sample_tool("t"), ToolMetadata::default());
        manager.deprecate("t", None);

        // A winning registration during the grace period keeps the tool.
        assert!(manager.register(sample_tool("t"), ToolMetadata::with_priority(1)));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let entry = manager.entry("t").unwrap();
        assert_eq!(entry.state, LifecycleState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_losing_registration_leaves_timer_running() {
        let manager = ToolLifecycleManager::with_grace_period(Duration::from_millis(1000));
        manager.register(sample_tool("t"), ToolMetadata::with_priority(5));
        manager.deprecate("t", None);

        assert!(!manager.register(sample_tool("t"), ToolMetadata::default()));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(manager.entry("t").is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let manager = ToolLifecycleManager::new();
        for name in ["a", "b", "c"] {
            manager.register(sample_tool(name), ToolMetadata::default());
        }
        manager.record_usage("a");
        manager.record_usage("a");
        manager.record_usage("b");

        let stats = manager.stats();
        assert_eq!(stats.total_active, 3);
        assert_eq!(stats.total_deprecated, 0);
        assert_eq!(stats.most_used[0], ("a".to_string(), 2));
        assert_eq!(stats.never_used, vec!["c".to_string()]);
        assert!((stats.average_usage - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let manager = ToolLifecycleManager::new();
        let stats = manager.stats();
        assert_eq!(stats.total_active, 0);
        assert_eq!(stats.average_usage, 0.0);
    }
}
