//! Thread-safe first-writer-wins tool registry.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AuditAction, AuditRecord, ToolEntry};
use crate::tool::Tool;

/// Default cap on retained audit records; oldest are evicted first.
pub const AUDIT_HISTORY_MAX_DEFAULT: usize = 10_000;

/// Internal state of the registry.
#[derive(Debug)]
struct RegistryInner {
    /// Entries keyed by tool name.
    entries: HashMap<String, ToolEntry>,

    /// Bounded audit trail of every registration attempt.
    audit: VecDeque<AuditRecord>,

    /// Cap on `audit`.
    audit_max: usize,
}

/// Registry statistics with the serialized audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Number of registered tools.
    pub total_tools: usize,

    /// Tool counts per owning source.
    pub tools_by_source: HashMap<String, usize>,

    /// The audit trail, oldest first.
    pub registration_history: Vec<AuditRecord>,
}

/// Thread-safe registry holding the authoritative name → tool mapping.
///
/// First registration of a name wins; later attempts under the same name are
/// skipped regardless of source, never merged. The handle is cheap to clone
/// and safe to share across threads; the check-then-set at the heart of
/// [`register`](Self::register) runs atomically under one write guard.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::with_audit_capacity(AUDIT_HISTORY_MAX_DEFAULT)
    }

    /// Create a registry with a custom audit retention cap.
    pub fn with_audit_capacity(audit_max: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                entries: HashMap::new(),
                audit: VecDeque::new(),
                audit_max,
            })),
        }
    }

    fn push_audit(inner: &mut RegistryInner, record: AuditRecord) {
        if inner.audit.len() >= inner.audit_max {
            inner.audit.pop_front();
        }
        inner.audit.push_back(record);
    }

    /// Register a tool under its name.
    ///
    /// Returns `true` and stores the entry when the name is free; returns
    /// `false` without mutating the entry map when the name is already taken.
    /// Every attempt, successful or not, is appended to the audit trail.
    pub fn register(&self, tool: Tool, source: impl Into<String>, namespace: Option<String>) -> bool {
        let source = source.into();
        let name = tool.name.clone();
        let mut inner = self.inner.write().unwrap();

        if let Some(existing) = inner.entries.get(&name) {
            warn!(
                tool = %name,
                existing_source = %existing.source,
                source = %source,
                "Tool already registered, skipping"
            );
            Self::push_audit(
                &mut inner,
                AuditRecord {
                    tool: name,
                    action: AuditAction::Skip,
                    source,
                    timestamp: Utc::now(),
                },
            );
            return false;
        }

        inner.entries.insert(
            name.clone(),
            ToolEntry {
                tool,
                source: source.clone(),
                timestamp: Utc::now(),
                namespace,
            },
        );
        Self::push_audit(
            &mut inner,
            AuditRecord {
                tool: name.clone(),
                action: AuditAction::Register,
                source: source.clone(),
                timestamp: Utc::now(),
            },
        );

        info!(tool = %name, source = %source, "Tool registered");
        true
    }

    /// All registered tools.
    pub fn tools(&self) -> Vec<Tool> {
        let inner = self.inner.read().unwrap();
        inner.entries.values().map(|e| e.tool.clone()).collect()
    }

    /// Tools owned by a specific source.
    pub fn tools_by_source(&self, source: &str) -> Vec<Tool> {
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .values()
            .filter(|e| e.source == source)
            .map(|e| e.tool.clone())
            .collect()
    }

    /// Entry for a name, with ownership metadata.
    pub fn entry(&self, name: &str) -> Option<ToolEntry> {
        self.inner.read().unwrap().entries.get(name).cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().unwrap().entries.contains_key(name)
    }

    /// Owning source of a name, if registered.
    pub fn tool_source(&self, name: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap()
            .entries
            .get(name)
            .map(|e| e.source.clone())
    }

    /// Remove a tool by name. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.inner.write().unwrap().entries.remove(name).is_some();
        if removed {
            debug!(tool = %name, "Tool removed from registry");
        }
        removed
    }

    /// Clear all entries. The audit trail is retained.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        let count = inner.entries.len();
        inner.entries.clear();
        info!(count, "Registry cleared");
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of counts and the audit trail.
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().unwrap();

        let mut tools_by_source: HashMap<String, usize> = HashMap::new();
        for entry in inner.entries.values() {
            *tools_by_source.entry(entry.source.clone()).or_insert(0) += 1;
        }

        RegistryStats {
            total_tools: inner.entries.len(),
            tools_by_source,
            registration_history: inner.audit.iter().cloned().collect(),
        }
    }
}
