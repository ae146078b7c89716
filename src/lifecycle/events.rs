//! Typed lifecycle notifications.

use crate::tool::Tool;

/// A lifecycle state change, sent on the manager's broadcast channel at the
/// moment the change takes effect.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// A tool was registered (first sight or after a won conflict).
    Registered {
        /// The registered tool.
        tool: Tool,
    },

    /// A registration attempt hit an existing entry with the same name.
    Conflict {
        /// Name of the contested tool.
        tool_name: String,
    },

    /// A conflicting registration won and replaced the existing entry.
    Replaced {
        /// Name of the replaced tool.
        tool_name: String,
    },

    /// A tool was marked deprecated; removal follows after the grace period.
    Deprecated {
        /// Name of the deprecated tool.
        tool_name: String,
        /// Suggested replacement tool, if any.
        replacement: Option<String>,
    },

    /// A tool was explicitly unregistered; removal follows after the grace
    /// period.
    Unregistered {
        /// Name of the unregistered tool.
        tool_name: String,
    },

    /// A tool's entry was removed. Terminal.
    Removed {
        /// Name of the removed tool.
        tool_name: String,
    },
}

impl LifecycleEvent {
    /// Name of the tool this event concerns.
    pub fn tool_name(&self) -> &str {
        match self {
            LifecycleEvent::Registered { tool } => &tool.name,
            LifecycleEvent::Conflict { tool_name }
            | LifecycleEvent::Replaced { tool_name }
            | LifecycleEvent::Deprecated { tool_name, .. }
            | LifecycleEvent::Unregistered { tool_name }
            | LifecycleEvent::Removed { tool_name } => tool_name,
        }
    }
}
