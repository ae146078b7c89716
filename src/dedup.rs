//! Tool deduplication.
//!
//! Collapses lists of tools sharing a name into the most complete definition,
//! and namespaces tool names to fit the consumer-facing constraints. Both
//! operations select or copy; they never mutate the input tools.

use std::collections::HashMap;

use crate::tool::Tool;
use crate::validate::NAME_LEN_MAX;

/// Separator between namespace prefix and tool name.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Deduplicate tools by name, preserving the most complete definition.
///
/// Folds left to right: a stored entry is replaced only when the incoming
/// tool is strictly more complete under [`Tool::is_more_complete`]. Output
/// order is the first-seen order of distinct names, not the input order of
/// all occurrences.
pub fn deduplicate(tools: &[Tool]) -> Vec<Tool> {
    let mut kept: Vec<Tool> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tool in tools {
        match index.get(&tool.name) {
            Some(&i) => {
                if tool.is_more_complete(&kept[i]) {
                    kept[i] = tool.clone();
                }
            }
            None => {
                index.insert(tool.name.clone(), kept.len());
                kept.push(tool.clone());
            }
        }
    }

    kept
}

/// Rename a tool to `{namespace}:{name}`, keeping the result within the
/// 64 character limit.
///
/// When the combined name would be too long, the original name (never the
/// namespace prefix) is truncated so the result fits. A namespace whose
/// prefix alone exceeds the limit is itself truncated as the last resort;
/// the bound holds for every input. All other fields pass through unchanged.
pub fn namespace_tool(tool: &Tool, namespace: &str) -> Tool {
    let mut namespaced = tool.clone();
    let combined = format!("{namespace}{NAMESPACE_SEPARATOR}{}", tool.name);

    if combined.len() > NAME_LEN_MAX {
        let budget = NAME_LEN_MAX
            .saturating_sub(namespace.len())
            .saturating_sub(NAMESPACE_SEPARATOR.len_utf8());
        let truncated: String = tool.name.chars().take(budget).collect();
        let mut name = format!("{namespace}{NAMESPACE_SEPARATOR}{truncated}");
        if name.len() > NAME_LEN_MAX {
            name = name.chars().take(NAME_LEN_MAX).collect();
        }
        namespaced.name = name;
    } else {
        namespaced.name = combined;
    }

    namespaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_removes_duplicates_by_name() {
        let tools = vec![
            Tool::new("tool1").with_description("First tool"),
            Tool::new("tool1").with_description("Duplicate"),
            Tool::new("tool2").with_description("Second tool"),
        ];

        let result = deduplicate(&tools);

        assert_eq!(result.len(), 2);
        let names: Vec<&str> = result.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tool1", "tool2"]);
    }

    #[test]
    fn test_prefers_more_complete_definition() {
        let tools = vec![
            Tool::new("test").with_description("Basic"),
            Tool::new("test").with_description("Complete").with_schema(json!({
                "type": "object",
                "properties": {"prop": {"type": "string"}}
            })),
        ];

        let result = deduplicate(&tools);

        assert_eq!(result.len(), 1);
        assert!(result[0].input_schema.is_some());
    }

    #[test]
    fn test_more_complete_wins_regardless_of_order() {
        let complete = Tool::new("x").with_description("d");
        let bare = Tool::new("x");

        let forward = deduplicate(&[bare.clone(), complete.clone()]);
        let reverse = deduplicate(&[complete.clone(), bare.clone()]);

        assert_eq!(forward, vec![complete.clone()]);
        assert_eq!(reverse, vec![complete]);
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate(&[]).is_empty());
    }

    #[test]
    fn test_preserves_unique_tools() {
        let tools = vec![Tool::new("tool1"), Tool::new("tool2"), Tool::new("tool3")];
        assert_eq!(deduplicate(&tools).len(), 3);
    }

    #[test]
    fn test_idempotent() {
        let tools = vec![
            Tool::new("a").with_description("d"),
            Tool::new("a"),
            Tool::new("b").with_schema(json!({"type": "object"})),
            Tool::new("b"),
        ];

        let once = deduplicate(&tools);
        let twice = deduplicate(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_not_mutated() {
        let tools = vec![Tool::new("a"), Tool::new("a").with_description("d")];
        let before = tools.clone();

        let _ = deduplicate(&tools);

        assert_eq!(tools, before);
    }

    #[test]
    fn test_namespace_tool() {
        let tool = Tool::new("search").with_description("d");
        let namespaced = namespace_tool(&tool, "web");

        assert_eq!(namespaced.name, "web:search");
        assert_eq!(namespaced.description.as_deref(), Some("d"));
    }

    #[test]
    fn test_namespace_truncates_long_names() {
        let tool = Tool::new("a".repeat(70));
        let namespaced = namespace_tool(&tool, "server");

        assert!(namespaced.name.len() <= NAME_LEN_MAX);
        assert!(namespaced.name.starts_with("server:"));
    }

    #[test]
    fn test_namespace_bound_holds_for_long_namespace() {
        let tool = Tool::new("tool");
        let namespaced = namespace_tool(&tool, &"n".repeat(63));

        assert!(namespaced.name.len() <= NAME_LEN_MAX);
        assert!(namespaced.name.starts_with(&"n".repeat(63)));
    }

    #[test]
    fn test_namespace_bound_holds_when_prefix_alone_is_over_limit() {
        // The prefix by itself is past the limit; the namespace is cut too.
        let tool = Tool::new("t");
        let namespaced = namespace_tool(&tool, &"n".repeat(70));

        assert_eq!(namespaced.name.len(), NAME_LEN_MAX);
        assert_eq!(namespaced.name, "n".repeat(64));

        let at_limit = namespace_tool(&tool, &"n".repeat(64));
        assert!(at_limit.name.len() <= NAME_LEN_MAX);
    }
}
