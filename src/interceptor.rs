//! Outbound-payload validation middleware.
//!
//! Callers install this around their own outbound-call path: any JSON body
//! carrying a `tools` array is validated before it leaves the process, and
//! deduplicated in place when validation fails. Nothing here touches global
//! or ambient state.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::dedup::deduplicate;
use crate::tool::Tool;
use crate::validate::{validate, ValidationResult};

/// What [`PayloadInterceptor::inspect`] did to a body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterceptOutcome {
    /// Whether the body was rewritten.
    pub modified: bool,

    /// Whether the (possibly rewritten) tool list validates.
    pub valid_after: bool,

    /// The original validation failure, if there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validates and repairs tool lists embedded in outgoing payloads.
///
/// Stateless; construct once and share freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadInterceptor;

impl PayloadInterceptor {
    /// Create an interceptor.
    pub fn new() -> Self {
        Self
    }

    /// Inspect a JSON body and deduplicate its `tools` array if invalid.
    ///
    /// Bodies without a `tools` array, or whose entries do not parse as
    /// tools, pass through untouched. When the deduplicated list still fails
    /// validation the rewrite is kept and the failure reported; the request
    /// is never blocked here.
    pub fn inspect(&self, body: &mut Value) -> InterceptOutcome {
        let Some(tools_value) = body.get("tools").filter(|v| v.is_array()) else {
            return InterceptOutcome {
                modified: false,
                valid_after: true,
                error: None,
            };
        };

        let Ok(tools) = serde_json::from_value::<Vec<Tool>>(tools_value.clone()) else {
            debug!("Payload tools array does not parse as tool objects, passing through");
            return InterceptOutcome {
                modified: false,
                valid_after: true,
                error: None,
            };
        };

        match validate(&tools) {
            Ok(()) => InterceptOutcome {
                modified: false,
                valid_after: true,
                error: None,
            },
            Err(err) => {
                error!(error = %err, "Invalid tool list in outgoing payload, deduplicating");

                let deduped = deduplicate(&tools);
                let valid_after = match validate(&deduped) {
                    Ok(()) => true,
                    Err(retry_err) => {
                        error!(error = %retry_err, "Deduplication did not restore validity");
                        false
                    }
                };

                // Unwrap is safe: Vec<Tool> always serializes.
                body["tools"] = serde_json::to_value(&deduped).unwrap();

                InterceptOutcome {
                    modified: true,
                    valid_after,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Validate a source's reported tool list, auto-remediating duplicates.
    ///
    /// Returns the deduplicated list when remediation restores validity;
    /// returns the input unchanged when it was already valid or when
    /// remediation fails (letting it fail downstream rather than silently
    /// dropping tools).
    pub fn sanitize_response(&self, tools: Vec<Tool>) -> Vec<Tool> {
        match validate(&tools) {
            Ok(()) => tools,
            Err(err) => {
                error!(error = %err, "Source tool list failed validation");

                let deduped = deduplicate(&tools);
                match validate(&deduped) {
                    Ok(()) => {
                        debug!("Auto-remediation successful");
                        deduped
                    }
                    Err(retry_err) => {
                        error!(error = %retry_err, "Auto-remediation failed");
                        tools
                    }
                }
            }
        }
    }

    /// Deduplicate a client-side aggregation when it fails validation.
    pub fn sanitize_aggregation(&self, tools: Vec<Tool>) -> Vec<Tool> {
        match validate(&tools) {
            Ok(()) => tools,
            Err(err) => {
                error!(error = %err, "Aggregated tool list has duplicates");
                deduplicate(&tools)
            }
        }
    }

    /// Validate with a context label for the log line.
    pub fn validate_with_context(&self, tools: &[Tool], context: &str) -> ValidationResult {
        let result = validate(tools);

        if let Err(err) = &result {
            let unique: std::collections::HashSet<&str> =
                tools.iter().map(|t| t.name.as_str()).collect();
            warn!(
                context = %context,
                tool_count = tools.len(),
                unique_count = unique.len(),
                error = %err,
                "Validation failed"
            );
        }

        result
    }
}
