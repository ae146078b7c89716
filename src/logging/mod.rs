//! Registration event sink.
//!
//! Structured records of tool registrations across the phases of an
//! aggregation run, with real-time duplicate detection and offline pattern
//! analysis. The sink is an owned instance with an optional JSONL file
//! behind it; core correctness never depends on it being present.

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::tool::Tool;

/// Phase of the aggregation pipeline a record was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPhase {
    /// A source announced its tools at startup.
    ServerInit,

    /// A source answered a tool-list query.
    ToolList,

    /// The client merged tools across sources.
    ClientAggregate,

    /// Tools were attached to an outgoing API request.
    ApiRequest,
}

impl RegistrationPhase {
    /// String form used in records and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationPhase::ServerInit => "server_init",
            RegistrationPhase::ToolList => "tool_list",
            RegistrationPhase::ClientAggregate => "client_aggregate",
            RegistrationPhase::ApiRequest => "api_request",
        }
    }
}

impl std::fmt::Display for RegistrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifying slice of a tool captured in a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,

    /// Fingerprint of the full serialized definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Source the tool came from, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ToolInfo {
    /// Capture a tool, fingerprinting its serialized form.
    pub fn from_tool(tool: &Tool, source: Option<&str>) -> Self {
        let hash = serde_json::to_vec(tool).ok().map(|bytes| {
            let digest = Sha256::digest(&bytes);
            format!("{digest:x}")
        });

        Self {
            name: tool.name.clone(),
            hash,
            source: source.map(str::to_string),
        }
    }
}

/// One logged registration event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,

    /// Pipeline phase.
    pub phase: RegistrationPhase,

    /// Component that produced the event.
    pub source: String,

    /// Tools involved.
    pub tools: Vec<ToolInfo>,

    /// Names duplicated within this record, stamped at log time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<Vec<String>>,
}

/// Pattern analysis over the logged records.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateAnalysis {
    /// Number of records logged.
    pub total_registrations: usize,

    /// Duplicate-name occurrences per phase.
    pub duplicates_by_phase: HashMap<String, usize>,

    /// Cross-phase and cross-source duplication patterns.
    pub common_patterns: Vec<String>,

    /// Suggested mitigations.
    pub recommendations: Vec<String>,
}

/// Collects registration events in memory, optionally mirroring them to a
/// JSONL file for offline analysis.
#[derive(Debug)]
pub struct RegistrationLogger {
    records: Mutex<Vec<RegistrationRecord>>,
    log_file: Option<PathBuf>,
}

impl Default for RegistrationLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationLogger {
    /// In-memory sink without a file behind it.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            log_file: None,
        }
    }

    /// Sink mirroring records to a JSONL file, creating parent directories
    /// as needed.
    pub fn with_log_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        Ok(Self {
            records: Mutex::new(Vec::new()),
            log_file: Some(path),
        })
    }

    /// Log a registration event, detecting duplicates within it.
    ///
    /// A file-write failure is logged and swallowed; the sink never fails
    /// the caller.
    pub fn log(
        &self,
        phase: RegistrationPhase,
        source: impl Into<String>,
        tools: &[ToolInfo],
    ) -> RegistrationRecord {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for tool in tools {
            *counts.entry(tool.name.as_str()).or_insert(0) += 1;
        }
        // First-occurrence order, each name listed once.
        let mut duplicates: Vec<String> = Vec::new();
        for tool in tools {
            if counts[tool.name.as_str()] > 1 && !duplicates.contains(&tool.name) {
                duplicates.push(tool.name.clone());
            }
        }

        let record = RegistrationRecord {
            timestamp: Utc::now(),
            phase,
            source: source.into(),
            tools: tools.to_vec(),
            duplicates: if duplicates.is_empty() {
                None
            } else {
                Some(duplicates.clone())
            },
        };

        if !duplicates.is_empty() {
            error!(
                phase = %phase,
                duplicates = ?duplicates,
                "Duplicate tools detected"
            );
        }

        if let Some(path) = &self.log_file {
            if let Err(err) = self.append_line(path, &record) {
                warn!(error = %err, "Failed to write registration record");
            }
        }

        self.records.lock().unwrap().push(record.clone());
        record
    }

    fn append_line(&self, path: &Path, record: &RegistrationRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        writeln!(file, "{line}").context("Failed to write to log file")?;
        Ok(())
    }

    /// Analyze the logged records for duplication patterns.
    pub fn analyze(&self) -> DuplicateAnalysis {
        let records = self.records.lock().unwrap();

        let mut duplicates_by_phase: HashMap<String, usize> = HashMap::new();
        let mut all_duplicates: HashSet<String> = HashSet::new();

        for record in records.iter() {
            if let Some(duplicates) = &record.duplicates {
                *duplicates_by_phase
                    .entry(record.phase.as_str().to_string())
                    .or_insert(0) += duplicates.len();
                all_duplicates.extend(duplicates.iter().cloned());
            }
        }

        let common_patterns = Self::find_common_patterns(&records);
        let recommendations = Self::recommendations(all_duplicates.len());

        DuplicateAnalysis {
            total_registrations: records.len(),
            duplicates_by_phase,
            common_patterns,
            recommendations,
        }
    }

    fn find_common_patterns(records: &[RegistrationRecord]) -> Vec<String> {
        let mut patterns = Vec::new();

        // Tools observed in more than one phase.
        let mut tools_by_phase: HashMap<RegistrationPhase, HashSet<&str>> = HashMap::new();
        for record in records {
            let phase_tools = tools_by_phase.entry(record.phase).or_default();
            for tool in &record.tools {
                phase_tools.insert(&tool.name);
            }
        }

        let mut phase_counts: HashMap<&str, usize> = HashMap::new();
        for tools in tools_by_phase.values() {
            for tool in tools {
                *phase_counts.entry(tool).or_insert(0) += 1;
            }
        }
        let mut crossing: Vec<(&str, usize)> = phase_counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .collect();
        crossing.sort();
        for (tool, count) in crossing {
            patterns.push(format!("Tool \"{tool}\" appears across {count} different phases"));
        }

        // Tools reported by more than one source.
        let mut sources_by_tool: HashMap<&str, HashSet<&str>> = HashMap::new();
        for record in records {
            for tool in &record.tools {
                sources_by_tool
                    .entry(&tool.name)
                    .or_default()
                    .insert(&record.source);
            }
        }
        let mut multi_source: Vec<(&str, Vec<&str>)> = sources_by_tool
            .into_iter()
            .filter(|(_, sources)| sources.len() > 1)
            .map(|(tool, sources)| {
                let mut sources: Vec<&str> = sources.into_iter().collect();
                sources.sort_unstable();
                (tool, sources)
            })
            .collect();
        multi_source.sort();
        for (tool, sources) in multi_source {
            patterns.push(format!(
                "Tool \"{tool}\" registered by multiple sources: {}",
                sources.join(", ")
            ));
        }

        patterns
    }

    fn recommendations(duplicate_count: usize) -> Vec<String> {
        let mut recommendations = Vec::new();

        if duplicate_count > 0 {
            recommendations.push("Enable tool deduplication in the aggregation layer".to_string());
            recommendations
                .push("Route all registrations through the central registry".to_string());
            recommendations.push("Namespace tools involved in cross-source conflicts".to_string());

            if duplicate_count > 5 {
                recommendations.push(
                    "Run the discovery protocol to negotiate conflicts up front".to_string(),
                );
            }
        }

        recommendations
    }

    /// JSON report over the analysis, for operators.
    pub fn report(&self) -> String {
        let analysis = self.analyze();

        #[derive(Serialize)]
        struct Report {
            timestamp: DateTime<Utc>,
            summary: Summary,
            duplicates_by_phase: HashMap<String, usize>,
            patterns: Vec<String>,
            recommendations: Vec<String>,
        }

        #[derive(Serialize)]
        struct Summary {
            total_registrations: usize,
            phases_with_duplicates: usize,
        }

        let report = Report {
            timestamp: Utc::now(),
            summary: Summary {
                total_registrations: analysis.total_registrations,
                phases_with_duplicates: analysis.duplicates_by_phase.len(),
            },
            duplicates_by_phase: analysis.duplicates_by_phase,
            patterns: analysis.common_patterns,
            recommendations: analysis.recommendations,
        };

        serde_json::to_string_pretty(&report).unwrap_or_default()
    }

    /// All logged records, oldest first.
    pub fn records(&self) -> Vec<RegistrationRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Drop all logged records.
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}
