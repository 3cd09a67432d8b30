//! Per-run stage records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::PipelineStage;

/// Pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Pipeline is running
    Running,
    /// Pipeline completed successfully
    Completed,
    /// Pipeline failed
    Failed,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Output from a pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Whether the stage was successful
    pub success: bool,
    /// Rows produced by the stage
    pub rows: usize,
    /// Rows the stage dropped
    pub dropped: usize,
    /// Stage-specific metadata
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl StageOutput {
    /// Create a successful stage output
    pub fn success(rows: usize) -> Self {
        Self {
            success: true,
            rows,
            dropped: 0,
            metadata: BTreeMap::new(),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed stage output
    pub fn failed() -> Self {
        Self {
            success: false,
            ..Self::success(0)
        }
    }

    /// Set the dropped row count
    pub fn with_dropped(mut self, dropped: usize) -> Self {
        self.dropped = dropped;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set duration
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }
}

/// Report from a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Run ID
    pub run_id: String,
    /// Final status
    pub status: PipelineStatus,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Stage outputs in execution order
    pub stages: Vec<(PipelineStage, StageOutput)>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Error message if failed
    pub error: Option<String>,
}

impl PipelineReport {
    /// Start a report for a new run
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: PipelineStatus::Running,
            started_at: Utc::now(),
            stages: Vec::new(),
            duration_ms: 0,
            error: None,
        }
    }

    /// Record a finished stage
    pub fn complete_stage(&mut self, stage: PipelineStage, output: StageOutput) {
        self.stages.push((stage, output));
    }

    /// Mark the run completed
    pub fn complete(&mut self, duration_ms: u64) {
        self.status = PipelineStatus::Completed;
        self.duration_ms = duration_ms;
    }

    /// Mark the run failed
    pub fn fail(&mut self, stage: PipelineStage, error: impl Into<String>) {
        self.stages.push((stage, StageOutput::failed()));
        self.status = PipelineStatus::Failed;
        self.error = Some(error.into());
    }

    /// Check if pipeline was successful
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Output of one stage
    pub fn stage(&self, stage: PipelineStage) -> Option<&StageOutput> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, output)| output)
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else if secs > 0 {
            format!("{}s", secs)
        } else {
            format!("{}ms", self.duration_ms)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Pipeline {} - {}", self.run_id, self.status);
        eprintln!("Duration: {}", self.duration_formatted());

        for (stage, output) in &self.stages {
            let status = if output.success { "ok" } else { "failed" };
            if output.dropped > 0 {
                eprintln!(
                    "  - {}: {} ({} rows, {} dropped, {}ms)",
                    stage.name(),
                    status,
                    output.rows,
                    output.dropped,
                    output.duration_ms
                );
            } else {
                eprintln!(
                    "  - {}: {} ({} rows, {}ms)",
                    stage.name(),
                    status,
                    output.rows,
                    output.duration_ms
                );
            }
        }
        if let Some(error) = &self.error {
            eprintln!("Error: {}", error);
        }
    }
}
