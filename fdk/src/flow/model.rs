//! Flow definitions

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user-authored sequence of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

impl Flow {
    pub fn step(&self, id: &str) -> Option<&FlowStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// One step of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// What a step does, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Request {
        #[serde(default = "default_method")]
        method: String,
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    Delay {
        #[serde(rename = "duration", alias = "durationMs")]
        duration_ms: u64,
    },
    Condition {
        #[serde(alias = "condition")]
        expression: String,
    },
    Log {
        message: String,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

impl StepKind {
    /// Wire tag, e.g. `REQUEST`
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Request { .. } => "REQUEST",
            StepKind::Delay { .. } => "DELAY",
            StepKind::Condition { .. } => "CONDITION",
            StepKind::Log { .. } => "LOG",
        }
    }

    /// One-line description shown in the step list
    pub fn summary(&self) -> String {
        match self {
            StepKind::Request { method, url, .. } => format!("{} {}", method.to_ascii_uppercase(), url),
            StepKind::Delay { duration_ms } => format!("Wait {}ms", duration_ms),
            StepKind::Condition { expression } => format!("If {}", expression),
            StepKind::Log { message } => format!("Log: {}", message),
        }
    }
}

/// Execution state of a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Success,
    Error,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Error => "error",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            StepStatus::Pending => "Pending",
            StepStatus::Running => "Running",
            StepStatus::Success => "Success",
            StepStatus::Error => "Error",
            StepStatus::Skipped => "Skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "success" => Ok(StepStatus::Success),
            "error" => Ok(StepStatus::Error),
            "skipped" => Ok(StepStatus::Skipped),
            other => Err(format!("Unknown step status: '{}'", other)),
        }
    }
}
