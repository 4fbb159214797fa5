//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SnapError, SnapResult};

/// A named sequence of navigation + settle + checks, the unit of retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Navigation target passed to the application
    #[serde(default)]
    pub view: String,

    /// Settle delay after navigation, compensating for async rendering
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Attempts before the scenario is reported failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Screenshot checks to run in order
    pub checks: Vec<Check>,
}

/// A single screenshot assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    /// Check name, doubling as the baseline/candidate filename stem
    pub name: String,

    /// Maximum acceptable difference ratio, exclusive, in [0, 1]
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_tolerance() -> f64 {
    0.2
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> SnapResult<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> SnapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            SnapError::Spec(msg) => SnapError::Spec(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Load all scenarios from a directory, in filename order.
    pub fn load_all(dir: &Path) -> SnapResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            scenarios.push(Self::from_file(entry.path())?);
        }

        Ok(scenarios)
    }

    fn validate(&self) -> SnapResult<()> {
        if self.name.is_empty() {
            return Err(SnapError::Spec("scenario name must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(SnapError::Spec(format!(
                "scenario '{}': max_attempts must be at least 1",
                self.name
            )));
        }
        if self.checks.is_empty() {
            return Err(SnapError::Spec(format!(
                "scenario '{}' has no checks",
                self.name
            )));
        }
        for check in &self.checks {
            if check.name.is_empty() {
                return Err(SnapError::Spec(format!(
                    "scenario '{}': check name must not be empty",
                    self.name
                )));
            }
            // Check names double as filename stems
            if check.name.contains('/') || check.name.contains('\\') || check.name.contains("..") {
                return Err(SnapError::Spec(format!(
                    "scenario '{}': check name '{}' is not filesystem-safe",
                    self.name, check.name
                )));
            }
            if !(0.0..=1.0).contains(&check.tolerance) {
                return Err(SnapError::Spec(format!(
                    "scenario '{}': tolerance {} for '{}' is outside [0, 1]",
                    self.name, check.tolerance, check.name
                )));
            }
        }
        Ok(())
    }
}
