//! Scenario runner - orchestrates app lifecycle, navigation, checks and retries

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::app::{AppConfig, AppHandle};
use crate::baseline::BaselineStore;
use crate::capture::DEFAULT_CAPTURE_WIDTH;
use crate::check::{CheckOutcome, ScreenshotCheck};
use crate::driver::AppDriver;
use crate::error::{SnapError, SnapResult};
use crate::scenario::Scenario;

/// Per-scenario progress, mirrored into the log at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    NotStarted,
    Navigating,
    Settling,
    Checking,
    Passed,
    Failed,
}

impl std::fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScenarioState::NotStarted => "not-started",
            ScenarioState::Navigating => "navigating",
            ScenarioState::Settling => "settling",
            ScenarioState::Checking => "checking",
            ScenarioState::Passed => "passed",
            ScenarioState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal classification of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// All checks passed
    Passed,
    /// A check reported a visual regression
    Failed,
    /// Infrastructure failure (navigation, capture, comparator inputs)
    Error,
}

/// Result of running a single scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: ScenarioOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
    pub checks: Vec<CheckOutcome>,
    pub error: Option<String>,
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioResult>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub app: AppConfig,
    pub baseline_root: PathBuf,
    pub scratch_root: PathBuf,
    pub capture_width: u32,
    pub update_baselines: bool,
    /// Blanket policy retries regressions too; disable to report them on the
    /// first attempt while still retrying infrastructure failures.
    pub retry_on_regression: bool,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            baseline_root: PathBuf::from("test-results/baselines"),
            scratch_root: PathBuf::from("test-results/scratch"),
            capture_width: DEFAULT_CAPTURE_WIDTH,
            update_baselines: false,
            retry_on_regression: true,
            specs_dir: PathBuf::from("tests/specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Drives scenarios sequentially against a single application instance.
pub struct ScenarioRunner {
    config: RunnerConfig,
    check: ScreenshotCheck,
    driver: Option<Arc<dyn AppDriver>>,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let check = ScreenshotCheck::new(
            BaselineStore::new(config.baseline_root.clone()),
            config.scratch_root.clone(),
            config.capture_width,
            config.update_baselines,
        );
        Self {
            config,
            check,
            driver: None,
        }
    }

    /// Use an already-running driver instead of spawning the app binary.
    pub fn with_driver(config: RunnerConfig, driver: Arc<dyn AppDriver>) -> Self {
        let mut runner = Self::new(config);
        runner.driver = Some(driver);
        runner
    }

    /// Spawn the application if no driver is attached yet.
    async fn ensure_driver(&mut self) -> SnapResult<Arc<dyn AppDriver>> {
        if let Some(driver) = &self.driver {
            return Ok(driver.clone());
        }
        let handle = AppHandle::launch(self.config.app.clone()).await?;
        let driver: Arc<dyn AppDriver> = Arc::new(handle);
        self.driver = Some(driver.clone());
        Ok(driver)
    }

    /// Stop the application. Runs on every exit path; also wired into `Drop`.
    pub fn stop_app(&mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.stop() {
                warn!("Failed to stop application: {}", e);
            }
        }
    }

    /// Run all scenarios found in the specs directory.
    pub async fn run_all(&mut self) -> SnapResult<RunReport> {
        let scenarios = Scenario::load_all(&self.config.specs_dir)?;
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios carrying the given tag.
    pub async fn run_tagged(&mut self, tag: &str) -> SnapResult<RunReport> {
        let scenarios: Vec<Scenario> = Scenario::load_all(&self.config.specs_dir)?
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect();
        self.run_scenarios(&scenarios).await
    }

    /// Run a single scenario by name.
    pub async fn run_named(&mut self, name: &str) -> SnapResult<RunReport> {
        let scenario = Scenario::load_all(&self.config.specs_dir)?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SnapError::Spec(format!("scenario not found: {}", name)))?;
        self.run_scenarios(std::slice::from_ref(&scenario)).await
    }

    /// Run a list of scenarios sequentially, in declaration order.
    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> SnapResult<RunReport> {
        let start = Instant::now();
        let started_at = Utc::now().to_rfc3339();

        let driver = self.ensure_driver().await?;

        info!("Running {} scenario(s)...", scenarios.len());

        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut errors = 0;

        for scenario in scenarios {
            let result = self.run_scenario(driver.as_ref(), scenario).await;
            match result.outcome {
                ScenarioOutcome::Passed => {
                    passed += 1;
                    info!("✓ {} ({} ms)", result.name, result.duration_ms);
                }
                ScenarioOutcome::Failed => {
                    failed += 1;
                    error!(
                        "✗ {} - {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown failure")
                    );
                }
                ScenarioOutcome::Error => {
                    errors += 1;
                    error!(
                        "! {} - {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            results.push(result);
        }

        self.stop_app();

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario results: {} passed, {} failed, {} errored ({} ms)",
            passed, failed, errors, duration_ms
        );

        Ok(RunReport {
            started_at,
            total: scenarios.len(),
            passed,
            failed,
            errors,
            duration_ms,
            scenarios: results,
        })
    }

    /// Run one scenario through its retry state machine.
    async fn run_scenario(&self, driver: &dyn AppDriver, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        let mut attempts = 0;

        let (outcome, checks, error) = loop {
            attempts += 1;
            let attempt = self.attempt(driver, scenario).await;

            match attempt.error {
                None => break (ScenarioOutcome::Passed, attempt.checks, None),
                Some(err) => {
                    if self.should_retry(&err) && attempts < scenario.max_attempts {
                        warn!(
                            "Scenario '{}' attempt {}/{} failed: {}; retrying",
                            scenario.name, attempts, scenario.max_attempts, err
                        );
                        continue;
                    }
                    let outcome = match err {
                        SnapError::Regression { .. } => ScenarioOutcome::Failed,
                        _ => ScenarioOutcome::Error,
                    };
                    break (outcome, attempt.checks, Some(err.to_string()));
                }
            }
        };

        debug!(
            "Scenario '{}' -> {} after {} attempt(s)",
            scenario.name,
            if outcome == ScenarioOutcome::Passed {
                ScenarioState::Passed
            } else {
                ScenarioState::Failed
            },
            attempts
        );

        ScenarioResult {
            name: scenario.name.clone(),
            outcome,
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
            checks,
            error,
        }
    }

    /// One navigate + settle + checks pass. A retry re-runs all of it.
    async fn attempt(&self, driver: &dyn AppDriver, scenario: &Scenario) -> Attempt {
        debug!("Scenario '{}': {}", scenario.name, ScenarioState::Navigating);
        if let Err(e) = driver.navigate(&scenario.view).await {
            return Attempt::failed(vec![], e);
        }

        debug!(
            "Scenario '{}': {} ({} ms)",
            scenario.name,
            ScenarioState::Settling,
            scenario.settle_ms
        );
        tokio::time::sleep(Duration::from_millis(scenario.settle_ms)).await;

        debug!("Scenario '{}': {}", scenario.name, ScenarioState::Checking);
        let mut checks = Vec::new();
        for check in &scenario.checks {
            match self.check.run(driver, &check.name, check.tolerance).await {
                Ok(outcome) if outcome.passed => checks.push(outcome),
                Ok(outcome) => {
                    let err = SnapError::Regression {
                        name: outcome.name.clone(),
                        ratio: outcome.ratio,
                        tolerance: outcome.tolerance,
                        diff_image: outcome.diff_image.clone(),
                    };
                    checks.push(outcome);
                    return Attempt::failed(checks, err);
                }
                Err(e) => return Attempt::failed(checks, e),
            }
        }

        Attempt {
            checks,
            error: None,
        }
    }

    fn should_retry(&self, err: &SnapError) -> bool {
        match err {
            SnapError::Regression { .. } => self.config.retry_on_regression,
            SnapError::Startup(_) | SnapError::StartupTimeout(_) => false,
            _ => true,
        }
    }

    /// Write the run report as pretty JSON into the output directory.
    pub fn write_report(&self, report: &RunReport) -> SnapResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for ScenarioRunner {
    fn drop(&mut self) {
        self.stop_app();
    }
}

struct Attempt {
    checks: Vec<CheckOutcome>,
    error: Option<SnapError>,
}

impl Attempt {
    fn failed(checks: Vec<CheckOutcome>, error: SnapError) -> Self {
        Self {
            checks,
            error: Some(error),
        }
    }
}
