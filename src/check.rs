//! Screenshot check - the capture/baseline/compare decision

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::baseline::BaselineStore;
use crate::capture::capture;
use crate::compare::{compare, DiffResult};
use crate::driver::AppDriver;
use crate::error::SnapResult;

/// Outcome of a single named screenshot check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub ratio: f64,
    pub tolerance: f64,
    pub passed: bool,
    pub baseline_created: bool,
    pub diff_image: Option<PathBuf>,
}

/// Runs named screenshot assertions against the baseline store.
#[derive(Debug, Clone)]
pub struct ScreenshotCheck {
    baselines: BaselineStore,
    scratch_root: PathBuf,
    capture_width: u32,
    update_baselines: bool,
}

impl ScreenshotCheck {
    pub fn new(
        baselines: BaselineStore,
        scratch_root: impl Into<PathBuf>,
        capture_width: u32,
        update_baselines: bool,
    ) -> Self {
        Self {
            baselines,
            scratch_root: scratch_root.into(),
            capture_width,
            update_baselines,
        }
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    /// Run one check: bootstrap the baseline if absent, capture a candidate,
    /// compare, and decide.
    ///
    /// The candidate is captured unconditionally, so a first run compares its
    /// own capture against the baseline it just created and still exercises
    /// the full comparison path.
    pub async fn run(
        &self,
        driver: &dyn AppDriver,
        name: &str,
        tolerance: f64,
    ) -> SnapResult<CheckOutcome> {
        let baseline_created = self.update_baselines || !self.baselines.exists(name);
        if baseline_created {
            if self.update_baselines {
                info!("Refreshing baseline for '{}'", name);
            } else {
                info!("No baseline for '{}', capturing initial reference", name);
            }
            capture(driver, name, self.baselines.root(), self.capture_width).await?;
        }

        let candidate = capture(driver, name, &self.scratch_root, self.capture_width).await?;

        let diff_path = self.scratch_root.join(format!("{}-diff.png", name));
        let diff = compare(&candidate, &self.baselines.path(name), &diff_path)?;

        let passed = passes(&diff, tolerance);
        if !passed {
            warn!(
                "Visual regression in '{}': ratio {:.4} (tolerance {:.4})",
                name, diff.ratio, tolerance
            );
        }

        Ok(CheckOutcome {
            name: name.to_string(),
            ratio: diff.ratio,
            tolerance,
            passed,
            baseline_created,
            diff_image: diff.diff_image,
        })
    }
}

/// Tolerance is an exclusive upper bound. The byte-identical fast path is what
/// lets a zero tolerance still admit exact renders.
fn passes(diff: &DiffResult, tolerance: f64) -> bool {
    diff.identical || diff.ratio < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn diff(ratio: f64, identical: bool) -> DiffResult {
        DiffResult {
            ratio,
            identical,
            diff_pixels: 0,
            total_pixels: 0,
            diff_image: None,
        }
    }

    #[test_case(0.0, 0.2 => true; "zero ratio under default tolerance")]
    #[test_case(0.19, 0.2 => true; "just under the bound")]
    #[test_case(0.2, 0.2 => false; "bound is exclusive")]
    #[test_case(0.35, 0.3 => false; "regression over tolerance")]
    #[test_case(0.0, 0.0 => false; "zero tolerance rejects decoded-equal renders")]
    #[test_case(0.999, 1.0 => true; "tolerance one never fails on ratio")]
    fn tolerance_is_strict(ratio: f64, tolerance: f64) -> bool {
        passes(&diff(ratio, false), tolerance)
    }

    #[test]
    fn byte_identical_passes_at_zero_tolerance() {
        assert!(passes(&diff(0.0, true), 0.0));
    }
}
