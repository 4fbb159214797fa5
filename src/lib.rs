//! Snapcheck - visual regression testing for a driven application
//!
//! This crate drives a running application instance view by view, captures
//! normalized screenshots, and compares them against stored baselines:
//! - Spawns the application as a subprocess and waits for its automation
//!   endpoint (bounded startup timeout)
//! - Parses declarative YAML scenarios (navigate + settle + checks)
//! - Bootstraps baselines on first run, then treats them as ground truth
//! - Retries whole scenarios to absorb rendering flakiness
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                           │
//! │    ├── ensure_driver() -> AppHandle (spawn + health wait)    │
//! │    ├── per scenario: navigate -> settle -> checks            │
//! │    │     retry up to max_attempts, re-navigating each time   │
//! │    └── RunReport -> results.json, exit code                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ScreenshotCheck                                             │
//! │    ├── BaselineStore: <baseline_root>/<name>.png             │
//! │    ├── capture(): window bitmap -> normalized width PNG      │
//! │    └── compare(): ratio in [0,1] + <name>-diff.png artifact  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                             │
//! │    ├── name, view, settle_ms, max_attempts, tags             │
//! │    └── checks: [{ name, tolerance }]                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod baseline;
pub mod capture;
pub mod check;
pub mod compare;
pub mod driver;
pub mod error;
pub mod runner;
pub mod scenario;

pub use driver::AppDriver;
pub use error::{SnapError, SnapResult};
pub use runner::{RunReport, ScenarioRunner};
pub use scenario::{Check, Scenario};
