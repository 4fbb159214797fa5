//! Driven-application capability surface
//!
//! The runner only ever talks to the application through [`AppDriver`]:
//! navigate to a named view, grab a window bitmap, query liveness, stop.
//! Production runs use [`crate::app::AppHandle`]; the harness's own tests use
//! [`ScriptedDriver`].

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};

use crate::error::{SnapError, SnapResult};

/// Capability surface of the driven application.
///
/// One navigation or capture is in flight at a time; implementations are not
/// required to serialize concurrent calls.
#[async_trait]
pub trait AppDriver: Send + Sync {
    /// Navigate the application window to the named view.
    async fn navigate(&self, view: &str) -> SnapResult<()>;

    /// Capture the current window as encoded PNG bytes.
    async fn capture_window(&self) -> SnapResult<Vec<u8>>;

    /// Whether the application is still alive.
    fn is_running(&self) -> bool;

    /// Stop the application. Idempotent.
    fn stop(&self) -> SnapResult<()>;
}

/// Deterministic in-memory driver for tests.
///
/// Views are scripted as frame sequences: each capture consumes the next frame
/// for the current view, and the last frame repeats once the sequence is
/// exhausted. Navigation failures can be injected to exercise retry handling.
pub struct ScriptedDriver {
    state: Mutex<ScriptedState>,
}

struct ScriptedState {
    current_view: Option<String>,
    views: HashMap<String, Vec<RgbaImage>>,
    nav_failures: usize,
    running: bool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                current_view: None,
                views: HashMap::new(),
                nav_failures: 0,
                running: true,
            }),
        }
    }

    /// Script the frames returned for captures of `view`.
    pub fn view(self, view: &str, frames: Vec<RgbaImage>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.views.insert(view.to_string(), frames);
        }
        self
    }

    /// Fail the next `count` navigation calls before succeeding.
    pub fn fail_navigations(self, count: usize) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.nav_failures = count;
        }
        self
    }

    /// Solid-color frame helper.
    pub fn frame(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppDriver for ScriptedDriver {
    async fn navigate(&self, view: &str) -> SnapResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SnapError::Navigation {
                view: view.to_string(),
                reason: "driver state poisoned".to_string(),
            })?;

        if state.nav_failures > 0 {
            state.nav_failures -= 1;
            return Err(SnapError::Navigation {
                view: view.to_string(),
                reason: "scripted navigation failure".to_string(),
            });
        }
        if !state.views.contains_key(view) {
            return Err(SnapError::Navigation {
                view: view.to_string(),
                reason: "unknown view".to_string(),
            });
        }
        state.current_view = Some(view.to_string());
        Ok(())
    }

    async fn capture_window(&self) -> SnapResult<Vec<u8>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SnapError::Capture("driver state poisoned".to_string()))?;

        if !state.running {
            return Err(SnapError::Capture("application is not running".to_string()));
        }
        let view = state
            .current_view
            .clone()
            .ok_or_else(|| SnapError::Capture("no view navigated to".to_string()))?;
        let frames = state
            .views
            .get_mut(&view)
            .ok_or_else(|| SnapError::Capture(format!("no frames scripted for '{view}'")))?;

        let frame = if frames.len() > 1 {
            frames.remove(0)
        } else {
            frames
                .first()
                .cloned()
                .ok_or_else(|| SnapError::Capture(format!("frame sequence for '{view}' is empty")))?
        };

        encode_png(&frame)
    }

    fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }

    fn stop(&self) -> SnapResult<()> {
        if let Ok(mut state) = self.state.lock() {
            state.running = false;
        }
        Ok(())
    }
}

fn encode_png(frame: &RgbaImage) -> SnapResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    frame.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_frames_advance_and_repeat() {
        let driver = ScriptedDriver::new().view(
            "home",
            vec![
                ScriptedDriver::frame(4, 4, [255, 0, 0, 255]),
                ScriptedDriver::frame(4, 4, [0, 255, 0, 255]),
            ],
        );
        driver.navigate("home").await.unwrap();

        let first = driver.capture_window().await.unwrap();
        let second = driver.capture_window().await.unwrap();
        let third = driver.capture_window().await.unwrap();

        assert_ne!(first, second);
        // Last frame repeats once the sequence is exhausted.
        assert_eq!(second, third);
    }

    #[tokio::test]
    async fn unknown_view_is_a_navigation_failure() {
        let driver = ScriptedDriver::new();
        let err = driver.navigate("nowhere").await.unwrap_err();
        assert!(matches!(err, SnapError::Navigation { .. }));
    }

    #[tokio::test]
    async fn injected_failures_consume_then_clear() {
        let driver = ScriptedDriver::new()
            .view("home", vec![ScriptedDriver::frame(2, 2, [0, 0, 0, 255])])
            .fail_navigations(1);

        assert!(driver.navigate("home").await.is_err());
        assert!(driver.navigate("home").await.is_ok());
    }

    #[tokio::test]
    async fn capture_before_navigation_fails() {
        let driver =
            ScriptedDriver::new().view("home", vec![ScriptedDriver::frame(2, 2, [0, 0, 0, 255])]);
        let err = driver.capture_window().await.unwrap_err();
        assert!(matches!(err, SnapError::Capture(_)));
    }

    #[test]
    fn stop_flips_liveness() {
        let driver = ScriptedDriver::new();
        assert!(driver.is_running());
        driver.stop().unwrap();
        assert!(!driver.is_running());
    }
}
