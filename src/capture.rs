//! Image capture - window bitmap to normalized PNG on disk

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::driver::AppDriver;
use crate::error::{SnapError, SnapResult};

/// Default normalized capture width in pixels.
///
/// Captures are resized to a fixed width so baselines stay comparable across
/// display densities and window sizes.
pub const DEFAULT_CAPTURE_WIDTH: u32 = 800;

/// Capture the application window and persist it as `<dest_root>/<name>.png`,
/// resized to `width` with aspect ratio preserved. Overwrites any prior file.
pub async fn capture(
    driver: &dyn AppDriver,
    name: &str,
    dest_root: &Path,
    width: u32,
) -> SnapResult<PathBuf> {
    let bytes = driver.capture_window().await?;

    let img = image::load_from_memory(&bytes)
        .map_err(|e| SnapError::Capture(format!("'{}': undecodable window bitmap: {}", name, e)))?;
    let normalized = normalize_width(&img, width);

    std::fs::create_dir_all(dest_root)
        .map_err(|e| SnapError::Capture(format!("'{}': cannot create {}: {}", name, dest_root.display(), e)))?;

    let path = dest_root.join(format!("{}.png", name));
    normalized
        .save(&path)
        .map_err(|e| SnapError::Capture(format!("'{}': write to {} failed: {}", name, path.display(), e)))?;

    debug!(
        "Captured '{}' at {}x{} -> {}",
        name,
        normalized.width(),
        normalized.height(),
        path.display()
    );
    Ok(path)
}

/// Scale to the target width, preserving aspect ratio. No-op when already there.
fn normalize_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w == width {
        return img.clone();
    }
    let height = ((h as u64 * width as u64) / w as u64).max(1) as u32;
    img.resize_exact(width, height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;

    #[test]
    fn normalize_preserves_aspect_ratio() {
        let img = DynamicImage::ImageRgba8(ScriptedDriver::frame(1600, 1200, [10, 20, 30, 255]));
        let out = normalize_width(&img, 800);
        assert_eq!(out.dimensions(), (800, 600));
    }

    #[test]
    fn normalize_is_identity_at_target_width() {
        let img = DynamicImage::ImageRgba8(ScriptedDriver::frame(800, 450, [10, 20, 30, 255]));
        let out = normalize_width(&img, 800);
        assert_eq!(out.dimensions(), (800, 450));
    }

    #[test]
    fn normalize_upscales_narrow_captures() {
        let img = DynamicImage::ImageRgba8(ScriptedDriver::frame(400, 300, [10, 20, 30, 255]));
        let out = normalize_width(&img, 800);
        assert_eq!(out.dimensions(), (800, 600));
    }

    #[tokio::test]
    async fn capture_writes_normalized_png() {
        let dir = tempfile::tempdir().unwrap();
        let driver =
            ScriptedDriver::new().view("home", vec![ScriptedDriver::frame(40, 30, [5, 5, 5, 255])]);
        driver.navigate("home").await.unwrap();

        let path = capture(&driver, "CardList", dir.path(), 20).await.unwrap();

        assert_eq!(path, dir.path().join("CardList.png"));
        let written = image::open(&path).unwrap();
        assert_eq!(written.dimensions(), (20, 15));
    }

    #[tokio::test]
    async fn capture_without_view_is_a_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = ScriptedDriver::new();
        let err = capture(&driver, "CardList", dir.path(), 20).await.unwrap_err();
        assert!(matches!(err, SnapError::Capture(_)));
    }
}
