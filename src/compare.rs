//! Image comparator - per-pixel difference ratio with a visual diff artifact

use std::path::{Path, PathBuf};

use image::{Pixel, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{SnapError, SnapResult};

/// Per-channel deviation above which a pixel counts as differing. Absorbs
/// anti-aliasing and encoder noise.
const CHANNEL_SENSITIVITY: i32 = 5;

/// Result of comparing a candidate against a baseline.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Fraction of differing pixels, in [0, 1].
    pub ratio: f64,

    /// Whether the two files were byte-for-byte identical.
    pub identical: bool,

    /// Number of differing pixels.
    pub diff_pixels: u64,

    /// Total pixels compared (0 when the byte-identical fast path was taken).
    pub total_pixels: u64,

    /// Path to the diff image, written only when pixels differ.
    pub diff_image: Option<PathBuf>,
}

impl DiffResult {
    fn identical() -> Self {
        Self {
            ratio: 0.0,
            identical: true,
            diff_pixels: 0,
            total_pixels: 0,
            diff_image: None,
        }
    }
}

/// Compare two PNG files pixel by pixel.
///
/// Dimension mismatches are tolerated: the overlapping region is compared and
/// every pixel outside it counts as differing. The diff artifact marks
/// differing pixels solid red over a dimmed copy of the candidate.
pub fn compare(candidate: &Path, baseline: &Path, diff_path: &Path) -> SnapResult<DiffResult> {
    let candidate_bytes = std::fs::read(candidate).map_err(|e| {
        SnapError::Compare(format!("cannot read candidate {}: {}", candidate.display(), e))
    })?;
    let baseline_bytes = std::fs::read(baseline).map_err(|e| {
        SnapError::Compare(format!("cannot read baseline {}: {}", baseline.display(), e))
    })?;

    // Byte-identical files need no decode
    if digest(&candidate_bytes) == digest(&baseline_bytes) {
        debug!("Screenshots match exactly (same hash)");
        return Ok(DiffResult::identical());
    }

    let candidate_img = decode(&candidate_bytes, candidate)?;
    let baseline_img = decode(&baseline_bytes, baseline)?;

    let (cw, ch) = candidate_img.dimensions();
    let (bw, bh) = baseline_img.dimensions();
    if (cw, ch) != (bw, bh) {
        warn!(
            "Screenshot dimensions differ: candidate {}x{} vs baseline {}x{}",
            cw, ch, bw, bh
        );
    }

    let width = cw.max(bw);
    let height = ch.max(bh);
    let overlap_w = cw.min(bw);
    let overlap_h = ch.min(bh);

    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let in_overlap = x < overlap_w && y < overlap_h;
            if in_overlap
                && !pixels_differ(candidate_img.get_pixel(x, y), baseline_img.get_pixel(x, y))
            {
                // Keep the candidate but dim it
                let channels = candidate_img.get_pixel(x, y).channels();
                diff_img.put_pixel(
                    x,
                    y,
                    Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                );
            } else {
                diff_pixels += 1;
                diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
    }

    let total_pixels = (width as u64) * (height as u64);
    let ratio = if total_pixels == 0 {
        0.0
    } else {
        diff_pixels as f64 / total_pixels as f64
    };

    let diff_image = if diff_pixels > 0 {
        diff_img.save(diff_path).map_err(|e| {
            SnapError::Compare(format!("cannot write diff image {}: {}", diff_path.display(), e))
        })?;
        Some(diff_path.to_path_buf())
    } else {
        None
    };

    Ok(DiffResult {
        ratio,
        identical: false,
        diff_pixels,
        total_pixels,
        diff_image,
    })
}

fn decode(bytes: &[u8], path: &Path) -> SnapResult<RgbaImage> {
    image::load_from_memory(bytes)
        .map_err(|e| SnapError::Compare(format!("cannot decode {}: {}", path.display(), e)))
        .map(|img| img.to_rgba8())
}

/// Check if two pixels differ significantly
fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    let a_channels = a.channels();
    let b_channels = b.channels();

    for i in 0..4 {
        let diff = (a_channels[i] as i32 - b_channels[i] as i32).abs();
        if diff > CHANNEL_SENSITIVITY {
            return true;
        }
    }

    false
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;

    fn save(img: &RgbaImage, path: &Path) {
        img.save(path).unwrap();
    }

    #[test]
    fn identical_files_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let frame = ScriptedDriver::frame(8, 8, [120, 130, 140, 255]);
        save(&frame, &a);
        save(&frame, &b);

        let diff = compare(&a, &b, &dir.path().join("d.png")).unwrap();
        assert!(diff.identical);
        assert_eq!(diff.ratio, 0.0);
        assert!(diff.diff_image.is_none());
    }

    #[test]
    fn near_identical_pixels_are_within_sensitivity() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        save(&ScriptedDriver::frame(8, 8, [100, 100, 100, 255]), &a);
        save(&ScriptedDriver::frame(8, 8, [103, 100, 98, 255]), &b);

        let diff = compare(&a, &b, &dir.path().join("d.png")).unwrap();
        assert!(!diff.identical);
        assert_eq!(diff.ratio, 0.0);
        assert!(diff.diff_image.is_none());
    }

    #[test]
    fn disjoint_colors_differ_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let d = dir.path().join("d.png");
        save(&ScriptedDriver::frame(8, 8, [0, 0, 0, 255]), &a);
        save(&ScriptedDriver::frame(8, 8, [255, 255, 255, 255]), &b);

        let diff = compare(&a, &b, &d).unwrap();
        assert_eq!(diff.ratio, 1.0);
        assert_eq!(diff.diff_pixels, 64);
        assert_eq!(diff.diff_image.as_deref(), Some(d.as_path()));
        assert!(d.is_file());
    }

    #[test]
    fn partial_change_yields_fractional_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");

        let base = ScriptedDriver::frame(10, 10, [50, 50, 50, 255]);
        let mut changed = base.clone();
        // Repaint two full rows: 20 of 100 pixels
        for y in 0..2 {
            for x in 0..10 {
                changed.put_pixel(x, y, Rgba([200, 50, 50, 255]));
            }
        }
        save(&changed, &a);
        save(&base, &b);

        let diff = compare(&a, &b, &dir.path().join("d.png")).unwrap();
        assert!((diff.ratio - 0.2).abs() < 1e-9);
        assert_eq!(diff.diff_pixels, 20);
    }

    #[test]
    fn dimension_mismatch_penalizes_nonoverlap() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        save(&ScriptedDriver::frame(10, 10, [50, 50, 50, 255]), &a);
        save(&ScriptedDriver::frame(10, 5, [50, 50, 50, 255]), &b);

        let diff = compare(&a, &b, &dir.path().join("d.png")).unwrap();
        // Overlap matches; the lower half of the envelope counts as differing.
        assert_eq!(diff.total_pixels, 100);
        assert_eq!(diff.diff_pixels, 50);
        assert!((diff.ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unreadable_input_is_a_compare_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        save(&ScriptedDriver::frame(4, 4, [0, 0, 0, 255]), &a);

        let err = compare(&a, &dir.path().join("missing.png"), &dir.path().join("d.png"))
            .unwrap_err();
        assert!(matches!(err, SnapError::Compare(_)));
    }
}
