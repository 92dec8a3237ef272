//! Screenshot baselines and pixel comparison
//!
//! Pages write screenshots into `screenshot_dir`. When visual checks are
//! turned on, a screenshot is compared against `{baseline_dir}/{name}.png`
//! and a red-on-dim diff image is written for anything that differs.

use image::{GenericImageView, Pixel, RgbaImage};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::base_page::DEFAULT_SCREENSHOT_DIR;
use crate::error::{E2eError, E2eResult};

/// Per-channel difference still treated as equal (anti-aliasing, compression)
const CHANNEL_TOLERANCE: i32 = 5;

/// Result of comparing one screenshot against its baseline
#[derive(Debug, Clone)]
pub struct ScreenshotDiff {
    pub name: String,
    /// Within threshold
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
    pub actual_hash: String,
    pub baseline_hash: String,
}

#[derive(Debug, Clone)]
pub struct ScreenshotConfig {
    pub screenshot_dir: PathBuf,
    pub baseline_dir: PathBuf,
    pub diff_dir: PathBuf,
    /// Allowed share of differing pixels, in percent
    pub threshold: f64,
    /// Adopt the screenshot as baseline when none exists
    pub update_baselines: bool,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            baseline_dir: PathBuf::from("./e2e/baselines"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            update_baselines: false,
        }
    }
}

pub struct ScreenshotStore {
    config: ScreenshotConfig,
}

impl ScreenshotStore {
    pub fn new(config: ScreenshotConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.screenshot_dir)?;
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.config.screenshot_dir
    }

    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        self.config.screenshot_dir.join(format!("{}.png", name))
    }

    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.config.baseline_dir.join(format!("{}.png", name))
    }

    /// Compare `name` against its baseline
    pub fn compare(&self, name: &str) -> E2eResult<ScreenshotDiff> {
        let actual_path = self.screenshot_path(name);
        let baseline_path = self.baseline_path(name);

        if !actual_path.exists() {
            return Err(E2eError::AssertionFailed(format!(
                "screenshot not taken: {}",
                actual_path.display()
            )));
        }

        let actual_hash = hash_file(&actual_path)?;

        if !baseline_path.exists() {
            if !self.config.update_baselines {
                return Err(E2eError::BaselineNotFound(
                    baseline_path.to_string_lossy().to_string(),
                ));
            }
            info!("Creating baseline for '{}'", name);
            std::fs::copy(&actual_path, &baseline_path)?;
            return Ok(ScreenshotDiff {
                name: name.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                baseline_hash: actual_hash.clone(),
                actual_hash,
            });
        }

        let baseline_hash = hash_file(&baseline_path)?;
        let actual = image::open(&actual_path)?;

        if actual_hash == baseline_hash {
            debug!("Screenshot '{}' is byte-identical to its baseline", name);
            let (w, h) = actual.dimensions();
            return Ok(ScreenshotDiff {
                name: name.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: w as u64 * h as u64,
                diff_image_path: None,
                actual_hash,
                baseline_hash,
            });
        }

        let baseline = image::open(&baseline_path)?;
        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "Screenshot '{}' is {:?}, baseline is {:?}",
                name,
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let actual = actual.to_rgba8();
        let baseline = baseline.to_rgba8();
        let (diff_img, diff_pixels, total_pixels) = diff_images(&actual, &baseline);

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64 * 100.0
        };
        let matches = diff_percent <= self.config.threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.config.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold {:.2}%)",
                name, diff_percent, self.config.threshold
            );
        }

        Ok(ScreenshotDiff {
            name: name.to_string(),
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            actual_hash,
            baseline_hash,
        })
    }

    /// Compare and turn a mismatch into an error
    pub fn check(&self, name: &str) -> E2eResult<ScreenshotDiff> {
        let diff = self.compare(name)?;
        if !diff.matches {
            return Err(E2eError::ScreenshotMismatch {
                name: name.to_string(),
                diff_percent: diff.diff_percent,
                threshold: self.config.threshold,
            });
        }
        Ok(diff)
    }

    pub fn update_baseline(&self, name: &str) -> E2eResult<()> {
        let actual_path = self.screenshot_path(name);
        if !actual_path.exists() {
            return Err(E2eError::AssertionFailed(format!(
                "cannot update baseline, screenshot not taken: {}",
                actual_path.display()
            )));
        }
        std::fs::copy(&actual_path, self.baseline_path(name))?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    pub fn list_baselines(&self) -> E2eResult<Vec<String>> {
        let mut baselines = Vec::new();
        for entry in std::fs::read_dir(&self.config.baseline_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    baselines.push(name.to_string_lossy().to_string());
                }
            }
        }
        baselines.sort();
        Ok(baselines)
    }
}

/// Pixels outside the overlapping area count as different
fn diff_images(actual: &RgbaImage, baseline: &RgbaImage) -> (RgbaImage, u64, u64) {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let mut diff = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;

    for y in 0..height {
        for x in 0..width {
            let a = (x < actual.width() && y < actual.height()).then(|| actual.get_pixel(x, y));
            let b = (x < baseline.width() && y < baseline.height()).then(|| baseline.get_pixel(x, y));
            match (a, b) {
                (Some(a), Some(b)) if !pixels_differ(a, b) => {
                    let c = a.channels();
                    diff.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
                _ => {
                    diff_pixels += 1;
                    diff.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    (diff, diff_pixels, width as u64 * height as u64)
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}
