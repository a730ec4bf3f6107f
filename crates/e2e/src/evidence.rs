//! Screenshot evidence and visual regression
//!
//! A passing run must leave a readable PNG behind. [`Evidence::inspect`]
//! checks that and records what was captured; [`BaselineComparer`] optionally
//! compares the capture against a stored baseline.

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Per-channel difference still treated as equal (anti-aliasing, compression)
const CHANNEL_TOLERANCE: i32 = 5;

/// What a screenshot step left on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub sha256: String,
}

impl Evidence {
    /// Confirm `path` holds a decodable image and describe it
    pub fn inspect(path: &Path) -> E2eResult<Self> {
        let data = std::fs::read(path)
            .map_err(|e| E2eError::Evidence(format!("{}: {}", path.display(), e)))?;
        if data.is_empty() {
            return Err(E2eError::Evidence(format!("{} is empty", path.display())));
        }

        let img = image::load_from_memory(&data)
            .map_err(|e| E2eError::Evidence(format!("{}: {}", path.display(), e)))?;
        let (width, height) = img.dimensions();

        debug!("Evidence {} is {}x{}", path.display(), width, height);

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            size_bytes: data.len() as u64,
            sha256: hash_bytes(&data),
        })
    }
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Result of a visual comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiff {
    pub name: String,

    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    pub diff_pixels: u64,
    pub total_pixels: u64,

    /// Red-on-grey diff image, written only when pixels differ
    pub diff_image_path: Option<PathBuf>,

    /// The baseline did not exist and was created from this capture
    #[serde(default)]
    pub baseline_created: bool,
}

/// Configuration for baseline comparison
#[derive(Debug, Clone)]
pub struct EvidenceConfig {
    pub baseline_dir: PathBuf,
    pub diff_dir: PathBuf,
    /// Default threshold (0.0 - 100.0 percent)
    pub threshold: f64,
    /// Create or overwrite baselines from the current captures
    pub auto_update: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("test-results/baselines"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}

pub struct BaselineComparer {
    config: EvidenceConfig,
}

impl BaselineComparer {
    pub fn new(config: EvidenceConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;
        Ok(Self { config })
    }

    fn baseline_path(&self, name: &str) -> PathBuf {
        self.config.baseline_dir.join(format!("{}.png", name))
    }

    /// Compare `actual` against the baseline stored under `name`
    pub fn compare(&self, name: &str, actual: &Path, threshold: Option<f64>) -> E2eResult<VisualDiff> {
        let threshold = threshold.unwrap_or(self.config.threshold);
        let baseline_path = self.baseline_path(name);

        if !actual.exists() {
            return Err(E2eError::Evidence(format!(
                "screenshot not found: {}",
                actual.display()
            )));
        }

        if self.config.auto_update || !baseline_path.exists() {
            if !self.config.auto_update {
                return Err(E2eError::BaselineNotFound(baseline_path.display().to_string()));
            }
            std::fs::copy(actual, &baseline_path)?;
            info!("Wrote baseline for '{}'", name);
            return Ok(VisualDiff {
                name: name.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: 0,
                diff_image_path: None,
                baseline_created: true,
            });
        }

        let actual_bytes = std::fs::read(actual)?;
        let baseline_bytes = std::fs::read(&baseline_path)?;
        let actual_img = image::load_from_memory(&actual_bytes)?;

        if hash_bytes(&actual_bytes) == hash_bytes(&baseline_bytes) {
            debug!("'{}' matches its baseline byte for byte", name);
            return Ok(VisualDiff {
                name: name.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: actual_img.width() as u64 * actual_img.height() as u64,
                diff_image_path: None,
                baseline_created: false,
            });
        }

        let baseline_img = image::load_from_memory(&baseline_bytes)?;
        let (width, height) = actual_img.dimensions();
        let (base_width, base_height) = baseline_img.dimensions();
        if (width, height) != (base_width, base_height) {
            warn!(
                "'{}' dimensions differ: actual {}x{} vs baseline {}x{}",
                name, width, height, base_width, base_height
            );
        }

        let actual_rgba = actual_img.to_rgba8();
        let baseline_rgba = baseline_img.to_rgba8();

        // Compare over the union of both images; pixels present in only one
        // of them count as changed.
        let union_width = width.max(base_width);
        let union_height = height.max(base_height);
        let mut diff_img = RgbaImage::new(union_width, union_height);
        let mut diff_pixels = 0u64;
        let total_pixels = union_width as u64 * union_height as u64;

        for y in 0..union_height {
            for x in 0..union_width {
                let in_actual = x < width && y < height;
                let in_baseline = x < base_width && y < base_height;
                let differs = !(in_actual && in_baseline)
                    || pixels_differ(actual_rgba.get_pixel(x, y), baseline_rgba.get_pixel(x, y));

                if differs {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let c = actual_rgba.get_pixel(x, y).channels();
                    diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
            }
        }

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64 * 100.0
        };
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.config.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, threshold
            );
        }

        Ok(VisualDiff {
            name: name.to_string(),
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            baseline_created: false,
        })
    }

    /// Baseline names currently stored
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

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (*x as i32 - *y as i32).abs() > CHANNEL_TOLERANCE)
}
