//! Configuration for the processing pipeline.
//!
//! Settings load from an optional TOML file with environment-variable
//! overrides on top (`.env` files are honored by `main`). Every heuristic
//! constant the decision engine uses lives here as a named, overridable
//! field rather than an inline literal: these are tuning knobs, not
//! protocol constants.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default logical queue name.
pub const DEFAULT_QUEUE_NAME: &str = "document-processing";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub breaker: BreakerConfig,
    pub quality: QualityThresholds,
    pub ocr: OcrSettings,
    pub raster: RasterConfig,
    pub worker: WorkerConfig,
}

/// Where uploaded blobs live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored documents.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: base.join("docmill").join("documents"),
        }
    }
}

/// Queue connection and key settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Redis connection URL.
    pub url: String,
    /// Logical queue name; the job list, result keys, dead-letter list and
    /// progress channels all derive from it.
    pub name: String,
    /// Bounded wait for the blocking pop, so shutdown is observable.
    pub pop_timeout_secs: u64,
    /// TTL for per-document result records.
    pub result_ttl_secs: u64,
    /// Maximum retained dead-letter entries.
    pub dead_letter_max: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            name: DEFAULT_QUEUE_NAME.to_string(),
            pop_timeout_secs: 5,
            result_ttl_secs: 24 * 60 * 60,
            dead_letter_max: 1000,
        }
    }
}

/// Circuit breaker tuning for the enqueue path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before probing.
    pub cooldown_ms: u64,
    /// Consecutive half-open successes needed to close.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 30_000,
            success_threshold: 2,
        }
    }
}

/// Born-digital scoring knobs. See `analysis::quality` for how each field
/// feeds the confidence formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Non-whitespace characters per page considered "full density".
    pub density_target: f64,
    /// Ideal whitespace ratio for prose.
    pub whitespace_ideal: f64,
    /// Tolerated deviation from the ideal whitespace ratio.
    pub whitespace_tolerance: f64,
    /// Unique-character ratio considered full vocabulary variety.
    pub variety_target: f64,
    /// Multiplier punishing non-printable characters.
    pub non_printable_penalty: f64,
    /// Weight of the density score.
    pub density_weight: f64,
    /// Weight of the whitespace score.
    pub whitespace_weight: f64,
    /// Weight of the printable score.
    pub printable_weight: f64,
    /// Weight of the variety score.
    pub variety_weight: f64,
    /// Confidence at or above which direct extraction is preferred.
    pub direct_threshold: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            density_target: 1200.0,
            whitespace_ideal: 0.22,
            whitespace_tolerance: 0.15,
            variety_target: 0.12,
            non_printable_penalty: 5.0,
            density_weight: 0.55,
            whitespace_weight: 0.20,
            printable_weight: 0.15,
            variety_weight: 0.10,
            direct_threshold: 0.8,
        }
    }
}

/// OCR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Default recognition language (overridable per job).
    pub language: String,
    /// Words below this confidence (0..=100) are dropped from results.
    pub min_word_confidence: f64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            min_word_confidence: 0.0,
        }
    }
}

/// Rasterization settings for the OCR paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// DPI for the single raster used by selective augmentation.
    pub augment_dpi: u32,
    /// DPI for full-page OCR rasters.
    pub ocr_dpi: u32,
    /// Hard cap on rasterized pages per document.
    pub max_pages: u32,
    /// Longest raster edge after optimization, in pixels.
    pub max_dimension: u32,
    /// Image regions smaller than this (in raster pixels, after scaling)
    /// are skipped by selective OCR.
    pub min_region_px: u32,
    /// Scale of the logical page-pixel space (1.0 means 1 pt = 1 px).
    pub viewport_scale: f64,
    /// Mapped boxes thinner than this in either dimension are dropped as
    /// degenerate.
    pub epsilon_px: f64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            augment_dpi: 150,
            ocr_dpi: 300,
            max_pages: 50,
            max_dimension: 2400,
            min_region_px: 8,
            viewport_scale: 1.0,
            epsilon_px: 0.5,
        }
    }
}

/// Worker loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Delivery attempts before dead-lettering.
    pub max_attempts: u32,
    /// Base of the exponential re-queue backoff.
    pub backoff_base_ms: u64,
    /// Ceiling of the re-queue backoff.
    pub backoff_cap_ms: u64,
    /// How long shutdown waits for the in-flight job before force-exiting.
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_cap_ms: 30_000,
            shutdown_grace_secs: 30,
        }
    }
}

impl WorkerConfig {
    /// Exponential backoff before re-queueing attempt `attempt`:
    /// `min(base · 2^attempt, cap)`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let shifted = self
            .backoff_base_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        shifted.min(self.backoff_cap_ms)
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// no file is given or present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(p)
                    .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", p.display(), e))?;
                toml::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("invalid config {}: {}", p.display(), e))?
            }
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    let contents = std::fs::read_to_string(&default_path)?;
                    toml::from_str(&contents).map_err(|e| {
                        anyhow::anyhow!("invalid config {}: {}", default_path.display(), e)
                    })?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.expand_paths();
        Ok(config)
    }

    /// Default config file location (`~/.config/docmill/docmill.toml`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docmill")
            .join("docmill.toml")
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DOCMILL_QUEUE_URL") {
            self.queue.url = url;
        }
        if let Ok(name) = std::env::var("DOCMILL_QUEUE_NAME") {
            self.queue.name = name;
        }
        if let Ok(root) = std::env::var("DOCMILL_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Ok(lang) = std::env::var("DOCMILL_OCR_LANGUAGE") {
            self.ocr.language = lang;
        }
    }

    fn expand_paths(&mut self) {
        if let Some(s) = self.storage.root.to_str() {
            let expanded = shellexpand::tilde(s);
            self.storage.root = PathBuf::from(expanded.as_ref());
        }
    }
}
