//! Configuration management for runtime parameter tuning
//!
//! This module provides configuration loading from JSON files, enabling
//! adjustment without recompilation. Classifier parameters mirror the
//! tunables exposed by on-device audio classification engines: window
//! overlap, returned result count, confidence threshold, and interpreter
//! thread count.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    pub classifier: ClassifierParams,
    pub dispatch: DispatchConfig,
    pub synthetic: SyntheticConfig,
}

/// Classification engine parameters
///
/// Setters clamp to the ranges the engine accepts; the step helpers
/// reproduce the increment/decrement guards a control surface applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Fraction of the inference window shared between consecutive passes
    pub overlap: f32,
    /// Number of categories returned per inference pass
    pub max_results: usize,
    /// Minimum confidence for a category to appear in results
    pub score_threshold: f32,
    /// Interpreter worker threads
    pub num_threads: usize,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            // Position 2 on the overlap selector, i.e. half-window overlap
            overlap: 0.5,
            max_results: 2,
            score_threshold: 0.3,
            num_threads: 2,
        }
    }
}

impl ClassifierParams {
    /// Overlap advances in quarter-window steps
    pub const OVERLAP_STEP: f32 = 0.25;
    /// Highest overlap selector position (fraction 0.75)
    pub const MAX_OVERLAP_POSITION: usize = 3;
    /// Threshold advances in tenths
    pub const THRESHOLD_STEP: f32 = 0.1;
    pub const MIN_RESULTS: usize = 1;
    pub const MAX_RESULTS: usize = 5;
    pub const MIN_THREADS: usize = 1;
    pub const MAX_THREADS: usize = 4;

    /// Set overlap from a selector position, clamped to [0, 3].
    pub fn set_overlap_position(&mut self, position: usize) {
        let position = position.min(Self::MAX_OVERLAP_POSITION);
        self.overlap = Self::OVERLAP_STEP * position as f32;
    }

    /// Selector position corresponding to the current overlap.
    pub fn overlap_position(&self) -> usize {
        (self.overlap / Self::OVERLAP_STEP).round() as usize
    }

    /// Set the returned result count, clamped to [1, 5].
    pub fn set_max_results(&mut self, count: usize) {
        self.max_results = count.clamp(Self::MIN_RESULTS, Self::MAX_RESULTS);
    }

    /// Set the confidence threshold, snapped to the 0.1 grid in [0.1, 0.9].
    pub fn set_score_threshold(&mut self, threshold: f32) {
        let snapped = (threshold / Self::THRESHOLD_STEP).round() * Self::THRESHOLD_STEP;
        self.score_threshold = snapped.clamp(0.1, 0.9);
    }

    /// Set the interpreter thread count, clamped to [1, 4].
    pub fn set_num_threads(&mut self, threads: usize) {
        self.num_threads = threads.clamp(Self::MIN_THREADS, Self::MAX_THREADS);
    }

    /// Step the result count up by one. Returns false at the upper bound.
    pub fn increment_results(&mut self) -> bool {
        if self.max_results < Self::MAX_RESULTS {
            self.max_results += 1;
            true
        } else {
            false
        }
    }

    /// Step the result count down by one. Returns false at the lower bound.
    pub fn decrement_results(&mut self) -> bool {
        if self.max_results > Self::MIN_RESULTS {
            self.max_results -= 1;
            true
        } else {
            false
        }
    }

    /// Raise the threshold by one step while the current value is at most 0.8.
    pub fn increment_threshold(&mut self) -> bool {
        if self.score_threshold <= 0.8 {
            self.score_threshold += Self::THRESHOLD_STEP;
            true
        } else {
            false
        }
    }

    /// Lower the threshold by one step while the current value is at least 0.2.
    pub fn decrement_threshold(&mut self) -> bool {
        if self.score_threshold >= 0.2 {
            self.score_threshold -= Self::THRESHOLD_STEP;
            true
        } else {
            false
        }
    }

    /// Step the thread count up by one. Returns false at the upper bound.
    pub fn increment_threads(&mut self) -> bool {
        if self.num_threads < Self::MAX_THREADS {
            self.num_threads += 1;
            true
        } else {
            false
        }
    }

    /// Step the thread count down by one. Returns false at the lower bound.
    pub fn decrement_threads(&mut self) -> bool {
        if self.num_threads > Self::MIN_THREADS {
            self.num_threads -= 1;
            true
        } else {
            false
        }
    }

    /// Check every parameter against its accepted range.
    pub fn validate(&self) -> Result<(), crate::error::ClassifyError> {
        use crate::error::ClassifyError;

        if !(0.0..=0.75 + f32::EPSILON).contains(&self.overlap) {
            return Err(ClassifyError::InvalidParams {
                detail: format!("overlap {} outside [0.0, 0.75]", self.overlap),
            });
        }
        if !(Self::MIN_RESULTS..=Self::MAX_RESULTS).contains(&self.max_results) {
            return Err(ClassifyError::InvalidParams {
                detail: format!("max_results {} outside [1, 5]", self.max_results),
            });
        }
        if !(0.1 - 1e-4..=0.9 + 1e-4).contains(&self.score_threshold) {
            return Err(ClassifyError::InvalidParams {
                detail: format!("score_threshold {} outside [0.1, 0.9]", self.score_threshold),
            });
        }
        if !(Self::MIN_THREADS..=Self::MAX_THREADS).contains(&self.num_threads) {
            return Err(ClassifyError::InvalidParams {
                detail: format!("num_threads {} outside [1, 4]", self.num_threads),
            });
        }
        Ok(())
    }
}

/// Dispatch queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded capacity of the single-consumer result queue
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// Synthetic demo backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Inference window length in milliseconds (YAMNet uses 975ms)
    pub window_ms: u64,
    /// Probability that a generated cycle contains a watched category
    pub watched_weight: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            window_ms: 975,
            watched_weight: 0.2,
        }
    }
}

impl Default for SentryConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            classifier: ClassifierParams::default(),
            dispatch: DispatchConfig::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl SentryConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// * `SentryConfig` - Loaded configuration, or defaults when the file
    ///   is missing or fails to parse (a warning is logged either way)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/sentry_config.json")
    }
}
