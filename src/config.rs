// ==============================================================================
// config.rs - Processor Configuration
// ==============================================================================
// Description: Tunable thresholds and pipeline switches, loaded from JSON and
//              range-checked before any processing starts
// Author: Matt Barham
// Created: 2026-10-14
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

use crate::dedup::DedupOptions;
use crate::error::{ProcessingError, Result};
use crate::models::Build;

pub const DEFAULT_CHIP_OVERLAP_THRESHOLD: f64 = 0.95;

/// Sex determination thresholds
///
/// These are a heuristic over X heterozygosity and Y call rate, not a
/// diagnostic test. Defaults:
/// - `heterozygous_x_threshold` 0.03: male X het ratio stays at or below this
/// - `y_called_threshold` 0.3: male non-PAR Y call rate exceeds this
/// - `min_called_positions` 10: fewer called non-PAR X positions → unknown
/// - `min_y_positions` 10: non-PAR Y positions needed as evidence. Calling
///   Male needs this many called Y positions; inferring from Y alone needs
///   this many Y rows, called or not
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SexThresholds {
    #[validate(range(min = 0.0, max = 1.0))]
    pub heterozygous_x_threshold: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub y_called_threshold: f64,

    #[validate(range(min = 1))]
    pub min_called_positions: usize,

    #[validate(range(min = 1))]
    pub min_y_positions: usize,
}

impl Default for SexThresholds {
    fn default() -> Self {
        Self {
            heterozygous_x_threshold: 0.03,
            y_called_threshold: 0.3,
            min_called_positions: 10,
            min_y_positions: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProcessorConfig {
    pub dedup: DedupOptions,

    #[validate(nested)]
    pub sex: SexThresholds,

    /// Both overlap ratios must exceed this for a chip assignment
    #[validate(range(min = 0.0, max = 1.0))]
    pub chip_overlap_threshold: f64,

    /// Build assumed when detection finds no anchors
    pub fallback_build: Build,

    /// Run per-chromosome / per-build work on the rayon pool
    pub parallel: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            dedup: DedupOptions::default(),
            sex: SexThresholds::default(),
            chip_overlap_threshold: DEFAULT_CHIP_OVERLAP_THRESHOLD,
            fallback_build: Build::Grch37,
            parallel: true,
        }
    }
}

impl ProcessorConfig {
    /// Load and validate a JSON configuration file
    ///
    /// Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ProcessingError::InvalidConfig(format!("cannot open {:?}: {}", path, e))
        })?;

        let config: ProcessorConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ProcessingError::InvalidConfig(format!("cannot parse {:?}: {}", path, e)))?;

        config.checked()?;
        info!("Loaded processor configuration from {:?}", path);
        debug!("{:?}", config);
        Ok(config)
    }

    /// Run range validation, mapping failures to `InvalidConfig`
    pub fn checked(&self) -> Result<()> {
        self.validate()
            .map_err(|e| ProcessingError::InvalidConfig(e.to_string()))
    }
}
