// ==============================================================================
// error.rs - Processing Error Taxonomy
// ==============================================================================
// Description: Fatal error kinds raised by the genotype processing core
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-15
// Version: 1.0.0
// ==============================================================================
// Only validation failures and unavailable reference resources are raised.
// Malformed input rows are counted on the Sample and data-integrity
// conflicts are recorded in its discrepancy sets.
// ==============================================================================

use thiserror::Error;

/// Errors that abort a processing call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Invalid genome build: '{0}' (expected 36, 37, 38, NCBI36, GRCh37 or GRCh38)")]
    InvalidBuild(String),

    #[error("Invalid chromosome argument: '{0}'")]
    InvalidChromosome(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reference resource '{resource}' unavailable: {reason}")]
    ResourceUnavailable { resource: String, reason: String },
}

impl ProcessingError {
    pub fn resource_unavailable(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        ProcessingError::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// True for the validation family (rejected before any mutation)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProcessingError::InvalidBuild(_)
                | ProcessingError::InvalidChromosome(_)
                | ProcessingError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
