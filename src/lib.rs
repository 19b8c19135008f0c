// ==============================================================================
// lib.rs - Genotype Processor Library
// ==============================================================================
// Description: Library interface for consumer genotype processing: build
//              detection, assembly remapping, deduplication, chip and sex
//              classification
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

pub mod build_detector;
pub mod chip;
pub mod config;
pub mod dedup;
pub mod error;
pub mod genotype;
pub mod input;
pub mod merge;
pub mod models;
pub mod processor;
pub mod quality;
pub mod remapper;
pub mod resources;
pub mod sample;
pub mod sex;
pub mod table;

pub use config::ProcessorConfig;
pub use error::{ProcessingError, Result};
pub use models::{Build, RawRecord, Sex, SnpRecord};
pub use processor::{GenotypeProcessor, Providers};
pub use resources::ReferenceResources;
pub use sample::{Sample, SampleSummary};
pub use table::GenotypeTable;
