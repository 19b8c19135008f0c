// ==============================================================================
// processor.rs - Genotype Processing Pipeline
// ==============================================================================
// Description: Runs raw records through build detection, PAR assignment and
//              deduplication, and exposes the on-demand stages
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use std::sync::Arc;
use tracing::info;

use crate::config::ProcessorConfig;
use crate::dedup::DedupReport;
use crate::error::Result;
use crate::merge::MergeStats;
use crate::models::{Build, ChipAssignment, RawRecord, Sex};
use crate::remapper::RemapStats;
use crate::resources::{
    AnchorPositionProvider, AssemblyMappingProvider, ChipClusterProvider, LowQualityProvider,
    ParBoundaryProvider, ReferenceResources,
};
use crate::sample::Sample;
use crate::table::GenotypeTable;

/// Reference data collaborators, injected once per processor
#[derive(Clone)]
pub struct Providers {
    pub anchors: Arc<dyn AnchorPositionProvider>,
    pub mappings: Arc<dyn AssemblyMappingProvider>,
    pub clusters: Arc<dyn ChipClusterProvider>,
    pub low_quality: Arc<dyn LowQualityProvider>,
    pub par: Arc<dyn ParBoundaryProvider>,
}

impl Providers {
    /// Serve every concern from one in-memory resource set
    pub fn from_resources(resources: ReferenceResources) -> Self {
        let shared = Arc::new(resources);
        Self {
            anchors: shared.clone(),
            mappings: shared.clone(),
            clusters: shared.clone(),
            low_quality: shared.clone(),
            par: shared,
        }
    }
}

pub struct GenotypeProcessor {
    config: ProcessorConfig,
    providers: Providers,
}

impl GenotypeProcessor {
    /// Create a processor; the configuration is validated up front
    pub fn new(config: ProcessorConfig, providers: Providers) -> Result<Self> {
        config.checked()?;
        Ok(Self { config, providers })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Main processing pipeline
    pub fn build_sample<I>(&self, source: &str, records: I, declared_build: Option<Build>) -> Result<Sample>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        info!("Processing sample from {}", source);

        // 1. Normalize input rows
        let mut sample = Sample::from_records(source, records, declared_build);

        // 2. Detect build when it was not declared
        if sample.build().is_none() {
            let detection = sample.detect_build_with(self.providers.anchors.as_ref(), self.config.parallel)?;
            if !detection.is_detected() {
                sample.assume_build(self.config.fallback_build);
            }
        }

        // 3. PAR assignment, sort and deduplication
        let report = self.deduplicate(&mut sample)?;

        info!(
            "Sample ready: {} SNPs on {} ({}), {} duplicates removed, sex '{}'",
            sample.count(),
            sample.assembly_name(),
            sample.chromosomes_summary(),
            report.rsid.removed,
            sample.sex().as_str()
        );

        Ok(sample)
    }

    pub fn deduplicate(&self, sample: &mut Sample) -> Result<DedupReport> {
        sample.deduplicate(&self.config.dedup, self.providers.par.as_ref(), &self.config.sex)
    }

    pub fn remap(&self, sample: &mut Sample, target: Build) -> Result<RemapStats> {
        sample.remap_with(target, self.providers.mappings.as_ref(), self.config.parallel)
    }

    pub fn classify_chip(&self, sample: &mut Sample) -> Result<Option<ChipAssignment>> {
        sample.classify_chip(
            self.providers.clusters.as_ref(),
            self.providers.mappings.as_ref(),
            self.config.chip_overlap_threshold,
        )
    }

    pub fn determine_sex(&self, sample: &mut Sample, chrom: &str) -> Result<Sex> {
        sample.determine_sex(chrom, self.providers.par.as_ref(), &self.config.sex)
    }

    pub fn filter_low_quality(&self, sample: &Sample) -> Result<GenotypeTable> {
        sample.filter_low_quality(
            self.providers.low_quality.as_ref(),
            self.providers.mappings.as_ref(),
        )
    }

    pub fn merge(&self, sample: &mut Sample, other: Sample) -> Result<MergeStats> {
        sample.merge(other, self.providers.mappings.as_ref())
    }
}
