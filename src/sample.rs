// ==============================================================================
// sample.rs - Sample Aggregate
// ==============================================================================
// Description: Owns a genotype table with its build, sex, chip assignment
//              and discrepancy sets; every processing stage runs through it
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::build_detector::{detect_build_with, BuildDetection};
use crate::chip::classify_chip;
use crate::config::SexThresholds;
use crate::dedup::{
    assign_par, deduplicate_mt, deduplicate_rsids, deduplicate_xy, DedupOptions, DedupReport,
    Discrepancies,
};
use crate::error::{ProcessingError, Result};
use crate::genotype::Genotype;
use crate::merge::{merge_tables, MergeStats};
use crate::models::{normalize_chromosome, Build, ChipAssignment, RawRecord, Sex, SnpRecord};
use crate::quality::filter_low_quality;
use crate::remapper::{remap_table_with, RemapStats};
use crate::resources::{
    AnchorPositionProvider, AssemblyMappingProvider, ChipClusterProvider, LowQualityProvider,
    ParBoundaryProvider,
};
use crate::sex::determine_sex;
use crate::table::GenotypeTable;

/// Sizes of the discrepancy sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscrepancyCounts {
    pub duplicate: usize,
    pub discrepant_xy: usize,
    pub heterozygous_mt: usize,
    pub discrepant_vcf_position: usize,
    pub discrepant_merge_positions: usize,
    pub discrepant_merge_genotypes: usize,
}

impl From<&Discrepancies> for DiscrepancyCounts {
    fn from(d: &Discrepancies) -> Self {
        Self {
            duplicate: d.duplicate.len(),
            discrepant_xy: d.discrepant_xy.len(),
            heterozygous_mt: d.heterozygous_mt.len(),
            discrepant_vcf_position: d.discrepant_vcf_position.len(),
            discrepant_merge_positions: d.discrepant_merge_positions.len(),
            discrepant_merge_genotypes: d.discrepant_merge_genotypes.len(),
        }
    }
}

/// Serializable overview of a processed sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    pub source: String,
    pub assembly: String,
    /// 36, 37 or 38; 0 when unknown
    pub build: u8,
    pub build_detected: bool,
    pub phased: bool,
    pub count: usize,
    pub chromosomes: String,
    pub sex: String,
    pub cluster_id: String,
    pub chip: String,
    pub chip_version: String,
    pub discrepancies: DiscrepancyCounts,
    pub malformed_records: usize,
}

/// One individual's genotype data and processing state
#[derive(Debug, Clone)]
pub struct Sample {
    sources: Vec<String>,
    table: GenotypeTable,
    phased: bool,
    build: Option<Build>,
    build_detected: bool,
    discrepancies: Discrepancies,
    malformed_records: usize,
    chip: Option<ChipAssignment>,
    sex: Sex,
}

impl Sample {
    /// Build a sample from parsed input rows
    ///
    /// Malformed rows are skipped and counted. Multi-base VCF sites go to
    /// `discrepant_vcf_position`. A declared build is trusted as detected.
    pub fn from_records<I>(source: &str, records: I, declared_build: Option<Build>) -> Self
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut snps = Vec::new();
        let mut discrepancies = Discrepancies::default();
        let mut malformed = 0usize;
        let mut separated = 0usize;
        let mut phased_tokens = 0usize;

        for raw in records {
            let Some(snp) = normalize_record(&raw, &mut separated, &mut phased_tokens) else {
                malformed += 1;
                continue;
            };

            if raw.ref_allele.as_deref().is_some_and(|r| r.trim().len() > 1) {
                debug!("{} is not a single-base site; set aside", snp.rsid);
                discrepancies.discrepant_vcf_position.push(snp);
                continue;
            }

            snps.push(snp);
        }

        if malformed > 0 {
            warn!("{}: skipped {} malformed records", source, malformed);
        }

        let table = GenotypeTable::from_records(snps);
        info!(
            "{}: loaded {} SNPs on {} chromosomes",
            source,
            table.len(),
            table.chromosomes().len()
        );

        let sources = if source.trim().is_empty() {
            Vec::new()
        } else {
            vec![source.trim().to_string()]
        };

        Self {
            sources,
            table,
            phased: separated > 0 && phased_tokens == separated,
            build: declared_build,
            build_detected: declared_build.is_some(),
            discrepancies,
            malformed_records: malformed,
            chip: None,
            sex: Sex::Unknown,
        }
    }

    // ------------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------------

    /// Detect the build from anchor positions
    ///
    /// A detected build replaces the stored one. When nothing matches the
    /// stored build is left alone; see [`Sample::assume_build`].
    pub fn detect_build(&mut self, anchors: &dyn AnchorPositionProvider) -> Result<BuildDetection> {
        self.detect_build_with(anchors, true)
    }

    pub(crate) fn detect_build_with(
        &mut self,
        anchors: &dyn AnchorPositionProvider,
        parallel: bool,
    ) -> Result<BuildDetection> {
        let detection = detect_build_with(&self.table, anchors, parallel)?;
        if let Some(build) = detection.build {
            self.build = Some(build);
            self.build_detected = true;
        }
        Ok(detection)
    }

    /// Record a fallback build that was not detected
    pub fn assume_build(&mut self, build: Build) {
        info!("Assuming build {} (not detected)", build);
        self.build = Some(build);
        self.build_detected = false;
    }

    fn known_build(&self) -> Result<Build> {
        self.build
            .ok_or_else(|| ProcessingError::InvalidBuild("0 (unknown)".to_string()))
    }

    /// Remap the live table onto `target`
    ///
    /// On error the table is left unmodified.
    pub fn remap(&mut self, target: Build, provider: &dyn AssemblyMappingProvider) -> Result<RemapStats> {
        self.remap_with(target, provider, true)
    }

    pub(crate) fn remap_with(
        &mut self,
        target: Build,
        provider: &dyn AssemblyMappingProvider,
        parallel: bool,
    ) -> Result<RemapStats> {
        let source = self.known_build()?;
        let (table, stats) = remap_table_with(&self.table, source, target, provider, parallel)?;
        self.table = table;
        self.build = Some(target);
        Ok(stats)
    }

    // ------------------------------------------------------------------------
    // Deduplication
    // ------------------------------------------------------------------------

    /// PAR assignment, rsid dedup, then the optional XY and MT stages
    ///
    /// The XY stage treats the sample as male when forced; otherwise it uses
    /// the stored sex, determining it from chromosome X if still unknown.
    /// Unknown sex without force skips the stage.
    pub fn deduplicate(
        &mut self,
        options: &DedupOptions,
        par: &dyn ParBoundaryProvider,
        thresholds: &SexThresholds,
    ) -> Result<DedupReport> {
        let build = self.build.unwrap_or_else(|| {
            debug!("Build unknown; using GRCh37 PAR boundaries");
            Build::Grch37
        });
        let boundaries = par.get_boundaries(build)?;
        boundaries.check(build)?;
        let mut report = DedupReport::default();

        if options.assign_par {
            report.par = assign_par(&mut self.table, &boundaries);
        }
        self.table.sort();

        report.rsid = deduplicate_rsids(&mut self.table, &mut self.discrepancies);

        if options.deduplicate_xy {
            let male = if options.force_male {
                Some(true)
            } else {
                if !self.sex.is_known() {
                    self.sex = determine_sex(&self.table, "X", &boundaries, thresholds)?;
                }
                match self.sex {
                    Sex::Male => Some(true),
                    Sex::Female => Some(false),
                    Sex::Unknown => None,
                }
            };

            match male {
                Some(male) => {
                    report.xy = Some(deduplicate_xy(
                        &mut self.table,
                        male,
                        &boundaries,
                        &mut self.discrepancies,
                    ));
                }
                None => info!("Sex unknown; XY deduplication skipped"),
            }
        }

        if options.deduplicate_mt {
            report.mt = Some(deduplicate_mt(&mut self.table, &mut self.discrepancies));
        }

        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------------

    /// Classify the genotyping chip and store the result
    pub fn classify_chip(
        &mut self,
        clusters: &dyn ChipClusterProvider,
        mapping: &dyn AssemblyMappingProvider,
        threshold: f64,
    ) -> Result<Option<ChipAssignment>> {
        let build = self.known_build()?;
        let assignment = classify_chip(&self.table, build, &self.sources, clusters, mapping, threshold)?;
        self.chip = assignment.clone();
        Ok(assignment)
    }

    /// Determine sex from chromosome X or Y and store the result
    pub fn determine_sex(
        &mut self,
        chrom: &str,
        par: &dyn ParBoundaryProvider,
        thresholds: &SexThresholds,
    ) -> Result<Sex> {
        let build = self.build.unwrap_or(Build::Grch37);
        let boundaries = par.get_boundaries(build)?;
        boundaries.check(build)?;
        let sex = determine_sex(&self.table, chrom, &boundaries, thresholds)?;
        self.sex = sex;
        Ok(sex)
    }

    /// Table without low-quality loci; the sample is not modified
    pub fn filter_low_quality(
        &self,
        low_quality: &dyn LowQualityProvider,
        mapping: &dyn AssemblyMappingProvider,
    ) -> Result<GenotypeTable> {
        filter_low_quality(&self.table, self.known_build()?, low_quality, mapping)
    }

    // ------------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------------

    /// Merge another sample into this one
    ///
    /// The other sample is remapped to this build first when they differ;
    /// a remap failure leaves this sample untouched. The chip assignment is
    /// cleared since the table it was computed on no longer exists.
    pub fn merge(&mut self, other: Sample, provider: &dyn AssemblyMappingProvider) -> Result<MergeStats> {
        let Sample {
            sources,
            table: mut other_table,
            build: other_build,
            discrepancies,
            malformed_records,
            sex,
            ..
        } = other;

        let mut remap = None;
        match (self.build, other_build) {
            (Some(live), Some(incoming)) if live != incoming => {
                let (remapped, stats) = remap_table_with(&other_table, incoming, live, provider, true)?;
                other_table = remapped;
                remap = Some(stats);
            }
            (None, Some(incoming)) => self.build = Some(incoming),
            _ => {}
        }

        let mut stats = merge_tables(&mut self.table, &other_table, &mut self.discrepancies);
        stats.remap = remap;

        extend_discrepancies(&mut self.discrepancies, discrepancies);
        self.malformed_records += malformed_records;
        for source in sources {
            if !self.sources.contains(&source) {
                self.sources.push(source);
            }
        }
        if !self.sex.is_known() {
            self.sex = sex;
        }
        self.chip = None;

        Ok(stats)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Source labels joined with ", "
    pub fn source(&self) -> String {
        self.sources.join(", ")
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn table(&self) -> &GenotypeTable {
        &self.table
    }

    pub fn phased(&self) -> bool {
        self.phased
    }

    pub fn build(&self) -> Option<Build> {
        self.build
    }

    /// Numeric build, 0 when unknown
    pub fn build_number(&self) -> u8 {
        self.build.map_or(0, |b| b.number())
    }

    pub fn build_detected(&self) -> bool {
        self.build_detected
    }

    pub fn assembly_name(&self) -> &'static str {
        self.build.map_or("", |b| b.assembly_name())
    }

    pub fn count(&self) -> usize {
        self.table.len()
    }

    pub fn chromosomes_summary(&self) -> String {
        self.table.chromosomes_summary()
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn chip(&self) -> Option<&ChipAssignment> {
        self.chip.as_ref()
    }

    pub fn malformed_records(&self) -> usize {
        self.malformed_records
    }

    pub fn discrepancies(&self) -> &Discrepancies {
        &self.discrepancies
    }

    pub fn duplicate(&self) -> &[SnpRecord] {
        &self.discrepancies.duplicate
    }

    pub fn discrepant_xy(&self) -> &[SnpRecord] {
        &self.discrepancies.discrepant_xy
    }

    pub fn heterozygous_mt(&self) -> &[SnpRecord] {
        &self.discrepancies.heterozygous_mt
    }

    pub fn discrepant_vcf_position(&self) -> &[SnpRecord] {
        &self.discrepancies.discrepant_vcf_position
    }

    pub fn discrepant_merge_positions(&self) -> &[SnpRecord] {
        &self.discrepancies.discrepant_merge_positions
    }

    pub fn discrepant_merge_genotypes(&self) -> &[SnpRecord] {
        &self.discrepancies.discrepant_merge_genotypes
    }

    pub fn summary(&self) -> SampleSummary {
        let chip = self.chip.clone().unwrap_or_default();
        SampleSummary {
            source: self.source(),
            assembly: self.assembly_name().to_string(),
            build: self.build_number(),
            build_detected: self.build_detected,
            phased: self.phased,
            count: self.count(),
            chromosomes: self.chromosomes_summary(),
            sex: self.sex.as_str().to_string(),
            cluster_id: chip.cluster_id,
            chip: chip.chip,
            chip_version: chip.chip_version,
            discrepancies: DiscrepancyCounts::from(&self.discrepancies),
            malformed_records: self.malformed_records,
        }
    }
}

/// Validate and normalize one input row; None when malformed
fn normalize_record(raw: &RawRecord, separated: &mut usize, phased: &mut usize) -> Option<SnpRecord> {
    let rsid = raw.rsid.trim();
    if rsid.is_empty() {
        debug!("Record without rsid at {}:{}", raw.chrom, raw.pos);
        return None;
    }

    let pos = match u32::try_from(raw.pos) {
        Ok(pos) if pos > 0 => pos,
        _ => {
            debug!("{}: position {} out of range", rsid, raw.pos);
            return None;
        }
    };

    let chrom = normalize_chromosome(&raw.chrom);
    if chrom.is_empty() {
        debug!("{}: empty chromosome", rsid);
        return None;
    }

    // VCF-style "A/G" and "A|G" tokens
    let token = raw.genotype.trim();
    let token = if token.len() > 1 && token.contains(['/', '|']) {
        *separated += 1;
        if token.contains('|') {
            *phased += 1;
        }
        token.replace(['/', '|'], "")
    } else {
        token.to_string()
    };

    match Genotype::parse(&token) {
        Ok(genotype) => Some(SnpRecord::new(rsid, chrom, pos, genotype)),
        Err(e) => {
            debug!("{}: {}", rsid, e);
            None
        }
    }
}

fn extend_discrepancies(into: &mut Discrepancies, from: Discrepancies) {
    into.duplicate.extend(from.duplicate);
    into.discrepant_xy.extend(from.discrepant_xy);
    into.heterozygous_mt.extend(from.heterozygous_mt);
    into.discrepant_vcf_position.extend(from.discrepant_vcf_position);
    into.discrepant_merge_positions.extend(from.discrepant_merge_positions);
    into.discrepant_merge_genotypes.extend(from.discrepant_merge_genotypes);
}
