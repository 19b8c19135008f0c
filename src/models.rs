// ==============================================================================
// models.rs - Genotype Data Models
// ==============================================================================
// Description: SNP records, genome builds, loci and reference resource types
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::genotype::Genotype;

/// Reference genome assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Build {
    /// NCBI Build 36 (hg18)
    Ncbi36,
    /// GRCh37 (hg19)
    Grch37,
    /// GRCh38 (hg38)
    Grch38,
}

impl Build {
    pub const ALL: [Build; 3] = [Build::Ncbi36, Build::Grch37, Build::Grch38];

    pub fn number(&self) -> u8 {
        match self {
            Build::Ncbi36 => 36,
            Build::Grch37 => 37,
            Build::Grch38 => 38,
        }
    }

    pub fn assembly_name(&self) -> &'static str {
        match self {
            Build::Ncbi36 => "NCBI36",
            Build::Grch37 => "GRCh37",
            Build::Grch38 => "GRCh38",
        }
    }

    /// Preference when anchor match counts tie (GRCh37 is the de-facto default)
    pub fn tie_break_priority(&self) -> u8 {
        match self {
            Build::Grch37 => 2,
            Build::Grch38 => 1,
            Build::Ncbi36 => 0,
        }
    }
}

impl TryFrom<u8> for Build {
    type Error = ProcessingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            36 => Ok(Build::Ncbi36),
            37 => Ok(Build::Grch37),
            38 => Ok(Build::Grch38),
            other => Err(ProcessingError::InvalidBuild(other.to_string())),
        }
    }
}

impl From<Build> for u8 {
    fn from(build: Build) -> u8 {
        build.number()
    }
}

impl FromStr for Build {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "36" | "ncbi36" | "hg18" => Ok(Build::Ncbi36),
            "37" | "grch37" | "hg19" => Ok(Build::Grch37),
            "38" | "grch38" | "hg38" => Ok(Build::Grch38),
            _ => Err(ProcessingError::InvalidBuild(s.to_string())),
        }
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.assembly_name())
    }
}

/// Chromosomal coordinate (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locus {
    pub chrom: String,
    pub pos: u32,
}

impl Locus {
    pub fn new(chrom: impl Into<String>, pos: u32) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
        }
    }
}

/// Single SNP call in the genotype table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnpRecord {
    /// SNP identifier (e.g., "rs548049170"); may be comma-joined before dedup
    pub rsid: String,
    /// Chromosome ("1"-"22", "X", "Y", "MT", or another contig)
    pub chrom: String,
    /// Base pair position (1-based)
    pub pos: u32,
    /// Called genotype, None for a no-call
    pub genotype: Option<Genotype>,
}

impl SnpRecord {
    pub fn new(
        rsid: impl Into<String>,
        chrom: impl Into<String>,
        pos: u32,
        genotype: Option<Genotype>,
    ) -> Self {
        Self {
            rsid: rsid.into(),
            chrom: chrom.into(),
            pos,
            genotype,
        }
    }

    pub fn locus(&self) -> Locus {
        Locus::new(self.chrom.clone(), self.pos)
    }

    pub fn is_heterozygous(&self) -> bool {
        crate::genotype::is_heterozygous(self.genotype.as_ref())
    }

    pub fn is_called(&self) -> bool {
        self.genotype.is_some()
    }

    /// Total ordering: chromosome rank, position, rsid, genotype
    pub(crate) fn sort_key(&self) -> (ChromRank<'_>, u32, &str, Option<&str>) {
        (
            chromosome_rank(&self.chrom),
            self.pos,
            self.rsid.as_str(),
            self.genotype.as_ref().map(Genotype::as_str),
        )
    }
}

/// Input row handed over by the file-parsing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub rsid: String,
    pub chrom: String,
    pub pos: u64,
    /// Genotype token as written in the source file (e.g., "AG", "--")
    pub genotype: String,
    /// Reference allele, present for VCF-derived input
    #[serde(default)]
    pub ref_allele: Option<String>,
}

impl RawRecord {
    pub fn new(rsid: &str, chrom: &str, pos: u64, genotype: &str) -> Self {
        Self {
            rsid: rsid.to_string(),
            chrom: chrom.to_string(),
            pos,
            genotype: genotype.to_string(),
            ref_allele: None,
        }
    }
}

/// Chromosome ordering key: 1..22, X, Y, MT, then other contigs lexically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChromRank<'a>(u8, &'a str);

pub fn chromosome_rank(chrom: &str) -> ChromRank<'_> {
    match chrom {
        "X" => ChromRank(23, ""),
        "Y" => ChromRank(24, ""),
        "MT" => ChromRank(25, ""),
        other => match other.parse::<u8>() {
            Ok(n) if (1..=22).contains(&n) && !other.starts_with('0') => ChromRank(n, ""),
            _ => ChromRank(26, other),
        },
    }
}

/// Strip a "chr" prefix and map "M" to "MT"
pub fn normalize_chromosome(chrom: &str) -> String {
    let trimmed = chrom.trim();
    let has_prefix = trimmed.len() > 3
        && trimmed
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("chr"));
    let stripped = if has_prefix {
        &trimmed[3..]
    } else {
        trimmed
    };

    let upper = stripped.to_ascii_uppercase();
    match upper.as_str() {
        "M" => "MT".to_string(),
        _ => upper,
    }
}

/// First rsid of a comma-joined multi-rsid key ("rs1,rs2" → "rs1")
pub fn canonical_rsid(rsid: &str) -> &str {
    rsid.split(',').map(str::trim).next().unwrap_or(rsid)
}

/// Biological sex inferred from X/Y calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Unknown => "",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Sex::Unknown)
    }
}

/// Orientation of a target region relative to its source region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Forward,
    Reverse,
}

/// Aligned block between two assemblies (inclusive, 1-based coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRegion {
    pub source_start: u32,
    pub source_end: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub orientation: Orientation,
}

impl AssemblyRegion {
    pub fn forward(source_start: u32, source_end: u32, target_start: u32) -> Self {
        Self {
            source_start,
            source_end,
            target_start,
            target_end: target_start + (source_end - source_start),
            orientation: Orientation::Forward,
        }
    }

    pub fn reverse(source_start: u32, source_end: u32, target_start: u32) -> Self {
        Self {
            orientation: Orientation::Reverse,
            ..Self::forward(source_start, source_end, target_start)
        }
    }

    pub fn contains(&self, pos: u32) -> bool {
        self.source_start <= pos && pos <= self.source_end
    }

    /// Map a contained source position onto the target assembly
    pub fn map_position(&self, pos: u32) -> u32 {
        let offset = pos - self.source_start;
        match self.orientation {
            Orientation::Forward => self.target_start + offset,
            Orientation::Reverse => self.target_end - offset,
        }
    }

    /// Same block seen from the target assembly
    pub fn inverted(&self) -> Self {
        Self {
            source_start: self.target_start,
            source_end: self.target_end,
            target_start: self.source_start,
            target_end: self.source_end,
            orientation: self.orientation,
        }
    }
}

/// Genotyping platform cluster (loci are GRCh37)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipCluster {
    pub cluster_id: String,
    /// Companies/versions observed in the cluster (e.g., "23andMe-v5, LivingDNA")
    pub company_composition: String,
    pub chip_base_deduced: String,
    pub loci: Vec<Locus>,
}

/// Chip classification stored on a sample
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChipAssignment {
    pub cluster_id: String,
    pub chip: String,
    pub chip_version: String,
}

/// One pseudoautosomal region with its X and Y extents (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParRegion {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

impl ParRegion {
    pub fn contains(&self, chrom: &str, pos: u32) -> bool {
        match chrom {
            "X" => self.x_start <= pos && pos <= self.x_end,
            "Y" => self.y_start <= pos && pos <= self.y_end,
            _ => false,
        }
    }

    /// Equivalent coordinate on the other sex chromosome
    ///
    /// None when the offset would land outside the target extent.
    pub fn mirror(&self, chrom: &str, pos: u32) -> Option<Locus> {
        if !self.contains(chrom, pos) {
            return None;
        }
        let (target, start, end, offset) = match chrom {
            "X" => ("Y", self.y_start, self.y_end, pos - self.x_start),
            "Y" => ("X", self.x_start, self.x_end, pos - self.y_start),
            _ => return None,
        };
        start
            .checked_add(offset)
            .filter(|mirrored| *mirrored <= end)
            .map(|mirrored| Locus::new(target, mirrored))
    }

    /// Ordered extents of equal length on X and Y
    pub fn is_well_formed(&self) -> bool {
        self.x_start <= self.x_end
            && self.y_start <= self.y_end
            && self.x_end - self.x_start == self.y_end - self.y_start
    }
}

/// Pseudoautosomal boundaries for one build
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParBoundaries {
    pub regions: Vec<ParRegion>,
}

impl ParBoundaries {
    pub fn is_par(&self, chrom: &str, pos: u32) -> bool {
        self.regions.iter().any(|r| r.contains(chrom, pos))
    }

    pub fn mirror(&self, chrom: &str, pos: u32) -> Option<Locus> {
        self.regions.iter().find_map(|r| r.mirror(chrom, pos))
    }

    /// Reject regions that cannot be mirrored by a plain offset
    pub fn check(&self, build: Build) -> Result<(), ProcessingError> {
        match self.regions.iter().find(|r| !r.is_well_formed()) {
            Some(region) => Err(ProcessingError::resource_unavailable(
                format!("PAR boundaries {}", build),
                format!(
                    "region X {}-{} / Y {}-{} is not an ordered pair of equal-length extents",
                    region.x_start, region.x_end, region.y_start, region.y_end
                ),
            )),
            None => Ok(()),
        }
    }
}
