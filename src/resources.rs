// ==============================================================================
// resources.rs - Reference Resource Providers
// ==============================================================================
// Description: Collaborator interfaces for assembly mappings, chip clusters,
//              low-quality loci, build anchors and PAR boundaries, plus an
//              in-memory implementation loadable from a JSON resource bundle
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Providers are resolved before the core runs: the algorithms treat them as
// synchronous read-only inputs and never re-fetch mid-computation. Retry and
// download policy belongs to the implementor.
// ==============================================================================

use anyhow::{Context, Result as AnyResult};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ProcessingError, Result};
use crate::models::{AssemblyRegion, Build, ChipCluster, Locus, ParBoundaries, ParRegion};

pub trait AssemblyMappingProvider: Send + Sync {
    /// Ordered, non-overlapping regions for one chromosome
    fn get_regions(&self, chrom: &str, source: Build, target: Build) -> Result<Vec<AssemblyRegion>>;
}

pub trait ChipClusterProvider: Send + Sync {
    fn get_clusters(&self) -> Result<Vec<ChipCluster>>;
}

pub trait LowQualityProvider: Send + Sync {
    /// Low-quality loci on GRCh37
    fn get_loci(&self) -> Result<HashSet<Locus>>;
}

pub trait AnchorPositionProvider: Send + Sync {
    fn get_anchors(&self, build: Build) -> Result<HashSet<Locus>>;
}

pub trait ParBoundaryProvider: Send + Sync {
    fn get_boundaries(&self, build: Build) -> Result<ParBoundaries>;
}

/// Anchor SNPs whose coordinates differ between builds:
/// (rsid, chromosome, NCBI36, GRCh37, GRCh38)
const ANCHOR_SNPS: [(&str, &str, u32, u32, u32); 7] = [
    ("rs3094315", "1", 742429, 752566, 817186),
    ("rs11928389", "3", 50908372, 50927009, 50889578),
    ("rs2500347", "1", 143649677, 144938320, 148946169),
    ("rs964481", "20", 27566744, 27656823, 27638706),
    ("rs2341354", "1", 908436, 918573, 983193),
    ("rs3850290", "15", 22315141, 23245301, 22776092),
    ("rs1329546", "X", 135302086, 135474420, 135587999),
];

/// Built-in anchor positions for a build
pub fn default_anchors(build: Build) -> HashSet<Locus> {
    ANCHOR_SNPS
        .iter()
        .map(|(_, chrom, b36, b37, b38)| {
            let pos = match build {
                Build::Ncbi36 => *b36,
                Build::Grch37 => *b37,
                Build::Grch38 => *b38,
            };
            Locus::new(*chrom, pos)
        })
        .collect()
}

/// Built-in PAR1/PAR2 boundaries for a build
pub fn default_par_boundaries(build: Build) -> ParBoundaries {
    let regions = match build {
        Build::Ncbi36 => vec![
            ParRegion { x_start: 1, x_end: 2_709_520, y_start: 1, y_end: 2_709_520 },
            ParRegion {
                x_start: 154_584_238,
                x_end: 154_913_754,
                y_start: 57_443_438,
                y_end: 57_772_954,
            },
        ],
        Build::Grch37 => vec![
            ParRegion { x_start: 60_001, x_end: 2_699_520, y_start: 10_001, y_end: 2_649_520 },
            ParRegion {
                x_start: 154_931_044,
                x_end: 155_260_560,
                y_start: 59_034_050,
                y_end: 59_363_566,
            },
        ],
        Build::Grch38 => vec![
            ParRegion { x_start: 10_001, x_end: 2_781_479, y_start: 10_001, y_end: 2_781_479 },
            ParRegion {
                x_start: 155_701_383,
                x_end: 156_030_895,
                y_start: 56_887_903,
                y_end: 57_217_415,
            },
        ],
    };
    ParBoundaries { regions }
}

/// Assembly mapping data for one chromosome and build pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeMapping {
    pub chrom: String,
    pub source_build: Build,
    pub target_build: Build,
    pub regions: Vec<AssemblyRegion>,
}

/// On-disk resource bundle (JSON, optionally gzip compressed)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceBundle {
    #[serde(default)]
    pub mappings: Vec<ChromosomeMapping>,
    #[serde(default)]
    pub clusters: Vec<ChipCluster>,
    #[serde(default)]
    pub low_quality: Vec<Locus>,
    /// Overrides for the built-in anchor tables, keyed by build number
    #[serde(default)]
    pub anchors: HashMap<Build, Vec<Locus>>,
    /// Overrides for the built-in PAR boundaries, keyed by build number
    #[serde(default)]
    pub par: HashMap<Build, Vec<ParRegion>>,
}

/// In-memory reference resources implementing every provider trait
///
/// Mappings are served in both directions: a bundle holding GRCh37→GRCh38
/// data also answers GRCh38→GRCh37 requests with inverted regions. A build
/// pair with no data at all is ResourceUnavailable; a chromosome missing from
/// a known pair has no regions (its records come back unmapped).
#[derive(Debug, Clone, Default)]
pub struct ReferenceResources {
    mappings: HashMap<(Build, Build), HashMap<String, Vec<AssemblyRegion>>>,
    clusters: Option<Vec<ChipCluster>>,
    low_quality: Option<HashSet<Locus>>,
    anchors: HashMap<Build, HashSet<Locus>>,
    par: HashMap<Build, ParBoundaries>,
}

impl ReferenceResources {
    /// Built-in anchors and PAR boundaries, no mappings/clusters/low-quality loci
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a resource bundle (`.json` or `.json.gz`)
    pub fn open<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open resource bundle {:?}", path))?;

        let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let bundle: ResourceBundle = serde_json::from_reader(BufReader::new(reader))
            .with_context(|| format!("Failed to parse resource bundle {:?}", path))?;

        let resources = Self::from_bundle(bundle);
        for (build, boundaries) in &resources.par {
            boundaries
                .check(*build)
                .with_context(|| format!("Invalid PAR boundaries in {:?}", path))?;
        }
        info!(
            "Loaded resource bundle {:?}: {} mapping pairs, {} clusters, {} low-quality loci",
            path,
            resources.mappings.len(),
            resources.clusters.as_ref().map_or(0, Vec::len),
            resources.low_quality.as_ref().map_or(0, HashSet::len)
        );

        Ok(resources)
    }

    pub fn from_bundle(bundle: ResourceBundle) -> Self {
        let mut resources = Self::new();

        for mapping in bundle.mappings {
            resources.add_mapping(
                &mapping.chrom,
                mapping.source_build,
                mapping.target_build,
                mapping.regions,
            );
        }
        if !bundle.clusters.is_empty() {
            resources.clusters = Some(bundle.clusters);
        }
        if !bundle.low_quality.is_empty() {
            resources.low_quality = Some(bundle.low_quality.into_iter().collect());
        }
        for (build, loci) in bundle.anchors {
            resources.anchors.insert(build, loci.into_iter().collect());
        }
        for (build, regions) in bundle.par {
            resources.par.insert(build, ParBoundaries { regions });
        }

        resources
    }

    pub fn add_mapping(
        &mut self,
        chrom: &str,
        source: Build,
        target: Build,
        mut regions: Vec<AssemblyRegion>,
    ) -> &mut Self {
        regions.sort_by_key(|r| r.source_start);
        self.mappings
            .entry((source, target))
            .or_default()
            .insert(chrom.to_string(), regions);
        self
    }

    pub fn with_clusters(mut self, clusters: Vec<ChipCluster>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    pub fn with_low_quality(mut self, loci: HashSet<Locus>) -> Self {
        self.low_quality = Some(loci);
        self
    }

    pub fn with_anchors(mut self, build: Build, anchors: HashSet<Locus>) -> Self {
        self.anchors.insert(build, anchors);
        self
    }

    /// Boundaries are checked when served; malformed ones are ResourceUnavailable
    pub fn with_par_boundaries(mut self, build: Build, boundaries: ParBoundaries) -> Self {
        self.par.insert(build, boundaries);
        self
    }

    fn inverted_regions(&self, chrom: &str, source: Build, target: Build) -> Option<Vec<AssemblyRegion>> {
        let by_chrom = self.mappings.get(&(target, source))?;
        let mut regions: Vec<AssemblyRegion> = by_chrom
            .get(chrom)
            .map(|regions| regions.iter().map(AssemblyRegion::inverted).collect())
            .unwrap_or_default();
        regions.sort_by_key(|r| r.source_start);
        Some(regions)
    }
}

impl AssemblyMappingProvider for ReferenceResources {
    fn get_regions(&self, chrom: &str, source: Build, target: Build) -> Result<Vec<AssemblyRegion>> {
        if let Some(by_chrom) = self.mappings.get(&(source, target)) {
            return Ok(by_chrom.get(chrom).cloned().unwrap_or_default());
        }

        if let Some(regions) = self.inverted_regions(chrom, source, target) {
            debug!(
                "Serving {} -> {} regions for chr{} from inverted mapping",
                source, target, chrom
            );
            return Ok(regions);
        }

        Err(ProcessingError::resource_unavailable(
            format!("assembly mapping chr{}", chrom),
            format!("no mapping data for {} -> {}", source, target),
        ))
    }
}

impl ChipClusterProvider for ReferenceResources {
    fn get_clusters(&self) -> Result<Vec<ChipCluster>> {
        self.clusters
            .clone()
            .ok_or_else(|| ProcessingError::resource_unavailable("chip clusters", "not loaded"))
    }
}

impl LowQualityProvider for ReferenceResources {
    fn get_loci(&self) -> Result<HashSet<Locus>> {
        self.low_quality
            .clone()
            .ok_or_else(|| ProcessingError::resource_unavailable("low-quality loci", "not loaded"))
    }
}

impl AnchorPositionProvider for ReferenceResources {
    fn get_anchors(&self, build: Build) -> Result<HashSet<Locus>> {
        Ok(self
            .anchors
            .get(&build)
            .cloned()
            .unwrap_or_else(|| default_anchors(build)))
    }
}

impl ParBoundaryProvider for ReferenceResources {
    fn get_boundaries(&self, build: Build) -> Result<ParBoundaries> {
        let boundaries = self
            .par
            .get(&build)
            .cloned()
            .unwrap_or_else(|| default_par_boundaries(build));
        boundaries.check(build)?;
        Ok(boundaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_detector::detect_build;
    use crate::genotype::Genotype;
    use crate::models::SnpRecord;
    use crate::table::GenotypeTable;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_anchor_tables() {
        for build in Build::ALL {
            assert_eq!(default_anchors(build).len(), 7);
        }
        assert!(default_anchors(Build::Grch37).contains(&Locus::new("1", 752566)));
        assert!(default_anchors(Build::Grch38).contains(&Locus::new("X", 135587999)));
        // No anchor is shared between builds
        let b37 = default_anchors(Build::Grch37);
        assert!(default_anchors(Build::Grch38).is_disjoint(&b37));
        assert!(default_anchors(Build::Ncbi36).is_disjoint(&b37));
    }

    #[test]
    fn test_default_par_regions_have_equal_lengths() {
        for build in Build::ALL {
            for region in default_par_boundaries(build).regions {
                assert_eq!(region.x_end - region.x_start, region.y_end - region.y_start);
            }
        }
    }

    #[test]
    fn test_missing_build_pair_is_unavailable() {
        let resources = ReferenceResources::new();
        let err = resources
            .get_regions("1", Build::Grch37, Build::Grch38)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::ResourceUnavailable { .. }));

        assert!(resources.get_clusters().is_err());
        assert!(resources.get_loci().is_err());
    }

    #[test]
    fn test_inverse_mapping_is_served() {
        let mut resources = ReferenceResources::new();
        resources.add_mapping(
            "1",
            Build::Grch37,
            Build::Grch38,
            vec![AssemblyRegion::forward(1000, 1999, 5000), AssemblyRegion::forward(1, 99, 101)],
        );

        let forward = resources.get_regions("1", Build::Grch37, Build::Grch38).unwrap();
        assert_eq!(forward[0].source_start, 1);

        let inverse = resources.get_regions("1", Build::Grch38, Build::Grch37).unwrap();
        assert_eq!(inverse.len(), 2);
        assert_eq!(inverse[0].source_start, 101);
        assert_eq!(inverse[1].map_position(5000), 1000);

        // Known pair, unknown chromosome: empty, not an error
        assert!(resources.get_regions("2", Build::Grch37, Build::Grch38).unwrap().is_empty());
    }

    #[test]
    fn test_open_gzipped_bundle() {
        let bundle = serde_json::json!({
            "mappings": [{
                "chrom": "1",
                "source_build": 36,
                "target_build": 37,
                "regions": [{
                    "source_start": 1, "source_end": 100,
                    "target_start": 11, "target_end": 110,
                    "orientation": "forward"
                }]
            }],
            "clusters": [{
                "cluster_id": "c1",
                "company_composition": "23andMe-v5",
                "chip_base_deduced": "HTS iSelect HD",
                "loci": [{"chrom": "1", "pos": 752566}]
            }],
            "low_quality": [{"chrom": "1", "pos": 42}],
            "anchors": {"38": [{"chrom": "2", "pos": 12345}]},
            "par": {"37": [{"x_start": 1, "x_end": 10, "y_start": 1, "y_end": 10}]}
        });

        let file: NamedTempFile = tempfile::Builder::new()
            .suffix(".json.gz")
            .tempfile()
            .unwrap();
        let mut encoder = GzEncoder::new(file.reopen().unwrap(), Compression::default());
        encoder.write_all(bundle.to_string().as_bytes()).unwrap();
        encoder.finish().unwrap();

        let resources = ReferenceResources::open(file.path()).unwrap();
        assert_eq!(resources.get_clusters().unwrap().len(), 1);
        assert!(resources.get_loci().unwrap().contains(&Locus::new("1", 42)));
        assert_eq!(
            resources.get_regions("1", Build::Ncbi36, Build::Grch37).unwrap()[0].target_start,
            11
        );
        assert_eq!(resources.get_boundaries(Build::Grch37).unwrap().regions.len(), 1);
        assert_eq!(resources.get_boundaries(Build::Grch38).unwrap().regions.len(), 2);

        // Anchor override replaces the built-in GRCh38 table only
        let anchors = resources.get_anchors(Build::Grch38).unwrap();
        assert_eq!(anchors.len(), 1);
        assert!(anchors.contains(&Locus::new("2", 12345)));
        assert_eq!(resources.get_anchors(Build::Grch37).unwrap(), default_anchors(Build::Grch37));

        let table = GenotypeTable::from_records(vec![SnpRecord::new(
            "rs100",
            "2",
            12345,
            Genotype::parse("AA").unwrap(),
        )]);
        assert_eq!(detect_build(&table, &resources).unwrap().build, Some(Build::Grch38));
    }

    #[test]
    fn test_open_rejects_unequal_par_boundaries() {
        let bundle = serde_json::json!({
            "par": {"38": [{"x_start": 1, "x_end": 100, "y_start": 1, "y_end": 10}]}
        });
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bundle.to_string().as_bytes()).unwrap();
        file.flush().unwrap();

        let err = ReferenceResources::open(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessingError>(),
            Some(ProcessingError::ResourceUnavailable { .. })
        ));
    }
}
