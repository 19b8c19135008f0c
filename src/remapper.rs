// ==============================================================================
// remapper.rs - Assembly Coordinate Remapping
// ==============================================================================
// Description: Lifts genotype table positions between reference assemblies
//              using sparse per-chromosome region maps
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   source == target → identity
//   For each chromosome (in parallel):
//     1. Fetch ordered regions from the mapping provider (failure is fatal)
//     2. Binary search the region whose source range contains pos
//     3. forward: target_start + (pos - source_start)
//        reverse: target_end   - (pos - source_start)
//     4. No containing region → record dropped and reported as unmapped
//   Results are merged by chromosome key and the table is re-sorted.
// ==============================================================================

use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{ProcessingError, Result};
use crate::models::{AssemblyRegion, Build, SnpRecord};
use crate::resources::AssemblyMappingProvider;
use crate::table::GenotypeTable;

/// Remapping statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemapStats {
    pub source_build: Build,
    pub target_build: Build,
    pub mapped: usize,
    pub unmapped: usize,
    /// rsids dropped because no region contained their position
    pub unmapped_rsids: Vec<String>,
}

impl RemapStats {
    fn identity(build: Build, count: usize) -> Self {
        Self {
            source_build: build,
            target_build: build,
            mapped: count,
            unmapped: 0,
            unmapped_rsids: Vec::new(),
        }
    }
}

struct ChromosomeRemap {
    mapped: Vec<SnpRecord>,
    unmapped: Vec<String>,
}

/// Remap a table between builds (parallel over chromosomes)
///
/// # Returns
/// * `Ok((table, stats))` - Remapped, sorted table and statistics
/// * `Err(ProcessingError::ResourceUnavailable)` - Mapping data for a
///   chromosome could not be obtained; nothing is returned
pub fn remap_table(
    table: &GenotypeTable,
    source: Build,
    target: Build,
    provider: &dyn AssemblyMappingProvider,
) -> Result<(GenotypeTable, RemapStats)> {
    remap_table_with(table, source, target, provider, true)
}

pub(crate) fn remap_table_with(
    table: &GenotypeTable,
    source: Build,
    target: Build,
    provider: &dyn AssemblyMappingProvider,
    parallel: bool,
) -> Result<(GenotypeTable, RemapStats)> {
    if source == target {
        return Ok((table.clone(), RemapStats::identity(source, table.len())));
    }

    let mut by_chrom: BTreeMap<&str, Vec<&SnpRecord>> = BTreeMap::new();
    for record in table.iter() {
        by_chrom.entry(record.chrom.as_str()).or_default().push(record);
    }

    info!(
        "Remapping {} SNPs on {} chromosomes from {} to {}",
        table.len(),
        by_chrom.len(),
        source,
        target
    );

    let remap_one = |(chrom, records): (&&str, &Vec<&SnpRecord>)| -> Result<ChromosomeRemap> {
        let regions = provider.get_regions(chrom, source, target)?;
        validate_regions(chrom, &regions)?;
        Ok(remap_chromosome(records, &regions))
    };

    let results: Vec<ChromosomeRemap> = if parallel {
        by_chrom.par_iter().map(remap_one).collect::<Result<_>>()?
    } else {
        by_chrom.iter().map(remap_one).collect::<Result<_>>()?
    };

    let mut mapped = Vec::with_capacity(table.len());
    let mut unmapped_rsids = Vec::new();
    for result in results {
        mapped.extend(result.mapped);
        unmapped_rsids.extend(result.unmapped);
    }

    if !unmapped_rsids.is_empty() {
        warn!(
            "{} SNPs could not be remapped from {} to {} and were dropped",
            unmapped_rsids.len(),
            source,
            target
        );
    }

    let stats = RemapStats {
        source_build: source,
        target_build: target,
        mapped: mapped.len(),
        unmapped: unmapped_rsids.len(),
        unmapped_rsids,
    };

    Ok((GenotypeTable::from_records(mapped), stats))
}

/// GRCh37 view of a table, borrowed when it is already on GRCh37
///
/// Reference sets keyed on GRCh37 (chip clusters, low-quality loci) are
/// compared against this view.
pub fn grch37_view<'a>(
    table: &'a GenotypeTable,
    build: Build,
    provider: &dyn AssemblyMappingProvider,
) -> Result<Cow<'a, GenotypeTable>> {
    if build == Build::Grch37 {
        return Ok(Cow::Borrowed(table));
    }
    let (remapped, stats) = remap_table(table, build, Build::Grch37, provider)?;
    debug!(
        "GRCh37 view: {} mapped, {} unmapped from {}",
        stats.mapped, stats.unmapped, build
    );
    Ok(Cow::Owned(remapped))
}

fn remap_chromosome(records: &[&SnpRecord], regions: &[AssemblyRegion]) -> ChromosomeRemap {
    let mut mapped = Vec::with_capacity(records.len());
    let mut unmapped = Vec::new();

    for record in records {
        match find_region(regions, record.pos) {
            Some(region) => {
                let mut lifted = (*record).clone();
                lifted.pos = region.map_position(record.pos);
                mapped.push(lifted);
            }
            None => unmapped.push(record.rsid.clone()),
        }
    }

    if let Some(first) = records.first() {
        debug!(
            "chr{}: {} mapped, {} unmapped",
            first.chrom,
            mapped.len(),
            unmapped.len()
        );
    }

    ChromosomeRemap { mapped, unmapped }
}

/// Region whose source range contains pos (regions sorted by source_start)
pub fn find_region(regions: &[AssemblyRegion], pos: u32) -> Option<&AssemblyRegion> {
    let idx = regions.partition_point(|r| r.source_start <= pos);
    if idx == 0 {
        return None;
    }
    let candidate = &regions[idx - 1];
    candidate.contains(pos).then_some(candidate)
}

/// Regions must be well-formed, sorted by source_start and disjoint
fn validate_regions(chrom: &str, regions: &[AssemblyRegion]) -> Result<()> {
    let malformed = |reason: String| {
        ProcessingError::resource_unavailable(format!("assembly mapping chr{}", chrom), reason)
    };

    for region in regions {
        if region.source_end < region.source_start || region.target_end < region.target_start {
            return Err(malformed(format!("inverted region {:?}", region)));
        }
        if region.source_end - region.source_start != region.target_end - region.target_start {
            return Err(malformed(format!("region lengths differ {:?}", region)));
        }
    }

    for pair in regions.windows(2) {
        if pair[1].source_start <= pair[0].source_end {
            return Err(malformed(format!(
                "regions unsorted or overlapping at source {}",
                pair[1].source_start
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::Genotype;
    use crate::resources::ReferenceResources;

    fn snp(rsid: &str, chrom: &str, pos: u32) -> SnpRecord {
        SnpRecord::new(rsid, chrom, pos, Genotype::parse("AG").unwrap())
    }

    fn resources() -> ReferenceResources {
        let mut resources = ReferenceResources::new();
        resources
            .add_mapping(
                "1",
                Build::Grch37,
                Build::Grch38,
                vec![
                    AssemblyRegion::forward(100, 199, 1100),
                    AssemblyRegion::reverse(300, 399, 5000),
                ],
            )
            .add_mapping("X", Build::Grch37, Build::Grch38, vec![AssemblyRegion::forward(1, 1000, 2001)]);
        resources
    }

    fn table() -> GenotypeTable {
        GenotypeTable::from_records(vec![
            snp("rs1", "1", 150),
            snp("rs2", "1", 300),
            snp("rs3", "1", 250),
            snp("rs4", "X", 10),
            snp("rs5", "MT", 10),
        ])
    }

    #[test]
    fn test_identity_when_builds_match() {
        let table = table();
        for build in Build::ALL {
            let (remapped, stats) =
                remap_table(&table, build, build, &ReferenceResources::new()).unwrap();
            assert_eq!(remapped, table);
            assert_eq!(stats.unmapped, 0);
        }
    }

    #[test]
    fn test_forward_and_reverse_regions() {
        let (remapped, stats) =
            remap_table(&table(), Build::Grch37, Build::Grch38, &resources()).unwrap();

        assert_eq!(remapped.get("rs1").unwrap().pos, 1150);
        // Reverse orientation: target_end - (pos - source_start)
        assert_eq!(remapped.get("rs2").unwrap().pos, 5099);
        assert_eq!(remapped.get("rs4").unwrap().pos, 2010);
        assert!(remapped.is_sorted());

        // rs3 falls in a gap, MT has no regions
        assert_eq!(stats.mapped, 3);
        assert_eq!(stats.unmapped, 2);
        assert!(stats.unmapped_rsids.contains(&"rs3".to_string()));
        assert!(stats.unmapped_rsids.contains(&"rs5".to_string()));
        assert!(remapped.get("rs3").is_none());
    }

    #[test]
    fn test_round_trip() {
        let original = table();
        let resources = resources();
        let (there, _) = remap_table(&original, Build::Grch37, Build::Grch38, &resources).unwrap();
        let (back, _) = remap_table(&there, Build::Grch38, Build::Grch37, &resources).unwrap();

        for record in back.iter() {
            assert_eq!(record.pos, original.get(&record.rsid).unwrap().pos);
        }
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn test_missing_mapping_is_fatal() {
        let err = remap_table(&table(), Build::Grch37, Build::Ncbi36, &resources()).unwrap_err();
        assert!(matches!(err, ProcessingError::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_overlapping_regions_rejected() {
        let mut resources = ReferenceResources::new();
        resources.add_mapping(
            "1",
            Build::Grch37,
            Build::Grch38,
            vec![AssemblyRegion::forward(100, 200, 1), AssemblyRegion::forward(150, 250, 500)],
        );
        let err = remap_table(&table(), Build::Grch37, Build::Grch38, &resources).unwrap_err();
        assert!(matches!(err, ProcessingError::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_find_region_boundaries() {
        let regions = vec![AssemblyRegion::forward(10, 19, 0), AssemblyRegion::forward(30, 39, 0)];
        assert!(find_region(&regions, 9).is_none());
        assert_eq!(find_region(&regions, 10).unwrap().source_start, 10);
        assert_eq!(find_region(&regions, 19).unwrap().source_start, 10);
        assert!(find_region(&regions, 25).is_none());
        assert_eq!(find_region(&regions, 39).unwrap().source_start, 30);
        assert!(find_region(&regions, 40).is_none());
    }

    #[test]
    fn test_grch37_view() {
        let table = table();
        let view = grch37_view(&table, Build::Grch37, &ReferenceResources::new()).unwrap();
        assert!(matches!(view, Cow::Borrowed(_)));

        let (on38, _) = remap_table(&table, Build::Grch37, Build::Grch38, &resources()).unwrap();
        let view = grch37_view(&on38, Build::Grch38, &resources()).unwrap();
        assert_eq!(view.get("rs1").unwrap().pos, 150);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let resources = resources();
        let parallel =
            remap_table_with(&table(), Build::Grch37, Build::Grch38, &resources, true).unwrap();
        let sequential =
            remap_table_with(&table(), Build::Grch37, Build::Grch38, &resources, false).unwrap();
        assert_eq!(parallel, sequential);
    }
}
