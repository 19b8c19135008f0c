// ==============================================================================
// chip.rs - Chip Cluster Classification
// ==============================================================================
// Description: Assigns a genotyping platform by set overlap between the
//              sample's GRCh37 loci and reference chip clusters
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// For every cluster C with at least one locus, with S the sample's loci:
//   overlap_with_cluster = |S ∩ C| / |C|
//   overlap_with_self    = |S ∩ C| / |S|
// The cluster with the highest overlap_with_cluster is the candidate (ties go
// to the lexically smallest cluster_id). It is accepted only if both ratios
// are strictly greater than the threshold.
// ==============================================================================

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Build, ChipAssignment, ChipCluster, Locus};
use crate::remapper::grch37_view;
use crate::resources::{AssemblyMappingProvider, ChipClusterProvider};
use crate::table::GenotypeTable;

/// Overlap of the sample with one cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterScore {
    pub cluster_id: String,
    pub shared: usize,
    pub overlap_with_cluster: f64,
    pub overlap_with_self: f64,
}

/// Classify a table against the provider's clusters
///
/// The table is compared on GRCh37; other builds are remapped first.
///
/// # Arguments
/// * `sources` - Sample source labels, used to pick the chip version out of
///   the cluster's company composition
pub fn classify_chip(
    table: &GenotypeTable,
    build: Build,
    sources: &[String],
    clusters: &dyn ChipClusterProvider,
    mapping: &dyn AssemblyMappingProvider,
    threshold: f64,
) -> Result<Option<ChipAssignment>> {
    let clusters = clusters.get_clusters()?;
    let view = grch37_view(table, build, mapping)?;
    let loci = view.loci();

    Ok(classify_loci(&loci, &clusters, threshold).map(|cluster| {
        let assignment = ChipAssignment {
            cluster_id: cluster.cluster_id.clone(),
            chip: cluster.chip_base_deduced.clone(),
            chip_version: chip_version(&cluster.company_composition, sources),
        };
        info!(
            "Assigned chip cluster {} ({} {})",
            assignment.cluster_id, assignment.chip, assignment.chip_version
        );
        assignment
    }))
}

/// Best-matching cluster for a set of GRCh37 loci, if it clears the threshold
pub fn classify_loci<'a>(
    loci: &HashSet<Locus>,
    clusters: &'a [ChipCluster],
    threshold: f64,
) -> Option<&'a ChipCluster> {
    if loci.is_empty() {
        return None;
    }

    let mut best: Option<(&ChipCluster, ClusterScore)> = None;
    for cluster in clusters.iter().filter(|c| !c.loci.is_empty()) {
        let candidate = score(loci, cluster);
        let better = match &best {
            None => true,
            Some((_, current)) => {
                candidate.overlap_with_cluster > current.overlap_with_cluster
                    || (candidate.overlap_with_cluster == current.overlap_with_cluster
                        && candidate.cluster_id < current.cluster_id)
            }
        };
        if better {
            best = Some((cluster, candidate));
        }
    }

    let (cluster, score) = best?;
    debug!("Best chip cluster candidate: {:?}", score);

    if score.overlap_with_cluster > threshold && score.overlap_with_self > threshold {
        Some(cluster)
    } else {
        info!(
            "No chip cluster above threshold {:.2} (best {} at {:.3}/{:.3})",
            threshold, score.cluster_id, score.overlap_with_cluster, score.overlap_with_self
        );
        None
    }
}

pub fn score(loci: &HashSet<Locus>, cluster: &ChipCluster) -> ClusterScore {
    let cluster_loci: HashSet<&Locus> = cluster.loci.iter().collect();
    let shared = cluster_loci.iter().filter(|l| loci.contains(**l)).count();

    ClusterScore {
        cluster_id: cluster.cluster_id.clone(),
        shared,
        overlap_with_cluster: ratio(shared, cluster_loci.len()),
        overlap_with_self: ratio(shared, loci.len()),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Version token following the first source label found in a composition
///
/// `"23andMe-v5, LivingDNA"` with source `23andMe` gives `"v5"`.
pub fn chip_version(company_composition: &str, sources: &[String]) -> String {
    let haystack = company_composition.to_ascii_lowercase();

    for source in sources.iter().filter(|s| !s.is_empty()) {
        let Some(idx) = haystack.find(&source.to_ascii_lowercase()) else {
            continue;
        };
        let rest = company_composition[idx + source.len()..]
            .trim_start_matches(|c: char| c == '-' || c == '_' || c == ' ');
        if !rest.starts_with(['v', 'V']) {
            return String::new();
        }
        let token: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
            .collect();
        return if token.len() > 1 { token } else { String::new() };
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use crate::genotype::Genotype;
    use crate::models::{AssemblyRegion, SnpRecord};
    use crate::resources::ReferenceResources;

    fn cluster(id: &str, composition: &str, chip: &str, positions: std::ops::Range<u32>) -> ChipCluster {
        ChipCluster {
            cluster_id: id.to_string(),
            company_composition: composition.to_string(),
            chip_base_deduced: chip.to_string(),
            loci: positions.map(|pos| Locus::new("1", pos)).collect(),
        }
    }

    fn table_at(positions: impl Iterator<Item = u32>) -> GenotypeTable {
        positions
            .map(|pos| SnpRecord::new(format!("rs{}", pos), "1", pos, Genotype::parse("AA").unwrap()))
            .collect()
    }

    fn sources(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accepts_cluster_above_threshold() {
        let clusters = ReferenceResources::new()
            .with_clusters(vec![cluster("c1", "23andMe-v5, LivingDNA", "GSA", 0..100)]);

        // 97 of 100 cluster loci plus 4 extras: 0.97 and 97/101 ≈ 0.96
        let table = table_at((0..97).chain(1000..1004));
        let assignment = classify_chip(
            &table,
            Build::Grch37,
            &sources(&["23andMe"]),
            &clusters,
            &clusters,
            0.95,
        )
        .unwrap()
        .unwrap();

        assert_eq!(assignment.cluster_id, "c1");
        assert_eq!(assignment.chip, "GSA");
        assert_eq!(assignment.chip_version, "v5");
    }

    #[test]
    fn test_rejects_low_overlap() {
        let clusters = vec![cluster("c1", "23andMe-v5", "GSA", 0..100)];
        let loci = table_at((0..80).chain(1000..1020)).loci();
        assert!(classify_loci(&loci, &clusters, 0.95).is_none());
    }

    #[test]
    fn test_both_ratios_must_exceed_threshold() {
        let clusters = vec![cluster("c1", "", "GSA", 0..100)];
        // Full cluster coverage but the sample is mostly elsewhere
        let loci = table_at((0..100).chain(1000..1100)).loci();
        assert!(classify_loci(&loci, &clusters, 0.95).is_none());
    }

    #[test]
    fn test_tie_prefers_smallest_cluster_id() {
        let clusters = vec![
            cluster("c9", "", "OmniExpress", 0..50),
            cluster("c2", "", "GSA", 0..50),
            cluster("empty", "", "none", 0..0),
        ];
        let loci = table_at(0..50).loci();
        let best = classify_loci(&loci, &clusters, 0.95).unwrap();
        assert_eq!(best.cluster_id, "c2");
    }

    #[test]
    fn test_non_37_sample_is_compared_on_37() {
        let mut resources = ReferenceResources::new()
            .with_clusters(vec![cluster("c1", "AncestryDNA v2.0", "OmniExpress", 1..101)]);
        resources.add_mapping("1", Build::Grch37, Build::Grch38, vec![AssemblyRegion::forward(1, 1000, 5001)]);

        let table = table_at(5001..5101);
        let assignment = classify_chip(
            &table,
            Build::Grch38,
            &sources(&["AncestryDNA"]),
            &resources,
            &resources,
            0.95,
        )
        .unwrap()
        .unwrap();
        assert_eq!(assignment.cluster_id, "c1");
        assert_eq!(assignment.chip_version, "v2.0");
    }

    #[test]
    fn test_missing_clusters_is_unavailable() {
        let resources = ReferenceResources::new();
        let err = classify_chip(&table_at(0..10), Build::Grch37, &[], &resources, &resources, 0.95)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_chip_version_extraction() {
        let composition = "23andMe-v5, AncestryDNA v2, FTDNA";
        assert_eq!(chip_version(composition, &sources(&["23andMe"])), "v5");
        assert_eq!(chip_version(composition, &sources(&["ancestrydna"])), "v2");
        assert_eq!(chip_version(composition, &sources(&["FTDNA"])), "");
        assert_eq!(chip_version(composition, &sources(&["MyHeritage"])), "");
        assert_eq!(chip_version(composition, &sources(&["MyHeritage", "23andMe"])), "v5");
    }
}
