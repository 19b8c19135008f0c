// ==============================================================================
// build_detector.rs - Genome Build Detection
// ==============================================================================
// Description: Infers the reference assembly of a genotype table from
//              curated anchor positions
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   For each candidate build (36, 37, 38) count table loci found in that
//   build's anchor set. Most matches wins; ties resolve 37 > 38 > 36.
//   No matches → build unknown (caller falls back to GRCh37).
//   Candidate builds are compared in parallel and merged by build key.
// ==============================================================================

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Build, Locus};
use crate::resources::AnchorPositionProvider;
use crate::table::GenotypeTable;

/// Outcome of build detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildDetection {
    /// Winning build, None if no anchor matched
    pub build: Option<Build>,
    /// Anchor matches per candidate build
    pub matches: BTreeMap<Build, usize>,
    /// Winner's share of all anchor matches (0.0-1.0)
    pub confidence: Option<f64>,
}

impl BuildDetection {
    pub fn is_detected(&self) -> bool {
        self.build.is_some()
    }
}

/// Detect the build of a table (parallel over candidate builds)
pub fn detect_build(
    table: &GenotypeTable,
    anchors: &dyn AnchorPositionProvider,
) -> Result<BuildDetection> {
    detect_build_with(table, anchors, true)
}

pub(crate) fn detect_build_with(
    table: &GenotypeTable,
    anchors: &dyn AnchorPositionProvider,
    parallel: bool,
) -> Result<BuildDetection> {
    let anchor_sets: Vec<(Build, HashSet<Locus>)> = Build::ALL
        .iter()
        .map(|build| anchors.get_anchors(*build).map(|set| (*build, set)))
        .collect::<Result<_>>()?;

    let count = |(build, set): &(Build, HashSet<Locus>)| -> (Build, usize) {
        let hits = table
            .iter()
            .filter(|r| set.contains(&Locus::new(r.chrom.as_str(), r.pos)))
            .count();
        (*build, hits)
    };

    let matches: BTreeMap<Build, usize> = if parallel {
        anchor_sets.par_iter().map(count).collect()
    } else {
        anchor_sets.iter().map(count).collect()
    };

    debug!("Anchor matches per build: {:?}", matches);

    let total: usize = matches.values().sum();
    let winner = matches
        .iter()
        .filter(|(_, hits)| **hits > 0)
        .max_by_key(|(build, hits)| (**hits, build.tie_break_priority()))
        .map(|(build, hits)| (*build, *hits));

    let detection = match winner {
        Some((build, hits)) => {
            let confidence = hits as f64 / total as f64;
            info!(
                "Detected build {} ({} anchor matches, confidence {:.2})",
                build, hits, confidence
            );
            BuildDetection {
                build: Some(build),
                matches,
                confidence: Some(confidence),
            }
        }
        None => {
            info!("No build anchors matched; build unknown");
            BuildDetection {
                build: None,
                matches,
                confidence: None,
            }
        }
    };

    Ok(detection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::Genotype;
    use crate::models::SnpRecord;
    use crate::resources::ReferenceResources;

    fn table_at(loci: &[(&str, u32)]) -> GenotypeTable {
        loci.iter()
            .enumerate()
            .map(|(idx, (chrom, pos))| {
                SnpRecord::new(format!("rs{}", idx), *chrom, *pos, Genotype::parse("AA").unwrap())
            })
            .collect()
    }

    #[test]
    fn test_detects_build_38() {
        let table = table_at(&[("1", 817186), ("3", 50889578), ("2", 1234)]);
        let detection = detect_build(&table, &ReferenceResources::new()).unwrap();

        assert_eq!(detection.build, Some(Build::Grch38));
        assert_eq!(detection.matches[&Build::Grch38], 2);
        assert_eq!(detection.confidence, Some(1.0));
    }

    #[test]
    fn test_detects_build_36() {
        let table = table_at(&[("X", 135302086)]);
        let detection = detect_build(&table, &ReferenceResources::new()).unwrap();
        assert_eq!(detection.build, Some(Build::Ncbi36));
    }

    #[test]
    fn test_majority_wins() {
        // Two GRCh37 anchors, one GRCh38 anchor
        let table = table_at(&[("1", 752566), ("20", 27656823), ("15", 22776092)]);
        let detection = detect_build(&table, &ReferenceResources::new()).unwrap();

        assert_eq!(detection.build, Some(Build::Grch37));
        let confidence = detection.confidence.unwrap();
        assert!((confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_break_prefers_37_then_38() {
        let resources = ReferenceResources::new();

        let table = table_at(&[("1", 752566), ("1", 817186), ("1", 742429)]);
        let detection = detect_build(&table, &resources).unwrap();
        assert_eq!(detection.build, Some(Build::Grch37));

        let table = table_at(&[("1", 817186), ("1", 742429)]);
        let detection = detect_build(&table, &resources).unwrap();
        assert_eq!(detection.build, Some(Build::Grch38));
    }

    #[test]
    fn test_no_anchor_matches() {
        let table = table_at(&[("1", 1), ("2", 2)]);
        let detection = detect_build(&table, &ReferenceResources::new()).unwrap();

        assert!(!detection.is_detected());
        assert_eq!(detection.confidence, None);
        assert!(detection.matches.values().all(|hits| *hits == 0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let table = table_at(&[("1", 752566), ("20", 27638706), ("X", 135302086), ("5", 5)]);
        let resources = ReferenceResources::new();
        assert_eq!(
            detect_build_with(&table, &resources, true).unwrap(),
            detect_build_with(&table, &resources, false).unwrap()
        );
    }
}
