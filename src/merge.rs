// ==============================================================================
// merge.rs - Genotype Table Merging
// ==============================================================================
// Description: Folds a second genotype table (same build) into a live table
//              with conflict bookkeeping
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// For each record of the incoming table:
//   rsid absent                   → added
//   rsid at a different position  → discrepant_merge_positions (live kept)
//   same position, live no-call   → live call filled
//   same position, calls differ   → both calls to discrepant_merge_genotypes,
//                                   live call nulled
//   otherwise                     → already consistent
// ==============================================================================

use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::dedup::Discrepancies;
use crate::remapper::RemapStats;
use crate::table::GenotypeTable;

/// Merge bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub added: usize,
    pub filled: usize,
    pub consistent: usize,
    pub position_conflicts: usize,
    pub genotype_conflicts: usize,
    /// Remapping of the incoming sample, when its build differed
    pub remap: Option<RemapStats>,
}

/// Merge `other` into `live`; both tables must be on the same build
pub fn merge_tables(
    live: &mut GenotypeTable,
    other: &GenotypeTable,
    discrepancies: &mut Discrepancies,
) -> MergeStats {
    let mut stats = MergeStats::default();
    let records = live.records_mut();
    let mut index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.rsid.clone(), idx))
        .collect();

    for incoming in other.iter() {
        let Some(&idx) = index.get(&incoming.rsid) else {
            index.insert(incoming.rsid.clone(), records.len());
            records.push(incoming.clone());
            stats.added += 1;
            continue;
        };

        let existing = &mut records[idx];
        if existing.chrom != incoming.chrom || existing.pos != incoming.pos {
            warn!(
                "Merge: {} at chr{}:{} conflicts with chr{}:{}; keeping the existing position",
                incoming.rsid, existing.chrom, existing.pos, incoming.chrom, incoming.pos
            );
            discrepancies.discrepant_merge_positions.push(incoming.clone());
            stats.position_conflicts += 1;
            continue;
        }

        match (&existing.genotype, &incoming.genotype) {
            (None, Some(_)) => {
                existing.genotype = incoming.genotype.clone();
                stats.filled += 1;
            }
            (Some(a), Some(b)) if a != b => {
                warn!(
                    "Merge: {} called {} and {}; clearing the call",
                    incoming.rsid, a, b
                );
                discrepancies.discrepant_merge_genotypes.push(existing.clone());
                discrepancies.discrepant_merge_genotypes.push(incoming.clone());
                existing.genotype = None;
                stats.genotype_conflicts += 1;
            }
            _ => stats.consistent += 1,
        }
    }

    live.sort();

    info!(
        "Merged table: {} added, {} filled, {} consistent, {} position conflicts, {} genotype conflicts",
        stats.added, stats.filled, stats.consistent, stats.position_conflicts, stats.genotype_conflicts
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::Genotype;
    use crate::models::SnpRecord;

    fn snp(rsid: &str, pos: u32, gt: &str) -> SnpRecord {
        SnpRecord::new(rsid, "4", pos, Genotype::parse(gt).unwrap())
    }

    #[test]
    fn test_merge_bookkeeping() {
        let mut live = GenotypeTable::from_records(vec![
            snp("rs1", 100, "AA"),
            snp("rs2", 200, "--"),
            snp("rs3", 300, "CC"),
            snp("rs4", 400, "GT"),
        ]);
        let other = GenotypeTable::from_records(vec![
            snp("rs1", 100, "AA"),
            snp("rs2", 200, "AG"),
            snp("rs3", 300, "CT"),
            snp("rs4", 450, "GT"),
            snp("rs5", 500, "TT"),
        ]);
        let mut discrepancies = Discrepancies::default();

        let stats = merge_tables(&mut live, &other, &mut discrepancies);

        assert_eq!(stats.added, 1);
        assert_eq!(stats.filled, 1);
        assert_eq!(stats.consistent, 1);
        assert_eq!(stats.position_conflicts, 1);
        assert_eq!(stats.genotype_conflicts, 1);

        assert_eq!(live.len(), 5);
        assert!(live.is_sorted());
        assert!(live.has_unique_rsids());
        assert_eq!(live.get("rs2").unwrap().genotype, Genotype::parse("AG").unwrap());
        assert!(live.get("rs3").unwrap().genotype.is_none());
        assert_eq!(live.get("rs4").unwrap().pos, 400);

        assert_eq!(discrepancies.discrepant_merge_positions.len(), 1);
        assert_eq!(discrepancies.discrepant_merge_positions[0].pos, 450);
        assert_eq!(discrepancies.discrepant_merge_genotypes.len(), 2);
    }

    #[test]
    fn test_merge_into_empty_table() {
        let mut live = GenotypeTable::new();
        let other = GenotypeTable::from_records(vec![snp("rs9", 9, "A"), snp("rs8", 8, "C")]);
        let mut discrepancies = Discrepancies::default();

        let stats = merge_tables(&mut live, &other, &mut discrepancies);

        assert_eq!(stats.added, 2);
        assert_eq!(live, other);
        assert_eq!(discrepancies, Discrepancies::default());
    }
}
