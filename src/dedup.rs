// ==============================================================================
// dedup.rs - Deduplication Engine
// ==============================================================================
// Description: PAR assignment and rsid / XY / MT deduplication with
//              discrepancy bookkeeping
// Author: Matt Barham
// Created: 2026-10-14
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Stage order: PAR assignment → sort → rsid → XY (optional) → MT (optional)
//
// Postconditions:
//   - no two live records share an rsid
//   - Male sample: no live heterozygous call on non-PAR X/Y
//   - no live heterozygous call on MT
// Conflicts are never fatal; offending records are copied into the
// discrepancy sets and processing continues.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::genotype::call_rank;
use crate::models::{canonical_rsid, Locus, ParBoundaries, SnpRecord};
use crate::table::GenotypeTable;

/// Records removed or flagged during processing, retained for audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discrepancies {
    /// Entries removed from the live table as duplicates
    pub duplicate: Vec<SnpRecord>,
    /// Heterozygous non-PAR X/Y calls of a male sample (nulled in the table)
    pub discrepant_xy: Vec<SnpRecord>,
    /// Heterozygous MT calls (nulled in the table)
    pub heterozygous_mt: Vec<SnpRecord>,
    /// Input rows that are not single-base sites
    pub discrepant_vcf_position: Vec<SnpRecord>,
    /// Same rsid reported at different positions
    pub discrepant_merge_positions: Vec<SnpRecord>,
    /// Same rsid and position reported with different genotypes
    pub discrepant_merge_genotypes: Vec<SnpRecord>,
}

/// Deduplication switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupOptions {
    /// Mirror PAR calls between X and Y before deduplicating
    pub assign_par: bool,
    pub deduplicate_xy: bool,
    pub deduplicate_mt: bool,
    /// Treat the sample as male regardless of inferred sex
    pub force_male: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            assign_par: true,
            deduplicate_xy: true,
            deduplicate_mt: true,
            force_male: false,
        }
    }
}

/// Counts produced by PAR assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParAssignment {
    /// "XY"/"PAR" contig records moved onto X or Y
    pub relabelled: usize,
    /// Copies added on the other sex chromosome
    pub mirrored: usize,
}

/// Counts produced by the rsid stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RsidDedup {
    pub removed: usize,
    pub position_conflicts: usize,
    pub genotype_conflicts: usize,
}

/// Counts produced by the XY or MT stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocusDedup {
    /// Heterozygous calls nulled in place
    pub nulled: usize,
    /// Duplicate loci collapsed away
    pub collapsed: usize,
}

/// Summary of a full deduplication run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    pub par: ParAssignment,
    pub rsid: RsidDedup,
    /// None when the stage was disabled or skipped for unknown sex
    pub xy: Option<LocusDedup>,
    pub mt: Option<LocusDedup>,
}

/// Assign pseudoautosomal calls to both sex chromosomes
///
/// Records on the "XY"/"PAR" contigs are first moved onto X (or Y) when the
/// position falls inside a PAR. Every PAR call on X is then copied onto the
/// equivalent Y coordinate and vice versa, unless a record already occupies
/// that locus. Copies are keyed `<rsid>_<chrom>` to keep rsids unique.
pub fn assign_par(table: &mut GenotypeTable, par: &ParBoundaries) -> ParAssignment {
    let mut relabelled = 0;
    for record in table.records_mut().iter_mut() {
        if record.chrom != "XY" && record.chrom != "PAR" {
            continue;
        }
        if par.is_par("X", record.pos) {
            record.chrom = "X".to_string();
            relabelled += 1;
        } else if par.is_par("Y", record.pos) {
            record.chrom = "Y".to_string();
            relabelled += 1;
        } else {
            debug!(
                "{} on contig {} at {} lies outside the PAR; left unassigned",
                record.rsid, record.chrom, record.pos
            );
        }
    }

    // Deterministic choice when several calls share a PAR locus
    table.sort();

    let mut occupied: HashSet<Locus> = table.loci();
    let mut mirrors = Vec::new();
    for record in table.iter() {
        if let Some(locus) = par.mirror(&record.chrom, record.pos) {
            if occupied.insert(locus.clone()) {
                mirrors.push(SnpRecord {
                    rsid: format!("{}_{}", canonical_rsid(&record.rsid), locus.chrom),
                    chrom: locus.chrom,
                    pos: locus.pos,
                    genotype: record.genotype.clone(),
                });
            }
        }
    }

    let mirrored = mirrors.len();
    for record in mirrors {
        table.push(record);
    }

    if relabelled > 0 || mirrored > 0 {
        info!(
            "PAR assignment: {} relabelled, {} mirrored between X and Y",
            relabelled, mirrored
        );
    }

    ParAssignment {
        relabelled,
        mirrored,
    }
}

/// Canonicalize multi-rsid keys and remove duplicate rsids
///
/// The table is sorted first, so the authoritative (first) entry of each
/// rsid does not depend on input order.
pub fn deduplicate_rsids(table: &mut GenotypeTable, discrepancies: &mut Discrepancies) -> RsidDedup {
    table.sort();

    let records = std::mem::take(table.records_mut());
    let mut kept: Vec<SnpRecord> = Vec::with_capacity(records.len());
    let mut first_seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut counts = RsidDedup::default();

    for mut record in records {
        let canonical = canonical_rsid(&record.rsid);
        if canonical != record.rsid {
            record.rsid = canonical.to_string();
        }

        let Some(&idx) = first_seen.get(&record.rsid) else {
            first_seen.insert(record.rsid.clone(), kept.len());
            kept.push(record);
            continue;
        };

        let authoritative = &kept[idx];
        if authoritative.chrom != record.chrom || authoritative.pos != record.pos {
            warn!(
                "{} reported at chr{}:{} and chr{}:{}; keeping the first",
                record.rsid, authoritative.chrom, authoritative.pos, record.chrom, record.pos
            );
            discrepancies.discrepant_merge_positions.push(record.clone());
            counts.position_conflicts += 1;
        } else if authoritative.genotype != record.genotype {
            warn!(
                "{} reported with genotypes {:?} and {:?}; keeping the first",
                record.rsid, authoritative.genotype, record.genotype
            );
            discrepancies.discrepant_merge_genotypes.push(record.clone());
            counts.genotype_conflicts += 1;
        }

        discrepancies.duplicate.push(record);
        counts.removed += 1;
    }

    *table.records_mut() = kept;
    table.sort();

    if counts.removed > 0 {
        info!(
            "rsid deduplication removed {} entries ({} position conflicts, {} genotype conflicts)",
            counts.removed, counts.position_conflicts, counts.genotype_conflicts
        );
    }

    counts
}

/// Null heterozygous non-PAR X/Y calls (male samples) and collapse X/Y loci
pub fn deduplicate_xy(
    table: &mut GenotypeTable,
    male: bool,
    par: &ParBoundaries,
    discrepancies: &mut Discrepancies,
) -> LocusDedup {
    let mut counts = LocusDedup::default();

    if male {
        for record in table.records_mut().iter_mut() {
            let sex_chrom = record.chrom == "X" || record.chrom == "Y";
            if sex_chrom && record.is_heterozygous() && !par.is_par(&record.chrom, record.pos) {
                discrepancies.discrepant_xy.push(record.clone());
                record.genotype = None;
                counts.nulled += 1;
            }
        }
    }

    counts.collapsed = collapse_loci(table, &["X", "Y"], discrepancies);

    if counts.nulled > 0 || counts.collapsed > 0 {
        info!(
            "XY deduplication: {} heterozygous calls nulled, {} duplicate loci collapsed",
            counts.nulled, counts.collapsed
        );
    }

    counts
}

/// Null heterozygous MT calls and collapse MT loci
pub fn deduplicate_mt(table: &mut GenotypeTable, discrepancies: &mut Discrepancies) -> LocusDedup {
    let mut counts = LocusDedup::default();

    for record in table.records_mut().iter_mut() {
        if record.chrom == "MT" && record.is_heterozygous() {
            discrepancies.heterozygous_mt.push(record.clone());
            record.genotype = None;
            counts.nulled += 1;
        }
    }

    counts.collapsed = collapse_loci(table, &["MT"], discrepancies);

    if counts.nulled > 0 || counts.collapsed > 0 {
        info!(
            "MT deduplication: {} heterozygous calls nulled, {} duplicate loci collapsed",
            counts.nulled, counts.collapsed
        );
    }

    counts
}

/// Keep one record per (chrom, pos) on the given chromosomes
///
/// Preference: called non-heterozygous > heterozygous > no-call; ties keep
/// table order. Dropped records go to the duplicate set.
fn collapse_loci(table: &mut GenotypeTable, chroms: &[&str], discrepancies: &mut Discrepancies) -> usize {
    table.sort();

    let records = std::mem::take(table.records_mut());
    let mut kept: Vec<SnpRecord> = Vec::with_capacity(records.len());
    let mut collapsed = 0;

    for record in records {
        if chroms.contains(&record.chrom.as_str()) {
            if let Some(last) = kept.last_mut() {
                if last.chrom == record.chrom && last.pos == record.pos {
                    if call_rank(record.genotype.as_ref()) > call_rank(last.genotype.as_ref()) {
                        let replaced = std::mem::replace(last, record);
                        discrepancies.duplicate.push(replaced);
                    } else {
                        discrepancies.duplicate.push(record);
                    }
                    collapsed += 1;
                    continue;
                }
            }
        }
        kept.push(record);
    }

    *table.records_mut() = kept;
    table.sort();
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::Genotype;
    use crate::models::Build;
    use crate::resources::default_par_boundaries;
    use rand::seq::SliceRandom;

    fn snp(rsid: &str, chrom: &str, pos: u32, gt: &str) -> SnpRecord {
        SnpRecord::new(rsid, chrom, pos, Genotype::parse(gt).unwrap())
    }

    fn par37() -> ParBoundaries {
        default_par_boundaries(Build::Grch37)
    }

    #[test]
    fn test_rsid_merge_conflict_on_position() {
        let mut table = GenotypeTable::from_records(vec![
            snp("rs1", "1", 200, "AT"),
            snp("rs1,rs2", "1", 100, "AA"),
        ]);
        let mut discrepancies = Discrepancies::default();

        let counts = deduplicate_rsids(&mut table, &mut discrepancies);

        assert_eq!(counts.removed, 1);
        assert_eq!(table.len(), 1);
        let live = table.get("rs1").unwrap();
        assert_eq!(live.pos, 100);
        assert_eq!(live.genotype.as_ref().unwrap().as_str(), "AA");
        assert_eq!(discrepancies.discrepant_merge_positions.len(), 1);
        assert_eq!(discrepancies.discrepant_merge_positions[0].pos, 200);
        assert_eq!(discrepancies.duplicate.len(), 1);
        assert!(discrepancies.discrepant_merge_genotypes.is_empty());
    }

    #[test]
    fn test_rsid_genotype_conflict_and_exact_duplicate() {
        let mut table = GenotypeTable::from_records(vec![
            snp("rs7", "2", 500, "CC"),
            snp("rs7", "2", 500, "CT"),
            snp("rs8", "3", 10, "GG"),
            snp("rs8", "3", 10, "GG"),
        ]);
        let mut discrepancies = Discrepancies::default();

        let counts = deduplicate_rsids(&mut table, &mut discrepancies);

        assert_eq!(counts.removed, 2);
        assert_eq!(counts.genotype_conflicts, 1);
        assert_eq!(counts.position_conflicts, 0);
        assert!(table.has_unique_rsids());
        assert_eq!(discrepancies.discrepant_merge_genotypes.len(), 1);
        assert_eq!(discrepancies.duplicate.len(), 2);
    }

    #[test]
    fn test_rsid_dedup_is_order_insensitive() {
        let records = vec![
            snp("rs1,rs2", "1", 100, "AA"),
            snp("rs1", "1", 200, "AT"),
            snp("rs1", "1", 100, "AG"),
            snp("rs3,rs4", "5", 7, "TT"),
            snp("rs3", "5", 7, "TT"),
            snp("rs9", "X", 9, "A"),
        ];

        let mut reference = GenotypeTable::from_records(records.clone());
        let mut reference_discrepancies = Discrepancies::default();
        deduplicate_rsids(&mut reference, &mut reference_discrepancies);

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let mut shuffled = records.clone();
            shuffled.shuffle(&mut rng);

            let mut table = GenotypeTable::new();
            for record in shuffled {
                table.push(record);
            }
            let mut discrepancies = Discrepancies::default();
            deduplicate_rsids(&mut table, &mut discrepancies);

            assert_eq!(table, reference);
            assert_eq!(discrepancies, reference_discrepancies);
        }
    }

    #[test]
    fn test_par_mirroring() {
        let mut table = GenotypeTable::new();
        table.push(snp("rs100", "X", 60_001, "AG"));
        table.push(snp("rs101", "Y", 2_649_520, "CC"));
        table.push(snp("rs102", "X", 5_000_000, "TT"));
        // Already has a counterpart on Y
        table.push(snp("rs103", "X", 70_000, "AA"));
        table.push(snp("rs104", "Y", 20_000, "AA"));

        let counts = assign_par(&mut table, &par37());
        table.sort();

        assert_eq!(counts.mirrored, 2);
        let mirrored_y = table.get("rs100_Y").unwrap();
        assert_eq!((mirrored_y.chrom.as_str(), mirrored_y.pos), ("Y", 10_001));
        assert_eq!(mirrored_y.genotype, Genotype::parse("AG").unwrap());
        let mirrored_x = table.get("rs101_X").unwrap();
        assert_eq!((mirrored_x.chrom.as_str(), mirrored_x.pos), ("X", 2_699_520));
        assert!(table.get("rs102_Y").is_none());
        assert!(table.get("rs103_Y").is_none());
    }

    #[test]
    fn test_par_contig_relabelling() {
        let mut table = GenotypeTable::new();
        table.push(snp("rs1", "XY", 100_000, "AG"));
        table.push(snp("rs2", "XY", 90_000_000, "AG"));

        let counts = assign_par(&mut table, &par37());

        assert_eq!(counts.relabelled, 1);
        assert_eq!(table.get("rs1").unwrap().chrom, "X");
        assert_eq!(table.get("rs2").unwrap().chrom, "XY");
        assert!(table.get("rs1_Y").is_some());
    }

    #[test]
    fn test_xy_male_heterozygous_calls_nulled() {
        let mut table = GenotypeTable::from_records(vec![
            snp("rs1", "X", 5_000_000, "AG"),
            snp("rs2", "X", 5_000_001, "AA"),
            snp("rs3", "Y", 3_000_000, "CT"),
            // PAR1 heterozygous call is legitimate
            snp("rs4", "X", 100_000, "AG"),
            snp("rs5", "1", 100, "AG"),
        ]);
        let mut discrepancies = Discrepancies::default();

        let counts = deduplicate_xy(&mut table, true, &par37(), &mut discrepancies);

        assert_eq!(counts.nulled, 2);
        assert_eq!(discrepancies.discrepant_xy.len(), 2);
        assert_eq!(table.len(), 5);
        assert!(table.get("rs1").unwrap().genotype.is_none());
        assert!(table.get("rs3").unwrap().genotype.is_none());
        assert!(table.get("rs4").unwrap().is_heterozygous());
        assert!(table.get("rs5").unwrap().is_heterozygous());

        let live_het_non_par = table
            .iter()
            .filter(|r| r.chrom == "X" || r.chrom == "Y")
            .filter(|r| !par37().is_par(&r.chrom, r.pos))
            .any(SnpRecord::is_heterozygous);
        assert!(!live_het_non_par);
    }

    #[test]
    fn test_xy_female_keeps_heterozygous_calls() {
        let mut table = GenotypeTable::from_records(vec![snp("rs1", "X", 5_000_000, "AG")]);
        let mut discrepancies = Discrepancies::default();

        let counts = deduplicate_xy(&mut table, false, &par37(), &mut discrepancies);

        assert_eq!(counts.nulled, 0);
        assert!(table.get("rs1").unwrap().is_heterozygous());
    }

    #[test]
    fn test_xy_collapse_prefers_homozygous_over_null() {
        let mut table = GenotypeTable::from_records(vec![
            snp("rsA", "X", 5_000_000, "--"),
            snp("rsB", "X", 5_000_000, "GG"),
            snp("rsC", "X", 5_000_000, "AG"),
        ]);
        let mut discrepancies = Discrepancies::default();

        let counts = deduplicate_xy(&mut table, true, &par37(), &mut discrepancies);

        assert_eq!(counts.collapsed, 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].rsid, "rsB");
        assert_eq!(discrepancies.duplicate.len(), 2);
    }

    #[test]
    fn test_mt_heterozygous_nulled_and_collapsed() {
        let mut table = GenotypeTable::from_records(vec![
            snp("rs1", "MT", 150, "CT"),
            snp("rs2", "MT", 200, "C"),
            snp("rs3", "MT", 200, "--"),
            snp("rs4", "1", 200, "CT"),
        ]);
        let mut discrepancies = Discrepancies::default();

        let counts = deduplicate_mt(&mut table, &mut discrepancies);

        assert_eq!(counts.nulled, 1);
        assert_eq!(counts.collapsed, 1);
        assert_eq!(discrepancies.heterozygous_mt.len(), 1);
        assert!(table.get("rs1").unwrap().genotype.is_none());
        assert!(table.get("rs2").is_some());
        assert!(table.get("rs3").is_none());
        assert!(!table.on_chromosome("MT").any(SnpRecord::is_heterozygous));
        assert!(table.get("rs4").unwrap().is_heterozygous());
    }
}
