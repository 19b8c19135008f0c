// ==============================================================================
// sex.rs - Sex Determination
// ==============================================================================
// Description: Heuristic sex inference from non-PAR X heterozygosity and
//              Y chromosome call rate
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-19
// Version: 1.1.0
// ==============================================================================
// NOT A DIAGNOSTIC TEST. Array data on the sex chromosomes is noisy; the
// thresholds in SexThresholds were chosen to separate typical consumer chip
// samples and return "" whenever the evidence is thin or contradictory.
//
//   chrom X: het_ratio = het / called (non-PAR X)
//            y_ratio   = called / rows (non-PAR Y)
//            het_ratio <= het threshold and y_called >= min Y and y_ratio > Y threshold → Male
//            het_ratio >  het threshold and (no Y rows or y_ratio <= Y threshold)      → Female
//   chrom Y: rows >= min Y, then y_ratio > Y threshold → Male, else Female
//
// A low X heterozygosity alone never yields Male; it also fits a female
// sample typed on an array with few informative X probes.
// ==============================================================================

use tracing::{debug, info};

use crate::config::SexThresholds;
use crate::error::{ProcessingError, Result};
use crate::models::{normalize_chromosome, ParBoundaries, Sex, SnpRecord};
use crate::table::GenotypeTable;

#[derive(Debug, Default)]
struct SexChromosomeCounts {
    x_called: usize,
    x_heterozygous: usize,
    y_rows: usize,
    y_called: usize,
}

impl SexChromosomeCounts {
    fn collect(table: &GenotypeTable, par: &ParBoundaries) -> Self {
        let mut counts = Self::default();
        let non_par = |r: &&SnpRecord| !par.is_par(&r.chrom, r.pos);

        for record in table.on_chromosome("X").filter(non_par) {
            if record.is_called() {
                counts.x_called += 1;
                if record.is_heterozygous() {
                    counts.x_heterozygous += 1;
                }
            }
        }

        for record in table.on_chromosome("Y").filter(non_par) {
            counts.y_rows += 1;
            if record.is_called() {
                counts.y_called += 1;
            }
        }

        counts
    }

    fn y_called_ratio(&self) -> Option<f64> {
        (self.y_rows > 0).then(|| self.y_called as f64 / self.y_rows as f64)
    }
}

/// Infer sex from the non-PAR region of chromosome X or Y
///
/// # Returns
/// * `Ok(Sex::Unknown)` - Too few positions or contradictory evidence
/// * `Err(ProcessingError::InvalidChromosome)` - chrom is not X or Y
pub fn determine_sex(
    table: &GenotypeTable,
    chrom: &str,
    par: &ParBoundaries,
    thresholds: &SexThresholds,
) -> Result<Sex> {
    let chrom = normalize_chromosome(chrom);
    let counts = SexChromosomeCounts::collect(table, par);
    debug!("Sex chromosome counts: {:?}", counts);

    let sex = match chrom.as_str() {
        "X" => from_x(&counts, thresholds),
        "Y" => from_y(&counts, thresholds),
        _ => return Err(ProcessingError::InvalidChromosome(chrom)),
    };

    info!("Determined sex from chr{}: {:?}", chrom, sex);
    Ok(sex)
}

fn from_x(counts: &SexChromosomeCounts, thresholds: &SexThresholds) -> Sex {
    if counts.x_called < thresholds.min_called_positions {
        return Sex::Unknown;
    }

    let het_ratio = counts.x_heterozygous as f64 / counts.x_called as f64;
    let y_ratio = counts.y_called_ratio();
    let low_het = het_ratio <= thresholds.heterozygous_x_threshold;
    let y_supports_male = counts.y_called >= thresholds.min_y_positions
        && y_ratio.is_some_and(|r| r > thresholds.y_called_threshold);
    let y_supports_female = y_ratio.map_or(true, |r| r <= thresholds.y_called_threshold);

    match (low_het, y_supports_male, y_supports_female) {
        (true, true, _) => Sex::Male,
        (false, _, true) => Sex::Female,
        _ => {
            debug!(
                "Inconclusive sex evidence: X het ratio {:.3}, Y called {} ({:?})",
                het_ratio, counts.y_called, y_ratio
            );
            Sex::Unknown
        }
    }
}

fn from_y(counts: &SexChromosomeCounts, thresholds: &SexThresholds) -> Sex {
    if counts.y_rows < thresholds.min_y_positions {
        return Sex::Unknown;
    }
    match counts.y_called_ratio() {
        Some(ratio) if ratio > thresholds.y_called_threshold => Sex::Male,
        _ => Sex::Female,
    }
}
