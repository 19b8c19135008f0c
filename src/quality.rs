// ==============================================================================
// quality.rs - Low-Quality Locus Filter
// ==============================================================================
// Description: Non-destructive view of a genotype table without loci known
//              to genotype poorly
// Author: Matt Barham
// Created: 2026-10-15
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================

use std::collections::HashSet;
use tracing::info;

use crate::error::Result;
use crate::models::Build;
use crate::remapper::grch37_view;
use crate::resources::{AssemblyMappingProvider, LowQualityProvider};
use crate::table::GenotypeTable;

/// Copy of the table without records whose GRCh37 locus is low quality
///
/// Low-quality loci are GRCh37 coordinates. Tables on another build are
/// matched through their GRCh37 positions but returned on their own build;
/// records that cannot be lifted to GRCh37 are kept.
pub fn filter_low_quality(
    table: &GenotypeTable,
    build: Build,
    low_quality: &dyn LowQualityProvider,
    mapping: &dyn AssemblyMappingProvider,
) -> Result<GenotypeTable> {
    let loci = low_quality.get_loci()?;

    let filtered = if build == Build::Grch37 {
        table.without_loci(&loci)
    } else {
        let view = grch37_view(table, build, mapping)?;
        let flagged: HashSet<String> = view
            .iter()
            .filter(|r| loci.contains(&r.locus()))
            .map(|r| r.rsid.clone())
            .collect();
        table.without_rsids(&flagged)
    };

    info!(
        "Low-quality filter removed {} of {} SNPs",
        table.len() - filtered.len(),
        table.len()
    );

    Ok(filtered)
}
