// ==============================================================================
// table.rs - Genotype Table
// ==============================================================================
// Description: Ordered collection of SNP calls owned by a Sample
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-17
// Version: 1.0.0
// ==============================================================================
// Ordering: chromosome rank (1..22, X, Y, MT, other contigs lexically), then
// position, rsid and genotype. The full key makes the sorted order independent
// of input order, which the deduplication stages rely on.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{chromosome_rank, Locus, SnpRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenotypeTable {
    records: Vec<SnpRecord>,
}

impl GenotypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sorted table from records
    pub fn from_records(records: Vec<SnpRecord>) -> Self {
        let mut table = Self { records };
        table.sort();
        table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SnpRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnpRecord> {
        self.records.iter()
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<SnpRecord> {
        &mut self.records
    }

    pub fn push(&mut self, record: SnpRecord) {
        self.records.push(record);
    }

    pub fn sort(&mut self) {
        self.records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    pub fn is_sorted(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].sort_key() <= pair[1].sort_key())
    }

    pub fn get(&self, rsid: &str) -> Option<&SnpRecord> {
        self.records.iter().find(|r| r.rsid == rsid)
    }

    pub fn has_unique_rsids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.records.len());
        self.records.iter().all(|r| seen.insert(r.rsid.as_str()))
    }

    pub fn loci(&self) -> HashSet<Locus> {
        self.records.iter().map(SnpRecord::locus).collect()
    }

    /// Distinct chromosomes in table order
    pub fn chromosomes(&self) -> Vec<String> {
        let mut chroms: Vec<&str> = self
            .records
            .iter()
            .map(|r| r.chrom.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        chroms.sort_by_key(|c| chromosome_rank(*c));
        chroms.into_iter().map(str::to_string).collect()
    }

    /// Human-readable chromosome coverage (e.g., "1-22, X, Y, MT")
    ///
    /// Consecutive autosomes are collapsed into ranges; other contigs are
    /// listed individually in table order.
    pub fn chromosomes_summary(&self) -> String {
        let chroms = self.chromosomes();

        let autosomes: Vec<u8> = chroms
            .iter()
            .filter_map(|c| c.parse::<u8>().ok().filter(|n| (1..=22).contains(n)))
            .collect();

        let mut parts: Vec<String> = Vec::new();
        let mut idx = 0;
        while idx < autosomes.len() {
            let start = autosomes[idx];
            let mut end = start;
            while idx + 1 < autosomes.len() && autosomes[idx + 1] == end + 1 {
                idx += 1;
                end = autosomes[idx];
            }
            if start == end {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{}-{}", start, end));
            }
            idx += 1;
        }

        parts.extend(
            chroms
                .into_iter()
                .filter(|c| !c.parse::<u8>().is_ok_and(|n| (1..=22).contains(&n))),
        );

        parts.join(", ")
    }

    /// Records on a chromosome
    pub fn on_chromosome<'a>(&'a self, chrom: &'a str) -> impl Iterator<Item = &'a SnpRecord> + 'a {
        self.records.iter().filter(move |r| r.chrom == chrom)
    }

    /// Called (non-null) records, optionally restricted to one chromosome
    pub fn notnull<'a>(&'a self, chrom: Option<&'a str>) -> impl Iterator<Item = &'a SnpRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.is_called() && chrom.map_or(true, |c| r.chrom == c))
    }

    /// Heterozygous records, optionally restricted to one chromosome
    pub fn heterozygous<'a>(
        &'a self,
        chrom: Option<&'a str>,
    ) -> impl Iterator<Item = &'a SnpRecord> + 'a {
        self.notnull(chrom).filter(|r| r.is_heterozygous())
    }

    /// Copy of the table without records at the given loci
    pub fn without_loci(&self, loci: &HashSet<Locus>) -> GenotypeTable {
        let records = self
            .records
            .iter()
            .filter(|r| !loci.contains(&r.locus()))
            .cloned()
            .collect();
        GenotypeTable { records }
    }

    /// Copy of the table without the given rsids
    pub fn without_rsids(&self, rsids: &HashSet<String>) -> GenotypeTable {
        let records = self
            .records
            .iter()
            .filter(|r| !rsids.contains(&r.rsid))
            .cloned()
            .collect();
        GenotypeTable { records }
    }
}

impl FromIterator<SnpRecord> for GenotypeTable {
    fn from_iter<I: IntoIterator<Item = SnpRecord>>(iter: I) -> Self {
        GenotypeTable::from_records(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a GenotypeTable {
    type Item = &'a SnpRecord;
    type IntoIter = std::slice::Iter<'a, SnpRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
