// ==============================================================================
// genotype.rs - Genotype Token Parsing
// ==============================================================================
// Description: Parses consumer genotype tokens into validated allele calls
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   - "--", "-", "", "00", "??", "NA", ".", ".." → no-call (None)
//     ("./." and ".|." reach here as ".." once the separator is stripped)
//   - 1 or 2 characters from A/C/G/T/D/I → Genotype (upper-cased)
//   - Anything else → GenotypeParseError (record is skipped and counted)
//   Two present, differing alleles → heterozygous
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const NO_CALL_TOKENS: [&str; 8] = ["", "-", "--", "00", "??", "NA", ".", ".."];
const VALID_ALLELES: [char; 6] = ['A', 'C', 'G', 'T', 'D', 'I'];

/// Errors that can occur while parsing a genotype token
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenotypeParseError {
    #[error("Invalid genotype length: '{0}' (expected 1 or 2 alleles)")]
    InvalidLength(String),

    #[error("Invalid allele '{allele}' in genotype '{genotype}'")]
    InvalidAllele { genotype: String, allele: char },
}

/// A called genotype of one (haploid) or two alleles
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genotype(String);

impl Genotype {
    /// Parse a genotype token
    ///
    /// # Returns
    /// * `Ok(Some(genotype))` - Valid call
    /// * `Ok(None)` - No-call token
    /// * `Err(GenotypeParseError)` - Unparsable token
    ///
    /// # Examples
    /// ```
    /// use genotype_processor::genotype::Genotype;
    ///
    /// let gt = Genotype::parse("ag").unwrap().unwrap();
    /// assert_eq!(gt.as_str(), "AG");
    /// assert!(gt.is_heterozygous());
    ///
    /// assert_eq!(Genotype::parse("--").unwrap(), None);
    /// assert!(Genotype::parse("AXT").is_err());
    /// ```
    pub fn parse(token: &str) -> Result<Option<Genotype>, GenotypeParseError> {
        let token = token.trim();
        if NO_CALL_TOKENS.contains(&token) {
            return Ok(None);
        }

        let upper = token.to_ascii_uppercase();
        let length = upper.chars().count();
        if length == 0 || length > 2 {
            return Err(GenotypeParseError::InvalidLength(token.to_string()));
        }

        if let Some(allele) = upper.chars().find(|c| !VALID_ALLELES.contains(c)) {
            return Err(GenotypeParseError::InvalidAllele {
                genotype: token.to_string(),
                allele,
            });
        }

        Ok(Some(Genotype(upper)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two present alleles that differ
    pub fn is_heterozygous(&self) -> bool {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    /// Two identical alleles, or a single haploid allele
    pub fn is_homozygous(&self) -> bool {
        !self.is_heterozygous()
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Heterozygosity of an optional call (no-calls are never heterozygous)
pub fn is_heterozygous(genotype: Option<&Genotype>) -> bool {
    genotype.map(Genotype::is_heterozygous).unwrap_or(false)
}

/// Preference rank used when collapsing calls at one locus
///
/// - 2 = called, not heterozygous
/// - 1 = heterozygous
/// - 0 = no-call
pub fn call_rank(genotype: Option<&Genotype>) -> u8 {
    match genotype {
        Some(gt) if gt.is_homozygous() => 2,
        Some(_) => 1,
        None => 0,
    }
}
