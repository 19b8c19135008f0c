// ==============================================================================
// input.rs - Tab-Delimited Record Reader
// ==============================================================================
// Description: Reads generic four-column genotype files into raw records for
//              the command-line tool
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Format: tab-delimited, '#' comment lines, optional header row
//   rsid    chromosome    position    genotype    [ref_allele]
//   rs4477212    1    82154    AA
// Files ending in .gz are decompressed transparently.
// Rows that cannot be read as records are passed through with an empty rsid
// so the sample counts them as malformed.
// ==============================================================================

use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::RawRecord;

#[derive(Error, Debug)]
pub enum RecordReaderError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Read raw records from a tab-delimited file (optionally gzip compressed)
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>, RecordReaderError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let records = parse_records(reader)?;
    info!("Read {} rows from {:?}", records.len(), path);
    Ok(records)
}

pub fn parse_records<R: Read>(reader: R) -> Result<Vec<RawRecord>, RecordReaderError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let field = |i: usize| row.get(i).map(str::trim).unwrap_or("");

        if row.len() < 4 {
            debug!("Row {} has {} fields; expected at least 4", idx + 1, row.len());
            records.push(RawRecord::new("", field(1), 0, ""));
            continue;
        }

        let pos = match field(2).parse::<u64>() {
            Ok(pos) => pos,
            // Header row
            Err(_) if idx == 0 => continue,
            Err(_) => {
                debug!("Row {}: position '{}' is not a number", idx + 1, field(2));
                0
            }
        };

        let mut record = RawRecord::new(field(0), field(1), pos, field(3));
        let ref_allele = field(4);
        if !ref_allele.is_empty() {
            record.ref_allele = Some(ref_allele.to_string());
        }
        records.push(record);
    }

    Ok(records)
}
