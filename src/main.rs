// ==============================================================================
// main.rs - Genotype Processor Entry Point
// ==============================================================================
// Description: Command-line front end: reads a genotype file, runs the
//              processing pipeline and prints a JSON summary
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genotype_processor::dedup::DedupReport;
use genotype_processor::input::read_records;
use genotype_processor::merge::MergeStats;
use genotype_processor::remapper::RemapStats;
use genotype_processor::{
    Build, GenotypeProcessor, ProcessorConfig, Providers, ReferenceResources, SampleSummary, Sex,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tab-delimited genotype file (rsid, chromosome, position, genotype)
    #[arg(short, long)]
    input: PathBuf,

    /// Source label (e.g., 23andMe, AncestryDNA)
    #[arg(short, long, default_value = "")]
    source: String,

    /// Declared build (36/37/38, NCBI36, GRCh37, hg19, ...); detected if omitted
    #[arg(short, long)]
    build: Option<Build>,

    /// Reference resource bundle (.json or .json.gz)
    #[arg(short, long, env = "GENOTYPE_RESOURCES")]
    resources: Option<PathBuf>,

    /// Processor configuration (JSON)
    #[arg(short, long, env = "GENOTYPE_PROCESSOR_CONFIG")]
    config: Option<PathBuf>,

    /// Second genotype file merged into the first
    #[arg(long)]
    merge: Option<PathBuf>,

    /// Source label of the merged file
    #[arg(long, default_value = "")]
    merge_source: String,

    /// Remap the processed sample to this build
    #[arg(long)]
    remap: Option<Build>,

    /// Classify the genotyping chip (needs clusters in the bundle)
    #[arg(long)]
    classify_chip: bool,

    /// Report how many SNPs remain after low-quality filtering
    #[arg(long)]
    filter_low_quality: bool,

    /// Treat the sample as male during XY deduplication
    #[arg(long)]
    force_male: bool,
}

#[derive(Serialize)]
struct Report {
    summary: SampleSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    merge: Option<MergeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remap: Option<RemapStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dedup_after_merge: Option<DedupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    high_quality_count: Option<usize>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genotype_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Genotype Processor starting...");

    // Parse command line arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ProcessorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => ProcessorConfig::default(),
    };
    if args.force_male {
        config.dedup.force_male = true;
    }

    let resources = match &args.resources {
        Some(path) => ReferenceResources::open(path)?,
        None => {
            warn!("No resource bundle given; remapping, chip and quality data unavailable");
            ReferenceResources::new()
        }
    };

    let processor = GenotypeProcessor::new(config, Providers::from_resources(resources))
        .context("Invalid processor configuration")?;

    let records = read_records(&args.input)
        .with_context(|| format!("Failed to read genotype file {:?}", args.input))?;
    let mut sample = processor.build_sample(&args.source, records, args.build)?;

    let mut report = Report {
        summary: sample.summary(),
        merge: None,
        remap: None,
        dedup_after_merge: None,
        high_quality_count: None,
    };

    if let Some(path) = &args.merge {
        let records = read_records(path)
            .with_context(|| format!("Failed to read genotype file {:?}", path))?;
        let other = processor.build_sample(&args.merge_source, records, None)?;
        report.merge = Some(processor.merge(&mut sample, other).context("Merge failed")?);
        report.dedup_after_merge = Some(processor.deduplicate(&mut sample)?);
    }

    if let Some(target) = args.remap {
        report.remap = Some(processor.remap(&mut sample, target).context("Remap failed")?);
    }

    if args.classify_chip {
        processor
            .classify_chip(&mut sample)
            .context("Chip classification failed")?;
    }

    if !sample.sex().is_known() {
        // Best effort; too few X calls leaves it unknown
        let sex = processor.determine_sex(&mut sample, "X")?;
        if sex == Sex::Unknown {
            info!("Sex could not be determined");
        }
    }

    if args.filter_low_quality {
        let filtered = processor
            .filter_low_quality(&sample)
            .context("Low-quality filtering failed")?;
        report.high_quality_count = Some(filtered.len());
    }

    report.summary = sample.summary();
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Genotype Processor finished");
    Ok(())
}
