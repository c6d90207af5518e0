//! RIVET: Run and InterVal Extraction Toolkit
//!
//! Usage: rivet <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use log::{error, info, Level};
use simple_logger::init_with_level;
use std::path::PathBuf;
use std::process;

use rivet_genomics::commands::{
    Direction, HomopolymerCommand, HomopolymerStatsCommand, LowMapqCommand, MergeCommand,
    MotifCommand, NRegionsCommand, ReadDepthCommand,
};
use rivet_genomics::error::{Error, Result};
use rivet_genomics::util::consolidate_file_list;

#[derive(Parser)]
#[command(name = "rivet")]
#[command(version)]
#[command(
    about = "RIVET: Run and InterVal Extraction Toolkit - region detection and interval consolidation",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report homopolymer stretches in FASTA sequences as GFF3
    Homopolymer {
        /// Input FASTA file(s), plain or gzip
        #[arg(long = "fasta", required = true)]
        fasta: Vec<PathBuf>,

        /// Minimum reportable stretch length
        #[arg(long = "min-length", default_value_t = 5)]
        min_length: u64,

        /// Output GFF3 file of homopolymer regions
        #[arg(long = "gff3")]
        gff3: PathBuf,
    },

    /// Tally homopolymer counts by base and length
    HomopolymerStats {
        /// Input FASTA file(s), plain or gzip
        #[arg(long = "fasta", required = true)]
        fasta: Vec<PathBuf>,

        /// Text output file for the tally matrix
        #[arg(long = "outfile")]
        outfile: PathBuf,
    },

    /// Report contiguous runs of N bases as GFF3
    NRegions {
        /// Input FASTA file(s), plain or gzip
        #[arg(long = "fasta", required = true)]
        fasta: Vec<PathBuf>,

        /// Minimum reportable run length
        #[arg(long = "min-length", default_value_t = 1)]
        min_length: u64,

        /// Output GFF3 file of N regions
        #[arg(long = "gff3")]
        gff3: PathBuf,
    },

    /// Report regions of low average mapping quality from pileup view files
    LowMapq {
        /// Pileup view file(s)
        #[arg(long = "view")]
        view: Vec<PathBuf>,

        /// Text file listing pileup view files
        #[arg(long = "viewlist")]
        viewlist: Option<PathBuf>,

        /// Positions with average mapq below this are reported
        #[arg(long = "threshold", default_value_t = 10)]
        threshold: u32,

        /// Minimum reportable region length
        #[arg(long = "region-min", default_value_t = 100)]
        region_min: u64,

        /// Output GFF3 file of regions
        #[arg(long = "gff3")]
        gff3: PathBuf,
    },

    /// Report regions of unusual read depth from pileup view files
    ReadDepth {
        /// Pileup view file(s)
        #[arg(long = "view")]
        view: Vec<PathBuf>,

        /// Text file listing pileup view files
        #[arg(long = "viewlist")]
        viewlist: Option<PathBuf>,

        /// Read-depth threshold
        #[arg(long = "threshold")]
        threshold: u32,

        /// Report positions above the threshold
        #[arg(long = "above")]
        above: bool,

        /// Report positions below the threshold
        #[arg(long = "below")]
        below: bool,

        /// Number of datasets contributing to the summed depth columns
        #[arg(long = "dataset-count")]
        dataset_count: u32,

        /// Minimum reportable region length
        #[arg(long = "region-min", default_value_t = 100)]
        region_min: u64,

        /// Output GFF3 file of regions
        #[arg(long = "gff3")]
        gff3: PathBuf,
    },

    /// Merge and consolidate two or more GFF3 files
    Merge {
        /// GFF3 files to merge, in merge order
        #[arg(long = "gff3", required = true)]
        gff3: Vec<PathBuf>,

        /// Output GFF3 file
        #[arg(long = "out-gff3")]
        out_gff3: PathBuf,
    },

    /// Search for motifs (regular expressions) in FASTA sequences
    Motif {
        /// Input FASTA file(s), plain or gzip
        #[arg(long = "fasta", required = true)]
        fasta: Vec<PathBuf>,

        /// Regular expression(s) to search for
        #[arg(long = "regex", required = true)]
        regex: Vec<String>,

        /// Text output file for motif locations
        #[arg(long = "outfile")]
        outfile: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::Debug } else { Level::Info };
    if let Err(e) = init_with_level(level) {
        eprintln!("failed to initialise logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(cli.command) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Homopolymer {
            fasta,
            min_length,
            gff3,
        } => {
            info!("  --min-length {}", min_length);
            let stats = HomopolymerCommand::new()
                .with_min_length(min_length)
                .run(&fasta, &gff3)?;
            info!("regions written: {}", stats.regions);
        }

        Commands::HomopolymerStats { fasta, outfile } => {
            HomopolymerStatsCommand::new().run(&fasta, &outfile)?;
        }

        Commands::NRegions {
            fasta,
            min_length,
            gff3,
        } => {
            info!("  --min-length {}", min_length);
            let stats = NRegionsCommand::new()
                .with_min_length(min_length)
                .run(&fasta, &gff3)?;
            info!("regions written: {}", stats.regions);
        }

        Commands::LowMapq {
            view,
            viewlist,
            threshold,
            region_min,
            gff3,
        } => {
            info!("  --threshold {}", threshold);
            info!("  --region-min {}", region_min);
            let views = consolidate_file_list(viewlist.as_deref(), &view)?;
            if views.is_empty() {
                return Err(Error::Config(
                    "no view files supplied via --view or --viewlist".to_string(),
                ));
            }
            let stats = LowMapqCommand::new()
                .with_threshold(threshold)
                .with_min_length(region_min)
                .run(&views, &gff3)?;
            info!(
                "regions written: {} ({} short lines skipped)",
                stats.regions, stats.skipped_lines
            );
        }

        Commands::ReadDepth {
            view,
            viewlist,
            threshold,
            above,
            below,
            dataset_count,
            region_min,
            gff3,
        } => {
            let direction = match (above, below) {
                (true, false) => Direction::Above,
                (false, true) => Direction::Below,
                _ => {
                    return Err(Error::Config(
                        "exactly one of --above and --below must be specified".to_string(),
                    ))
                }
            };
            info!("  --{} {}", direction, threshold);
            info!("  --region-min {}", region_min);
            info!("  --dataset-count {}", dataset_count);
            let views = consolidate_file_list(viewlist.as_deref(), &view)?;
            if views.is_empty() {
                return Err(Error::Config(
                    "no view files supplied via --view or --viewlist".to_string(),
                ));
            }
            let stats = ReadDepthCommand::new(threshold, direction, dataset_count)
                .with_min_length(region_min)
                .run(&views, &gff3)?;
            info!(
                "regions written: {} ({} short lines skipped)",
                stats.regions, stats.skipped_lines
            );
        }

        Commands::Merge { gff3, out_gff3 } => {
            let stats = MergeCommand::new().run(&gff3, &out_gff3)?;
            info!(
                "merged {} files into {} features over {} sequences",
                stats.files, stats.features, stats.seqids
            );
        }

        Commands::Motif {
            fasta,
            regex,
            outfile,
        } => {
            let stats = MotifCommand::new().run(&fasta, &regex, &outfile)?;
            info!(
                "{} matches written for {} patterns",
                stats.matches, stats.patterns
            );
        }
    }
    Ok(())
}
