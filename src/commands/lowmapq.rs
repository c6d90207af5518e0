//! Low average-mapping-quality region detection over pileup view files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::Result;
use crate::gff::GffWriter;
use crate::pileup::{check_file_header, ViewReader, ViewRecord};
use crate::runs::RunDetector;

pub const DEFAULT_THRESHOLD: u32 = 10;
pub const DEFAULT_MIN_LENGTH: u64 = 100;

const PROGRESS_INTERVAL: usize = 10_000_000;

/// Report regions whose per-position average mapping quality stays
/// below a threshold.
///
/// The minimum region length matters: without it the report drowns in
/// very short regions.
#[derive(Debug, Clone)]
pub struct LowMapqCommand {
    /// Positions with average mapq below this are in-region.
    pub threshold: u32,
    /// Minimum reportable region length.
    pub min_length: u64,
}

impl Default for LowMapqCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl LowMapqCommand {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_length: DEFAULT_MIN_LENGTH,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_length(mut self, min_length: u64) -> Self {
        self.min_length = min_length;
        self
    }

    /// Scan the view files in the order given, streaming regions out as
    /// they close. Files run to many gigabytes, so nothing is buffered.
    pub fn run(&self, views: &[PathBuf], output: &Path) -> Result<LowMapqStats> {
        // Every file's header is checked before any file is scanned:
        // failing on file five after hours spent on files one to four
        // is not acceptable.
        info!("checking for required data columns in view files");
        for file in views {
            check_file_header(file)?;
        }
        info!("view files checked: {}", views.len());

        info!("writing low-mapq GFF3 file: {}", output.display());
        let mut writer = GffWriter::create(output)?;
        writer.write_preamble("low average mapping quality regions from pileup view file(s)")?;
        writer.write_pragma("threshold", &self.threshold.to_string())?;
        writer.write_pragma("region-min", &self.min_length.to_string())?;
        for file in views {
            writer.write_pragma("view-file", &file.display().to_string())?;
        }

        let mut stats = LowMapqStats::default();

        for file in views {
            info!("processing file: {}", file.display());
            let mut reader = ViewReader::open(file)?;

            let threshold = self.threshold;
            let mut detector = RunDetector::new(
                self.min_length,
                1,
                move |r: &ViewRecord| r.mapq_avg() < threshold,
                |r: &ViewRecord| r.is_ambiguous(),
                |sum: &mut u64, r: &ViewRecord| *sum += u64::from(r.mapq_avg()),
            );
            let mut last_position = None;

            while let Some(record) = reader.read_record()? {
                if reader.lines_read() % PROGRESS_INTERVAL == 0 {
                    info!("  {} lines processed", reader.lines_read());
                }
                *stats.tally.entry(record.mapq_avg()).or_insert(0) += 1;
                last_position = Some(record.position);

                if let Some(run) = detector.step(record.position, &record) {
                    stats.regions += 1;
                    write_region(&mut writer, &record.reference, &run, stats.regions)?;
                }
            }

            // The final position belongs to the region, so the exclusive
            // end is one past it.
            if let (Some(last), Some(reference)) = (last_position, reader.reference()) {
                if let Some(run) = detector.finish(last + 1) {
                    stats.regions += 1;
                    write_region(&mut writer, reference, &run, stats.regions)?;
                }
            }

            if reader.skipped() > 0 {
                warn!(
                    "  {} lines of {} were short - fewer than 33 fields",
                    reader.skipped(),
                    reader.lines_read()
                );
                stats.skipped_lines += reader.skipped();
            }
            stats.files += 1;
        }
        writer.flush()?;

        stats.log_tally();
        Ok(stats)
    }
}

fn write_region(
    writer: &mut GffWriter<std::fs::File>,
    seqid: &str,
    run: &crate::runs::Run<u64>,
    id: u64,
) -> Result<()> {
    let avg = run.aggregate / run.count.max(1);
    let attributes = format!(
        "ID=lowmapq{};length={};avgmapq={}",
        id,
        run.len(),
        avg
    );
    writer.write_region(seqid, "rivet:low-mapq", "remark", run.start, run.end, &attributes)
}

/// End-of-run accounting for a low-mapq scan.
#[derive(Debug, Clone, Default)]
pub struct LowMapqStats {
    pub files: usize,
    pub regions: u64,
    /// Total short lines skipped across all files.
    pub skipped_lines: usize,
    /// Positions seen per average-mapq value, in sorted mapq order.
    pub tally: BTreeMap<u32, u64>,
}

impl LowMapqStats {
    fn log_tally(&self) {
        let total: u64 = self.tally.values().sum();
        if total == 0 {
            return;
        }
        info!("tally of average mapping quality score (total={}):", total);
        info!("  MapQ\tCount\tPercent");
        for (mapq, count) in &self.tally {
            info!(
                "  {}\t{}\t{:.3}",
                mapq,
                count,
                *count as f64 * 100.0 / total as f64
            );
        }
    }
}
