//! Abnormal read-depth region detection over pileup view files.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{Error, Result};
use crate::gff::GffWriter;
use crate::pileup::{check_file_header, ViewReader, ViewRecord};
use crate::runs::RunDetector;

pub const DEFAULT_MIN_LENGTH: u64 = 100;

const PROGRESS_INTERVAL: usize = 10_000_000;

/// Which side of the threshold counts as in-region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Above => write!(f, "above"),
            Direction::Below => write!(f, "below"),
        }
    }
}

/// Report regions whose normalised read depth sits above or below a
/// threshold.
///
/// View files sum depth over every contributing dataset, so the raw
/// depth is divided by `dataset_count` before the comparison.
#[derive(Debug, Clone)]
pub struct ReadDepthCommand {
    pub threshold: u32,
    pub direction: Direction,
    /// Number of datasets contributing to the summed depth columns.
    pub dataset_count: u32,
    /// Minimum reportable region length.
    pub min_length: u64,
}

impl ReadDepthCommand {
    pub fn new(threshold: u32, direction: Direction, dataset_count: u32) -> Self {
        Self {
            threshold,
            direction,
            dataset_count,
            min_length: DEFAULT_MIN_LENGTH,
        }
    }

    pub fn with_min_length(mut self, min_length: u64) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn run(&self, views: &[PathBuf], output: &Path) -> Result<ReadDepthStats> {
        if self.dataset_count == 0 {
            return Err(Error::Config(
                "dataset count must be at least 1".to_string(),
            ));
        }

        info!("checking for required data columns in view files");
        for file in views {
            check_file_header(file)?;
        }
        info!("view files checked: {}", views.len());

        info!("writing read-depth GFF3 file: {}", output.display());
        let mut writer = GffWriter::create(output)?;
        writer.write_preamble(&format!(
            "regions where average read depth is {} threshold - from pileup view file(s)",
            self.direction
        ))?;
        writer.write_pragma("threshold", &self.threshold.to_string())?;
        writer.write_pragma("region-min", &self.min_length.to_string())?;
        writer.write_pragma("dataset-count", &self.dataset_count.to_string())?;
        for file in views {
            writer.write_pragma("view-file", &file.display().to_string())?;
        }

        let mut stats = ReadDepthStats::default();

        for file in views {
            info!("processing file: {}", file.display());
            let mut reader = ViewReader::open(file)?;

            let threshold = f64::from(self.threshold);
            let dataset_count = self.dataset_count;
            let direction = self.direction;
            let mut detector = RunDetector::new(
                self.min_length,
                1,
                move |r: &ViewRecord| {
                    let normalised = r.depth_per_dataset(dataset_count);
                    match direction {
                        Direction::Above => normalised > threshold,
                        Direction::Below => normalised < threshold,
                    }
                },
                |r: &ViewRecord| r.is_ambiguous(),
                |sum: &mut u64, r: &ViewRecord| *sum += r.depth,
            );
            let mut last_position = None;

            while let Some(record) = reader.read_record()? {
                if reader.lines_read() % PROGRESS_INTERVAL == 0 {
                    info!("  {} lines processed", reader.lines_read());
                }
                last_position = Some(record.position);

                if let Some(run) = detector.step(record.position, &record) {
                    stats.regions += 1;
                    self.write_region(&mut writer, &record.reference, &run, stats.regions)?;
                }
            }

            if let (Some(last), Some(reference)) = (last_position, reader.reference()) {
                if let Some(run) = detector.finish(last + 1) {
                    stats.regions += 1;
                    self.write_region(&mut writer, reference, &run, stats.regions)?;
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

        info!("{} read-depth regions reported", stats.regions);
        Ok(stats)
    }

    fn write_region(
        &self,
        writer: &mut GffWriter<std::fs::File>,
        seqid: &str,
        run: &crate::runs::Run<u64>,
        id: u64,
    ) -> Result<()> {
        // The aggregate sums depth over every position and dataset, so
        // the reported average divides by both.
        let avg = run.aggregate / run.count.max(1) / u64::from(self.dataset_count);
        let attributes = format!(
            "ID=readdepth{};test={}-{};length={};avgdepth={}",
            id,
            self.direction,
            self.threshold,
            run.len(),
            avg
        );
        writer.write_region(seqid, "rivet:read-depth", "remark", run.start, run.end, &attributes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadDepthStats {
    pub files: usize,
    pub regions: u64,
    pub skipped_lines: usize,
}
