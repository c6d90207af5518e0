//! Contiguous ambiguous-base (N) region detection.
//!
//! Output records use the N_region Sequence Ontology term (SO:0001835),
//! which exists precisely for runs of N bases.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::Result;
use crate::fasta::for_each_sequence;
use crate::gff::GffWriter;
use crate::runs::ambiguous_run_detector;

/// Report contiguous runs of `N`/`n` bases as GFF3 records.
#[derive(Debug, Clone)]
pub struct NRegionsCommand {
    /// Minimum reportable run length.
    pub min_length: u64,
}

impl Default for NRegionsCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl NRegionsCommand {
    pub fn new() -> Self {
        Self { min_length: 1 }
    }

    pub fn with_min_length(mut self, min_length: u64) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn run(&self, fastas: &[PathBuf], output: &Path) -> Result<NRegionsStats> {
        info!("searching for contiguous runs of N");

        let mut writer = GffWriter::create(output)?;
        writer.write_preamble("genomic N regions")?;
        for fasta in fastas {
            writer.write_pragma("fasta", &fasta.display().to_string())?;
        }

        let mut stats = NRegionsStats::default();
        for_each_sequence(fastas, |seqid, seq| {
            stats.sequences += 1;
            let detector = ambiguous_run_detector(self.min_length);
            let positions = seq.iter().enumerate().map(|(i, &b)| (i as u64, b));
            for run in detector.scan(positions) {
                stats.regions += 1;
                let attributes =
                    format!("ID=nregion{};length={}", stats.regions, run.len());
                writer.write_region(
                    seqid,
                    "rivet:n-regions",
                    "N_region",
                    run.start + 1,
                    run.end + 1,
                    &attributes,
                )?;
            }
            Ok(())
        })?;
        writer.flush()?;

        info!(
            "{} N regions reported from {} sequences",
            stats.regions, stats.sequences
        );
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NRegionsStats {
    pub sequences: usize,
    pub regions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_n_regions_output() {
        let mut fasta = NamedTempFile::new().unwrap();
        write!(fasta, ">chr1\nACNNNGTN\n").unwrap();
        fasta.flush().unwrap();
        let out = NamedTempFile::new().unwrap();

        let stats = NRegionsCommand::new()
            .run(&[fasta.path().to_path_buf()], out.path())
            .unwrap();

        assert_eq!(stats.regions, 2);
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert!(text.contains("chr1\trivet:n-regions\tN_region\t3\t6\t.\t.\t.\tID=nregion1;length=3"));
        // Single trailing N is a length-1 run, reported at default minimum.
        assert!(text.contains("chr1\trivet:n-regions\tN_region\t8\t9\t.\t.\t.\tID=nregion2;length=1"));
    }

    #[test]
    fn test_min_length_filter() {
        let mut fasta = NamedTempFile::new().unwrap();
        write!(fasta, ">chr1\nNNACGNNNN\n").unwrap();
        fasta.flush().unwrap();
        let out = NamedTempFile::new().unwrap();

        let stats = NRegionsCommand::new()
            .with_min_length(3)
            .run(&[fasta.path().to_path_buf()], out.path())
            .unwrap();

        assert_eq!(stats.regions, 1);
    }
}
