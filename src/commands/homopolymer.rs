//! Homopolymer detection and tallying.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Result;
use crate::fasta::for_each_sequence;
use crate::gff::GffWriter;
use crate::runs::{base_pairs, homopolymer_detector};

pub const DEFAULT_MIN_LENGTH: u64 = 5;

/// Report stretches of one repeated base as GFF3 records.
#[derive(Debug, Clone)]
pub struct HomopolymerCommand {
    /// Minimum reportable stretch length.
    pub min_length: u64,
}

impl Default for HomopolymerCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl HomopolymerCommand {
    pub fn new() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }

    pub fn with_min_length(mut self, min_length: u64) -> Self {
        self.min_length = min_length;
        self
    }

    /// Scan every sequence in the given FASTA files, streaming a record
    /// out as each qualifying stretch closes.
    pub fn run(&self, fastas: &[PathBuf], output: &Path) -> Result<HomopolymerStats> {
        info!("identifying homopolymers, minimum length {}", self.min_length);

        let mut writer = GffWriter::create(output)?;
        writer.write_preamble("homopolymer regions")?;
        writer.write_pragma("min-length", &self.min_length.to_string())?;
        for fasta in fastas {
            writer.write_pragma("fasta", &fasta.display().to_string())?;
        }

        let mut stats = HomopolymerStats::default();
        for_each_sequence(fastas, |seqid, seq| {
            stats.sequences += 1;
            let detector = homopolymer_detector(self.min_length);
            for run in detector.scan(base_pairs(seq)) {
                stats.regions += 1;
                let attributes = format!(
                    "ID=hpoly{};base={};length={}",
                    stats.regions,
                    run.aggregate as char,
                    run.len()
                );
                writer.write_region(
                    seqid,
                    "rivet:homopolymer",
                    "remark",
                    run.start + 1,
                    run.end + 1,
                    &attributes,
                )?;
            }
            Ok(())
        })?;
        writer.flush()?;

        info!(
            "{} homopolymers reported from {} sequences",
            stats.regions, stats.sequences
        );
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HomopolymerStats {
    pub sequences: usize,
    pub regions: u64,
}

/// Tally homopolymer counts by base and length.
///
/// Every stretch of two or more repeated bases contributes, no minimum
/// filter. Both maps are ordered so the report iterates bases and
/// lengths in sorted order and is byte-for-byte reproducible.
#[derive(Debug, Clone, Default)]
pub struct HomopolymerStatsCommand;

impl HomopolymerStatsCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, fastas: &[PathBuf], output: &Path) -> Result<HomopolymerTally> {
        info!("tallying homopolymers by base and length");

        let mut tally = HomopolymerTally::default();
        for_each_sequence(fastas, |_, seq| {
            let detector = homopolymer_detector(2);
            for run in detector.scan(base_pairs(seq)) {
                tally.add(run.aggregate, run.len());
            }
            Ok(())
        })?;

        info!("writing homopolymer report: {}", output.display());
        let mut writer = BufWriter::new(File::create(output)?);
        tally.write(&mut writer)?;
        writer.flush()?;
        Ok(tally)
    }
}

/// Ordered base x length homopolymer counts.
#[derive(Debug, Clone, Default)]
pub struct HomopolymerTally {
    counts: BTreeMap<u8, BTreeMap<u64, u64>>,
}

impl HomopolymerTally {
    pub fn add(&mut self, base: u8, length: u64) {
        *self
            .counts
            .entry(base)
            .or_default()
            .entry(length)
            .or_insert(0) += 1;
    }

    pub fn count(&self, base: u8, length: u64) -> u64 {
        self.counts
            .get(&base)
            .and_then(|by_len| by_len.get(&length))
            .copied()
            .unwrap_or(0)
    }

    /// Write the tally as a TSV matrix: one row per length, one column
    /// per base, both in sorted order.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bases: Vec<u8> = self.counts.keys().copied().collect();
        let mut lengths: BTreeMap<u64, ()> = BTreeMap::new();
        for by_len in self.counts.values() {
            for &len in by_len.keys() {
                lengths.insert(len, ());
            }
        }

        write!(writer, "Length")?;
        for &base in &bases {
            write!(writer, "\t{}", base as char)?;
        }
        writeln!(writer)?;

        for &length in lengths.keys() {
            write!(writer, "{}", length)?;
            for &base in &bases {
                write!(writer, "\t{}", self.count(base, length))?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use tempfile::NamedTempFile;

    fn fasta_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_homopolymer_command_output() {
        let fasta = fasta_file(">chr1\nGGGGGTACCCCC\n");
        let out = NamedTempFile::new().unwrap();

        let cmd = HomopolymerCommand::new();
        let stats = cmd
            .run(&[fasta.path().to_path_buf()], out.path())
            .unwrap();

        assert_eq!(stats.sequences, 1);
        assert_eq!(stats.regions, 2);

        let text = std::fs::read_to_string(out.path()).unwrap();
        // 1-based half-open coordinates.
        assert!(text.contains("chr1\trivet:homopolymer\tremark\t1\t6\t.\t.\t.\tID=hpoly1;base=G;length=5"));
        assert!(text.contains("chr1\trivet:homopolymer\tremark\t8\t13\t.\t.\t.\tID=hpoly2;base=C;length=5"));
    }

    #[test]
    fn test_homopolymer_below_minimum_not_reported() {
        let fasta = fasta_file(">chr1\nAATTGG\n");
        let out = NamedTempFile::new().unwrap();

        let stats = HomopolymerCommand::new()
            .run(&[fasta.path().to_path_buf()], out.path())
            .unwrap();

        assert_eq!(stats.regions, 0);
    }

    #[test]
    fn test_tally_counts_and_order() {
        let fasta = fasta_file(">chr1\nAAATTAAA\n>chr2\nTT\n");
        let out = NamedTempFile::new().unwrap();

        let tally = HomopolymerStatsCommand::new()
            .run(&[fasta.path().to_path_buf()], out.path())
            .unwrap();

        assert_eq!(tally.count(b'A', 3), 2);
        assert_eq!(tally.count(b'T', 2), 2);

        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Length\tA\tT");
        assert_eq!(lines[1], "2\t0\t2");
        assert_eq!(lines[2], "3\t2\t0");
    }
}
