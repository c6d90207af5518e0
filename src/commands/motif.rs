//! Motif searching over a resident genome.
//!
//! Reverse complements are not searched; callers wanting both strands
//! supply a second pattern matching the reverse complement.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use regex::bytes::Regex;

use crate::error::Result;
use crate::fasta::{read_sequences, FastaSequence};

/// Search one or more patterns against every sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotifCommand;

/// All matches for one pattern, in sequence order.
#[derive(Debug, Clone)]
pub struct PatternHits {
    pub pattern: String,
    pub hits: Vec<MotifHit>,
}

/// A single match. `end` is one past the last matched position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotifHit {
    pub seqid: String,
    pub start: u64,
    pub end: u64,
    pub matched: String,
}

impl MotifCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn run(
        &self,
        fastas: &[PathBuf],
        patterns: &[String],
        output: &Path,
    ) -> Result<MotifStats> {
        // Compiling is cheap and reading a genome is not, so every
        // pattern is validated before any file is touched.
        info!("search terms ({}): {}", patterns.len(), patterns.join(" ; "));
        let mut searches: Vec<(String, Regex)> = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            searches.push((pattern.clone(), Regex::new(pattern)?));
        }

        // Make sure the output file can be created before doing the work.
        let mut writer = BufWriter::new(File::create(output)?);

        let genome = read_sequences(fastas)?;

        // One independent task per pattern over the read-only genome.
        // Each task owns its result list; the collect is the join
        // barrier, and a task panic aborts the whole operation rather
        // than dropping one pattern's results.
        let results: Vec<PatternHits> = searches
            .par_iter()
            .map(|(pattern, regex)| search_genome(&genome, pattern, regex))
            .collect();

        let mut stats = MotifStats::default();
        for result in &results {
            if result.hits.is_empty() {
                warn!("no matches found for pattern {}", result.pattern);
            }
            info!(
                "{} matches found for pattern {}",
                result.hits.len(),
                result.pattern
            );
            writeln!(
                writer,
                "###  Pattern: {} MatchCount: {}  ###",
                result.pattern,
                result.hits.len()
            )?;
            writeln!(writer, "Sequence\tStart\tEnd\tMatch")?;
            for hit in &result.hits {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}",
                    hit.seqid, hit.start, hit.end, hit.matched
                )?;
            }
            stats.matches += result.hits.len();
        }
        writer.flush()?;

        stats.patterns = results.len();
        Ok(stats)
    }
}

fn search_genome(genome: &[FastaSequence], pattern: &str, regex: &Regex) -> PatternHits {
    let mut hits = Vec::new();
    for sequence in genome {
        let before = hits.len();
        for found in regex.find_iter(&sequence.seq) {
            hits.push(MotifHit {
                seqid: sequence.id.clone(),
                start: found.start() as u64,
                end: found.end() as u64,
                matched: String::from_utf8_lossy(found.as_bytes()).into_owned(),
            });
        }
        info!(
            "  found {} matches for pattern {} in sequence {} ({} bases)",
            hits.len() - before,
            pattern,
            sequence.id,
            sequence.len()
        );
    }
    PatternHits {
        pattern: pattern.to_string(),
        hits,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MotifStats {
    pub patterns: usize,
    pub matches: usize,
}
