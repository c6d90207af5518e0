//! FASTA input.
//!
//! Sequence parsing is delegated to `needletail`, which handles plain
//! and gzip-compressed files. Each input file's MD5 is logged before it
//! is read so the run record identifies the exact inputs.

use std::path::{Path, PathBuf};

use log::info;
use needletail::parse_fastx_file;

use crate::error::Result;
use crate::util::md5sum;

/// One resident sequence.
#[derive(Debug, Clone)]
pub struct FastaSequence {
    pub id: String,
    pub seq: Vec<u8>,
}

impl FastaSequence {
    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Stream sequences from the given files, one record resident at a
/// time, in file order then record order. Used by the scans, which
/// never need more than the current sequence in memory.
pub fn for_each_sequence<F>(files: &[PathBuf], mut f: F) -> Result<()>
where
    F: FnMut(&str, &[u8]) -> Result<()>,
{
    for file in files {
        log_checksum(file)?;
        let mut reader = parse_fastx_file(file)?;
        while let Some(record) = reader.next() {
            let record = record?;
            let id = record_id(record.id());
            f(&id, &record.seq())?;
        }
    }
    Ok(())
}

/// Load every sequence from the given files into memory. Used by the
/// motif search, which runs several independent scans over the same
/// resident dataset.
pub fn read_sequences(files: &[PathBuf]) -> Result<Vec<FastaSequence>> {
    let mut sequences = Vec::new();
    for_each_sequence(files, |id, seq| {
        sequences.push(FastaSequence {
            id: id.to_string(),
            seq: seq.to_vec(),
        });
        Ok(())
    })?;

    let bases: usize = sequences.iter().map(|s| s.len()).sum();
    info!(
        "loaded {} sequences, {} bases total",
        sequences.len(),
        bases
    );
    Ok(sequences)
}

fn log_checksum(file: &Path) -> Result<()> {
    info!("reading FASTA file: {}", file.display());
    info!("  MD5 checksum: {}", md5sum(file)?);
    Ok(())
}

/// First whitespace-delimited token of the record header.
fn record_id(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.split_whitespace().next().unwrap_or("").to_string()
}
