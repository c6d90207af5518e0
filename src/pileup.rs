//! The 33-column pileup "view" report format.
//!
//! Per-position records carry forward and reverse sub-counts for bases,
//! qualities and read classification. The column layout is fixed: every
//! input file must open with exactly the expected header line, checked
//! before any data is scanned because the files run to many gigabytes
//! and a layout mismatch must not surface hours into a run.
//!
//! Only the columns the region scans consume are parsed out of each
//! line; everything else is skipped without allocation.

use std::path::Path;

use memchr::memchr_iter;

use crate::error::{Error, Result};
use crate::util::open_text;

/// Number of columns in a view report line.
pub const FIELD_COUNT: usize = 33;

/// Column names in required order.
pub const HEADER_FIELDS: [&str; FIELD_COUNT] = [
    "Reference",
    "Position",
    "Ref_base",
    "A_for",
    "C_for",
    "G_for",
    "T_for",
    "N_for",
    "Aqual_for",
    "Cqual_for",
    "Gqual_for",
    "Tqual_for",
    "Nqual_for",
    "MapQual_for",
    "ReferenceNo_for",
    "NonreferenceNo_for",
    "HighNonreference_for",
    "LowReadCount_for",
    "A_rev",
    "C_rev",
    "G_rev",
    "T_rev",
    "N_rev",
    "Aqual_rev",
    "Cqual_rev",
    "Gqual_rev",
    "Tqual_rev",
    "Nqual_rev",
    "MapQual_rev",
    "ReferenceNo_rev",
    "NonreferenceNo_rev",
    "HighNonreference_rev",
    "LowReadCount_rev",
];

// Indices of the columns the scans consume.
pub const REFERENCE: usize = 0;
pub const POSITION: usize = 1;
pub const REF_BASE: usize = 2;
pub const MAPQUAL_FOR: usize = 13;
pub const REFERENCE_NO_FOR: usize = 14;
pub const NONREFERENCE_NO_FOR: usize = 15;
pub const MAPQUAL_REV: usize = 28;
pub const REFERENCE_NO_REV: usize = 29;
pub const NONREFERENCE_NO_REV: usize = 30;

/// The exact header line a view report must start with.
pub fn expected_header() -> String {
    format!("## {}", HEADER_FIELDS.join("\t"))
}

/// Check that a view file opens with the expected column-name line.
///
/// Called for every input file before any file is processed: scanning is
/// expensive and a bad file must fail the batch up front, not after the
/// preceding files have already been chewed through.
pub fn check_file_header(path: &Path) -> Result<()> {
    let mut reader = open_text(path)?;
    let expected = expected_header();

    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes > 0 && line.trim_end() == expected {
        return Ok(());
    }
    Err(Error::HeaderMismatch {
        file: path.display().to_string(),
        expected,
    })
}

/// One parsed per-position record, reduced to the fields the scans use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRecord {
    pub reference: String,
    pub position: u64,
    pub ref_base: u8,
    /// Summed forward and reverse mapping quality.
    pub mapq_sum: u64,
    /// Total read depth: reference plus non-reference, both strands.
    pub depth: u64,
}

impl ViewRecord {
    /// True for an ambiguous reference base, which hard-stops any region.
    #[inline]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.ref_base, b'N' | b'n')
    }

    /// Average mapping quality at this position, rounded to the nearest
    /// integer. A position with zero depth is exactly 0 — dividing here
    /// would not trap but would produce a garbage extreme value.
    #[inline]
    pub fn mapq_avg(&self) -> u32 {
        if self.depth == 0 {
            return 0;
        }
        (self.mapq_sum as f64 / self.depth as f64).round() as u32
    }

    /// Read depth normalised by the number of contributing datasets.
    #[inline]
    pub fn depth_per_dataset(&self, dataset_count: u32) -> f64 {
        self.depth as f64 / dataset_count as f64
    }
}

/// Streaming reader over the data lines of one view file.
///
/// Comment lines are skipped. Lines with fewer than 33 fields cannot be
/// indexed safely, so they are skipped and counted rather than parsed;
/// the count is surfaced through [`skipped`] and must be reported by the
/// caller. A field that fails numeric conversion is fatal, since
/// substituting a default would corrupt the region aggregates. A view
/// file describes one reference sequence by construction; a second
/// reference name appearing mid-file is fatal.
///
/// [`skipped`]: ViewReader::skipped
pub struct ViewReader {
    reader: Box<dyn std::io::BufRead>,
    file: String,
    line_number: usize,
    buffer: String,
    reference: Option<String>,
    skipped: usize,
}

impl ViewReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: open_text(path)?,
            file: path.display().to_string(),
            line_number: 0,
            buffer: String::with_capacity(512),
            reference: None,
            skipped: 0,
        })
    }

    /// Count of short lines skipped so far.
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Lines consumed so far, headers and skipped lines included.
    #[inline]
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    /// The reference sequence seen on the records so far.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Read the next data record, or `None` at end of file.
    pub fn read_record(&mut self) -> Result<Option<ViewRecord>> {
        loop {
            self.buffer.clear();
            let bytes = self.reader.read_line(&mut self.buffer)?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields: [&str; FIELD_COUNT] = [""; FIELD_COUNT];
            if !split_fields(line, &mut fields) {
                self.skipped += 1;
                continue;
            }

            let record = self.parse_fields(&fields)?;

            if let Some(previous) = &self.reference {
                if *previous != record.reference {
                    return Err(Error::MultipleReferences {
                        file: self.file.clone(),
                        line: self.line_number,
                        previous: previous.clone(),
                        found: record.reference,
                    });
                }
            } else {
                self.reference = Some(record.reference.clone());
            }

            return Ok(Some(record));
        }
    }

    fn parse_fields(&self, fields: &[&str; FIELD_COUNT]) -> Result<ViewRecord> {
        let mapq_for = self.parse_u64(fields[MAPQUAL_FOR], "MapQual_for")?;
        let mapq_rev = self.parse_u64(fields[MAPQUAL_REV], "MapQual_rev")?;
        let ref_for = self.parse_u64(fields[REFERENCE_NO_FOR], "ReferenceNo_for")?;
        let nonref_for = self.parse_u64(fields[NONREFERENCE_NO_FOR], "NonreferenceNo_for")?;
        let ref_rev = self.parse_u64(fields[REFERENCE_NO_REV], "ReferenceNo_rev")?;
        let nonref_rev = self.parse_u64(fields[NONREFERENCE_NO_REV], "NonreferenceNo_rev")?;

        Ok(ViewRecord {
            reference: fields[REFERENCE].to_string(),
            position: self.parse_u64(fields[POSITION], "Position")?,
            ref_base: fields[REF_BASE].bytes().next().unwrap_or(b'N'),
            mapq_sum: mapq_for + mapq_rev,
            depth: ref_for + nonref_for + ref_rev + nonref_rev,
        })
    }

    fn parse_u64(&self, text: &str, name: &str) -> Result<u64> {
        text.parse().map_err(|_| Error::Parse {
            file: self.file.clone(),
            line: self.line_number,
            message: format!("error converting {}: '{}'", name, text),
        })
    }
}

/// Split a line on tabs into exactly `FIELD_COUNT` leading fields.
/// Returns false when the line is short. Extra trailing columns are
/// tolerated and ignored.
fn split_fields<'a>(line: &'a str, out: &mut [&'a str; FIELD_COUNT]) -> bool {
    let bytes = line.as_bytes();
    let mut field = 0;
    let mut start = 0;
    for tab in memchr_iter(b'\t', bytes) {
        if field == FIELD_COUNT {
            return true;
        }
        out[field] = &line[start..tab];
        field += 1;
        start = tab + 1;
    }
    if field < FIELD_COUNT {
        out[field] = &line[start..];
        field += 1;
    }
    field == FIELD_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Build a full view line with the given leading columns and zeros
    /// in the ones the tests don't care about.
    fn view_line(
        reference: &str,
        position: u64,
        ref_base: char,
        mapq_for: u64,
        mapq_rev: u64,
        depth_each: u64,
    ) -> String {
        let mut fields = vec!["0".to_string(); FIELD_COUNT];
        fields[REFERENCE] = reference.to_string();
        fields[POSITION] = position.to_string();
        fields[REF_BASE] = ref_base.to_string();
        fields[MAPQUAL_FOR] = mapq_for.to_string();
        fields[MAPQUAL_REV] = mapq_rev.to_string();
        fields[REFERENCE_NO_FOR] = depth_each.to_string();
        fields[NONREFERENCE_NO_FOR] = depth_each.to_string();
        fields[REFERENCE_NO_REV] = depth_each.to_string();
        fields[NONREFERENCE_NO_REV] = depth_each.to_string();
        fields.join("\t")
    }

    fn view_file(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", expected_header()).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_header_check_accepts_expected() {
        let file = view_file(&[]);
        check_file_header(file.path()).unwrap();
    }

    #[test]
    fn test_header_check_rejects_mismatch() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "## Reference\tPosition").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            check_file_header(file.path()),
            Err(Error::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_header_check_rejects_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            check_file_header(file.path()),
            Err(Error::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_read_record_fields() {
        let file = view_file(&[view_line("chr1", 101, 'A', 120, 80, 2)]);
        let mut reader = ViewReader::open(file.path()).unwrap();

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.reference, "chr1");
        assert_eq!(record.position, 101);
        assert_eq!(record.ref_base, b'A');
        assert_eq!(record.mapq_sum, 200);
        assert_eq!(record.depth, 8);
        assert_eq!(record.mapq_avg(), 25);
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_zero_depth_mapq_is_zero() {
        let file = view_file(&[view_line("chr1", 1, 'A', 99, 99, 0)]);
        let mut reader = ViewReader::open(file.path()).unwrap();

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.depth, 0);
        assert_eq!(record.mapq_avg(), 0);
    }

    #[test]
    fn test_short_lines_skipped_and_counted() {
        let file = view_file(&[
            "chr1\t1\tA".to_string(),
            view_line("chr1", 2, 'C', 10, 10, 1),
        ]);
        let mut reader = ViewReader::open(file.path()).unwrap();

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.position, 2);
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn test_numeric_garbage_is_fatal() {
        let mut bad = view_line("chr1", 5, 'A', 10, 10, 1);
        bad = bad.replace("\t10\t", "\tten\t");
        let file = view_file(&[bad]);
        let mut reader = ViewReader::open(file.path()).unwrap();

        assert!(matches!(
            reader.read_record(),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_second_reference_is_fatal() {
        let file = view_file(&[
            view_line("chr1", 1, 'A', 10, 10, 1),
            view_line("chr2", 1, 'A', 10, 10, 1),
        ]);
        let mut reader = ViewReader::open(file.path()).unwrap();

        reader.read_record().unwrap().unwrap();
        assert!(matches!(
            reader.read_record(),
            Err(Error::MultipleReferences { .. })
        ));
    }

    #[test]
    fn test_depth_per_dataset() {
        let file = view_file(&[view_line("chr1", 1, 'A', 0, 0, 3)]);
        let mut reader = ViewReader::open(file.path()).unwrap();

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.depth, 12);
        assert!((record.depth_per_dataset(4) - 3.0).abs() < f64::EPSILON);
    }
}
