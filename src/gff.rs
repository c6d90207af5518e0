//! Streaming GFF3-style reader and writer.
//!
//! Records are nine tab-separated columns: seqid, source, type, start,
//! end, score, strand, phase, attributes. Missing values are `.`.
//! Coordinates follow this toolkit's convention of half-open ranges
//! (the start position is within the feature, the end position is the
//! first past it); every output file carries a `##format` pragma saying
//! so. Attributes are `key=value` pairs joined with `;`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::interval::{Feature, Strand};
use crate::util::open_text;

const FORMAT_PRAGMA: &str = "1-based half-open";

/// A streaming reader over GFF3-style feature lines.
///
/// Header and comment lines (`#`-prefixed) are skipped. Records with
/// fewer than eight columns, a non-numeric coordinate or score, or an
/// empty range are parse errors: a malformed annotation is fatal here
/// because substituting defaults would corrupt every merge downstream.
pub struct GffReader {
    reader: Box<dyn std::io::BufRead>,
    file: String,
    line_number: usize,
    buffer: String,
}

impl GffReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: open_text(path)?,
            file: path.display().to_string(),
            line_number: 0,
            buffer: String::with_capacity(1024),
        })
    }

    /// Read the next feature record, or `None` at end of file.
    pub fn read_record(&mut self) -> Result<Option<Feature>> {
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
            return self.parse_line(line).map(Some);
        }
    }

    fn parse_line(&self, line: &str) -> Result<Feature> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(self.parse_error(format!(
                "expected at least 8 fields, got {}",
                fields.len()
            )));
        }

        let start = self.parse_coord(fields[3], "start")?;
        let end = self.parse_coord(fields[4], "end")?;
        if start >= end {
            return Err(Error::InvalidInterval {
                seqid: fields[0].to_string(),
                start,
                end,
            });
        }

        let mut feature = Feature::new(fields[0], start, end);
        feature.source = missing(fields[1]);
        feature.category = missing(fields[2]);
        feature.score = match fields[5] {
            "." | "" => None,
            text => Some(text.parse().map_err(|_| {
                self.parse_error(format!("invalid score: '{}'", text))
            })?),
        };
        feature.strand = fields[6].chars().next().map(Strand::from_char).unwrap_or_default();
        feature.phase = missing(fields[7]);
        if let Some(attrs) = fields.get(8) {
            for pair in attrs.split(';') {
                let pair = pair.trim();
                if pair.is_empty() {
                    continue;
                }
                match pair.split_once('=') {
                    Some((key, value)) => {
                        feature
                            .attributes
                            .insert(key.trim().to_string(), value.trim().to_string());
                    }
                    None => {
                        feature.attributes.insert(pair.to_string(), String::new());
                    }
                }
            }
        }

        Ok(feature)
    }

    fn parse_coord(&self, text: &str, name: &str) -> Result<u64> {
        text.parse().map_err(|_| {
            self.parse_error(format!("invalid {} position: '{}'", name, text))
        })
    }

    fn parse_error(&self, message: String) -> Error {
        Error::Parse {
            file: self.file.clone(),
            line: self.line_number,
            message,
        }
    }

    /// Iterator over all records.
    pub fn records(self) -> GffRecordIter {
        GffRecordIter { reader: self }
    }
}

/// Iterator over GFF records.
pub struct GffRecordIter {
    reader: GffReader,
}

impl Iterator for GffRecordIter {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record() {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Buffered GFF3 writer. Regions are written as they close, one at a
/// time, so the full output set never sits in memory; coordinates go
/// through an `itoa` buffer to keep the per-record cost down on
/// multi-gigabyte scans.
pub struct GffWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl GffWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> GffWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: BufWriter::new(output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Write the `##gff-version` line and the coordinate-format pragma.
    pub fn write_preamble(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "##gff-version 3")?;
        writeln!(self.writer, "##content {}", content)?;
        writeln!(self.writer, "##format {}", FORMAT_PRAGMA)?;
        Ok(())
    }

    /// Write a `##key value` pragma line.
    pub fn write_pragma(&mut self, key: &str, value: &str) -> Result<()> {
        writeln!(self.writer, "##{} {}", key, value)?;
        Ok(())
    }

    /// Write one detected region. Score, strand and phase are missing
    /// for regions; `attributes` is the preassembled attribute column.
    pub fn write_region(
        &mut self,
        seqid: &str,
        source: &str,
        category: &str,
        start: u64,
        end: u64,
        attributes: &str,
    ) -> Result<()> {
        self.writer.write_all(seqid.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(source.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(category.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(start).as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(end).as_bytes())?;
        self.writer.write_all(b"\t.\t.\t.\t")?;
        self.writer.write_all(attributes.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write a full feature record.
    pub fn write_feature(&mut self, feature: &Feature) -> Result<()> {
        let score = match feature.score {
            Some(s) => s.to_string(),
            None => ".".to_string(),
        };
        let attributes = attribute_string(feature);
        writeln!(
            self.writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            feature.seqid(),
            feature.source.as_deref().unwrap_or("."),
            feature.category.as_deref().unwrap_or("."),
            feature.start(),
            feature.end(),
            score,
            feature.strand,
            feature.phase.as_deref().unwrap_or("."),
            attributes,
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// The attribute column in key-sorted order, `.` when empty. Sorted
/// iteration keeps output deterministic even when inputs listed the
/// attributes differently.
pub fn attribute_string(feature: &Feature) -> String {
    if feature.attributes.is_empty() {
        return ".".to_string();
    }
    feature
        .attributes
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

fn missing(field: &str) -> Option<String> {
    match field {
        "." | "" => None,
        text => Some(text.to_string()),
    }
}

/// Read all features from a GFF3 file.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    GffReader::open(path)?.records().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_basic_record() {
        let file = write_temp(
            "##gff-version 3\n\
             chr1\ttest\texon\t100\t200\t4.5\t+\t.\tID=x1;gene=BRCA1\n",
        );
        let features = read_features(file.path()).unwrap();

        assert_eq!(features.len(), 1);
        let f = &features[0];
        assert_eq!(f.seqid(), "chr1");
        assert_eq!(f.start(), 100);
        assert_eq!(f.end(), 200);
        assert_eq!(f.source.as_deref(), Some("test"));
        assert_eq!(f.category.as_deref(), Some("exon"));
        assert_eq!(f.score, Some(4.5));
        assert_eq!(f.strand, Strand::Plus);
        assert_eq!(f.attributes.get("gene").map(String::as_str), Some("BRCA1"));
    }

    #[test]
    fn test_read_missing_fields() {
        let file = write_temp("chr1\t.\t.\t5\t10\t.\t.\t.\t.\n");
        let features = read_features(file.path()).unwrap();

        let f = &features[0];
        assert_eq!(f.source, None);
        assert_eq!(f.category, None);
        assert_eq!(f.score, None);
        assert_eq!(f.strand, Strand::Unknown);
        assert!(f.attributes.is_empty());
    }

    #[test]
    fn test_short_record_is_fatal() {
        let file = write_temp("chr1\t100\t200\n");
        assert!(matches!(
            read_features(file.path()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_bad_coordinate_is_fatal() {
        let file = write_temp("chr1\t.\t.\tabc\t10\t.\t.\t.\t.\n");
        assert!(matches!(
            read_features(file.path()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_length_is_rejected() {
        let file = write_temp("chr1\t.\t.\t10\t10\t.\t.\t.\t.\n");
        assert!(matches!(
            read_features(file.path()),
            Err(Error::InvalidInterval { .. })
        ));
    }

    #[test]
    fn test_write_region_columns() {
        let mut out = Vec::new();
        {
            let mut writer = GffWriter::new(&mut out);
            writer
                .write_region("chr1", "rivet:test", "remark", 101, 111, "ID=r1;length=10")
                .unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "chr1\trivet:test\tremark\t101\t111\t.\t.\t.\tID=r1;length=10\n"
        );
    }

    #[test]
    fn test_feature_roundtrip() {
        let mut feature = Feature::new("chr2", 50, 80);
        feature.source = Some("merge".to_string());
        feature.category = Some("overlap".to_string());
        feature
            .attributes
            .insert("b".to_string(), "2".to_string());
        feature
            .attributes
            .insert("a".to_string(), "1".to_string());

        let mut out = Vec::new();
        {
            let mut writer = GffWriter::new(&mut out);
            writer.write_feature(&feature).unwrap();
            writer.flush().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        // Attributes come out in key order regardless of insertion order.
        assert_eq!(text, "chr2\tmerge\toverlap\t50\t80\t.\t.\t.\ta=1;b=2\n");

        let file = write_temp(&text);
        let back = read_features(file.path()).unwrap();
        assert_eq!(back[0], feature);
    }
}
