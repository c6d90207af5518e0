//! Multi-file GFF3 merging.
//!
//! Inputs are merged strictly in the order given: the second file is
//! folded onto the first, the third onto that result, and so on. Each
//! file's features are consolidated per sequence first, so the prudent
//! merge always sees internally non-overlapping sides. The merge order
//! is semantically significant because provenance pragmas accumulate in
//! file-processing order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::collection::FeatureSet;
use crate::error::{Error, Result};
use crate::gff::{GffReader, GffWriter};
use crate::interval::Feature;
use crate::prudent::merge_into;
use crate::util::md5sum;

/// Merge two or more GFF3 files with overlap splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeCommand;

impl MergeCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<MergeStats> {
        if inputs.len() < 2 {
            return Err(Error::Config(
                "at least two GFF3 files are required for a merge".to_string(),
            ));
        }

        let mut accumulator: BTreeMap<String, FeatureSet> = BTreeMap::new();
        let mut provenance: Vec<(usize, String, String)> = Vec::new();

        for (index, file) in inputs.iter().enumerate() {
            info!("merging GFF3 file {}: {}", index, file.display());
            let checksum = md5sum(file)?;
            info!("  MD5 checksum: {}", checksum);
            provenance.push((index, file.display().to_string(), checksum));

            let sets = load_consolidated(file)?;
            info!(
                "  this GFF3 file contains {} features over {} sequences",
                sets.values().map(|s| s.len()).sum::<usize>(),
                sets.len()
            );

            for (seqid, set) in sets {
                match accumulator.remove(&seqid) {
                    None => {
                        accumulator.insert(seqid, set);
                    }
                    Some(existing) => {
                        let merged = merge_into(existing, set)?;
                        accumulator.insert(seqid, merged);
                    }
                }
            }

            info!(
                "  merged result contains {} features over {} sequences",
                accumulator.values().map(|s| s.len()).sum::<usize>(),
                accumulator.len()
            );
        }

        info!("GFF3 files merged: {}", inputs.len());
        info!("sequences with features: {}", accumulator.len());
        info!("  Seqid\tCount\tExtent");
        for (seqid, set) in &accumulator {
            info!("  {}\t{}\t{}", seqid, set.len(), set.sum_intervals());
        }

        let mut writer = GffWriter::create(output)?;
        writer.write_preamble("prudent merge of GFF3 files")?;
        for (index, file, checksum) in &provenance {
            writer.write_pragma("merged-gff3-file", &format!("{} {}", index, file))?;
            writer.write_pragma("merged-gff3-md5", &format!("{} {}", index, checksum))?;
        }

        let mut stats = MergeStats {
            files: inputs.len(),
            seqids: accumulator.len(),
            features: 0,
        };
        for set in accumulator.values() {
            for feature in set.features() {
                writer.write_feature(feature)?;
                stats.features += 1;
            }
        }
        writer.flush()?;

        info!("writing complete: {}", output.display());
        Ok(stats)
    }
}

/// Read one GFF3 file into per-sequence sets, sorted and consolidated.
fn load_consolidated(file: &Path) -> Result<BTreeMap<String, FeatureSet>> {
    let mut sets: BTreeMap<String, FeatureSet> = BTreeMap::new();
    for record in GffReader::open(file)?.records() {
        let feature: Feature = record?;
        sets.entry(feature.seqid().to_string())
            .or_insert_with(|| FeatureSet::new(feature.seqid()))
            .push(feature);
    }
    for set in sets.values_mut() {
        set.sort();
        let merged = set.consolidate()?;
        if merged > 0 {
            info!(
                "  consolidated {} overlapping features on {}",
                merged,
                set.seqid()
            );
        }
    }
    Ok(sets)
}

/// End-of-run accounting for a merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeStats {
    pub files: usize,
    pub seqids: usize,
    pub features: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gff_file(records: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "##gff-version 3").unwrap();
        for r in records {
            writeln!(file, "{}", r).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_requires_two_inputs() {
        let one = gff_file(&["chr1\t.\texon\t10\t20\t.\t.\t.\t."]);
        let out = NamedTempFile::new().unwrap();

        let err = MergeCommand::new()
            .run(&[one.path().to_path_buf()], out.path())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_two_file_merge_splits_overlap() {
        let first = gff_file(&["chr1\t.\texon\t10\t20\t.\t.\t.\t."]);
        let second = gff_file(&["chr1\t.\texon\t15\t25\t.\t.\t.\t."]);
        let out = NamedTempFile::new().unwrap();

        let stats = MergeCommand::new()
            .run(
                &[first.path().to_path_buf(), second.path().to_path_buf()],
                out.path(),
            )
            .unwrap();

        assert_eq!(stats.features, 3);
        let text = std::fs::read_to_string(out.path()).unwrap();
        assert!(text.contains("chr1\t.\taccumulator-only\t10\t15"));
        assert!(text.contains("chr1\t.\toverlap\t15\t20"));
        assert!(text.contains("chr1\t.\tincoming-only\t20\t25"));
        assert!(text.contains("##merged-gff3-file 0 "));
        assert!(text.contains("##merged-gff3-file 1 "));
    }

    #[test]
    fn test_merge_consolidates_within_each_file_first() {
        // The two overlapping features in the first file collapse before
        // the cross-file merge, so the prudent sweep sees one interval.
        let first = gff_file(&[
            "chr1\t.\texon\t10\t30\t.\t.\t.\t.",
            "chr1\t.\texon\t20\t40\t.\t.\t.\t.",
        ]);
        let second = gff_file(&["chr1\t.\texon\t35\t50\t.\t.\t.\t."]);
        let out = NamedTempFile::new().unwrap();

        let stats = MergeCommand::new()
            .run(
                &[first.path().to_path_buf(), second.path().to_path_buf()],
                out.path(),
            )
            .unwrap();

        // [10,40) vs [35,50): accumulator-only, overlap, incoming-only.
        assert_eq!(stats.features, 3);
    }

    #[test]
    fn test_sequences_kept_separate() {
        let first = gff_file(&["chr1\t.\texon\t10\t20\t.\t.\t.\t."]);
        let second = gff_file(&["chr2\t.\texon\t10\t20\t.\t.\t.\t."]);
        let out = NamedTempFile::new().unwrap();

        let stats = MergeCommand::new()
            .run(
                &[first.path().to_path_buf(), second.path().to_path_buf()],
                out.path(),
            )
            .unwrap();

        assert_eq!(stats.seqids, 2);
        assert_eq!(stats.features, 2);
        let text = std::fs::read_to_string(out.path()).unwrap();
        // No cross-file merge happened for either sequence, so both
        // features come through with their original categories.
        assert!(text.contains("chr1\t.\texon\t10\t20"));
        assert!(text.contains("chr2\t.\texon\t10\t20"));
    }

    #[test]
    fn test_three_file_sequential_merge() {
        let first = gff_file(&["chr1\t.\ta\t0\t10\t.\t.\t.\t."]);
        let second = gff_file(&["chr1\t.\tb\t5\t15\t.\t.\t.\t."]);
        let third = gff_file(&["chr1\t.\tc\t100\t110\t.\t.\t.\t."]);
        let out = NamedTempFile::new().unwrap();

        let stats = MergeCommand::new()
            .run(
                &[
                    first.path().to_path_buf(),
                    second.path().to_path_buf(),
                    third.path().to_path_buf(),
                ],
                out.path(),
            )
            .unwrap();

        // Round one: [0,5) [5,10) [10,15). Round two adds [100,110).
        assert_eq!(stats.features, 4);
    }
}
