//! Shared file helpers: transparent gzip opening, checksums and
//! file-list handling.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::warn;
use md5::{Digest, Md5};

use crate::error::Result;

/// Open a text file for forward-only buffered reading, decompressing on
/// the fly when the file name ends in `.gz` (case-insensitive).
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let gzipped = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// MD5 hash of a file, hex encoded. Logged against input files so a run
/// record identifies exactly which inputs were processed.
pub fn md5sum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Read a file into trimmed, non-empty lines.
pub fn lines_from_file(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Combine a file-of-filenames with directly supplied paths, preserving
/// order and dropping duplicates with a warning.
pub fn consolidate_file_list(
    list_file: Option<&Path>,
    files: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(list) = list_file {
        candidates.extend(lines_from_file(list)?.into_iter().map(PathBuf::from));
    }
    candidates.extend(files.iter().cloned());

    let mut seen: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(candidates.len());
    for file in candidates {
        if seen.insert(file.clone()) {
            unique.push(file);
        } else {
            warn!("duplicate file specified: {}", file.display());
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_md5sum() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "hello world").unwrap();
        file.flush().unwrap();

        // Well-known digest of "hello world".
        assert_eq!(
            md5sum(file.path()).unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_consolidate_file_list_dedups() {
        let mut list = NamedTempFile::new().unwrap();
        writeln!(list, "a.txt").unwrap();
        writeln!(list, "b.txt").unwrap();
        list.flush().unwrap();

        let direct = vec![PathBuf::from("b.txt"), PathBuf::from("c.txt")];
        let files = consolidate_file_list(Some(list.path()), &direct).unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[test]
    fn test_open_text_plain() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "line one").unwrap();
        file.flush().unwrap();

        let mut reader = open_text(file.path()).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "line one\n");
    }

    #[test]
    fn test_open_text_gzip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt.gz");
        let mut encoder =
            GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"compressed line\n").unwrap();
        encoder.finish().unwrap();

        let mut reader = open_text(&path).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "compressed line\n");
    }
}
