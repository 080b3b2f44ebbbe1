mod bam;
mod tabular;

pub use bam::{BamAlignmentReader, UNKNOWN_MISMATCH_COUNT};
pub use tabular::TabularAlignmentReader;

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::alignment::Alignment;
use crate::error::Error;

/// Where a stream currently is, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPosition {
    pub path: PathBuf,
    /// Line number for text input, record number for BAM input.
    pub record: u64,
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.record)
    }
}

/// A sorted stream of alignments of one dataset's sampled reads against one
/// reference genome, decoded lazily from a single alignment file.
pub trait AlignmentReader {
    /// Decodes the next alignment, or `None` once the stream is exhausted.
    /// The underlying file handle is released when the end is reached.
    fn next_alignment(&mut self) -> Result<Option<Alignment>>;

    /// The file and record number of the most recently decoded record.
    fn position(&self) -> StreamPosition;

    /// Releases the underlying file handle. Closing an already closed or
    /// exhausted stream is a no-op.
    fn close(&mut self);
}

/// Opens the alignment file at `path`, choosing the backend from the file
/// name: `.bam` files are read as BAM, everything else as tab-delimited text
/// (possibly gzip-compressed).
pub fn open_alignment_file(
    path: &Path,
    reference_genome_id: &str,
) -> Result<Box<dyn AlignmentReader>> {
    if path.extension().is_some_and(|ext| ext == "bam") {
        Ok(Box::new(BamAlignmentReader::open(path, reference_genome_id)?))
    } else {
        Ok(Box::new(TabularAlignmentReader::open(
            path,
            reference_genome_id,
        )?))
    }
}

/// Extracts the reference genome id from an alignment file named
/// `<run_id>.<dataset_id>.<reference_genome_id>.<aligner>.alignment`, with an
/// optional trailing `.gz` or `.bam`. The genome id is everything after the
/// first `.` once the prefix and suffix are stripped, so it may itself
/// contain `.`; the dataset id may not.
pub fn reference_genome_from_filename(
    path: &Path,
    run_id: &str,
    aligner: &str,
) -> Result<String> {
    let err = || Error::UnknownReferenceGenome {
        path: path.to_path_buf(),
    };

    let mut name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(err)?;
    for ext in [".gz", ".bam"] {
        name = name.strip_suffix(ext).unwrap_or(name);
    }

    let id = name
        .strip_suffix(".alignment")
        .and_then(|name| name.strip_suffix(aligner))
        .and_then(|name| name.strip_suffix('.'))
        .and_then(|name| name.strip_prefix(run_id))
        .and_then(|name| name.strip_prefix('.'))
        .ok_or_else(err)?;

    match id.split_once('.') {
        Some((dataset_id, genome_id)) if !dataset_id.is_empty() && !genome_id.is_empty() => {
            Ok(genome_id.to_string())
        }
        _ => Err(err().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genome_from_filename() {
        let path = Path::new("/tmp/run1.sample1.GRCh38.bowtie.alignment");
        assert_eq!(
            reference_genome_from_filename(path, "run1", "bowtie").unwrap(),
            "GRCh38"
        );
    }

    #[test]
    fn test_genome_from_filename_compressed_and_bam() {
        let path = Path::new("run1.sample1.GRCh38.bowtie.alignment.gz");
        assert_eq!(
            reference_genome_from_filename(path, "run1", "bowtie").unwrap(),
            "GRCh38"
        );
        let path = Path::new("run1.sample1.GRCh38.bwa.alignment.bam");
        assert_eq!(
            reference_genome_from_filename(path, "run1", "bwa").unwrap(),
            "GRCh38"
        );
    }

    #[test]
    fn test_genome_id_is_everything_after_the_first_dot() {
        let path = Path::new("run1.sample1.mus.musculus.GRCm39.bowtie.alignment");
        assert_eq!(
            reference_genome_from_filename(path, "run1", "bowtie").unwrap(),
            "mus.musculus.GRCm39"
        );
    }

    #[test]
    fn test_genome_from_filename_failures() {
        for name in [
            "run1.sample1.GRCh38.bowtie.alignment", // aligner does not match
            "run2.sample1.GRCh38.star.alignment",   // wrong run id
            "run1.sample1GRCh38.star.alignment",    // no dot between ids
            "run1..GRCh38.star.alignment",          // empty dataset id
            "run1.sample1..star.alignment",         // empty genome id
        ] {
            let result = reference_genome_from_filename(Path::new(name), "run1", "star");
            assert!(result.is_err(), "expected failure for {name}");
        }
    }
}
