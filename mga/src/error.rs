use std::path::PathBuf;
use thiserror::Error;

/// Fatal error categories raised while scanning alignment streams.
///
/// Every stream-level variant carries the file path and the record number
/// within it so bad input can be located. Apart from failures to open an
/// alignment file, which are logged and skipped, all of these abort the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: malformed record at line {line}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error(
        "{}: record at line {line} is not in sort order; alignment files must be sorted by read name, then mismatch count",
        path.display()
    )]
    OutOfOrderInput { path: PathBuf, line: u64 },

    #[error("unknown dataset {dataset_id}: no sequence counts were provided for it")]
    UnknownDataset { dataset_id: String },

    #[error(
        "sequence id {sequence_id} in dataset {dataset_id} exceeds the sampled read count {sampled_count}"
    )]
    SequenceIdOutOfRange {
        dataset_id: String,
        sequence_id: u64,
        sampled_count: u64,
    },

    #[error("cannot determine reference genome for file {}", path.display())]
    UnknownReferenceGenome { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
