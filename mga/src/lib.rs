//! Core of a multi-genome contamination screen.
//!
//! Each sequenced dataset's sampled reads are aligned, upstream of this
//! crate, against every candidate reference genome, producing one sorted
//! alignment file per (dataset, genome) pair. This crate merges those files
//! into per-read groups and runs a two-pass scan over them: the first pass
//! tallies how often each genome is a read's best hit, the second uses those
//! tallies to assign every read to the single genome it most likely came
//! from. The populated per-dataset summaries are handed to external report
//! writers.

mod alignment;
mod error;
mod io;
mod merge;
mod reader;
mod screen;
mod summary;

pub use alignment::Alignment;
pub use error::Error;
pub use merge::MergedAlignmentReader;
pub use reader::{
    open_alignment_file, reference_genome_from_filename, AlignmentReader, BamAlignmentReader,
    StreamPosition, TabularAlignmentReader, UNKNOWN_MISMATCH_COUNT,
};
pub use screen::{assign_reads, screen_alignments, tally_alignments, GenomeScores};
pub use summary::{
    write_json, AlignmentSummary, CategoryStat, DatasetCounts, MultiGenomeAlignmentSummary,
};
