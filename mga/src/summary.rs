use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::io::Write;

use crate::alignment::Alignment;

/// Counters for one measurement category of one (dataset, genome) pair.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryStat {
    pub count: u64,
    pub total_aligned_length: u64,
    pub total_mismatch_count: u64,
}

impl CategoryStat {
    pub fn add(&mut self, alignment: &Alignment) {
        self.count += 1;
        self.total_aligned_length += u64::from(alignment.aligned_length);
        self.total_mismatch_count += u64::from(alignment.mismatch_count);
    }

    /// Mismatches per aligned base, 0.0 when nothing has been counted.
    pub fn error_rate(&self) -> f64 {
        if self.total_aligned_length == 0 {
            0.0
        } else {
            self.total_mismatch_count as f64 / self.total_aligned_length as f64
        }
    }
}

/// Tallies for one reference genome within one dataset, split into four
/// disjoint measurement categories:
///
/// - `aligned`: every alignment seen against this genome;
/// - `uniquely_aligned`: this genome was the read's only tied-best hit;
/// - `preferentially_aligned`: this genome was among the read's tied-best
///   hits, before the final tie-break;
/// - `assigned`: this genome was chosen as the read's origin after the
///   tie-break.
///
/// After a full run, `assigned.count <= preferentially_aligned.count <=
/// aligned.count` holds for every genome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlignmentSummary {
    pub aligned: CategoryStat,
    pub uniquely_aligned: CategoryStat,
    pub preferentially_aligned: CategoryStat,
    pub assigned: CategoryStat,
}

/// Read counts for one dataset, supplied by the upstream sampling step.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatasetCounts {
    /// Total number of reads in the dataset before sampling.
    pub sequence_count: u64,
    /// Number of reads actually fed to the aligner.
    pub sampled_count: u64,
    /// Number of sampled reads matching a known adapter.
    pub adapter_count: u64,
}

/// Alignment statistics of one dataset against every candidate genome,
/// seeded from the dataset's read counts before scanning and populated over
/// the two passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiGenomeAlignmentSummary {
    pub dataset_id: String,
    pub sequence_count: u64,
    pub sampled_count: u64,
    pub adapter_count: u64,
    /// Number of sampled reads with at least one alignment.
    pub aligned_count: u64,
    /// Number of sampled reads with no alignment against any genome.
    pub unmapped_count: u64,
    pub genomes: IndexMap<String, AlignmentSummary>,
}

impl MultiGenomeAlignmentSummary {
    pub fn new(dataset_id: impl Into<String>, counts: &DatasetCounts) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            sequence_count: counts.sequence_count,
            sampled_count: counts.sampled_count,
            adapter_count: counts.adapter_count,
            aligned_count: 0,
            unmapped_count: 0,
            genomes: IndexMap::new(),
        }
    }

    /// The summary for a genome, created on first use.
    pub fn genome_mut(&mut self, reference_genome_id: &str) -> &mut AlignmentSummary {
        self.genomes
            .entry(reference_genome_id.to_string())
            .or_default()
    }

    /// Settles the unmapped read count once both passes are complete.
    pub(crate) fn finalize(&mut self) {
        self.unmapped_count = self.sampled_count.saturating_sub(self.aligned_count);
    }
}

/// Serializes the per-dataset summaries as JSON, for downstream report
/// writers.
pub fn write_json<W: Write>(
    writer: W,
    summaries: &IndexMap<String, MultiGenomeAlignmentSummary>,
) -> Result<()> {
    serde_json::to_writer_pretty(writer, summaries)?;
    Ok(())
}
