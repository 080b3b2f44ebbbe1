use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::alignment::Alignment;
use crate::error::Error;
use crate::merge::MergedAlignmentReader;
use crate::summary::{DatasetCounts, MultiGenomeAlignmentSummary};

/// For each dataset, the fraction of its tied-best hits that fell on each
/// genome. Learned in the first pass and used as the prior for breaking ties
/// in the second.
pub type GenomeScores = HashMap<String, HashMap<String, f64>>;

/// Screens one run's alignment files and returns the populated per-dataset
/// summaries.
///
/// The files are scanned twice, through two independently opened merge
/// readers. The first pass tallies, per dataset, how often each genome is a
/// read's best hit; the second re-reads the files and uses those tallies to
/// pick a single genome for every read that aligned equally well to several.
/// A read's tied-best hits cannot be disambiguated in isolation, so the
/// genome-wide prevalence of ties serves as the prior.
pub fn screen_alignments<P: AsRef<Path>>(
    files: &[P],
    run_id: &str,
    aligner: &str,
    counts: &IndexMap<String, DatasetCounts>,
) -> Result<IndexMap<String, MultiGenomeAlignmentSummary>> {
    let mut summaries: IndexMap<String, MultiGenomeAlignmentSummary> = counts
        .iter()
        .map(|(dataset_id, counts)| {
            (
                dataset_id.clone(),
                MultiGenomeAlignmentSummary::new(dataset_id.clone(), counts),
            )
        })
        .collect();

    info!("tallying alignments for run {run_id}");
    let mut reader = MergedAlignmentReader::new(files, run_id, aligner)?;
    let scores = tally_alignments(&mut reader, &mut summaries)?;

    info!("assigning reads for run {run_id}");
    let mut reader = MergedAlignmentReader::new(files, run_id, aligner)?;
    assign_reads(&mut reader, &scores, &mut summaries)?;

    for summary in summaries.values_mut() {
        summary.finalize();
    }
    Ok(summaries)
}

/// First pass: scans every read's alignment group once, accumulating the
/// aligned, preferentially aligned and uniquely aligned categories, and
/// returns the per-dataset genome scores used to break ties in the second
/// pass.
pub fn tally_alignments(
    reader: &mut MergedAlignmentReader,
    summaries: &mut IndexMap<String, MultiGenomeAlignmentSummary>,
) -> Result<GenomeScores> {
    let mut tied_hit_histogram: BTreeMap<usize, u64> = BTreeMap::new();

    loop {
        let group = reader.next_alignment_group()?;
        let Some(first) = group.first() else {
            break;
        };
        let summary = lookup_dataset(summaries, &first.dataset_id)?;
        if first.sequence_id > summary.sampled_count {
            return Err(Error::SequenceIdOutOfRange {
                dataset_id: first.dataset_id.clone(),
                sequence_id: first.sequence_id,
                sampled_count: summary.sampled_count,
            }
            .into());
        }
        summary.aligned_count += 1;

        // The group is sorted by mismatch count, so the tied-best hits are
        // the prefix matching the first element's count.
        let best = first.mismatch_count;
        let tied_count = group
            .iter()
            .take_while(|alignment| alignment.mismatch_count == best)
            .count();
        for (rank, alignment) in group.iter().enumerate() {
            let genome = summary.genome_mut(&alignment.reference_genome_id);
            genome.aligned.add(alignment);
            if rank < tied_count {
                genome.preferentially_aligned.add(alignment);
            }
        }
        if let Ok(only) = group.iter().take(tied_count).exactly_one() {
            summary
                .genome_mut(&only.reference_genome_id)
                .uniquely_aligned
                .add(only);
        }
        *tied_hit_histogram.entry(tied_count).or_default() += 1;
    }

    for (genomes, reads) in &tied_hit_histogram {
        debug!("{reads} reads aligned equally well to {genomes} genome(s)");
    }

    Ok(genome_scores(summaries))
}

/// Second pass: re-scans every read's alignment group and assigns the read to
/// the tied-best genome with the highest first-pass score. On equal scores
/// the first hit in group order wins.
pub fn assign_reads(
    reader: &mut MergedAlignmentReader,
    scores: &GenomeScores,
    summaries: &mut IndexMap<String, MultiGenomeAlignmentSummary>,
) -> Result<()> {
    loop {
        let group = reader.next_alignment_group()?;
        let Some(first) = group.first() else {
            break;
        };
        let summary = lookup_dataset(summaries, &first.dataset_id)?;
        let dataset_scores = scores.get(&first.dataset_id);

        let best = first.mismatch_count;
        let mut winner = first;
        let mut winner_score = score_of(dataset_scores, winner);
        for alignment in group
            .iter()
            .take_while(|alignment| alignment.mismatch_count == best)
            .skip(1)
        {
            let score = score_of(dataset_scores, alignment);
            if score > winner_score {
                winner = alignment;
                winner_score = score;
            }
        }

        summary
            .genome_mut(&winner.reference_genome_id)
            .assigned
            .add(winner);
    }
    Ok(())
}

fn lookup_dataset<'a>(
    summaries: &'a mut IndexMap<String, MultiGenomeAlignmentSummary>,
    dataset_id: &str,
) -> Result<&'a mut MultiGenomeAlignmentSummary> {
    summaries.get_mut(dataset_id).ok_or_else(|| {
        Error::UnknownDataset {
            dataset_id: dataset_id.to_string(),
        }
        .into()
    })
}

fn score_of(dataset_scores: Option<&HashMap<String, f64>>, alignment: &Alignment) -> f64 {
    dataset_scores
        .and_then(|scores| scores.get(&alignment.reference_genome_id))
        .copied()
        .unwrap_or(0.0)
}

/// Normalizes each dataset's preferentially-aligned counts into per-genome
/// fractions of that dataset's total.
fn genome_scores(summaries: &IndexMap<String, MultiGenomeAlignmentSummary>) -> GenomeScores {
    summaries
        .iter()
        .map(|(dataset_id, summary)| {
            let total: u64 = summary
                .genomes
                .values()
                .map(|genome| genome.preferentially_aligned.count)
                .sum();
            let scores = summary
                .genomes
                .iter()
                .map(|(genome_id, genome)| {
                    let score = if total == 0 {
                        0.0
                    } else {
                        genome.preferentially_aligned.count as f64 / total as f64
                    };
                    (genome_id.clone(), score)
                })
                .collect();
            (dataset_id.clone(), scores)
        })
        .collect()
}
