use serde::Serialize;

/// One candidate alignment of one sampled read against one reference genome.
///
/// The derived ordering (dataset id, sequence id, mismatch count, reference
/// genome id) is both the required on-disk sort order of every alignment file
/// and the key used when merging files. It places all alignments of the same
/// read next to each other, fewest mismatches first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Alignment {
    pub dataset_id: String,
    pub sequence_id: u64,
    pub mismatch_count: u32,
    pub reference_genome_id: String,
    pub aligned_length: u32,
}

impl Alignment {
    /// Whether this alignment belongs to the same read as `other`.
    pub fn is_same_read(&self, other: &Alignment) -> bool {
        self.dataset_id == other.dataset_id && self.sequence_id == other.sequence_id
    }
}

/// Splits a read name of the form `"<dataset_id>_<sequence_id>"` at its last
/// underscore; dataset ids may themselves contain underscores. Returns `None`
/// when there is no underscore or the suffix is not an integer.
pub(crate) fn parse_read_name(name: &str) -> Option<(&str, u64)> {
    let (dataset_id, ordinal) = name.rsplit_once('_')?;
    let sequence_id = ordinal.parse().ok()?;
    Some((dataset_id, sequence_id))
}
