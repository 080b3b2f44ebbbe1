use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::path::Path;

use crate::alignment::Alignment;
use crate::error::Error;
use crate::reader::{open_alignment_file, reference_genome_from_filename, AlignmentReader};

/// Merges the sorted per-genome alignment files of one run into a single
/// globally sorted sequence, with read-level grouping.
///
/// One record per open stream is buffered in an ordered set of stream heads;
/// ties on the alignment key are broken by stream index so the set stays
/// well-defined. Memory use is bounded by the number of genomes regardless of
/// file size.
pub struct MergedAlignmentReader {
    streams: Vec<Box<dyn AlignmentReader>>,
    heads: BTreeSet<(Alignment, usize)>,
}

impl MergedAlignmentReader {
    /// Opens every alignment file of a run, extracting each file's reference
    /// genome id from its name, and primes the merge with each stream's first
    /// record. Files that cannot be opened are logged and skipped; files that
    /// are empty are closed and dropped immediately. A file whose genome id
    /// cannot be determined is fatal.
    pub fn new<P: AsRef<Path>>(files: &[P], run_id: &str, aligner: &str) -> Result<Self> {
        let mut merge = Self {
            streams: Vec::new(),
            heads: BTreeSet::new(),
        };

        for path in files {
            let path = path.as_ref();
            let genome_id = reference_genome_from_filename(path, run_id, aligner)?;
            let mut stream = match open_alignment_file(path, &genome_id) {
                Ok(stream) => stream,
                Err(error) => {
                    warn!("skipping unreadable alignment file {}: {error:#}", path.display());
                    continue;
                }
            };
            match stream.next_alignment() {
                Ok(Some(first)) => {
                    let index = merge.streams.len();
                    merge.heads.insert((first, index));
                    merge.streams.push(stream);
                }
                // Empty on open: the stream has already closed itself.
                Ok(None) => debug!("no alignments in {}", path.display()),
                Err(error) => {
                    merge.close();
                    return Err(error);
                }
            }
        }

        Ok(merge)
    }

    /// Removes and returns the smallest buffered alignment, refilling from
    /// the stream it came from. The refilled record must compare strictly
    /// greater than the one removed, otherwise the input file was not sorted
    /// and the whole run is aborted. Returns `None` once every stream is
    /// exhausted.
    pub fn next_alignment(&mut self) -> Result<Option<Alignment>> {
        let Some((alignment, index)) = self.heads.pop_first() else {
            return Ok(None);
        };

        match self.streams[index].next_alignment() {
            Ok(Some(next)) => {
                if next <= alignment {
                    let position = self.streams[index].position();
                    self.close();
                    return Err(Error::OutOfOrderInput {
                        path: position.path,
                        line: position.record,
                    }
                    .into());
                }
                self.heads.insert((next, index));
            }
            // Exhausted: the stream has already closed itself.
            Ok(None) => {}
            Err(error) => {
                self.close();
                return Err(error);
            }
        }

        Ok(Some(alignment))
    }

    /// Returns all alignments of the next read, across every genome, sorted
    /// by mismatch count then genome id. An empty group signals the end of
    /// the input.
    pub fn next_alignment_group(&mut self) -> Result<Vec<Alignment>> {
        let mut group = Vec::new();
        let Some(first) = self.next_alignment()? else {
            return Ok(group);
        };
        group.push(first);

        while self
            .heads
            .first()
            .is_some_and(|(head, _)| head.is_same_read(&group[0]))
        {
            match self.next_alignment()? {
                Some(alignment) => group.push(alignment),
                None => break,
            }
        }

        Ok(group)
    }

    /// Releases every still-open stream.
    pub fn close(&mut self) {
        for stream in &mut self.streams {
            stream.close();
        }
        self.heads.clear();
    }
}
