use anyhow::Result;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use super::{AlignmentReader, StreamPosition};
use crate::alignment::{parse_read_name, Alignment};
use crate::error::Error;
use crate::io::open_for_read;

/// Column holding the read name, `"<dataset_id>_<sequence_id>"`.
const READ_NAME_FIELD: usize = 0;
/// Column holding the aligned sequence; only its length is used.
const SEQUENCE_FIELD: usize = 4;
/// Column holding the comma-separated mismatch descriptors; only their number
/// is used. The column may be empty or missing entirely when the alignment
/// has no mismatches.
const MISMATCHES_FIELD: usize = 7;

/// Reads alignments from a tab-delimited text file (bowtie output layout),
/// one record per line, optionally gzip-compressed.
pub struct TabularAlignmentReader {
    path: PathBuf,
    reference_genome_id: String,
    reader: Option<BufReader<Box<dyn Read>>>,
    line_number: u64,
}

impl TabularAlignmentReader {
    pub fn open<P: AsRef<Path>>(path: P, reference_genome_id: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = BufReader::new(open_for_read(&path)?);
        Ok(Self {
            path,
            reference_genome_id: reference_genome_id.to_string(),
            reader: Some(reader),
            line_number: 0,
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedRecord {
            path: self.path.clone(),
            line: self.line_number,
            reason: reason.into(),
        }
    }

    fn decode(&self, line: &str) -> Result<Alignment> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() <= SEQUENCE_FIELD {
            return Err(self
                .malformed(format!(
                    "expected at least {} tab-separated fields, found {}",
                    SEQUENCE_FIELD + 1,
                    fields.len()
                ))
                .into());
        }

        let name = fields[READ_NAME_FIELD];
        let (dataset_id, sequence_id) = parse_read_name(name).ok_or_else(|| {
            self.malformed(format!("cannot parse read name {name:?} as <dataset>_<ordinal>"))
        })?;

        let mismatches = fields.get(MISMATCHES_FIELD).copied().unwrap_or("");
        let mismatch_count = if mismatches.is_empty() {
            0
        } else {
            mismatches.split(',').count() as u32
        };

        Ok(Alignment {
            dataset_id: dataset_id.to_string(),
            sequence_id,
            mismatch_count,
            reference_genome_id: self.reference_genome_id.clone(),
            aligned_length: fields[SEQUENCE_FIELD].len() as u32,
        })
    }
}

impl AlignmentReader for TabularAlignmentReader {
    fn next_alignment(&mut self) -> Result<Option<Alignment>> {
        let mut line = String::new();
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                self.close();
                return Ok(None);
            }
            self.line_number += 1;
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            return self.decode(line).map(Some);
        }
    }

    fn position(&self) -> StreamPosition {
        StreamPosition {
            path: self.path.clone(),
            record: self.line_number,
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
