use anyhow::{Context, Result};
use noodles::bam;
use noodles::bgzf;
use noodles::sam::alignment::record::data::field::tag::Tag;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{AlignmentReader, StreamPosition};
use crate::alignment::{parse_read_name, Alignment};
use crate::error::Error;

/// Mismatch count recorded for alignments without an NM tag: a valid but very
/// poor alignment rather than an error.
pub const UNKNOWN_MISMATCH_COUNT: u32 = 255;

/// Reads alignments from a BAM file. Secondary and supplementary records are
/// skipped so each read contributes at most one record per genome locus.
pub struct BamAlignmentReader {
    path: PathBuf,
    reference_genome_id: String,
    reader: Option<bam::io::Reader<bgzf::io::Reader<File>>>,
    record: bam::Record,
    record_number: u64,
}

impl BamAlignmentReader {
    pub fn open<P: AsRef<Path>>(path: P, reference_genome_id: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("cannot open file: {}", path.display()))?;
        let mut reader = bam::io::Reader::new(file);
        reader
            .read_header()
            .with_context(|| format!("cannot read BAM header: {}", path.display()))?;
        Ok(Self {
            path,
            reference_genome_id: reference_genome_id.to_string(),
            reader: Some(reader),
            record: bam::Record::default(),
            record_number: 0,
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedRecord {
            path: self.path.clone(),
            line: self.record_number,
            reason: reason.into(),
        }
    }

    fn decode(&self) -> Result<Alignment> {
        let record = &self.record;
        let name = record
            .name()
            .ok_or_else(|| self.malformed("record has no read name"))?;
        let name = std::str::from_utf8(name.as_ref())
            .map_err(|_| self.malformed("read name is not valid UTF-8"))?;
        let (dataset_id, sequence_id) = parse_read_name(name).ok_or_else(|| {
            self.malformed(format!("cannot parse read name {name:?} as <dataset>_<ordinal>"))
        })?;

        let mismatch_count = match record.data().get(&Tag::EDIT_DISTANCE).transpose()? {
            Some(value) => value
                .as_int()
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(UNKNOWN_MISMATCH_COUNT),
            None => UNKNOWN_MISMATCH_COUNT,
        };

        Ok(Alignment {
            dataset_id: dataset_id.to_string(),
            sequence_id,
            mismatch_count,
            reference_genome_id: self.reference_genome_id.clone(),
            aligned_length: record.sequence().len() as u32,
        })
    }
}

impl AlignmentReader for BamAlignmentReader {
    fn next_alignment(&mut self) -> Result<Option<Alignment>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            if reader.read_record(&mut self.record)? == 0 {
                self.close();
                return Ok(None);
            }
            self.record_number += 1;
            let flags = self.record.flags();
            if flags.is_secondary() || flags.is_supplementary() {
                continue;
            }
            return self.decode().map(Some);
        }
    }

    fn position(&self) -> StreamPosition {
        StreamPosition {
            path: self.path.clone(),
            record: self.record_number,
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noodles::sam;
    use noodles::sam::alignment::io::Write as _;
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record_buf::{data::field::value::Value, RecordBuf};

    fn record(name: &str, sequence: &str, flags: Flags, edit_distance: Option<i32>) -> RecordBuf {
        let mut record = RecordBuf::default();
        *record.name_mut() = Some(name.as_bytes().to_vec().into());
        *record.sequence_mut() = sequence.as_bytes().to_vec().into();
        *record.flags_mut() = flags;
        if let Some(nm) = edit_distance {
            record
                .data_mut()
                .insert(Tag::EDIT_DISTANCE, Value::Int32(nm));
        }
        record
    }

    fn write_bam_file(records: &[RecordBuf]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run1.sample1.GRCh38.bwa.alignment.bam");
        let header = sam::Header::default();
        let mut writer = bam::io::Writer::new(std::fs::File::create(&path).unwrap());
        writer.write_header(&header).unwrap();
        for record in records {
            writer.write_alignment_record(&header, record).unwrap();
        }
        writer.try_finish().unwrap();
        (dir, path)
    }

    #[test]
    fn test_decode_records() {
        let (_dir, path) = write_bam_file(&[
            record("sample1_1", "ACGTACGT", Flags::UNMAPPED, Some(2)),
            record("sample1_2", "ACGTACGTAC", Flags::UNMAPPED, Some(0)),
        ]);
        let mut reader = BamAlignmentReader::open(&path, "GRCh38").unwrap();

        let first = reader.next_alignment().unwrap().unwrap();
        assert_eq!(first.dataset_id, "sample1");
        assert_eq!(first.sequence_id, 1);
        assert_eq!(first.reference_genome_id, "GRCh38");
        assert_eq!(first.aligned_length, 8);
        assert_eq!(first.mismatch_count, 2);

        let second = reader.next_alignment().unwrap().unwrap();
        assert_eq!(second.sequence_id, 2);
        assert_eq!(second.mismatch_count, 0);

        assert!(reader.next_alignment().unwrap().is_none());
        // Exhaustion released the handle; further calls stay at end.
        assert!(reader.next_alignment().unwrap().is_none());
    }

    #[test]
    fn test_skips_secondary_and_supplementary_records() {
        let (_dir, path) = write_bam_file(&[
            record("sample1_1", "ACGT", Flags::UNMAPPED, Some(0)),
            record("sample1_1", "ACGT", Flags::SECONDARY, Some(0)),
            record("sample1_2", "ACGT", Flags::SUPPLEMENTARY, Some(0)),
            record("sample1_3", "ACGT", Flags::UNMAPPED, Some(1)),
        ]);
        let mut reader = BamAlignmentReader::open(&path, "GRCh38").unwrap();

        assert_eq!(reader.next_alignment().unwrap().unwrap().sequence_id, 1);
        assert_eq!(reader.next_alignment().unwrap().unwrap().sequence_id, 3);
        assert!(reader.next_alignment().unwrap().is_none());
    }

    #[test]
    fn test_missing_edit_distance_uses_sentinel() {
        let (_dir, path) =
            write_bam_file(&[record("sample1_1", "ACGT", Flags::UNMAPPED, None)]);
        let mut reader = BamAlignmentReader::open(&path, "GRCh38").unwrap();
        assert_eq!(
            reader.next_alignment().unwrap().unwrap().mismatch_count,
            UNKNOWN_MISMATCH_COUNT
        );
    }

    #[test]
    fn test_malformed_read_name_cites_record() {
        let (_dir, path) =
            write_bam_file(&[record("noseparator", "ACGT", Flags::UNMAPPED, Some(0))]);
        let mut reader = BamAlignmentReader::open(&path, "GRCh38").unwrap();
        let err = reader.next_alignment().unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::MalformedRecord { line, .. }) => assert_eq!(*line, 1),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }
}
