use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Open a text file for reading, transparently decompressing gzip input.
pub fn open_for_read<P: AsRef<Path>>(path: P) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    if is_gzipped(path)? {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(File::open(
            path,
        )?)))
    } else {
        Ok(Box::new(File::open(path)?))
    }
}

/// Gzip detection is based on the file content, not the extension.
fn is_gzipped(path: &Path) -> Result<bool> {
    let file =
        File::open(path).with_context(|| format!("cannot open file: {}", path.display()))?;
    Ok(flate2::read::MultiGzDecoder::new(file).header().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "hello\n").unwrap();

        let mut content = String::new();
        open_for_read(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_read_gzipped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"hello\n").unwrap();
        encoder.finish().unwrap();

        let mut content = String::new();
        open_for_read(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(open_for_read("/no/such/file").is_err());
    }
}
