use super::ByteSource;
use std::fs::File;
use std::io::{BufReader, Read, Result, Seek, SeekFrom};
use std::path::Path;

/// Local file reader with random access support
///
/// Each reader owns its own file handle, so separate readers over the same
/// path can be positioned independently from different threads.
pub struct LocalFileReader {
    file: BufReader<File>,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            size,
        })
    }
}

impl Read for LocalFileReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file.read(buf)
    }
}

impl ByteSource for LocalFileReader {
    fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_from_absolute_offsets() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdefghij").unwrap();
        tmp.flush().unwrap();

        let mut reader = LocalFileReader::new(tmp.path()).unwrap();
        assert_eq!(reader.len(), 10);

        reader.seek_to(7).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "hij");

        reader.seek_to(0).unwrap();
        let mut head = [0u8; 3];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"abc");
    }
}
