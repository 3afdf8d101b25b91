//! Compression-aware file I/O
//!
//! Readers detect gzip/bzip2 input by extension or magic bytes; writers
//! gzip their output when the path ends in `.gz`.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Default buffer size for readers and writers (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Compression format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Plain,
    /// Gzip, including multi-member (bgzip) files
    Gzip,
    Bzip2,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Detect compression from the extension, then from the first bytes
pub fn detect_compression(path: &Path) -> io::Result<CompressionFormat> {
    if has_extension(path, "gz") {
        return Ok(CompressionFormat::Gzip);
    }
    if has_extension(path, "bz2") {
        return Ok(CompressionFormat::Bzip2);
    }

    let mut magic = [0u8; 3];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..])? {
            0 => break,
            n => filled += n,
        }
    }

    Ok(match &magic[..filled] {
        [0x1f, 0x8b, ..] => CompressionFormat::Gzip,
        [b'B', b'Z', b'h'] => CompressionFormat::Bzip2,
        _ => CompressionFormat::Plain,
    })
}

/// Open a buffered reader, decompressing transparently
pub fn open_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let format = detect_compression(path)?;
    let file = File::open(path)?;
    Ok(match format {
        CompressionFormat::Gzip => Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, MultiGzDecoder::new(file))),
        CompressionFormat::Bzip2 => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            bzip2::read::BzDecoder::new(file),
        )),
        CompressionFormat::Plain => Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file)),
    })
}

/// Output sink, gzip-compressed or plain
pub enum OutputWriter {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl OutputWriter {
    /// Create `path`, compressing when it ends in `.gz`
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        if has_extension(path, "gz") {
            let encoder = GzEncoder::new(file, Compression::default());
            Ok(OutputWriter::Gzip(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, encoder)))
        } else {
            Ok(OutputWriter::Plain(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file)))
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, OutputWriter::Gzip(_))
    }

    /// Flush buffers and write the gzip trailer
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(mut w) => w.flush(),
            OutputWriter::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?.flush()
            }
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputWriter::Plain(w) => w.write(buf),
            OutputWriter::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(w) => w.flush(),
            OutputWriter::Gzip(w) => w.flush(),
        }
    }
}

/// Line reader reusing one buffer
///
/// Trailing `\n` / `\r\n` are stripped and lines are numbered from 1.
pub struct LineIterator<R: BufRead> {
    reader: R,
    buffer: String,
    line_no: usize,
}

impl<R: BufRead> LineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::with_capacity(1024),
            line_no: 0,
        }
    }

    /// Number of the line last returned
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next line, `None` at EOF
    pub fn next_line(&mut self) -> Option<io::Result<&str>> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                if self.buffer.ends_with('\n') {
                    self.buffer.pop();
                    if self.buffer.ends_with('\r') {
                        self.buffer.pop();
                    }
                }
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_all(path: &Path) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut iter = LineIterator::new(open_reader(path)?);
        while let Some(line) = iter.next_line() {
            lines.push(line?.to_string());
        }
        Ok(lines)
    }

    #[test]
    fn test_line_iterator_strips_newlines() -> io::Result<()> {
        let mut iter = LineIterator::new(&b"one\r\ntwo\nthree"[..]);
        assert_eq!(iter.next_line().unwrap()?, "one");
        assert_eq!(iter.next_line().unwrap()?, "two");
        assert_eq!(iter.next_line().unwrap()?, "three");
        assert_eq!(iter.line_no(), 3);
        assert!(iter.next_line().is_none());
        Ok(())
    }

    #[test]
    fn test_gzip_round_trip() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.tsv.gz");
        let mut writer = OutputWriter::create(&path)?;
        assert!(writer.is_compressed());
        writeln!(writer, "a\tb")?;
        writeln!(writer, "c\td")?;
        writer.finish()?;

        assert_eq!(detect_compression(&path)?, CompressionFormat::Gzip);
        assert_eq!(read_all(&path)?, vec!["a\tb", "c\td"]);
        Ok(())
    }

    #[test]
    fn test_detect_by_magic_bytes() -> io::Result<()> {
        let dir = TempDir::new()?;
        let gz = dir.path().join("noext");
        let mut writer = OutputWriter::Gzip(BufWriter::new(GzEncoder::new(File::create(&gz)?, Compression::fast())));
        writeln!(writer, "x")?;
        writer.finish()?;
        assert_eq!(detect_compression(&gz)?, CompressionFormat::Gzip);
        assert_eq!(read_all(&gz)?, vec!["x"]);

        let bz = dir.path().join("data.bin");
        let mut encoder = bzip2::write::BzEncoder::new(File::create(&bz)?, bzip2::Compression::default());
        encoder.write_all(b"y\n")?;
        encoder.finish()?;
        assert_eq!(detect_compression(&bz)?, CompressionFormat::Bzip2);
        assert_eq!(read_all(&bz)?, vec!["y"]);

        let plain = dir.path().join("plain.tsv");
        std::fs::write(&plain, "z\n")?;
        assert_eq!(detect_compression(&plain)?, CompressionFormat::Plain);
        Ok(())
    }

    #[test]
    fn test_empty_file_is_plain() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty");
        std::fs::write(&path, "")?;
        assert_eq!(detect_compression(&path)?, CompressionFormat::Plain);
        assert!(read_all(&path)?.is_empty());
        Ok(())
    }
}
