use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use seq_io::fasta::Reader as FastaReader;
use seq_io::fasta::Record as FastaRecord;
use seq_io::fastq::Reader as FastqReader;
use seq_io::fastq::Record as FastqRecord;

use super::output_file::{is_stdio, OutputFile};
use super::SequenceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastxFormat {
    Fasta,
    Fastq,
}

///////////////////////////////
/// Reader for FASTA or FASTQ, possibly compressed. Format is decided from the first byte of the
/// decompressed stream
pub struct FastxReader {
    path: PathBuf,
    inner: FastxInner,
}

enum FastxInner {
    Fasta(FastaReader<Box<dyn Read>>),
    Fastq(FastqReader<Box<dyn Read>>),
    Empty,
}

impl FastxReader {
    pub fn open(path: &Path) -> Result<FastxReader> {
        let handle: Box<dyn Read> = if is_stdio(path) {
            Box::new(std::io::stdin())
        } else {
            let file = File::open(path)
                .with_context(|| format!("Could not open sequence file {}", path.display()))?;
            Box::new(file)
        };

        let (reader, compression) = niffler::get_reader(handle)
            .map_err(|e| anyhow!("Could not open sequence file {}: {}", path.display(), e))?;
        debug!(
            "Opened file {} with compression {:?}",
            path.display(),
            compression
        );

        Self::from_reader(reader, path)
    }

    ///////////////////////////////
    /// Wrap an already decompressed stream. The path is only used for messages
    pub fn from_reader(reader: Box<dyn Read>, path: &Path) -> Result<FastxReader> {
        let mut buffered = BufReader::new(reader);
        let first_byte = buffered
            .fill_buf()
            .with_context(|| format!("Could not read from {}", path.display()))?
            .first()
            .copied();

        let reader: Box<dyn Read> = Box::new(buffered);
        let inner = match first_byte {
            Some(b'>') => FastxInner::Fasta(FastaReader::new(reader)),
            Some(b'@') => FastxInner::Fastq(FastqReader::new(reader)),
            None => FastxInner::Empty,
            Some(_) => bail!("File {} is neither FASTQ or FASTA", path.display()),
        };

        Ok(FastxReader {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn format(&self) -> Option<FastxFormat> {
        match self.inner {
            FastxInner::Fasta(_) => Some(FastxFormat::Fasta),
            FastxInner::Fastq(_) => Some(FastxFormat::Fastq),
            FastxInner::Empty => None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for FastxReader {
    type Item = Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = &self.path;
        match &mut self.inner {
            FastxInner::Fasta(reader) => reader.next().map(|res| match res {
                Ok(rec) => Ok(SequenceRecord {
                    name: String::from_utf8_lossy(rec.head()).into_owned(),
                    sequence: rec.full_seq().into_owned(),
                    quality: None,
                }),
                Err(e) => Err(anyhow!(
                    "Failed to parse FASTA record in {}: {}",
                    path.display(),
                    e
                )),
            }),
            FastxInner::Fastq(reader) => reader.next().map(|res| match res {
                Ok(rec) => Ok(SequenceRecord {
                    name: String::from_utf8_lossy(rec.head()).into_owned(),
                    sequence: rec.seq().to_vec(),
                    quality: Some(rec.qual().to_vec()),
                }),
                Err(e) => Err(anyhow!(
                    "Failed to parse FASTQ record in {}: {}",
                    path.display(),
                    e
                )),
            }),
            FastxInner::Empty => None,
        }
    }
}

///////////////////////////////
/// Anything that can take corrected reads
pub trait RecordSink {
    fn write_record(&mut self, record: &SequenceRecord) -> Result<()>;
}

impl RecordSink for Vec<SequenceRecord> {
    fn write_record(&mut self, record: &SequenceRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

///////////////////////////////
/// FASTA/FASTQ writer
pub struct FastxWriter<W: Write> {
    writer: W,
    format: FastxFormat,
}

impl<W: Write> FastxWriter<W> {
    pub fn new(writer: W, format: FastxFormat) -> FastxWriter<W> {
        FastxWriter { writer, format }
    }

    pub fn format(&self) -> FastxFormat {
        self.format
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl FastxWriter<OutputFile> {
    ///////////////////////////////
    /// Open an atomic output; format follows the file extension
    pub fn create(path: &Path) -> Result<FastxWriter<OutputFile>> {
        FastxWriter::create_or(path, FastxFormat::Fasta)
    }

    ///////////////////////////////
    /// As create, but with a given format when the extension does not tell (e.g. stdout)
    pub fn create_or(path: &Path, default: FastxFormat) -> Result<FastxWriter<OutputFile>> {
        let format = format_from_path(path).unwrap_or(default);
        Ok(FastxWriter::new(OutputFile::create(path)?, format))
    }

    pub fn commit(self) -> Result<()> {
        self.writer.commit()
    }
}

impl<W: Write> RecordSink for FastxWriter<W> {
    fn write_record(&mut self, record: &SequenceRecord) -> Result<()> {
        match self.format {
            FastxFormat::Fasta => write_fasta_read(&mut self.writer, record)?,
            FastxFormat::Fastq => {
                let quality = match &record.quality {
                    Some(q) => q,
                    None => bail!(
                        "Cannot write read {} as FASTQ; it has no quality string",
                        record.name
                    ),
                };
                write_fastq_read(&mut self.writer, record, quality)?
            }
        }
        Ok(())
    }
}

////////// Write one FASTA read
fn write_fasta_read<W: Write>(writer: &mut W, record: &SequenceRecord) -> std::io::Result<()> {
    writer.write_all(b">")?;
    writer.write_all(record.name.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.sequence)?;
    writer.write_all(b"\n")?;
    Ok(())
}

////////// Write one FASTQ read
fn write_fastq_read<W: Write>(
    writer: &mut W,
    record: &SequenceRecord,
    quality: &[u8],
) -> std::io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(record.name.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.sequence)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(quality)?;
    writer.write_all(b"\n")?;
    Ok(())
}

///////////////////////////////
/// Guess format from a file name, ignoring any .gz suffix
pub fn format_from_path(path: &Path) -> Option<FastxFormat> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);

    if name.ends_with(".fastq") || name.ends_with(".fq") {
        Some(FastxFormat::Fastq)
    } else if name.ends_with(".fasta") || name.ends_with(".fa") || name.ends_with(".fna") {
        Some(FastxFormat::Fasta)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(content: &'static [u8]) -> Vec<SequenceRecord> {
        let reader = FastxReader::from_reader(Box::new(Cursor::new(content)), Path::new("test"))
            .unwrap();
        reader.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_read_fastq() {
        let recs = read_all(b"@r1 1:N\nACGT\n+\nIIII\n@r2\nGGCC\n+\nJJJJ\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].name, "r1 1:N");
        assert_eq!(recs[0].sequence, b"ACGT".to_vec());
        assert_eq!(recs[0].quality, Some(b"IIII".to_vec()));
        assert_eq!(recs[1].id(), "r2");
    }

    #[test]
    fn test_read_multiline_fasta() {
        let recs = read_all(b">r1\nACGT\nTTTT\n>r2\nGG\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].sequence, b"ACGTTTTT".to_vec());
        assert_eq!(recs[0].quality, None);
    }

    #[test]
    fn test_read_empty() {
        assert!(read_all(b"").is_empty());
    }

    #[test]
    fn test_reject_unknown_format() {
        let res = FastxReader::from_reader(Box::new(Cursor::new(&b"hello\n"[..])), Path::new("x"));
        assert!(res.is_err());
    }

    #[test]
    fn test_write_fasta_and_fastq() {
        let rec = SequenceRecord::new("r1_AAAA", b"ACGT", Some(b"IIII"));

        let mut writer = FastxWriter::new(Vec::new(), FastxFormat::Fasta);
        writer.write_record(&rec).unwrap();
        assert_eq!(writer.into_inner(), b">r1_AAAA\nACGT\n".to_vec());

        let mut writer = FastxWriter::new(Vec::new(), FastxFormat::Fastq);
        writer.write_record(&rec).unwrap();
        assert_eq!(writer.into_inner(), b"@r1_AAAA\nACGT\n+\nIIII\n".to_vec());

        let mut writer = FastxWriter::new(Vec::new(), FastxFormat::Fastq);
        let rec = SequenceRecord::new("r1", b"ACGT", None);
        assert!(writer.write_record(&rec).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(format_from_path(Path::new("a/b.fastq.gz")), Some(FastxFormat::Fastq));
        assert_eq!(format_from_path(Path::new("b.fq")), Some(FastxFormat::Fastq));
        assert_eq!(format_from_path(Path::new("b.fasta")), Some(FastxFormat::Fasta));
        assert_eq!(format_from_path(Path::new("b.txt")), None);
    }

    #[test]
    fn test_roundtrip_through_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq.gz");

        let mut writer = FastxWriter::create(&path).unwrap();
        writer
            .write_record(&SequenceRecord::new("r1", b"ACGT", Some(b"IIII")))
            .unwrap();
        writer.commit().unwrap();

        let recs: Vec<_> = FastxReader::open(&path)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(recs, vec![SequenceRecord::new("r1", b"ACGT", Some(b"IIII"))]);
    }
}
