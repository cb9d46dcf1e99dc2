use std::fs;
use std::io::{BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use tempfile::NamedTempFile;

///////////////////////////////
/// Output written to a temporary file in the destination directory, and moved into place on commit.
/// Dropping it without commit removes the temporary file, so a failed run never leaves a partial
/// file behind. The special path "-" writes to stdout instead
pub struct OutputFile {
    path: PathBuf,
    target: OutputTarget,
}

enum OutputTarget {
    Stdout(BufWriter<Stdout>),
    Plain(BufWriter<NamedTempFile>),
    Gzip(GzEncoder<BufWriter<NamedTempFile>>),
}

impl OutputFile {
    pub fn create(path: &Path) -> Result<OutputFile> {
        if is_stdio(path) {
            return Ok(OutputFile {
                path: path.to_path_buf(),
                target: OutputTarget::Stdout(BufWriter::new(std::io::stdout())),
            });
        }

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".dbspro-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .with_context(|| format!("Could not create output file {}", path.display()))?;
        debug!(
            "Writing {} through temporary file {}",
            path.display(),
            temp.path().display()
        );

        let writer = BufWriter::new(temp);
        let target = if is_gzip_path(path) {
            OutputTarget::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            OutputTarget::Plain(writer)
        };

        Ok(OutputFile {
            path: path.to_path_buf(),
            target,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    ///////////////////////////////
    /// Flush everything and move the temporary file to its final path
    pub fn commit(self) -> Result<()> {
        let path = self.path;
        let temp = match self.target {
            OutputTarget::Stdout(mut writer) => {
                writer.flush()?;
                return Ok(());
            }
            OutputTarget::Plain(writer) => writer.into_inner().map_err(|e| e.into_error()),
            OutputTarget::Gzip(encoder) => encoder
                .finish()
                .and_then(|writer| writer.into_inner().map_err(|e| e.into_error())),
        }
        .with_context(|| format!("Failed to write {}", path.display()))?;

        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        temp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
        Ok(())
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.target {
            OutputTarget::Stdout(w) => w.write(buf),
            OutputTarget::Plain(w) => w.write(buf),
            OutputTarget::Gzip(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match &mut self.target {
            OutputTarget::Stdout(w) => w.write_all(buf),
            OutputTarget::Plain(w) => w.write_all(buf),
            OutputTarget::Gzip(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.target {
            OutputTarget::Stdout(w) => w.flush(),
            OutputTarget::Plain(w) => w.flush(),
            OutputTarget::Gzip(w) => w.flush(),
        }
    }
}

pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub fn is_gzip_path(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

///////////////////////////////
/// Check that an input file exists and warn if it is empty
pub fn verify_input_file(path: &Path) -> Result<()> {
    if is_stdio(path) {
        return Ok(());
    }
    let meta = fs::metadata(path)
        .with_context(|| format!("Could not open input file {}", path.display()))?;
    if meta.len() == 0 {
        log::warn!("Input file {} is empty", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_commit_moves_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut out = OutputFile::create(&path).unwrap();
        out.write_all(b"hello\n").unwrap();
        assert!(!path.exists());
        out.commit().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_drop_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        {
            let mut out = OutputFile::create(&path).unwrap();
            out.write_all(b"partial").unwrap();
        }
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_gzip_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt.gz");

        let mut out = OutputFile::create(&path).unwrap();
        out.write_all(b"compressed\n").unwrap();
        out.commit().unwrap();

        let mut decoder = flate2::read::GzDecoder::new(fs::File::open(&path).unwrap());
        let mut content = String::new();
        decoder.read_to_string(&mut content).unwrap();
        assert_eq!(content, "compressed\n");
    }

    #[test]
    fn test_missing_output_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.txt");
        assert!(OutputFile::create(&path).is_err());
    }
}
