use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::warn;

use crate::umi::Cluster;

///////////////////////////////
/// One line of a correction table, as written by starcode:
/// <canonical>\t<read count>\t<raw1>,<raw2>,...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionTableEntry {
    pub canonical: Vec<u8>,
    pub total_weight: u64,
    pub raw: Vec<Vec<u8>>,
}

///////////////////////////////
/// Parse one line. Returns None if the line does not have the three expected fields
pub fn parse_correction_line(line: &str) -> Option<CorrectionTableEntry> {
    let mut fields = line.split_whitespace();
    let canonical = fields.next()?;
    let total_weight = fields.next()?.parse::<u64>().ok()?;
    let raw_list = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    let raw: Vec<Vec<u8>> = raw_list
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.as_bytes().to_vec())
        .collect();
    if raw.is_empty() {
        return None;
    }

    Some(CorrectionTableEntry {
        canonical: canonical.as_bytes().to_vec(),
        total_weight,
        raw,
    })
}

///////////////////////////////
/// Streams entries of a correction table, skipping malformed lines with a warning
pub struct CorrectionTableReader<R: BufRead> {
    reader: R,
    line: String,
    pub num_lines: usize,
    pub num_malformed: usize,
}

impl CorrectionTableReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<CorrectionTableReader<BufReader<File>>> {
        let file = File::open(path)
            .with_context(|| format!("Could not open correction table {}", path.display()))?;
        if file.metadata()?.len() == 0 {
            warn!("File {} is empty.", path.display());
        }
        Ok(CorrectionTableReader::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CorrectionTableReader<R> {
    pub fn new(reader: R) -> CorrectionTableReader<R> {
        CorrectionTableReader {
            reader,
            line: String::new(),
            num_lines: 0,
            num_malformed: 0,
        }
    }
}

impl<R: BufRead> Iterator for CorrectionTableReader<R> {
    type Item = Result<CorrectionTableEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.num_lines += 1;

            let line = self.line.trim_end_matches(&['\n', '\r'][..]);
            if line.trim().is_empty() {
                continue;
            }
            match parse_correction_line(line) {
                Some(entry) => return Some(Ok(entry)),
                None => {
                    warn!("Non-default starcode output line: {}", line);
                    self.num_malformed += 1;
                }
            }
        }
    }
}

///////////////////////////////
/// Write clusters as a correction table, canonical sequence listed first among the raw sequences
pub fn write_correction_table<W: Write>(writer: &mut W, clusters: &[Cluster]) -> Result<()> {
    for cluster in clusters {
        let raw = cluster
            .members
            .iter()
            .map(|m| String::from_utf8_lossy(m))
            .join(",");
        writeln!(
            writer,
            "{}\t{}\t{}",
            String::from_utf8_lossy(&cluster.canonical),
            cluster.total_weight,
            raw
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let entry = parse_correction_line("AAAA\t5\tAAAA,AAAT").unwrap();
        assert_eq!(entry.canonical, b"AAAA".to_vec());
        assert_eq!(entry.total_weight, 5);
        assert_eq!(entry.raw, vec![b"AAAA".to_vec(), b"AAAT".to_vec()]);
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(parse_correction_line("AAAA\t5"), None);
        assert_eq!(parse_correction_line("AAAA\t5\tAAAA\textra"), None);
        assert_eq!(parse_correction_line("AAAA\tfive\tAAAA"), None);
        assert_eq!(parse_correction_line(""), None);
    }

    #[test]
    fn test_reader_skips_malformed() {
        let content = "AAAA\t5\tAAAA,AAAT\nbroken line\n\nCCCC\t2\tCCCC\n";
        let mut reader = CorrectionTableReader::new(content.as_bytes());
        let entries: Vec<_> = reader.by_ref().map(|e| e.unwrap()).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].canonical, b"CCCC".to_vec());
        assert_eq!(reader.num_malformed, 1);
    }

    #[test]
    fn test_write_table() {
        let clusters = vec![Cluster {
            canonical: b"AAAA".to_vec(),
            members: vec![b"AAAA".to_vec(), b"AAAT".to_vec()],
            total_weight: 5,
        }];
        let mut out = Vec::new();
        write_correction_table(&mut out, &clusters).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "AAAA\t5\tAAAA,AAAT\n");
    }
}
