use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::OutputFile;

///////////////////////////////
/// One row of the final count table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecord {
    #[serde(rename = "Barcode")]
    pub barcode: String,
    #[serde(rename = "Target")]
    pub target: String,
    #[serde(rename = "UMI")]
    pub umi: String,
    #[serde(rename = "ReadCount")]
    pub read_count: u64,
    #[serde(rename = "Sample")]
    pub sample: String,
}

pub type CountTable = Vec<CountRecord>;

///////////////////////////////
/// Sort by barcode, then target, then UMI
pub fn sort_count_table(table: &mut CountTable) {
    table.sort_by(|a, b| {
        (&a.barcode, &a.target, &a.umi).cmp(&(&b.barcode, &b.target, &b.umi))
    });
}

pub fn write_count_table<W: Write>(writer: W, table: &[CountRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_writer(writer);
    for rec in table {
        writer.serialize(rec)?;
    }
    writer.flush()?;
    Ok(())
}

///////////////////////////////
/// Write the table atomically to a path
pub fn save_count_table(path: &Path, table: &[CountRecord]) -> Result<()> {
    let mut out = OutputFile::create(path)?;
    write_count_table(&mut out, table)
        .with_context(|| format!("Failed to write count table {}", path.display()))?;
    out.commit()
}

pub fn read_count_table(path: &Path) -> Result<CountTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Could not open count table {}", path.display()))?;

    let mut table = Vec::new();
    for (i, row) in reader.deserialize().enumerate() {
        let rec: CountRecord =
            row.with_context(|| format!("Bad row {} in count table {}", i + 1, path.display()))?;
        table.push(rec);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(barcode: &str, target: &str, umi: &str, read_count: u64) -> CountRecord {
        CountRecord {
            barcode: barcode.to_string(),
            target: target.to_string(),
            umi: umi.to_string(),
            read_count,
            sample: "S1".to_string(),
        }
    }

    #[test]
    fn test_write_table() {
        let mut out = Vec::new();
        write_count_table(&mut out, &[rec("AAAA", "CD4", "GGG", 3)]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Barcode\tTarget\tUMI\tReadCount\tSample\nAAAA\tCD4\tGGG\t3\tS1\n"
        );
    }

    #[test]
    fn test_sort() {
        let mut table = vec![
            rec("CCCC", "CD4", "AAA", 1),
            rec("AAAA", "CD8", "AAA", 1),
            rec("AAAA", "CD4", "TTT", 1),
            rec("AAAA", "CD4", "AAA", 1),
        ];
        sort_count_table(&mut table);
        let keys: Vec<_> = table
            .iter()
            .map(|r| format!("{}-{}-{}", r.barcode, r.target, r.umi))
            .collect();
        assert_eq!(keys, vec!["AAAA-CD4-AAA", "AAAA-CD4-TTT", "AAAA-CD8-AAA", "CCCC-CD4-AAA"]);
    }

    #[test]
    fn test_save_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.tsv");
        let table = vec![rec("AAAA", "CD4", "GGG", 3), rec("AAAA", "CD8", "TTT", 1)];
        save_count_table(&path, &table).unwrap();
        assert_eq!(read_count_table(&path).unwrap(), table);
    }
}
