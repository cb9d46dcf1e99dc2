pub mod filters;

pub use filters::apply_filters;
pub use filters::Comparison;
pub use filters::CountFilter;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::fileformat::{CountRecord, CountTable, SequenceRecord};
use crate::utils::{log_progress, Summary};

///////////////////////////////
/// N50 of a list of counts: sorted ascending, the first value at which the running sum reaches half
/// of the total. Empty input gives 0
pub fn n50(values: &[u64]) -> u64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let total: u64 = sorted.iter().sum();

    let mut cumulative = 0;
    for v in sorted {
        cumulative += v;
        if 2 * cumulative >= total {
            return v;
        }
    }
    0
}

///////////////////////////////
/// Target name from a per-target read file such as "sample1.CD9-umis.fasta": the part before the
/// first '-', then the last '.'-separated component of that
pub fn target_name_from_path(path: &Path) -> String {
    let basename = basename(path);
    let before_dash = basename.split('-').next().unwrap_or(&basename);
    before_dash
        .rsplit('.')
        .next()
        .unwrap_or(before_dash)
        .to_string()
}

///////////////////////////////
/// Sample name from a per-target read file: everything before the first '.'
pub fn sample_name_from_path(path: &Path) -> String {
    let basename = basename(path);
    basename.split('.').next().unwrap_or(&basename).to_string()
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}

///////////////////////////////
/// Per-target statistics, over barcodes passing the read count filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    #[serde(rename = "Target")]
    pub target: String,
    #[serde(rename = "Total # UMI")]
    pub total_umis: u64,
    #[serde(rename = "N50(UMI/Barcode)")]
    pub n50_umis: u64,
    #[serde(rename = "Total # Reads")]
    pub total_reads: u64,
    #[serde(rename = "N50(Reads/Barcode)")]
    pub n50_reads: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub target_reads: u64,
    pub reads_without_barcode: u64,
}

//Barcode, target index, UMI
type CountKey = (String, usize, String);

///////////////////////////////
/// Counts reads per (barcode, target, UMI). The read sequence is the corrected UMI. The barcode
/// is either the tag at the end of the read id, or looked up by read id
pub struct Aggregator {
    sample: String,
    separator: String,
    targets: Vec<String>,
    counts: BTreeMap<CountKey, u64>,
    barcode_by_read: Option<FxHashMap<String, String>>,
    pub stats: AggregateStats,
}

impl Aggregator {
    pub fn new(sample: &str, separator: &str) -> Aggregator {
        Aggregator {
            sample: sample.to_string(),
            separator: separator.to_string(),
            targets: Vec::new(),
            counts: BTreeMap::new(),
            barcode_by_read: None,
            stats: AggregateStats::default(),
        }
    }

    ///////////////////////////////
    /// Take barcodes from a read id -> barcode map instead of from the read tags
    pub fn with_barcode_lookup(mut self, barcode_by_read: FxHashMap<String, String>) -> Aggregator {
        self.barcode_by_read = Some(barcode_by_read);
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    fn target_index(&mut self, target: &str) -> usize {
        match self.targets.iter().position(|t| t == target) {
            Some(i) => i,
            None => {
                self.targets.push(target.to_string());
                self.targets.len() - 1
            }
        }
    }

    fn barcode_of<'a>(&'a self, record: &'a SequenceRecord) -> Option<&'a str> {
        match &self.barcode_by_read {
            Some(lookup) => lookup.get(record.id()).map(|s| s.as_str()),
            None => record.tag(&self.separator),
        }
    }

    pub fn add_record(&mut self, target: &str, record: &SequenceRecord) {
        let target_index = self.target_index(target);
        self.stats.target_reads += 1;

        let barcode = match self.barcode_of(record).map(|b| b.to_string()) {
            Some(barcode) => barcode,
            None => {
                self.stats.reads_without_barcode += 1;
                return;
            }
        };
        let umi = String::from_utf8_lossy(&record.sequence).into_owned();
        *self.counts.entry((barcode, target_index, umi)).or_insert(0) += 1;
    }

    ///////////////////////////////
    /// Count all reads of one target
    pub fn add_reads<I>(&mut self, target: &str, reads: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<SequenceRecord>>,
    {
        //Register the target even if it has no reads
        self.target_index(target);

        let mut num_reads = 0;
        for record in reads {
            let record = record?;
            self.add_record(target, &record);
            num_reads += 1;
            log_progress("target reads", num_reads);
        }
        debug!("Target {}: {} reads", target, num_reads);
        Ok(())
    }

    pub fn num_barcodes(&self) -> usize {
        //Keys are sorted by barcode first
        self.counts.keys().map(|(barcode, _, _)| barcode).dedup().count()
    }

    ///////////////////////////////
    /// The complete count table, sorted by barcode, target and UMI
    pub fn count_table(&self) -> CountTable {
        let mut table: CountTable = self
            .counts
            .iter()
            .map(|((barcode, target, umi), count)| CountRecord {
                barcode: barcode.clone(),
                target: self.targets[*target].clone(),
                umi: umi.clone(),
                read_count: *count,
                sample: self.sample.clone(),
            })
            .collect();
        //Target order in the map is registration order, not name order
        crate::fileformat::sort_count_table(&mut table);
        table
    }

    ///////////////////////////////
    /// Per-target UMI and read statistics. A barcode contributes to a target if it has at least
    /// min_reads reads for it; with min_reads 0, barcodes without reads for the target count as zero
    pub fn target_summaries(&self, min_reads: u64) -> Vec<TargetSummary> {
        //Barcode -> (UMIs, reads) per target
        let mut per_barcode: BTreeMap<&str, Vec<(u64, u64)>> = BTreeMap::new();
        for ((barcode, target, _), count) in &self.counts {
            let entry = per_barcode
                .entry(barcode.as_str())
                .or_insert_with(|| vec![(0, 0); self.targets.len()]);
            entry[*target].0 += 1;
            entry[*target].1 += count;
        }

        self.targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let (umis, reads): (Vec<u64>, Vec<u64>) = per_barcode
                    .values()
                    .map(|per_target| per_target[i])
                    .filter(|(_, reads)| *reads >= min_reads)
                    .unzip();
                TargetSummary {
                    target: target.clone(),
                    total_umis: umis.iter().sum(),
                    n50_umis: n50(&umis),
                    total_reads: reads.iter().sum(),
                    n50_reads: n50(&reads),
                }
            })
            .collect()
    }

    pub fn to_summary(&self, name: &str) -> Summary {
        let mut summary = Summary::new(name);
        summary.set("Total target reads", self.stats.target_reads);
        summary.set("Target reads without barcode", self.stats.reads_without_barcode);
        summary.set("Total barcode count", self.num_barcodes() as u64);
        summary
    }

    pub fn log_target_summaries(&self, min_reads: u64) {
        info!("Results for barcodes with at least {} reads per target", min_reads);
        info!("Target\tTotal # UMI\tN50(UMI/Barcode)\tTotal # Reads\tN50(Reads/Barcode)");
        for s in self.target_summaries(min_reads) {
            info!(
                "{}\t{}\t{}\t{}\t{}",
                s.target, s.total_umis, s.n50_umis, s.total_reads, s.n50_reads
            );
        }
    }
}
