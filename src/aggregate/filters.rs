use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use log::info;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::fileformat::{CountRecord, CountTable};
use crate::umi::{ClusterMethod, SequenceCounts};

pub const DEFAULT_JACCARD_THRESHOLD: f64 = 0.8;
pub const DEFAULT_JACCARD_MIN_LEN: usize = 3;
pub const DEFAULT_CONNECTED_DISTANCE: u32 = 2;
pub const DEFAULT_CONNECTED_BARCODE_LENGTH: usize = 20;

///////////////////////////////
/// Comparison of a value against a filter threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Comparison {
    #[default]
    #[strum(to_string = "gt")]
    Gt,
    #[strum(to_string = "ge")]
    Ge,
    #[strum(to_string = "lt")]
    Lt,
    #[strum(to_string = "le")]
    Le,
    #[strum(to_string = "eq")]
    Eq,
}

impl Comparison {
    pub fn keep<T: PartialOrd>(&self, value: T, threshold: T) -> bool {
        match self {
            Comparison::Gt => value > threshold,
            Comparison::Ge => value >= threshold,
            Comparison::Lt => value < threshold,
            Comparison::Le => value <= threshold,
            Comparison::Eq => value == threshold,
        }
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(Comparison::Gt),
            "ge" => Ok(Comparison::Ge),
            "lt" => Ok(Comparison::Lt),
            "le" => Ok(Comparison::Le),
            "eq" => Ok(Comparison::Eq),
            _ => Err(format!("Unknown comparison operator: {}", s)),
        }
    }
}

///////////////////////////////
/// Post-processing filters over a count table. Each keeps or removes whole rows
#[derive(Debug, Clone, PartialEq)]
pub enum CountFilter {
    //Read count of each molecule
    ReadCount(Comparison, u64),
    //Total read count of each barcode
    BarcodeReads(Comparison, u64),
    //Number of rows (UMIs) of each barcode
    BarcodeUmis(Comparison, u64),
    //Read count of each molecule against a quantile of its barcode's read counts
    Quantile(Comparison, f64),
    //Number of distinct targets of each barcode
    Targets(Comparison, u64),
    //Remove barcodes sharing at least this many (target, UMI) combinations
    Duplicates(usize),
    //Remove barcodes whose (target, UMI) sets overlap with a Jaccard index above a threshold
    DuplicatesJaccard { threshold: f64, min_len: usize },
    //Keep only barcodes of a given length that do not cluster with any other barcode
    Connected { distance: u32, barcode_length: usize },
    //Number of rows sharing the (UMI, target) combination
    SharedTargets(Comparison, u64),
    //Number of rows sharing the UMI
    SharedUmis(Comparison, u64),
}

impl CountFilter {
    pub fn apply(&self, table: &[CountRecord]) -> CountTable {
        match self {
            CountFilter::ReadCount(op, threshold) => table
                .iter()
                .filter(|r| op.keep(r.read_count, *threshold))
                .cloned()
                .collect(),
            CountFilter::BarcodeReads(op, threshold) => {
                let totals = group_sum(table, |r| r.barcode.as_str());
                keep_rows(table, |r| op.keep(totals[r.barcode.as_str()], *threshold))
            }
            CountFilter::BarcodeUmis(op, threshold) => {
                let counts = group_count(table, |r| r.barcode.as_str());
                keep_rows(table, |r| op.keep(counts[r.barcode.as_str()], *threshold))
            }
            CountFilter::Quantile(op, q) => {
                let mut per_barcode: FxHashMap<&str, Vec<u64>> = FxHashMap::default();
                for r in table {
                    per_barcode.entry(r.barcode.as_str()).or_default().push(r.read_count);
                }
                let cutoffs: FxHashMap<&str, f64> = per_barcode
                    .into_iter()
                    .map(|(barcode, counts)| (barcode, quantile(counts, *q)))
                    .collect();
                keep_rows(table, |r| op.keep(r.read_count as f64, cutoffs[r.barcode.as_str()]))
            }
            CountFilter::Targets(op, threshold) => {
                let mut targets: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
                for r in table {
                    targets.entry(r.barcode.as_str()).or_default().insert(r.target.as_str());
                }
                keep_rows(table, |r| {
                    op.keep(targets[r.barcode.as_str()].len() as u64, *threshold)
                })
            }
            CountFilter::Duplicates(threshold) => {
                let sets = barcodes_per_molecule(table, *threshold);
                let mut remove: FxHashSet<&str> = FxHashSet::default();
                for (a, b) in sets.iter().tuple_combinations() {
                    let shared: Vec<&str> = a.intersection(b).copied().collect();
                    if shared.len() >= *threshold {
                        remove.extend(shared);
                    }
                }
                keep_rows(table, |r| !remove.contains(r.barcode.as_str()))
            }
            CountFilter::DuplicatesJaccard { threshold, min_len } => {
                let sets = barcodes_per_molecule(table, *min_len);
                let mut remove: FxHashSet<&str> = FxHashSet::default();
                for (a, b) in sets.iter().tuple_combinations() {
                    let shared: Vec<&str> = a.intersection(b).copied().collect();
                    if shared.is_empty() {
                        continue;
                    }
                    let union = a.union(b).count();
                    if shared.len() as f64 / union as f64 > *threshold {
                        remove.extend(shared);
                    }
                }
                keep_rows(table, |r| !remove.contains(r.barcode.as_str()))
            }
            CountFilter::Connected {
                distance,
                barcode_length,
            } => {
                let mut counts = SequenceCounts::new();
                for (barcode, reads) in group_sum(table, |r| r.barcode.as_str())
                    .into_iter()
                    .sorted()
                {
                    if barcode.len() == *barcode_length {
                        counts.insert(barcode.as_bytes().to_vec(), reads);
                    }
                }
                info!("Barcodes before clustering: {}", counts.len());
                let clusters = ClusterMethod::Cluster.cluster(&counts, *distance);
                info!("Barcode clusters: {}", clusters.len());

                let isolated: FxHashSet<&[u8]> = clusters
                    .iter()
                    .filter(|c| c.members.len() == 1)
                    .map(|c| c.canonical.as_slice())
                    .collect();
                keep_rows(table, |r| isolated.contains(r.barcode.as_bytes()))
            }
            CountFilter::SharedTargets(op, threshold) => {
                let counts = group_count(table, |r| (r.umi.as_str(), r.target.as_str()));
                keep_rows(table, |r| {
                    op.keep(counts[&(r.umi.as_str(), r.target.as_str())], *threshold)
                })
            }
            CountFilter::SharedUmis(op, threshold) => {
                let counts = group_count(table, |r| r.umi.as_str());
                keep_rows(table, |r| op.keep(counts[r.umi.as_str()], *threshold))
            }
        }
    }
}

fn keep_rows<F>(table: &[CountRecord], keep: F) -> CountTable
where
    F: Fn(&CountRecord) -> bool,
{
    table.iter().filter(|r| keep(r)).cloned().collect()
}

fn group_sum<'a, K, F>(table: &'a [CountRecord], key: F) -> FxHashMap<K, u64>
where
    K: std::hash::Hash + Eq,
    F: Fn(&'a CountRecord) -> K,
{
    let mut sums = FxHashMap::default();
    for r in table {
        *sums.entry(key(r)).or_insert(0) += r.read_count;
    }
    sums
}

fn group_count<'a, K, F>(table: &'a [CountRecord], key: F) -> FxHashMap<K, u64>
where
    K: std::hash::Hash + Eq,
    F: Fn(&'a CountRecord) -> K,
{
    let mut counts = FxHashMap::default();
    for r in table {
        *counts.entry(key(r)).or_insert(0) += 1;
    }
    counts
}

///////////////////////////////
/// Barcodes seen with each (target, UMI) combination, for combinations seen with at least
/// min_len barcodes
fn barcodes_per_molecule(table: &[CountRecord], min_len: usize) -> Vec<BTreeSet<&str>> {
    let mut sets: BTreeMap<(&str, &str), BTreeSet<&str>> = BTreeMap::new();
    for r in table {
        sets.entry((r.target.as_str(), r.umi.as_str()))
            .or_default()
            .insert(r.barcode.as_str());
    }
    sets.into_values().filter(|s| s.len() >= min_len).collect()
}

///////////////////////////////
/// Quantile with linear interpolation between closest ranks
pub fn quantile(mut values: Vec<u64>, q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    values[lo] as f64 + (values[hi] as f64 - values[lo] as f64) * frac
}

fn num_barcodes(table: &[CountRecord]) -> usize {
    table.iter().map(|r| r.barcode.as_str()).collect::<FxHashSet<_>>().len()
}

///////////////////////////////
/// Apply filters in order, logging how many barcodes each one removes
pub fn apply_filters(table: CountTable, filters: &[CountFilter]) -> CountTable {
    let mut table = table;
    for filter in filters {
        let before = num_barcodes(&table);
        info!("Filtering: {}", filter);
        table = filter.apply(&table);

        let after = num_barcodes(&table);
        let removed = before - after;
        let percent = if before > 0 {
            100.0 * removed as f64 / before as f64
        } else {
            0.0
        };
        info!("Barcodes = {} (-{}, -{:.2}%)", after, removed, percent);
    }
    table
}

impl fmt::Display for CountFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CountFilter::ReadCount(op, t) => write!(f, "molecules by read count {} {}", op, t),
            CountFilter::BarcodeReads(op, t) => {
                write!(f, "barcodes by total read count {} {}", op, t)
            }
            CountFilter::BarcodeUmis(op, t) => write!(f, "barcodes by total UMI count {} {}", op, t),
            CountFilter::Quantile(op, q) => {
                write!(f, "barcodes individually by read count {} quantile {}", op, q)
            }
            CountFilter::Targets(op, t) => write!(f, "barcodes by number of targets {} {}", op, t),
            CountFilter::Duplicates(t) => {
                write!(f, "barcodes sharing {} or more UMI + target combinations", t)
            }
            CountFilter::DuplicatesJaccard { threshold, min_len } => write!(
                f,
                "barcodes in UMI + target combinations of at least {} barcodes with Jaccard index > {}",
                min_len, threshold
            ),
            CountFilter::Connected {
                distance,
                barcode_length,
            } => write!(
                f,
                "barcodes of length {} within distance {} of another barcode",
                barcode_length, distance
            ),
            CountFilter::SharedTargets(op, t) => {
                write!(f, "molecules by barcodes sharing UMI + target {} {}", op, t)
            }
            CountFilter::SharedUmis(op, t) => {
                write!(f, "molecules by barcodes sharing UMI {} {}", op, t)
            }
        }
    }
}

///////////////////////////////
/// Parse a filter given as name[:op]:value, e.g. "rc:ge:2", "quantile:0.1", "dups-jaccard:0.8:3"
impl FromStr for CountFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split(':').collect();
        let name = parts.remove(0);

        //Operator is optional and comes first
        let op = match parts.first().map(|p| p.parse::<Comparison>()) {
            Some(Ok(op)) => {
                parts.remove(0);
                op
            }
            _ => Comparison::default(),
        };

        fn value<T: FromStr>(filter: &str, parts: &[&str], i: usize) -> Result<Option<T>, String> {
            match parts.get(i) {
                Some(p) => p
                    .parse::<T>()
                    .map(Some)
                    .map_err(|_| format!("Invalid value '{}' for filter {}", p, filter)),
                None => Ok(None),
            }
        }
        let required = |i: usize| -> Result<u64, String> {
            value::<u64>(name, &parts, i)?.ok_or_else(|| format!("Filter {} needs a value", name))
        };

        let filter = match name {
            "rc" => CountFilter::ReadCount(op, required(0)?),
            "rc-sum" => CountFilter::BarcodeReads(op, required(0)?),
            "uc" => CountFilter::BarcodeUmis(op, required(0)?),
            "targets" => CountFilter::Targets(op, required(0)?),
            "shared-targets" => CountFilter::SharedTargets(op, required(0)?),
            "shared-umis" => CountFilter::SharedUmis(op, required(0)?),
            "quantile" => {
                let q: f64 = value(name, &parts, 0)?
                    .ok_or_else(|| format!("Filter {} needs a value", name))?;
                if !(0.0..=1.0).contains(&q) {
                    return Err(format!("Quantile must be between 0 and 1, got {}", q));
                }
                CountFilter::Quantile(op, q)
            }
            "dups" => CountFilter::Duplicates(required(0)? as usize),
            "dups-jaccard" => CountFilter::DuplicatesJaccard {
                threshold: value(name, &parts, 0)?.unwrap_or(DEFAULT_JACCARD_THRESHOLD),
                min_len: value(name, &parts, 1)?.unwrap_or(DEFAULT_JACCARD_MIN_LEN),
            },
            "connected" => CountFilter::Connected {
                distance: value(name, &parts, 0)?.unwrap_or(DEFAULT_CONNECTED_DISTANCE),
                barcode_length: value(name, &parts, 1)?
                    .unwrap_or(DEFAULT_CONNECTED_BARCODE_LENGTH),
            },
            _ => return Err(format!("Unknown filter: {}", name)),
        };
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(barcode: &str, target: &str, umi: &str, read_count: u64) -> CountRecord {
        CountRecord {
            barcode: barcode.to_string(),
            target: target.to_string(),
            umi: umi.to_string(),
            read_count,
            sample: "S".to_string(),
        }
    }

    fn barcodes(table: &[CountRecord]) -> Vec<&str> {
        table.iter().map(|r| r.barcode.as_str()).dedup().collect()
    }

    fn example() -> CountTable {
        vec![
            row("BC1", "T1", "AAA", 5),
            row("BC1", "T1", "CCC", 1),
            row("BC1", "T2", "GGG", 2),
            row("BC2", "T1", "AAA", 1),
            row("BC3", "T1", "TTT", 3),
            row("BC3", "T2", "AAA", 3),
        ]
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "rc:ge:2".parse::<CountFilter>().unwrap(),
            CountFilter::ReadCount(Comparison::Ge, 2)
        );
        assert_eq!(
            "uc:3".parse::<CountFilter>().unwrap(),
            CountFilter::BarcodeUmis(Comparison::Gt, 3)
        );
        assert_eq!(
            "dups-jaccard".parse::<CountFilter>().unwrap(),
            CountFilter::DuplicatesJaccard {
                threshold: 0.8,
                min_len: 3
            }
        );
        assert_eq!(
            "connected:1".parse::<CountFilter>().unwrap(),
            CountFilter::Connected {
                distance: 1,
                barcode_length: 20
            }
        );
        assert!("rc".parse::<CountFilter>().is_err());
        assert!("rc:x".parse::<CountFilter>().is_err());
        assert!("quantile:1.5".parse::<CountFilter>().is_err());
        assert!("nope:1".parse::<CountFilter>().is_err());
    }

    #[test]
    fn test_comparison() {
        assert!(Comparison::Gt.keep(2, 1));
        assert!(!Comparison::Gt.keep(1, 1));
        assert!(Comparison::Ge.keep(1, 1));
        assert!(Comparison::Lt.keep(0, 1));
        assert!(Comparison::Le.keep(1, 1));
        assert!(Comparison::Eq.keep(1, 1));
        assert_eq!("le".parse::<Comparison>().unwrap(), Comparison::Le);
    }

    #[test]
    fn test_read_count_filters() {
        let table = example();
        let out = CountFilter::ReadCount(Comparison::Gt, 1).apply(&table);
        assert_eq!(out.len(), 4);

        let out = CountFilter::BarcodeReads(Comparison::Ge, 6).apply(&table);
        assert_eq!(barcodes(&out), vec!["BC1", "BC3"]);

        let out = CountFilter::BarcodeUmis(Comparison::Gt, 2).apply(&table);
        assert_eq!(barcodes(&out), vec!["BC1"]);

        let out = CountFilter::Targets(Comparison::Eq, 1).apply(&table);
        assert_eq!(barcodes(&out), vec!["BC2"]);
    }

    #[test]
    fn test_quantile() {
        assert_eq!(quantile(vec![1, 2, 3, 4], 0.5), 2.5);
        assert_eq!(quantile(vec![5, 1, 2], 0.0), 1.0);
        assert_eq!(quantile(vec![5, 1, 2], 1.0), 5.0);

        //BC1 median is 2, keep molecules above it
        let out = CountFilter::Quantile(Comparison::Gt, 0.5).apply(&example());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].umi, "AAA");
        assert_eq!(out[0].barcode, "BC1");
    }

    #[test]
    fn test_duplicates() {
        let table = vec![
            row("BC1", "T1", "AAA", 1),
            row("BC2", "T1", "AAA", 1),
            row("BC1", "T1", "CCC", 1),
            row("BC2", "T1", "CCC", 1),
            row("BC3", "T1", "AAA", 1),
            row("BC4", "T1", "GGG", 1),
        ];
        let out = CountFilter::Duplicates(2).apply(&table);
        assert_eq!(barcodes(&out), vec!["BC3", "BC4"]);

        //{BC1,BC2,BC3} and {BC1,BC2}: Jaccard 2/3
        let out = CountFilter::DuplicatesJaccard {
            threshold: 0.5,
            min_len: 2,
        }
        .apply(&table);
        assert_eq!(barcodes(&out), vec!["BC3", "BC4"]);

        let out = CountFilter::DuplicatesJaccard {
            threshold: 0.7,
            min_len: 2,
        }
        .apply(&table);
        assert_eq!(out.len(), table.len());
    }

    #[test]
    fn test_connected() {
        let table = vec![
            row("AAAAAAAA", "T1", "A", 5),
            row("AAAAAAAT", "T1", "A", 1),
            row("CCCCCCCC", "T1", "A", 2),
            row("GGGG", "T1", "A", 2),
        ];
        let out = CountFilter::Connected {
            distance: 1,
            barcode_length: 8,
        }
        .apply(&table);
        assert_eq!(barcodes(&out), vec!["CCCCCCCC"]);
    }

    #[test]
    fn test_shared() {
        let table = example();
        let out = CountFilter::SharedUmis(Comparison::Gt, 1).apply(&table);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.umi == "AAA"));

        let out = CountFilter::SharedTargets(Comparison::Gt, 1).apply(&table);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_apply_filters() {
        let filters = vec![
            CountFilter::ReadCount(Comparison::Gt, 1),
            CountFilter::BarcodeUmis(Comparison::Ge, 2),
        ];
        let out = apply_filters(example(), &filters);
        assert_eq!(barcodes(&out), vec!["BC1", "BC3"]);
        assert_eq!(out.len(), 4);
    }
}
