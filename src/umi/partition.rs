use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::debug;
use rustc_hash::FxHashSet;

use super::{ClusterMethod, SequenceCounts};
use crate::fileformat::{RecordSink, SequenceRecord};
use crate::utils::Summary;

//Raw UMI -> reads carrying it, in arrival order
type PartitionReads = IndexMap<Vec<u8>, Vec<SequenceRecord>>;

///////////////////////////////
/// How the input is laid out with respect to the partition key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOrder {
    //All reads of a barcode are contiguous. Memory is bounded by the largest partition
    Grouped,
    //Any order. Every read is held in memory until the end of the input
    Unsorted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub reads_total: u64,
    pub reads_wrong_length: u64,
    pub reads_without_barcode: u64,
    pub reads_discarded: u64,
    pub reads_written: u64,
    pub partitions: u64,
    pub umis_before: u64,
    pub umis_after: u64,
}

impl PartitionStats {
    pub fn to_summary(&self, name: &str) -> Summary {
        let mut summary = Summary::new(name);
        summary.set("Reads total", self.reads_total);
        summary.set("Reads with wrong UMI length", self.reads_wrong_length);
        summary.set("Reads without barcode", self.reads_without_barcode);
        summary.set("DBS clusters linked to ABC", self.partitions);
        summary.set("Total UMIs", self.umis_before);
        summary.set("Total clustered UMIs", self.umis_after);
        if self.reads_discarded > 0 {
            summary.set("Reads discarded by clustering", self.reads_discarded);
        }
        summary.set("Reads written", self.reads_written);
        summary
    }
}

///////////////////////////////
/// Clusters UMIs separately for each droplet barcode. The barcode is read from the tag at the end
/// of each read id; the read sequence is the UMI.
///
/// Reads go in one at a time with `push`. In grouped mode a partition is clustered and written as
/// soon as the barcode changes. A barcode showing up again after its partition was written is an
/// error, since its reads would otherwise be clustered in two separate runs
pub struct PartitionedUmiClusterer {
    method: ClusterMethod,
    threshold: u32,
    umi_length: usize,
    separator: String,
    order: InputOrder,

    pending: IndexMap<String, PartitionReads>,
    flushed: FxHashSet<String>,
    pub stats: PartitionStats,
}

impl PartitionedUmiClusterer {
    pub fn new(
        method: ClusterMethod,
        threshold: u32,
        umi_length: usize,
        separator: &str,
        order: InputOrder,
    ) -> PartitionedUmiClusterer {
        PartitionedUmiClusterer {
            method,
            threshold,
            umi_length,
            separator: separator.to_string(),
            order,
            pending: IndexMap::new(),
            flushed: FxHashSet::default(),
            stats: PartitionStats::default(),
        }
    }

    pub fn push<S: RecordSink>(&mut self, record: SequenceRecord, sink: &mut S) -> Result<()> {
        self.stats.reads_total += 1;

        if record.len() != self.umi_length {
            self.stats.reads_wrong_length += 1;
            return Ok(());
        }

        let key = match record.tag(&self.separator) {
            Some(key) => key.to_string(),
            None => {
                debug!("No barcode in read name {}", record.name);
                self.stats.reads_without_barcode += 1;
                return Ok(());
            }
        };

        if self.order == InputOrder::Grouped {
            let is_current = match self.pending.last() {
                Some((current, _)) => *current == key,
                None => false,
            };
            if !is_current {
                self.flush(sink)?;
                if self.flushed.contains(&key) {
                    bail!(
                        "Input is not grouped by barcode: read {} has barcode {}, which was seen earlier in the file. \
                        Sort the input by barcode, or run in unsorted mode",
                        record.name,
                        key
                    );
                }
            }
        }

        self.pending
            .entry(key)
            .or_default()
            .entry(record.sequence.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    ///////////////////////////////
    /// Cluster and write everything not yet written
    pub fn flush<S: RecordSink>(&mut self, sink: &mut S) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for (key, reads) in pending {
            self.cluster_partition(&key, reads, sink)?;
            if self.order == InputOrder::Grouped {
                self.flushed.insert(key);
            }
        }
        Ok(())
    }

    pub fn finish<S: RecordSink>(mut self, sink: &mut S) -> Result<PartitionStats> {
        self.flush(sink)?;
        Ok(self.stats)
    }

    fn cluster_partition<S: RecordSink>(
        &mut self,
        key: &str,
        mut reads: PartitionReads,
        sink: &mut S,
    ) -> Result<()> {
        let counts: SequenceCounts = reads
            .iter()
            .map(|(umi, recs)| (umi.clone(), recs.len() as u64))
            .collect();
        let num_reads: u64 = counts.values().sum();

        let clusters = self.method.cluster(&counts, self.threshold);

        self.stats.partitions += 1;
        self.stats.umis_before += counts.len() as u64;
        self.stats.umis_after += clusters.len() as u64;
        debug!(
            "Barcode {}: {} reads, {} UMIs, {} after clustering",
            key,
            num_reads,
            counts.len(),
            clusters.len()
        );

        let mut num_written = 0;
        for cluster in &clusters {
            for member in &cluster.members {
                if let Some(records) = reads.swap_remove(member) {
                    for mut rec in records {
                        rec.replace_sequence(&cluster.canonical);
                        sink.write_record(&rec)?;
                        num_written += 1;
                    }
                }
            }
        }
        self.stats.reads_written += num_written;
        self.stats.reads_discarded += num_reads - num_written;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(name: &str, umi: &str) -> SequenceRecord {
        SequenceRecord::new(name, umi.as_bytes(), None)
    }

    fn two_partitions() -> Vec<SequenceRecord> {
        vec![
            read("r1_BC1", "AAAAAA"),
            read("r2_BC1", "AAAAAT"),
            read("r3_BC1", "AAAAAA"),
            read("r4_BC1", "AAAAAA"),
            read("r5_BC2", "GGGGGG"),
            read("r6_BC2", "GGGGGG"),
        ]
    }

    fn run(reads: Vec<SequenceRecord>, order: InputOrder) -> Result<(Vec<SequenceRecord>, PartitionStats)> {
        let mut clusterer =
            PartitionedUmiClusterer::new(ClusterMethod::Directional, 1, 6, "_", order);
        let mut out = Vec::new();
        for rec in reads {
            clusterer.push(rec, &mut out)?;
        }
        let stats = clusterer.finish(&mut out)?;
        Ok((out, stats))
    }

    #[test]
    fn test_two_partitions() {
        let (out, stats) = run(two_partitions(), InputOrder::Grouped).unwrap();

        assert_eq!(out.len(), 6);
        for rec in &out[..4] {
            assert_eq!(rec.sequence, b"AAAAAA".to_vec());
            assert_eq!(rec.tag("_"), Some("BC1"));
        }
        for rec in &out[4..] {
            assert_eq!(rec.sequence, b"GGGGGG".to_vec());
            assert_eq!(rec.tag("_"), Some("BC2"));
        }

        //Read names are kept; most common UMI first, then arrival order
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["r1_BC1", "r3_BC1", "r4_BC1", "r2_BC1", "r5_BC2", "r6_BC2"]);

        assert_eq!(stats.partitions, 2);
        assert_eq!(stats.umis_before, 3);
        assert_eq!(stats.umis_after, 2);
        assert_eq!(stats.reads_written, 6);
    }

    #[test]
    fn test_umis_not_merged_across_partitions() {
        let reads = vec![
            read("r1_BC1", "AAAAAA"),
            read("r2_BC1", "AAAAAA"),
            read("r3_BC1", "AAAAAA"),
            read("r4_BC2", "AAAAAT"),
        ];
        let (out, _) = run(reads, InputOrder::Grouped).unwrap();
        assert_eq!(out[3].sequence, b"AAAAAT".to_vec());
    }

    #[test]
    fn test_wrong_length_and_missing_barcode() {
        let reads = vec![
            read("r1_BC1", "AAAAAA"),
            read("r2_BC1", "AAAAA"),
            read("r3", "AAAAAA"),
        ];
        let (out, stats) = run(reads, InputOrder::Grouped).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(stats.reads_total, 3);
        assert_eq!(stats.reads_wrong_length, 1);
        assert_eq!(stats.reads_without_barcode, 1);
    }

    #[test]
    fn test_ungrouped_input_is_rejected() {
        let mut reads = two_partitions();
        reads.push(read("r7_BC1", "AAAAAA"));

        let err = run(reads, InputOrder::Grouped).unwrap_err();
        assert!(err.to_string().contains("r7_BC1"));
    }

    #[test]
    fn test_unsorted_mode() {
        let mut reads = two_partitions();
        reads.push(read("r7_BC1", "AAAAAA"));
        reads.swap(0, 5);

        let (out, stats) = run(reads, InputOrder::Unsorted).unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(stats.partitions, 2);

        //Partitions come out in order of first appearance
        assert_eq!(out[0].tag("_"), Some("BC2"));
        assert!(out[2..].iter().all(|r| r.sequence == b"AAAAAA".to_vec()));
    }

    #[test]
    fn test_empty_input() {
        let (out, stats) = run(Vec::new(), InputOrder::Grouped).unwrap();
        assert!(out.is_empty());
        assert_eq!(stats.partitions, 0);
    }
}
