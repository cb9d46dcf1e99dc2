use anyhow::Result;
use log::{debug, info};
use rustc_hash::FxHashMap;

use super::IupacPattern;
use crate::fileformat::{CorrectionTableEntry, RecordSink, SequenceRecord};
use crate::umi::Cluster;
use crate::utils::{log_progress, Summary};

///////////////////////////////
/// Raw sequence -> canonical sequence. Each canonical is stored once
#[derive(Debug, Clone, Default)]
pub struct CorrectionMap {
    canonical: Vec<Vec<u8>>,
    raw_to_canonical: FxHashMap<Vec<u8>, u32>,
    pub num_rejected_by_pattern: u64,
}

impl CorrectionMap {
    pub fn new() -> CorrectionMap {
        CorrectionMap::default()
    }

    ///////////////////////////////
    /// Build from correction table entries. If a raw sequence is listed under several canonical
    /// sequences, the first one wins. Clusters whose canonical does not fit the pattern are skipped
    pub fn from_table<I>(entries: I, pattern: Option<&IupacPattern>) -> Result<CorrectionMap>
    where
        I: IntoIterator<Item = Result<CorrectionTableEntry>>,
    {
        let mut map = CorrectionMap::new();
        for entry in entries {
            let entry = entry?;
            if let Some(pattern) = pattern {
                if !pattern.matches(&entry.canonical) {
                    debug!(
                        "Canonical {} does not match pattern {}",
                        String::from_utf8_lossy(&entry.canonical),
                        pattern
                    );
                    map.num_rejected_by_pattern += 1;
                    continue;
                }
            }
            map.insert(&entry.canonical, entry.raw.iter());
        }
        Ok(map)
    }

    pub fn from_clusters(clusters: &[Cluster]) -> CorrectionMap {
        let mut map = CorrectionMap::new();
        for cluster in clusters {
            map.insert(&cluster.canonical, cluster.members.iter());
        }
        map
    }

    fn insert<'a>(&mut self, canonical: &[u8], raw: impl Iterator<Item = &'a Vec<u8>>) {
        let index = self.canonical.len() as u32;
        self.canonical.push(canonical.to_vec());
        for seq in raw {
            self.raw_to_canonical.entry(seq.clone()).or_insert(index);
        }
    }

    pub fn get(&self, raw: &[u8]) -> Option<&[u8]> {
        self.raw_to_canonical
            .get(raw)
            .map(|i| self.canonical[*i as usize].as_slice())
    }

    pub fn num_clusters(&self) -> usize {
        self.canonical.len()
    }

    pub fn num_raw(&self) -> usize {
        self.raw_to_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_to_canonical.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionStats {
    pub reads_total: u64,
    pub reads_corrected: u64,
    pub reads_dropped: u64,
}

impl CorrectionStats {
    pub fn to_summary(&self, name: &str) -> Summary {
        let mut summary = Summary::new(name);
        summary.set("Reads total", self.reads_total);
        summary.set("Reads corrected", self.reads_corrected);
        summary.set("Reads without corrected sequence", self.reads_dropped);
        summary
    }
}

///////////////////////////////
/// Replaces read sequences with their canonical sequence. Reads not in the map are dropped
pub struct BarcodeCorrector<'a> {
    map: &'a CorrectionMap,
    pub stats: CorrectionStats,
}

impl<'a> BarcodeCorrector<'a> {
    pub fn new(map: &'a CorrectionMap) -> BarcodeCorrector<'a> {
        BarcodeCorrector {
            map,
            stats: CorrectionStats::default(),
        }
    }

    ///////////////////////////////
    /// Correct one read in place. Returns false if the read should be dropped
    pub fn correct_record(&mut self, record: &mut SequenceRecord) -> bool {
        self.stats.reads_total += 1;
        match self.map.get(&record.sequence) {
            Some(canonical) => {
                record.replace_sequence(canonical);
                self.stats.reads_corrected += 1;
                true
            }
            None => {
                self.stats.reads_dropped += 1;
                false
            }
        }
    }

    ///////////////////////////////
    /// Correct all reads, writing the kept ones in arrival order
    pub fn run<I, S>(&mut self, reads: I, sink: &mut S) -> Result<()>
    where
        I: IntoIterator<Item = Result<SequenceRecord>>,
        S: RecordSink,
    {
        for record in reads {
            let mut record = record?;
            if self.correct_record(&mut record) {
                sink.write_record(&record)?;
            }
            log_progress("reads", self.stats.reads_total);
        }
        info!(
            "Corrected {} out of {} reads",
            self.stats.reads_corrected, self.stats.reads_total
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileformat::{CorrectionTableReader, FastxFormat, FastxWriter};

    fn map_from_text(text: &str, pattern: Option<&IupacPattern>) -> CorrectionMap {
        CorrectionMap::from_table(CorrectionTableReader::new(text.as_bytes()), pattern).unwrap()
    }

    fn correct(map: &CorrectionMap, seqs: &[&str]) -> (Vec<SequenceRecord>, CorrectionStats) {
        let reads = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| Ok(SequenceRecord::new(&format!("read{}", i), s.as_bytes(), None)));
        let mut corrector = BarcodeCorrector::new(map);
        let mut out = Vec::new();
        corrector.run(reads, &mut out).unwrap();
        (out, corrector.stats)
    }

    #[test]
    fn test_correct_reads() {
        let map = map_from_text("AAAA\t5\tAAAA,AAAT\n", None);
        let (out, stats) = correct(&map, &["AAAT", "CCCC"]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "read0");
        assert_eq!(out[0].sequence, b"AAAA".to_vec());
        assert_eq!(
            stats,
            CorrectionStats {
                reads_total: 2,
                reads_corrected: 1,
                reads_dropped: 1
            }
        );
    }

    #[test]
    fn test_first_writer_wins() {
        let map = map_from_text("AAAA\t5\tAAAA,AAAT\nTTTT\t4\tTTTT,AAAT\n", None);
        assert_eq!(map.get(b"AAAT"), Some(&b"AAAA"[..]));
        assert_eq!(map.get(b"TTTT"), Some(&b"TTTT"[..]));
        assert_eq!(map.num_clusters(), 2);
        assert_eq!(map.num_raw(), 3);
    }

    #[test]
    fn test_conservation_and_idempotence() {
        let map = map_from_text("AAAA\t5\tAAAA,AAAT,AATA\nCCCC\t3\tCCCC,CCCG\n", None);
        let seqs = ["AAAT", "GGGG", "CCCG", "AATA", "CCCC", "TTTT"];
        let (out, stats) = correct(&map, &seqs);
        assert_eq!(stats.reads_total, stats.reads_corrected + stats.reads_dropped);
        assert_eq!(stats.reads_corrected, 4);

        //A table of canonical sequences only leaves corrected reads as they are
        let identity = map_from_text("AAAA\t5\tAAAA\nCCCC\t3\tCCCC\n", None);
        let again: Vec<String> = out
            .iter()
            .map(|r| String::from_utf8(r.sequence.clone()).unwrap())
            .collect();
        let again: Vec<&str> = again.iter().map(|s| s.as_str()).collect();
        let (out2, stats2) = correct(&identity, &again);
        assert_eq!(stats2.reads_dropped, 0);
        assert_eq!(stats2.reads_corrected, 4);
        let seqs1: Vec<&Vec<u8>> = out.iter().map(|r| &r.sequence).collect();
        let seqs2: Vec<&Vec<u8>> = out2.iter().map(|r| &r.sequence).collect();
        assert_eq!(seqs1, seqs2);
    }

    #[test]
    fn test_length_change_written_as_fastq() {
        let map = map_from_text("AAAA\t2\tAAAA,AAAAT\n", None);
        let reads = vec![
            Ok(SequenceRecord::new("r1", b"AAAAT", Some(b"IIIIF"))),
            Ok(SequenceRecord::new("r2", b"AAAA", Some(b"IIII"))),
        ];
        let mut corrector = BarcodeCorrector::new(&map);
        let mut writer = FastxWriter::new(Vec::new(), FastxFormat::Fastq);
        corrector.run(reads.into_iter(), &mut writer).unwrap();
        assert_eq!(corrector.stats.reads_corrected, 2);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, "@r1\nAAAA\n+\nIIII\n@r2\nAAAA\n+\nIIII\n");
    }

    #[test]
    fn test_pattern_filter() {
        let pattern: IupacPattern = "BBBB".parse().unwrap();
        let map = map_from_text("AAAA\t5\tAAAA,AAAT\nCCCC\t3\tCCCC,CCCG\n", Some(&pattern));
        assert_eq!(map.num_rejected_by_pattern, 1);
        assert_eq!(map.get(b"AAAT"), None);
        assert_eq!(map.get(b"CCCG"), Some(&b"CCCC"[..]));
    }

    #[test]
    fn test_malformed_and_empty_table() {
        let map = map_from_text("AAAA\t5\nAAAA\tfive\tAAAA\n", None);
        assert!(map.is_empty());

        let (out, stats) = correct(&map, &["AAAA"]);
        assert!(out.is_empty());
        assert_eq!(stats.reads_dropped, 1);
    }

    #[test]
    fn test_from_clusters() {
        let cluster = Cluster {
            canonical: b"ACGT".to_vec(),
            members: vec![b"ACGT".to_vec(), b"ACGA".to_vec()],
            total_weight: 4,
        };
        let map = CorrectionMap::from_clusters(&[cluster]);
        assert_eq!(map.get(b"ACGA"), Some(&b"ACGT"[..]));
    }
}
