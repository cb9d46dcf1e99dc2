use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use log::info;

use crate::barcode::{BarcodeCorrector, CorrectionMap, CorrectionStats};
use crate::fileformat::output_file::is_stdio;
use crate::fileformat::{
    verify_input_file, write_correction_table, FastxReader, FastxWriter, OutputFile,
};
use crate::umi::{Cluster, ClusterMethod, SequenceCounts};
use crate::utils::{log_progress, Summary};

pub const DEFAULT_BARCODE_DISTANCE: &str = "2";
pub const DEFAULT_BARCODE_METHOD: &str = "directional";

#[derive(Args)]
pub struct ClusterBarcodesCMD {
    #[arg(value_parser)]
    /// FASTQ/FASTA with raw barcode sequences
    pub path_reads: PathBuf,

    #[arg(short = 'o', long = "output", value_parser)]
    /// Correction table to write, in starcode default output format
    pub path_table: PathBuf,

    #[arg(short = 'd', long = "distance", value_parser, default_value = DEFAULT_BARCODE_DISTANCE)]
    /// Maximum Hamming distance between clustered sequences
    pub threshold: u32,

    #[arg(short = 'm', long = "method", value_parser, default_value = DEFAULT_BARCODE_METHOD)]
    /// Clustering method: unique, percentile, cluster, adjacency or directional
    pub method: ClusterMethod,

    #[arg(short = 'l', long = "length", value_parser)]
    /// Only use sequences of this length
    pub length: Option<usize>,

    #[arg(long = "corrected", value_parser)]
    /// Also write reads with corrected sequences to this file
    pub path_corrected: Option<PathBuf>,
}
impl ClusterBarcodesCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let summary = ClusterBarcodes::run(&ClusterBarcodes {
            path_reads: self.path_reads.clone(),
            path_table: self.path_table.clone(),
            threshold: self.threshold,
            method: self.method,
            length: self.length,
            path_corrected: self.path_corrected.clone(),
        })?;

        summary.print_stats();
        log::info!("ClusterBarcodes has finished succesfully");
        Ok(())
    }
}

pub struct ClusterBarcodes {
    pub path_reads: PathBuf,
    pub path_table: PathBuf,
    pub threshold: u32,
    pub method: ClusterMethod,
    pub length: Option<usize>,
    pub path_corrected: Option<PathBuf>,
}
impl ClusterBarcodes {
    /// Run the algorithm
    pub fn run(params: &ClusterBarcodes) -> Result<Summary> {
        verify_input_file(&params.path_reads)?;
        if params.path_corrected.is_some() && is_stdio(&params.path_reads) {
            bail!("Reads are read twice when writing corrected reads, so they cannot come from stdin");
        }

        let mut summary = Summary::new("cluster-barcodes");

        //Count distinct sequences
        let mut counts = SequenceCounts::new();
        let mut num_reads = 0;
        let mut num_wrong_length = 0;
        for record in FastxReader::open(&params.path_reads)? {
            let record = record?;
            num_reads += 1;
            log_progress("reads", num_reads);

            if let Some(length) = params.length {
                if record.len() != length {
                    num_wrong_length += 1;
                    continue;
                }
            }
            *counts.entry(record.sequence).or_insert(0) += 1;
        }
        summary.set("Reads total", num_reads);
        if params.length.is_some() {
            summary.set("Reads with wrong length", num_wrong_length);
        }
        summary.set("Unique sequences", counts.len() as u64);
        info!("Counted {} unique sequences", counts.len());

        info!(
            "Clustering using method {} with distance {}",
            params.method, params.threshold
        );
        let clusters = cluster_by_weight(&counts, params.method, params.threshold);
        summary.set("Clusters", clusters.len() as u64);

        let mut out = OutputFile::create(&params.path_table)?;
        write_correction_table(&mut out, &clusters)
            .with_context(|| format!("Failed to write {}", params.path_table.display()))?;
        out.commit()?;

        if let Some(path_corrected) = &params.path_corrected {
            info!("Writing corrected reads to {}", path_corrected.display());
            let stats = correct_reads(params, path_corrected, &clusters)?;
            summary.set("Reads corrected", stats.reads_corrected);
            summary.set("Reads without corrected sequence", stats.reads_dropped);
        }

        Ok(summary)
    }
}

///////////////////////////////
/// Cluster and order by total weight, heaviest first
pub fn cluster_by_weight(counts: &SequenceCounts, method: ClusterMethod, threshold: u32) -> Vec<Cluster> {
    let mut clusters = method.cluster(counts, threshold);
    clusters.sort_by(|a, b| b.total_weight.cmp(&a.total_weight));
    clusters
}

fn correct_reads(
    params: &ClusterBarcodes,
    path_corrected: &PathBuf,
    clusters: &[Cluster],
) -> Result<CorrectionStats> {
    let map = CorrectionMap::from_clusters(clusters);
    let reader = FastxReader::open(&params.path_reads)?;
    let mut writer = FastxWriter::create(path_corrected)?;

    let mut corrector = BarcodeCorrector::new(&map);
    corrector.run(reader, &mut writer)?;
    writer.commit()?;
    Ok(corrector.stats)
}
