use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::fileformat::{verify_input_file, FastxReader, FastxWriter};
use crate::umi::{ClusterMethod, InputOrder, PartitionStats, PartitionedUmiClusterer};
use crate::utils::log_progress;

use super::tagfastq::DEFAULT_SEPARATOR;

pub const DEFAULT_UMI_DISTANCE: &str = "1";
pub const DEFAULT_UMI_METHOD: &str = "directional";

#[derive(Args)]
pub struct SplitClusterCMD {
    #[arg(value_parser)]
    /// FASTQ/FASTA with UMI sequences, the corrected barcode tagged onto each read id
    pub path_in: PathBuf,

    #[arg(short = 'o', long = "output", value_parser, default_value = "-")]
    /// Output with corrected UMI sequences. Use - for stdout
    pub path_out: PathBuf,

    #[arg(short = 'l', long = "length", value_parser)]
    /// Required length of UMI sequence. Reads of other lengths are filtered out
    pub umi_length: usize,

    #[arg(short = 't', long = "threshold", value_parser, default_value = DEFAULT_UMI_DISTANCE)]
    /// Hamming distance threshold to cluster sequences
    pub threshold: u32,

    #[arg(short = 'm', long = "method", value_parser, default_value = DEFAULT_UMI_METHOD)]
    /// Clustering method: unique, percentile, cluster, adjacency or directional
    pub method: ClusterMethod,

    #[arg(short = 's', long = "separator", value_parser, default_value = DEFAULT_SEPARATOR)]
    /// Separator between read id and barcode
    pub separator: String,

    #[arg(long = "unsorted", value_parser, default_value = "false")]
    /// Input is not grouped by barcode. Holds all reads in memory
    pub unsorted: bool,
}
impl SplitClusterCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let stats = SplitCluster::run(&SplitCluster {
            path_in: self.path_in.clone(),
            path_out: self.path_out.clone(),
            umi_length: self.umi_length,
            threshold: self.threshold,
            method: self.method,
            separator: self.separator.clone(),
            order: if self.unsorted {
                InputOrder::Unsorted
            } else {
                InputOrder::Grouped
            },
        })?;

        stats.to_summary("splitcluster").print_stats();
        log::info!("SplitCluster has finished succesfully");
        Ok(())
    }
}

pub struct SplitCluster {
    pub path_in: PathBuf,
    pub path_out: PathBuf,
    pub umi_length: usize,
    pub threshold: u32,
    pub method: ClusterMethod,
    pub separator: String,
    pub order: InputOrder,
}
impl SplitCluster {
    /// Run the algorithm
    pub fn run(params: &SplitCluster) -> Result<PartitionStats> {
        verify_input_file(&params.path_in)?;
        info!("Filtering reads not of length {} bp", params.umi_length);
        info!(
            "Clustering UMIs within each barcode using method {} with distance {}",
            params.method, params.threshold
        );

        let reader = FastxReader::open(&params.path_in)?;
        let mut writer = FastxWriter::create(&params.path_out)?;
        let mut clusterer = PartitionedUmiClusterer::new(
            params.method,
            params.threshold,
            params.umi_length,
            &params.separator,
            params.order,
        );

        for record in reader {
            clusterer.push(record?, &mut writer)?;
            log_progress("reads", clusterer.stats.reads_total);
        }
        let stats = clusterer.finish(&mut writer)?;
        writer.commit()?;

        Ok(stats)
    }
}
