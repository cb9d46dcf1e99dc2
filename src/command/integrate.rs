use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use log::info;
use rustc_hash::FxHashMap;

use crate::aggregate::{sample_name_from_path, target_name_from_path, Aggregator, TargetSummary};
use crate::fileformat::{save_count_table, verify_input_file, CountTable, FastxReader, OutputFile};
use crate::utils::{log_progress, Summary};

use super::tagfastq::DEFAULT_SEPARATOR;

#[derive(Args)]
pub struct IntegrateCMD {
    #[arg(value_parser, required = true, num_args = 1..)]
    /// Per-target FASTA/FASTQ with corrected UMI sequences, named <sample>.<target>[-...].fasta
    pub path_targets: Vec<PathBuf>,

    #[arg(short = 'o', long = "output", value_parser, default_value = "-")]
    /// Output count table (TSV). Use - for stdout
    pub path_out: PathBuf,

    #[arg(long = "min-reads", value_parser, default_value = "0")]
    /// Minimum reads for a barcode to be included in the per-target statistics
    pub min_reads: u64,

    #[arg(long = "sample", value_parser)]
    /// Sample name. Taken from the first target file name if not given
    pub sample: Option<String>,

    #[arg(long = "summary", value_parser)]
    /// Write per-target statistics to this TSV
    pub path_summary: Option<PathBuf>,

    #[arg(short = 's', long = "separator", value_parser, default_value = DEFAULT_SEPARATOR)]
    /// Separator between read id and barcode
    pub separator: String,

    #[arg(long = "barcodes", value_parser)]
    /// FASTA/FASTQ with corrected barcodes; take barcodes from here by read id instead of from the read ids
    pub path_barcodes: Option<PathBuf>,
}
impl IntegrateCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let (_table, summary) = Integrate::run(&Integrate {
            path_targets: self.path_targets.clone(),
            path_out: self.path_out.clone(),
            min_reads: self.min_reads,
            sample: self.sample.clone(),
            path_summary: self.path_summary.clone(),
            separator: self.separator.clone(),
            path_barcodes: self.path_barcodes.clone(),
        })?;

        summary.print_stats();
        log::info!("Integrate has finished succesfully");
        Ok(())
    }
}

pub struct Integrate {
    pub path_targets: Vec<PathBuf>,
    pub path_out: PathBuf,
    pub min_reads: u64,
    pub sample: Option<String>,
    pub path_summary: Option<PathBuf>,
    pub separator: String,
    pub path_barcodes: Option<PathBuf>,
}
impl Integrate {
    /// Run the algorithm
    pub fn run(params: &Integrate) -> Result<(CountTable, Summary)> {
        let first = match params.path_targets.first() {
            Some(p) => p,
            None => bail!("No target files given"),
        };
        for p in &params.path_targets {
            verify_input_file(p)?;
        }

        let sample = match &params.sample {
            Some(s) => s.clone(),
            None => sample_name_from_path(first),
        };
        info!("Found sample {}", sample);

        let mut aggregator = Aggregator::new(&sample, &params.separator);
        if let Some(path_barcodes) = &params.path_barcodes {
            info!("Reading barcodes from {}", path_barcodes.display());
            aggregator = aggregator.with_barcode_lookup(read_barcodes(path_barcodes)?);
        }

        for path in &params.path_targets {
            let target = target_name_from_path(path);
            info!("Reading file {} for target {}", path.display(), target);
            aggregator.add_reads(&target, FastxReader::open(path)?)?;
        }

        info!("Writing output");
        let table = aggregator.count_table();
        save_count_table(&params.path_out, &table)?;

        aggregator.log_target_summaries(0);
        if params.min_reads > 0 {
            aggregator.log_target_summaries(params.min_reads);
        }
        if let Some(path_summary) = &params.path_summary {
            save_target_summaries(path_summary, &aggregator.target_summaries(params.min_reads))?;
        }

        let summary = aggregator.to_summary("integrate");
        Ok((table, summary))
    }
}

///////////////////////////////
/// Read id -> barcode sequence
fn read_barcodes(path: &Path) -> Result<FxHashMap<String, String>> {
    let mut map = FxHashMap::default();
    for rec in FastxReader::open(path)? {
        let rec = rec?;
        map.insert(
            rec.id().to_string(),
            String::from_utf8_lossy(&rec.sequence).into_owned(),
        );
        log_progress("barcode reads", map.len() as u64);
    }
    info!("Read {} barcodes", map.len());
    Ok(map)
}

pub fn save_target_summaries(path: &Path, summaries: &[TargetSummary]) -> Result<()> {
    let out = OutputFile::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(out);
    for s in summaries {
        writer.serialize(s)?;
    }
    let out = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    out.commit()
}
