use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use itertools::Itertools;
use log::info;

use crate::aggregate::{apply_filters, CountFilter};
use crate::fileformat::{read_count_table, save_count_table, CountRecord, CountTable};
use crate::utils::Summary;

#[derive(Args)]
pub struct FilterCMD {
    #[arg(value_parser)]
    /// Count table (TSV) to filter
    pub path_in: PathBuf,

    #[arg(short = 'o', long = "output", value_parser, default_value = "-")]
    /// Filtered count table. Use - for stdout
    pub path_out: PathBuf,

    #[arg(short = 'f', long = "filter", value_parser, required = true)]
    /// Filter as name[:op]:value, applied in the order given. Names: rc, rc-sum, uc, quantile,
    /// targets, dups, dups-jaccard, connected, shared-targets, shared-umis. Ops: gt (default), ge, lt, le, eq
    pub filters: Vec<CountFilter>,
}
impl FilterCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let summary = Filter::run(&Filter {
            path_in: self.path_in.clone(),
            path_out: self.path_out.clone(),
            filters: self.filters.clone(),
        })?;

        summary.print_stats();
        log::info!("Filter has finished succesfully");
        Ok(())
    }
}

pub struct Filter {
    pub path_in: PathBuf,
    pub path_out: PathBuf,
    pub filters: Vec<CountFilter>,
}
impl Filter {
    /// Run the algorithm
    pub fn run(params: &Filter) -> Result<Summary> {
        let table = read_count_table(&params.path_in)?;
        info!("Read {} rows from {}", table.len(), params.path_in.display());

        let mut summary = Summary::new("filter");
        summary.set("Rows before", table.len() as u64);
        summary.set("Barcodes before", num_barcodes(&table));

        let table: CountTable = apply_filters(table, &params.filters);
        summary.set("Rows after", table.len() as u64);
        summary.set("Barcodes after", num_barcodes(&table));

        save_count_table(&params.path_out, &table)?;
        Ok(summary)
    }
}

fn num_barcodes(table: &[CountRecord]) -> u64 {
    table.iter().map(|r| &r.barcode).unique().count() as u64
}
