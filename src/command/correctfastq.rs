use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::barcode::{BarcodeCorrector, CorrectionMap, CorrectionStats, IupacPattern};
use crate::fileformat::{verify_input_file, CorrectionTableReader, FastxReader, FastxWriter};

#[derive(Args)]
pub struct CorrectFastqCMD {
    #[arg(value_parser)]
    /// FASTQ/FASTA with raw barcode sequences
    pub path_reads: PathBuf,

    #[arg(value_parser)]
    /// Correction table in starcode default output format
    pub path_table: PathBuf,

    #[arg(value_parser)]
    /// Output with corrected sequences; FASTA unless the name ends in .fastq/.fq. Use - for stdout
    pub path_out: PathBuf,

    #[arg(short = 'p', long = "barcode-pattern", value_parser)]
    /// Only use clusters whose canonical sequence matches this IUPAC pattern
    pub pattern: Option<IupacPattern>,
}
impl CorrectFastqCMD {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let stats = CorrectFastq::run(&CorrectFastq {
            path_reads: self.path_reads.clone(),
            path_table: self.path_table.clone(),
            path_out: self.path_out.clone(),
            pattern: self.pattern.clone(),
        })?;

        stats.to_summary("correctfastq").print_stats();
        log::info!("CorrectFastq has finished succesfully");
        Ok(())
    }
}

pub struct CorrectFastq {
    pub path_reads: PathBuf,
    pub path_table: PathBuf,
    pub path_out: PathBuf,
    pub pattern: Option<IupacPattern>,
}
impl CorrectFastq {
    /// Run the algorithm
    pub fn run(params: &CorrectFastq) -> Result<CorrectionStats> {
        verify_input_file(&params.path_reads)?;

        info!("Processing file: {}", params.path_table.display());
        let mut table = CorrectionTableReader::open(&params.path_table)?;
        let map = CorrectionMap::from_table(&mut table, params.pattern.as_ref())?;
        info!(
            "Clusters: {} ({} raw sequences, {} malformed lines)",
            map.num_clusters(),
            map.num_raw(),
            table.num_malformed
        );
        if let Some(pattern) = &params.pattern {
            info!(
                "Skipped {} clusters not matching pattern {}",
                map.num_rejected_by_pattern, pattern
            );
        }

        info!("Correcting sequences and writing to {}", params.path_out.display());
        let reader = FastxReader::open(&params.path_reads)?;
        let mut writer = FastxWriter::create(&params.path_out)?;

        let mut corrector = BarcodeCorrector::new(&map);
        corrector.run(reader, &mut writer)?;
        writer.commit()?;

        Ok(corrector.stats)
    }
}
