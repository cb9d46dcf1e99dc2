use clap::Subcommand;

// Module declarations (alphabetical)
pub mod clusterbarcodes;
pub mod correctfastq;
pub mod filter;
pub mod integrate;
pub mod splitcluster;
pub mod tagfastq;

pub use clusterbarcodes::{ClusterBarcodes, ClusterBarcodesCMD};
pub use correctfastq::{CorrectFastq, CorrectFastqCMD};
pub use filter::{Filter, FilterCMD};
pub use integrate::{Integrate, IntegrateCMD};
pub use splitcluster::{SplitCluster, SplitClusterCMD};
pub use tagfastq::{TagFastq, TagFastqCMD};

///////////////////////////////
/// Possible subcommands to parse
#[derive(Subcommand, strum_macros::Display)]
pub enum Commands {
    /// Cluster raw barcode sequences into a correction table
    ClusterBarcodes(ClusterBarcodesCMD),
    /// Correct barcode reads using a correction table
    Correctfastq(CorrectFastqCMD),
    /// Tag reads with the sequence of the read with the same id in another file
    Tagfastq(TagFastqCMD),
    /// Cluster UMIs within each barcode
    Splitcluster(SplitClusterCMD),
    /// Combine per-target UMI reads into a count table
    Integrate(IntegrateCMD),
    /// Filter a count table
    Filter(FilterCMD),
}
