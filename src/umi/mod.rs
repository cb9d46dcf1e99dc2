pub mod cluster;
pub mod partition;

pub use cluster::hamming_distance;
pub use cluster::within_distance;
pub use cluster::Cluster;
pub use cluster::ClusterMethod;
pub use cluster::SequenceCounts;

pub use partition::InputOrder;
pub use partition::PartitionStats;
pub use partition::PartitionedUmiClusterer;
