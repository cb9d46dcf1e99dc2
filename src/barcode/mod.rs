pub mod corrector;
pub mod iupac;

pub use iupac::IupacPattern;

pub use corrector::BarcodeCorrector;
pub use corrector::CorrectionMap;
pub use corrector::CorrectionStats;
