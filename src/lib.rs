pub mod aggregate;
pub mod barcode;
pub mod command;
pub mod fileformat;
pub mod umi;
pub mod utils;
