pub mod correction_table;
pub mod count_table;
pub mod fastx;
pub mod output_file;
pub mod record;

pub use record::parse_tag;
pub use record::SequenceRecord;

pub use fastx::format_from_path;
pub use fastx::FastxFormat;
pub use fastx::FastxReader;
pub use fastx::FastxWriter;
pub use fastx::RecordSink;

pub use output_file::verify_input_file;
pub use output_file::OutputFile;

pub use correction_table::write_correction_table;
pub use correction_table::CorrectionTableEntry;
pub use correction_table::CorrectionTableReader;

pub use count_table::read_count_table;
pub use count_table::save_count_table;
pub use count_table::sort_count_table;
pub use count_table::write_count_table;
pub use count_table::CountRecord;
pub use count_table::CountTable;
