mod summary;

pub use summary::StatValue;
pub use summary::Summary;

///////////////////////////////
/// Log progress every this many records
pub const PROGRESS_INTERVAL: u64 = 1_000_000;

///////////////////////////////
/// Log a progress message if the counter just hit a multiple of the interval
pub fn log_progress(what: &str, num_done: u64) {
    if num_done > 0 && num_done % PROGRESS_INTERVAL == 0 {
        log::info!("Processed {} {}", num_done, what);
    }
}
