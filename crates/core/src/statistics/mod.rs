pub mod detection_stats;
pub mod run_summary;
