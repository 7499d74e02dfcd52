//! WEEBIEE
//! Harvests posts for Weibo's trending topics page by page, resuming from a
//! binary checkpoint file between runs.

mod macros;

pub mod checkpoint;
pub mod harvest;
pub mod model;
pub mod parse;
pub mod request;
pub mod sink;

mod error;
pub use error::{Error, Result};

/// Max concurrent page fetches in flight at once.
pub const BATCH_SIZE: usize = 8;
/// Throttle between chunks of fetches.
pub const INTER_BATCH_DELAY_SECS: u64 = 30;
/// Stop once this many posts have been collected across all runs.
pub const TARGET_TOTAL: u64 = 10_000;

pub const CHECKPOINT_PATH: &str = "progress.ckp";
pub const OUTPUT_PATH: &str = "posts.csv";
pub const CACHE_DIR: &str = "./cache";
