/// Timestamped progress logging, similar to `info!` in tracing.
/// Pass a starting `chrono::Local` time as the first argument to also print
/// the elapsed seconds since then.
/// ```
/// # use weebiee::info_time;
/// # use chrono::Local;
/// info_time!("collected {} posts from {}", 12, "topic");
/// let time = Local::now();
/// info_time!(time, "finished chunk {}", 3);
/// ```
#[macro_export]
macro_rules! info_time {
    ($strfm:literal $(,)? $($arg:expr),*) => {{
        let local_now = Local::now();
        println!("{:<30} : {}", local_now, format!($strfm, $($arg),*));
    }};
    ($time:expr, $strfm:literal $(,)? $($arg:expr),*) => {{
        let local_now = Local::now();
        let elapsed = (local_now - $time)
            .num_microseconds()
            .map(|n| n as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        println!(
            "{:<30} : {} ({elapsed} sec)",
            local_now,
            format!($strfm, $($arg),*)
        );
    }};
}
