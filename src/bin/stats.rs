//! Per-topic summary of the harvested posts file.

use std::collections::{BTreeMap, HashSet};

use weebiee::{Result, OUTPUT_PATH};

fn main() -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(OUTPUT_PATH)?;

    // Re-runs refetch the last checkpointed page, so the raw file can hold
    // duplicate rows; count unique records only.
    let mut unique: HashSet<(String, String, String)> = HashSet::new();
    for record in reader.records() {
        let record = record?;
        unique.insert((
            record.get(0).unwrap_or_default().to_owned(),
            record.get(1).unwrap_or_default().to_owned(),
            record.get(2).unwrap_or_default().to_owned(),
        ));
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (topic, _, _) in &unique {
        *counts.entry(topic).or_default() += 1;
    }

    println!("{:<40} | {:>6}", "Topic", "Count");
    println!("{:-<40}-+-{:->6}", "", "");
    println!("{:<40} | {:>6}", "Unique records", unique.len());
    for (topic, count) in counts {
        println!("{topic:<40} | {count:>6}");
    }

    Ok(())
}
