use std::sync::{Arc, Mutex};

use chrono::Local;

use weebiee::checkpoint::ProgressStore;
use weebiee::harvest::{run_harvest, FetchOutcome, HarvestConfig};
use weebiee::request::Client;
use weebiee::sink::PostSink;
use weebiee::{info_time, Result, CACHE_DIR, CHECKPOINT_PATH, OUTPUT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();

    // A corrupt checkpoint file fails here, before any fetching starts.
    let mut store = ProgressStore::load(CHECKPOINT_PATH)?;
    info_time!(
        "Resuming from {} posts over {} known topics",
        store.total_collected(),
        store.len()
    );

    let client = Arc::new(Client::new(CACHE_DIR)?);
    if !client.is_signed_in().await? {
        info_time!("Not signed in, cookies look stale; expect empty pages");
    }

    let topics = client.top_topics().await?;
    info_time!("Got {} trending topics", topics.len());

    let sink = Arc::new(Mutex::new(PostSink::open(OUTPUT_PATH)?));

    let fetch = {
        let client = Arc::clone(&client);
        let sink = Arc::clone(&sink);
        move |topic: String, page: i32| {
            let client = Arc::clone(&client);
            let sink = Arc::clone(&sink);
            async move {
                match client.search(&topic, page).await? {
                    Some(posts) if !posts.is_empty() => {
                        let count = posts.len() as u64;
                        // Lock held for the write only, never across an await.
                        sink.lock()
                            .expect("sink lock poisoned")
                            .write_posts(&topic, &posts)?;
                        Ok(FetchOutcome::Items(count))
                    }
                    _ => Ok(FetchOutcome::Empty),
                }
            }
        }
    };

    let outcome = run_harvest(
        &mut store,
        &topics,
        &HarvestConfig::default(),
        fetch,
        |store| {
            store.save(CHECKPOINT_PATH)?;
            sink.lock().expect("sink lock poisoned").flush()?;
            Ok(())
        },
    )
    .await;

    // Session close: persist whatever the run managed, even after an abort.
    store.save(CHECKPOINT_PATH)?;
    sink.lock().expect("sink lock poisoned").flush()?;

    let outcome = outcome?;
    info_time!(
        start_time,
        "Harvest finished: {:?}, {} posts collected",
        outcome,
        store.total_collected()
    );

    Ok(())
}
