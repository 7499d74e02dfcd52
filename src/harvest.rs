//! The harvest loop: sweeps a shrinking working set of topics in bounded
//! concurrent chunks, advancing each topic's checkpoint one page per chunk,
//! retiring topics whose latest page came back empty, and throttling between
//! chunks until the collection target is hit or every topic runs dry.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinSet;

use crate::checkpoint::ProgressStore;
use crate::model::Topic;
use crate::{info_time, Result, BATCH_SIZE, INTER_BATCH_DELAY_SECS, TARGET_TOTAL};

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Max concurrent fetches in flight at once.
    pub batch_size: usize,
    /// Throttle applied between chunks, never after the last one.
    pub inter_batch_delay: Duration,
    /// Stop as soon as the store's running total reaches this.
    pub target_total: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            inter_batch_delay: Duration::from_secs(INTER_BATCH_DELAY_SECS),
            target_total: TARGET_TOTAL,
        }
    }
}

/// What one page fetch produced. An error return from the fetch itself is
/// fatal to the whole harvest; "no posts on this page" is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Items(u64),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestOutcome {
    TargetReached,
    Exhausted,
}

/// Drives the fetch/advance/retire/throttle loop over `topics`.
///
/// `fetch(topic, page)` is invoked concurrently for the distinct topics of a
/// chunk; a topic never has two fetches in flight since it appears at most
/// once per chunk and chunks are processed serially. `on_batch_complete` runs
/// synchronously after each chunk's checkpoint updates, so callers can
/// persist the store there — a crash then loses at most one chunk.
pub async fn run_harvest<F, Fut, H>(
    store: &mut ProgressStore,
    topics: &[Topic],
    config: &HarvestConfig,
    fetch: F,
    mut on_batch_complete: H,
) -> Result<HarvestOutcome>
where
    F: Fn(String, i32) -> Fut,
    Fut: Future<Output = Result<FetchOutcome>> + Send + 'static,
    H: FnMut(&ProgressStore) -> Result<()>,
{
    let mut working: Vec<Topic> = topics.to_vec();
    let mut retired: HashSet<String> = HashSet::new();
    let mut chunks_done = 0usize;

    while store.total_collected() < config.target_total {
        if working.is_empty() {
            info_time!("No topics left, stopping at {} posts", store.total_collected());
            return Ok(HarvestOutcome::Exhausted);
        }

        for chunk in working.chunks(config.batch_size.max(1)) {
            if chunks_done > 0 {
                tokio::time::sleep(config.inter_batch_delay).await;
            }
            let chunk_start = Local::now();

            let mut in_flight = JoinSet::new();
            for topic in chunk {
                let page = store.checkpoint(&topic.name).page + 1;
                let name = topic.name.clone();
                let fut = fetch(name.clone(), page);
                in_flight.spawn(async move { (name, page, fut.await) });
            }

            // Every fetch must settle before any store mutation; erroring out
            // here drops the set, which aborts the chunk's remaining fetches.
            let mut settled = Vec::with_capacity(chunk.len());
            while let Some(joined) = in_flight.join_next().await {
                let (name, page, outcome) = joined?;
                settled.push((name, page, outcome?));
            }

            for (name, page, outcome) in settled {
                match outcome {
                    FetchOutcome::Items(n) => {
                        store.add_collected(n);
                        store.checkpoint(&name).page = page;
                    }
                    FetchOutcome::Empty => {
                        // No page advance: the empty page is terminal for the
                        // topic and refetching it on a fresh run is fine.
                        store.add_collected(0);
                        retired.insert(name);
                    }
                }
            }

            chunks_done += 1;
            on_batch_complete(store)?;
            info_time!(
                chunk_start,
                "Chunk {} done, {} posts collected",
                chunks_done,
                store.total_collected()
            );

            if store.total_collected() >= config.target_total {
                return Ok(HarvestOutcome::TargetReached);
            }
        }

        working.retain(|t| !retired.contains(&t.name));
    }

    Ok(HarvestOutcome::TargetReached)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Copy)]
    enum Scripted {
        Items(u64),
        Fail,
    }

    type Script = HashMap<(String, i32), Scripted>;
    type CallLog = Arc<Mutex<Vec<(String, i32)>>>;
    type BoxedFetch = std::pin::Pin<Box<dyn Future<Output = Result<FetchOutcome>> + Send>>;

    fn topics(names: &[&str]) -> Vec<Topic> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Topic {
                name: (*name).to_owned(),
                rank: i as u32 + 1,
                count_posts: 0,
            })
            .collect()
    }

    fn script(entries: &[(&str, i32, Scripted)]) -> Script {
        entries
            .iter()
            .map(|(topic, page, s)| (((*topic).to_owned(), *page), *s))
            .collect()
    }

    /// Fetch closure answering from a script; unscripted pages come back
    /// empty. Logs every call it receives.
    fn scripted_fetch(script: Script, calls: CallLog) -> impl Fn(String, i32) -> BoxedFetch {
        let script = Arc::new(script);
        move |topic: String, page: i32| -> BoxedFetch {
            let script = Arc::clone(&script);
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.lock().unwrap().push((topic.clone(), page));
                match script.get(&(topic, page)) {
                    Some(Scripted::Items(n)) => Ok(FetchOutcome::Items(*n)),
                    Some(Scripted::Fail) => Err(std::io::Error::other("boom").into()),
                    None => Ok(FetchOutcome::Empty),
                }
            })
        }
    }

    fn zero_delay(target_total: u64, batch_size: usize) -> HarvestConfig {
        HarvestConfig {
            batch_size,
            inter_batch_delay: Duration::ZERO,
            target_total,
        }
    }

    fn page_of(store: &ProgressStore, topic: &str) -> i32 {
        store
            .checkpoints()
            .find(|c| c.topic == topic)
            .map(|c| c.page)
            .unwrap_or_else(|| panic!("no checkpoint for {topic}"))
    }

    #[tokio::test]
    async fn single_pass_hits_target_exactly() {
        let mut store = ProgressStore::default();
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(
            script(&[
                ("A", 1, Scripted::Items(5)),
                ("C", 1, Scripted::Items(3)),
                // B page 1 unscripted -> Empty
            ]),
            Arc::clone(&calls),
        );

        let mut hook_calls = 0;
        let outcome = run_harvest(
            &mut store,
            &topics(&["A", "B", "C"]),
            &zero_delay(8, 2),
            fetch,
            |_| {
                hook_calls += 1;
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, HarvestOutcome::TargetReached);
        assert_eq!(store.total_collected(), 8);
        assert_eq!(page_of(&store, "A"), 1);
        assert_eq!(page_of(&store, "B"), 0);
        assert_eq!(page_of(&store, "C"), 1);
        // Two chunks processed, hook once per chunk, no second pass started.
        assert_eq!(hook_calls, 2);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn all_empty_topics_exhaust_in_one_pass() {
        let mut store = ProgressStore::default();
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(Script::new(), Arc::clone(&calls));

        let mut hook_calls = 0;
        let outcome = run_harvest(
            &mut store,
            &topics(&["A", "B", "C"]),
            &zero_delay(u64::MAX, 2),
            fetch,
            |_| {
                hook_calls += 1;
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, HarvestOutcome::Exhausted);
        assert_eq!(store.total_collected(), 0);
        // ceil(3 / 2) chunks, every topic fetched exactly once.
        assert_eq!(hook_calls, 2);
        assert_eq!(calls.lock().unwrap().len(), 3);
        for topic in ["A", "B", "C"] {
            assert_eq!(page_of(&store, topic), 0);
        }
    }

    #[tokio::test]
    async fn totals_accumulate_across_passes_and_empty_never_advances() {
        let mut store = ProgressStore::default();
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(
            script(&[
                ("A", 1, Scripted::Items(2)),
                ("A", 2, Scripted::Items(3)),
                // A page 3 -> Empty
                ("B", 1, Scripted::Items(1)),
                // B page 2 -> Empty
            ]),
            Arc::clone(&calls),
        );

        let mut hook_calls = 0;
        let outcome = run_harvest(
            &mut store,
            &topics(&["A", "B"]),
            &zero_delay(100, 2),
            fetch,
            |_| {
                hook_calls += 1;
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, HarvestOutcome::Exhausted);
        assert_eq!(store.total_collected(), 6);
        // Page stays where the last non-empty fetch left it.
        assert_eq!(page_of(&store, "A"), 2);
        assert_eq!(page_of(&store, "B"), 1);
        assert_eq!(hook_calls, 3);

        // A topic retired in one pass is never refetched later in the run.
        let log = calls.lock().unwrap();
        assert_eq!(log.iter().filter(|(t, _)| t == "B").count(), 2);
        assert_eq!(log.iter().filter(|(t, _)| t == "A").count(), 3);
    }

    #[tokio::test]
    async fn fetch_error_aborts_without_mutating_the_store() {
        let mut store = ProgressStore::default();
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(
            script(&[("A", 1, Scripted::Items(5)), ("B", 1, Scripted::Fail)]),
            Arc::clone(&calls),
        );

        let mut hook_calls = 0;
        let err = run_harvest(
            &mut store,
            &topics(&["A", "B"]),
            &zero_delay(100, 2),
            fetch,
            |_| {
                hook_calls += 1;
                Ok(())
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, crate::Error::Io(_)), "got {err:?}");
        // The failed chunk applied nothing: no items counted, no page moved,
        // and the hook never ran.
        assert_eq!(store.total_collected(), 0);
        assert_eq!(page_of(&store, "A"), 0);
        assert_eq!(page_of(&store, "B"), 0);
        assert_eq!(hook_calls, 0);
    }

    #[tokio::test]
    async fn stops_mid_pass_once_target_is_reached() {
        let mut store = ProgressStore::default();
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(
            script(&[("A", 1, Scripted::Items(5))]),
            Arc::clone(&calls),
        );

        let mut hook_calls = 0;
        let outcome = run_harvest(
            &mut store,
            &topics(&["A", "B", "C"]),
            &zero_delay(5, 1),
            fetch,
            |_| {
                hook_calls += 1;
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, HarvestOutcome::TargetReached);
        // B and C were never touched.
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(hook_calls, 1);
    }

    #[tokio::test]
    async fn preloaded_store_past_target_fetches_nothing() {
        let mut store = ProgressStore::default();
        store.add_collected(10);
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(Script::new(), Arc::clone(&calls));

        let outcome = run_harvest(
            &mut store,
            &topics(&["A"]),
            &zero_delay(10, 1),
            fetch,
            |_| Ok(()),
        )
        .await
        .unwrap();

        assert_eq!(outcome, HarvestOutcome::TargetReached);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hook_error_is_fatal() {
        let mut store = ProgressStore::default();
        let calls: CallLog = Default::default();
        let fetch = scripted_fetch(
            script(&[("A", 1, Scripted::Items(1))]),
            Arc::clone(&calls),
        );

        let err = run_harvest(
            &mut store,
            &topics(&["A"]),
            &zero_delay(100, 1),
            fetch,
            |_| Err(std::io::Error::other("disk full").into()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, crate::Error::Io(_)));
        // The chunk itself had already been applied when the save failed.
        assert_eq!(store.total_collected(), 1);
    }
}
