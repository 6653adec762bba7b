use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Result of asking a collaborator about one work item.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// Usable data to write onto the row.
    Found(T),
    /// The service answered but had nothing for this item.
    Empty,
    /// The call or its response was broken; the item stays pending.
    Failed(FetchError),
}

impl<T> FetchOutcome<T> {
    /// Folds a fallible lookup whose success may legitimately be empty.
    pub fn from_lookup(result: Result<Option<T>, FetchError>) -> Self {
        match result {
            Ok(Some(value)) => Self::Found(value),
            Ok(None) => Self::Empty,
            Err(error) => Self::Failed(error),
        }
    }
}

/// Fixed pauses after non-success outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub on_empty: Duration,
    pub on_failure: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            on_empty: Duration::from_secs(30),
            on_failure: Duration::from_secs(10),
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlStats {
    pub stage: String,
    pub attempted: usize,
    pub found: usize,
    pub empty: usize,
    pub failed: usize,
    pub failed_items: Vec<String>,
}

impl CrawlStats {
    fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Self::default()
        }
    }
}

/// Sequential driver for one enrichment stage.
pub struct CrawlLoop<'a> {
    stage: &'a str,
    backoff: Backoff,
    sleeper: &'a dyn Sleeper,
}

impl<'a> CrawlLoop<'a> {
    pub fn new(stage: &'a str, backoff: Backoff, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            stage,
            backoff,
            sleeper,
        }
    }

    /// Visits `work` (indices into `rows`) in order.
    ///
    /// `apply` runs only on `Found`. Failures are logged under the row's
    /// `describe` label and the row is left as it was.
    pub fn run<R, T>(
        &self,
        rows: &mut [R],
        work: &[usize],
        describe: impl Fn(&R) -> String,
        mut fetch: impl FnMut(&R) -> FetchOutcome<T>,
        mut apply: impl FnMut(&mut R, T),
    ) -> CrawlStats {
        let mut stats = CrawlStats::new(self.stage);
        let total = work.len();

        info!(stage = self.stage, pending = total, "crawl stage starting");

        for (position, &index) in work.iter().enumerate() {
            let Some(row) = rows.get_mut(index) else {
                warn!(stage = self.stage, index, "work item outside snapshot, skipped");
                continue;
            };

            stats.attempted += 1;
            match fetch(&*row) {
                FetchOutcome::Found(value) => {
                    apply(row, value);
                    stats.found += 1;
                    debug!(
                        stage = self.stage,
                        item = %describe(&*row),
                        progress = position + 1,
                        total,
                        "item enriched"
                    );
                }
                FetchOutcome::Empty => {
                    stats.empty += 1;
                    debug!(stage = self.stage, item = %describe(&*row), "no usable match");
                    self.sleeper.sleep(self.backoff.on_empty);
                }
                FetchOutcome::Failed(error) => {
                    let label = describe(&*row);
                    warn!(stage = self.stage, item = %label, error = %error, "item failed");
                    stats.failed += 1;
                    stats.failed_items.push(label);
                    self.sleeper.sleep(self.backoff.on_failure);
                }
            }
        }

        info!(
            stage = self.stage,
            attempted = stats.attempted,
            found = stats.found,
            empty = stats.empty,
            failed = stats.failed,
            "crawl stage finished"
        );

        stats
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: String,
        value: Option<i32>,
    }

    fn rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|name| Row {
                name: name.to_string(),
                value: None,
            })
            .collect()
    }

    fn backoff() -> Backoff {
        Backoff {
            on_empty: Duration::from_secs(30),
            on_failure: Duration::from_secs(10),
        }
    }

    #[test]
    fn found_items_are_written_without_delay() {
        let sleeper = RecordingSleeper::default();
        let mut data = rows(&["a", "b"]);
        let stats = CrawlLoop::new("test", backoff(), &sleeper).run(
            &mut data,
            &[0, 1],
            |row| row.name.clone(),
            |row| FetchOutcome::Found(row.name.len() as i32),
            |row, value| row.value = Some(value),
        );

        assert_eq!(stats.found, 2);
        assert!(data.iter().all(|row| row.value == Some(1)));
        assert!(sleeper.calls.borrow().is_empty());
    }

    #[test]
    fn empty_result_backs_off_and_continues() {
        let sleeper = RecordingSleeper::default();
        let mut data = rows(&["miss", "hit"]);
        let stats = CrawlLoop::new("test", backoff(), &sleeper).run(
            &mut data,
            &[0, 1],
            |row| row.name.clone(),
            |row| {
                if row.name == "miss" {
                    FetchOutcome::Empty
                } else {
                    FetchOutcome::Found(1)
                }
            },
            |row, value| row.value = Some(value),
        );

        assert_eq!(data[0].value, None);
        assert_eq!(data[1].value, Some(1));
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.found, 1);
        assert_eq!(*sleeper.calls.borrow(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn failure_is_contained_to_its_row() {
        let sleeper = RecordingSleeper::default();
        let mut data = rows(&["broken", "fine"]);
        let stats = CrawlLoop::new("test", backoff(), &sleeper).run(
            &mut data,
            &[0, 1],
            |row| row.name.clone(),
            |row| {
                if row.name == "broken" {
                    FetchOutcome::Failed(FetchError::Transport("connection reset".to_string()))
                } else {
                    FetchOutcome::Found(2)
                }
            },
            |row, value| row.value = Some(value),
        );

        assert_eq!(data[0].value, None);
        assert_eq!(data[1].value, Some(2));
        assert_eq!(stats.failed_items, vec!["broken".to_string()]);
        assert_eq!(*sleeper.calls.borrow(), vec![Duration::from_secs(10)]);
    }

    #[test]
    fn only_listed_items_are_fetched_in_order() {
        let sleeper = RecordingSleeper::default();
        let mut data = rows(&["a", "b", "c"]);
        let mut seen = Vec::new();
        CrawlLoop::new("test", backoff(), &sleeper).run(
            &mut data,
            &[2, 0],
            |row| row.name.clone(),
            |row| {
                seen.push(row.name.clone());
                FetchOutcome::<i32>::Empty
            },
            |_, _| {},
        );

        assert_eq!(seen, vec!["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn from_lookup_maps_all_three_outcomes() {
        assert!(matches!(FetchOutcome::from_lookup(Ok(Some(1))), FetchOutcome::Found(1)));
        assert!(matches!(FetchOutcome::<i32>::from_lookup(Ok(None)), FetchOutcome::Empty));
        assert!(matches!(
            FetchOutcome::<i32>::from_lookup(Err(FetchError::Status(503))),
            FetchOutcome::Failed(FetchError::Status(503))
        ));
    }
}
