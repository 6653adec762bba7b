use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

use crate::cli::CertificationsArgs;
use crate::clients::http::HttpFetcher;
use crate::clients::riaa::{AwardPeriod, AwardSource, Riaa, periods_for_year};
use crate::commands::{DataLayout, RunLog};
use crate::config::load_scrape_config;
use crate::model::CertificationEntry;
use crate::pipeline::crawl::{CrawlLoop, CrawlStats, FetchOutcome, Sleeper, ThreadSleeper};
use crate::store::SnapshotStore;

pub fn run(args: CertificationsArgs) -> Result<()> {
    let config = load_scrape_config(&args.scrape_config)?;
    let (album_url, single_url) = config.riaa_urls()?;
    let layout = DataLayout::new(&args.data.data_root);
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| layout.certifications());

    let mut store = SnapshotStore::open(&output_path)?;
    let mut snapshot = store.load::<CertificationEntry>()?;
    info!(
        path = %output_path.display(),
        rows = snapshot.len(),
        start_year = config.params.start_year,
        end_year = config.params.end_year,
        "certifications snapshot loaded"
    );

    let http = HttpFetcher::new(&config.params.header, config.timeout());
    let riaa = Riaa::new(&http, album_url, single_url);
    let sleeper = ThreadSleeper;
    let mut log = RunLog::start("certifications");

    for year in config.params.start_year..=config.params.end_year {
        let periods = pending_periods(&periods_for_year(year), &snapshot);
        if periods.is_empty() {
            continue;
        }

        let stage = format!("awards-{year}");
        let crawl = CrawlLoop::new(&stage, config.backoff.crawl_backoff(), &sleeper);
        let (entries, stats) = scrape_periods(&riaa, &periods, &crawl);

        snapshot.extend(entries);
        store.save(&snapshot)?;
        log.record(stats);
        sleeper.sleep(config.backoff.period_pause());
    }

    log.finish(&layout, None, &output_path, snapshot.len())?;
    Ok(())
}

/// Periods with no rows yet. A window that really had no awards stays
/// pending and is searched again on the next run.
pub fn pending_periods(
    periods: &[AwardPeriod],
    snapshot: &[CertificationEntry],
) -> Vec<AwardPeriod> {
    let done = snapshot
        .iter()
        .map(|entry| (entry.category.as_str(), entry.period_from.as_str()))
        .collect::<HashSet<(&str, &str)>>();
    periods
        .iter()
        .filter(|period| !done.contains(&(period.category.as_str(), period.from.as_str())))
        .cloned()
        .collect()
}

struct PeriodTask {
    period: AwardPeriod,
    entries: Vec<CertificationEntry>,
}

pub fn scrape_periods(
    source: &dyn AwardSource,
    periods: &[AwardPeriod],
    crawl: &CrawlLoop<'_>,
) -> (Vec<CertificationEntry>, CrawlStats) {
    let mut tasks = periods
        .iter()
        .map(|period| PeriodTask {
            period: period.clone(),
            entries: Vec::new(),
        })
        .collect::<Vec<PeriodTask>>();
    let work = (0..tasks.len()).collect::<Vec<usize>>();

    let stats = crawl.run(
        &mut tasks,
        &work,
        |task| task.period.label(),
        |task| FetchOutcome::from_lookup(source.awards(&task.period)),
        |task, entries| task.entries = entries,
    );

    let entries = tasks.into_iter().flat_map(|task| task.entries).collect();
    (entries, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::pipeline::crawl::Backoff;
    use crate::pipeline::crawl::testing::RecordingSleeper;

    struct FakeAwards;

    impl AwardSource for FakeAwards {
        fn awards(
            &self,
            period: &AwardPeriod,
        ) -> Result<Option<Vec<CertificationEntry>>, FetchError> {
            if period.category != "album" {
                return Ok(None);
            }
            if period.from.ends_with("-03-01") {
                return Err(FetchError::Transport("timed out".to_string()));
            }
            Ok(Some(vec![award(period)]))
        }
    }

    fn award(period: &AwardPeriod) -> CertificationEntry {
        CertificationEntry {
            artist: "shania twain".to_string(),
            category: period.category.clone(),
            name: "come on over".to_string(),
            release_year: period.year,
            period_from: period.from.clone(),
        }
    }

    #[test]
    fn periods_with_rows_are_skipped() {
        let periods = periods_for_year(1997);
        let pending = pending_periods(&periods, &[award(&periods[0])]);
        assert_eq!(pending.len(), 11);
        assert!(!pending.contains(&periods[0]));
        assert!(pending.contains(&periods[1]));
    }

    #[test]
    fn scrape_periods_collects_found_awards() {
        let sleeper = RecordingSleeper::default();
        let crawl = CrawlLoop::new("awards-1997", Backoff::default(), &sleeper);
        let periods = periods_for_year(1997);

        let (entries, stats) = scrape_periods(&FakeAwards, &periods, &crawl);

        // five album windows succeed, March/April fails, singles are empty
        assert_eq!(entries.len(), 5);
        assert_eq!(stats.found, 5);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.empty, 6);
        assert_eq!(stats.failed_items, vec!["album 1997-03-01..1997-04-31".to_string()]);
        assert_eq!(sleeper.calls.borrow().len(), 7);
    }
}
