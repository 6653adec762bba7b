use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Duration as DateDuration, NaiveDate, Weekday};
use tracing::info;

use crate::cli::ChartsArgs;
use crate::clients::billboard::{Billboard, ChartSource};
use crate::clients::http::HttpFetcher;
use crate::commands::{DataLayout, RunLog};
use crate::config::load_scrape_config;
use crate::model::ChartEntry;
use crate::pipeline::crawl::{CrawlLoop, CrawlStats, FetchOutcome, ThreadSleeper};
use crate::store::SnapshotStore;

const WEEK_FORMAT: &str = "%Y-%m-%d";

pub fn run(args: ChartsArgs) -> Result<()> {
    let config = load_scrape_config(&args.scrape_config)?;
    let layout = DataLayout::new(&args.data.data_root);
    let output_path = args.output_path.clone().unwrap_or_else(|| layout.charts());

    let weeks = if args.weeks.is_empty() {
        chart_weeks(config.params.start_year, config.params.end_year)?
    } else {
        parse_weeks(&args.weeks)?
    };

    let mut store = SnapshotStore::open(&output_path)?;
    let mut snapshot = store.load::<ChartEntry>()?;
    let pending = pending_weeks(&weeks, &snapshot);
    info!(
        path = %output_path.display(),
        weeks = weeks.len(),
        pending = pending.len(),
        rows = snapshot.len(),
        "charts snapshot loaded"
    );

    let http = HttpFetcher::new(&config.params.header, config.timeout());
    let billboard = Billboard::new(&http, &config.params.billboard_base_url);
    let sleeper = ThreadSleeper;
    let mut log = RunLog::start("charts");

    // checkpoint once per chart year
    for year_weeks in pending.chunk_by(|left, right| left.get(..4) == right.get(..4)) {
        let stage = format!("chart-weeks-{}", year_weeks[0].get(..4).unwrap_or("?"));
        let crawl = CrawlLoop::new(&stage, config.backoff.crawl_backoff(), &sleeper);
        let (entries, stats) = scrape_weeks(&billboard, year_weeks, &crawl);

        snapshot.extend(entries);
        store.save(&snapshot)?;
        log.record(stats);
    }

    log.finish(&layout, None, &output_path, snapshot.len())?;
    Ok(())
}

/// Every Sunday from August 1 of `start_year` through the end of `end_year`.
pub fn chart_weeks(start_year: i32, end_year: i32) -> Result<Vec<String>> {
    let first = NaiveDate::from_ymd_opt(start_year, 8, 1)
        .with_context(|| format!("invalid start year {start_year}"))?;
    let last = NaiveDate::from_ymd_opt(end_year, 12, 31)
        .with_context(|| format!("invalid end year {end_year}"))?;

    let offset = (7 - first.weekday().num_days_from_sunday()) % 7;
    let mut day = first + DateDuration::days(i64::from(offset));
    let mut weeks = Vec::new();
    while day <= last {
        debug_assert_eq!(day.weekday(), Weekday::Sun);
        weeks.push(day.format(WEEK_FORMAT).to_string());
        day += DateDuration::days(7);
    }
    Ok(weeks)
}

fn parse_weeks(raw: &[String]) -> Result<Vec<String>> {
    raw.iter()
        .map(|week| {
            let Ok(date) = NaiveDate::parse_from_str(week.trim(), WEEK_FORMAT) else {
                bail!("invalid chart week {week:?}, expected YYYY-MM-DD");
            };
            Ok(date.format(WEEK_FORMAT).to_string())
        })
        .collect()
}

/// Weeks with no rows in the snapshot yet, in the given order.
pub fn pending_weeks(weeks: &[String], snapshot: &[ChartEntry]) -> Vec<String> {
    let done = snapshot
        .iter()
        .map(|entry| entry.chart_week.as_str())
        .collect::<HashSet<&str>>();
    weeks
        .iter()
        .filter(|week| !done.contains(week.as_str()))
        .cloned()
        .collect()
}

struct WeekTask {
    week: String,
    entries: Vec<ChartEntry>,
}

/// Crawls `weeks` and returns the scraped entries in week order.
pub fn scrape_weeks(
    source: &dyn ChartSource,
    weeks: &[String],
    crawl: &CrawlLoop<'_>,
) -> (Vec<ChartEntry>, CrawlStats) {
    let mut tasks = weeks
        .iter()
        .map(|week| WeekTask {
            week: week.clone(),
            entries: Vec::new(),
        })
        .collect::<Vec<WeekTask>>();
    let work = (0..tasks.len()).collect::<Vec<usize>>();

    let stats = crawl.run(
        &mut tasks,
        &work,
        |task| task.week.clone(),
        |task| {
            let chart = source
                .weekly_chart(&task.week)
                .map(|entries| entries.filter(|entries| !entries.is_empty()));
            FetchOutcome::from_lookup(chart)
        },
        |task, entries| task.entries = entries,
    );

    let entries = tasks.into_iter().flat_map(|task| task.entries).collect();
    (entries, stats)
}
