use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SongsArgs;
use crate::clients::genius::{Genius, GeniusSong, SongCatalog};
use crate::clients::http::HttpFetcher;
use crate::commands::{DataLayout, RunLog};
use crate::config::{GENIUS_API_KEY_VAR, load_scrape_config, require_env};
use crate::model::{ChartEntry, SongRecord};
use crate::pipeline::crawl::{CrawlLoop, CrawlStats, FetchOutcome, ThreadSleeper};
use crate::pipeline::resume::{SongStage, pending};
use crate::store::{SnapshotStore, load_existing};

pub fn run(args: SongsArgs) -> Result<()> {
    let config = load_scrape_config(&args.scrape_config)?;
    let access_token = require_env(GENIUS_API_KEY_VAR)?;
    let layout = DataLayout::new(&args.data.data_root);
    let charts_path = args.charts_path.clone().unwrap_or_else(|| layout.charts());
    let output_path = args.output_path.clone().unwrap_or_else(|| layout.songs());

    let (mut store, mut songs) = open_or_seed(&output_path, &charts_path)?;

    let http = HttpFetcher::new(&config.params.header, config.timeout());
    let genius = Genius::new(&http, &config.params.genius_search_url, access_token);
    let sleeper = ThreadSleeper;
    let backoff = config.backoff.crawl_backoff();
    let mut log = RunLog::start("songs");

    let search = CrawlLoop::new(SongStage::Search.as_str(), backoff, &sleeper);
    log.record(search_songs(&mut songs, &genius, args.limit, &search));
    store.save(&songs)?;

    let lyrics = CrawlLoop::new(SongStage::Lyrics.as_str(), backoff, &sleeper);
    log.record(scrape_lyrics(&mut songs, &genius, &lyrics));
    store.save(&songs)?;

    log.finish(&layout, Some(&charts_path), &output_path, songs.len())?;
    Ok(())
}

/// Opens the songs snapshot, seeding it from the charts when it holds no rows.
///
/// The charts are read before the songs file is touched, so a missing charts
/// snapshot leaves no empty songs file behind.
pub fn open_or_seed(
    songs_path: &Path,
    charts_path: &Path,
) -> Result<(SnapshotStore, Vec<SongRecord>)> {
    if let Some(songs) = load_existing::<SongRecord>(songs_path)?.filter(|rows| !rows.is_empty()) {
        return Ok((SnapshotStore::open(songs_path)?, songs));
    }

    let charts = load_existing::<ChartEntry>(charts_path)?.with_context(|| {
        format!(
            "songs are seeded from the charts snapshot, which is missing: {}",
            charts_path.display()
        )
    })?;
    let seeded = seed_from_charts(&charts);
    let mut store = SnapshotStore::open(songs_path)?;
    store.save(&seeded)?;
    info!(rows = seeded.len(), "songs seeded from charts");
    Ok((store, seeded))
}

/// Distinct `(artist, song)` pairs in first-charted order.
pub fn seed_from_charts(charts: &[ChartEntry]) -> Vec<SongRecord> {
    let mut seen = HashSet::<(&str, &str)>::new();
    charts
        .iter()
        .filter(|entry| seen.insert((entry.artist.as_str(), entry.song.as_str())))
        .map(|entry| SongRecord::new(entry.artist.clone(), entry.song.clone()))
        .collect()
}

fn song_label(row: &SongRecord) -> String {
    format!("{} - {}", row.artist, row.song)
}

pub fn search_songs(
    songs: &mut [SongRecord],
    catalog: &dyn SongCatalog,
    limit: Option<usize>,
    crawl: &CrawlLoop<'_>,
) -> CrawlStats {
    let mut work = pending(songs, SongStage::Search);
    if let Some(limit) = limit {
        work.truncate(limit);
    }

    crawl.run(
        songs,
        &work,
        song_label,
        |row| FetchOutcome::from_lookup(catalog.find_song(&row.song, &row.artist)),
        |row, found: GeniusSong| {
            row.genius_artist = Some(found.artist_names);
            row.genius_song = Some(found.title);
            row.genius_url = Some(found.url);
            row.genius_song_id = Some(found.song_id);
        },
    )
}

pub fn scrape_lyrics(
    songs: &mut [SongRecord],
    catalog: &dyn SongCatalog,
    crawl: &CrawlLoop<'_>,
) -> CrawlStats {
    let work = pending(songs, SongStage::Lyrics);
    crawl.run(
        songs,
        &work,
        song_label,
        |row| match row.genius_url.as_deref() {
            Some(url) => FetchOutcome::from_lookup(catalog.lyrics(url)),
            None => FetchOutcome::Empty,
        },
        |row, lyrics| row.lyrics = Some(lyrics),
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::FetchError;
    use crate::pipeline::crawl::Backoff;
    use crate::pipeline::crawl::testing::RecordingSleeper;

    #[derive(Default)]
    struct FakeCatalog {
        searched: RefCell<Vec<String>>,
    }

    impl SongCatalog for FakeCatalog {
        fn find_song(&self, song: &str, artist: &str) -> Result<Option<GeniusSong>, FetchError> {
            self.searched.borrow_mut().push(song.to_string());
            match song {
                "Kiss" => Ok(Some(GeniusSong {
                    song_id: "5721".to_string(),
                    artist_names: artist.to_string(),
                    title: song.to_string(),
                    url: "https://genius.com/Prince-kiss-lyrics".to_string(),
                })),
                "Unknown" => Ok(None),
                _ => Err(FetchError::Status(429)),
            }
        }

        fn lyrics(&self, url: &str) -> Result<Option<String>, FetchError> {
            if url.ends_with("kiss-lyrics") {
                Ok(Some("You don't have to be beautiful".to_string()))
            } else {
                Ok(None)
            }
        }
    }

    fn chart(artist: &str, song: &str, week: &str) -> ChartEntry {
        ChartEntry {
            artist: artist.to_string(),
            song: song.to_string(),
            chart_week: week.to_string(),
            position: 1,
        }
    }

    #[test]
    fn seeding_keeps_first_occurrence_of_each_song() {
        let charts = vec![
            chart("Prince", "Kiss", "1986-04-20"),
            chart("Bananarama", "Venus", "1986-09-07"),
            chart("Prince", "Kiss", "1986-04-27"),
        ];
        let songs = seed_from_charts(&charts);
        assert_eq!(
            songs,
            vec![
                SongRecord::new("Prince", "Kiss"),
                SongRecord::new("Bananarama", "Venus")
            ]
        );
    }

    #[test]
    fn empty_songs_file_is_seeded_from_charts() {
        let dir = tempfile::tempdir().unwrap();
        let charts_path = dir.path().join("raw/charts.sqlite");
        let songs_path = dir.path().join("songs/songs.sqlite");
        SnapshotStore::open(&charts_path)
            .unwrap()
            .save(&[chart("Prince", "Kiss", "1986-04-20")])
            .unwrap();
        SnapshotStore::open(&songs_path).unwrap();
        assert!(songs_path.exists());

        let (_store, songs) = open_or_seed(&songs_path, &charts_path).unwrap();
        assert_eq!(songs, vec![SongRecord::new("Prince", "Kiss")]);

        let reloaded = load_existing::<SongRecord>(&songs_path).unwrap();
        assert_eq!(reloaded, Some(vec![SongRecord::new("Prince", "Kiss")]));
    }

    #[test]
    fn existing_songs_are_not_reseeded() {
        let dir = tempfile::tempdir().unwrap();
        let charts_path = dir.path().join("raw/charts.sqlite");
        let songs_path = dir.path().join("songs/songs.sqlite");
        let mut kiss = SongRecord::new("Prince", "Kiss");
        kiss.genius_url = Some("https://genius.com/Prince-kiss-lyrics".to_string());
        SnapshotStore::open(&songs_path)
            .unwrap()
            .save(std::slice::from_ref(&kiss))
            .unwrap();

        let (_store, songs) = open_or_seed(&songs_path, &charts_path).unwrap();
        assert_eq!(songs, vec![kiss]);
    }

    #[test]
    fn missing_charts_leave_no_songs_file() {
        let dir = tempfile::tempdir().unwrap();
        let songs_path = dir.path().join("songs/songs.sqlite");

        assert!(open_or_seed(&songs_path, &dir.path().join("raw/charts.sqlite")).is_err());
        assert!(!songs_path.exists());
    }

    #[test]
    fn search_then_lyrics_fill_markers() {
        let sleeper = RecordingSleeper::default();
        let catalog = FakeCatalog::default();
        let mut songs = vec![
            SongRecord::new("Prince", "Kiss"),
            SongRecord::new("Nobody", "Unknown"),
            SongRecord::new("Bananarama", "Venus"),
        ];

        let search = CrawlLoop::new("search", Backoff::default(), &sleeper);
        let stats = search_songs(&mut songs, &catalog, None, &search);
        assert_eq!((stats.found, stats.empty, stats.failed), (1, 1, 1));
        assert_eq!(songs[0].genius_song_id.as_deref(), Some("5721"));
        assert_eq!(songs[1].genius_url, None);
        assert_eq!(songs[2].genius_url, None);

        let lyrics = CrawlLoop::new("lyrics", Backoff::default(), &sleeper);
        let stats = scrape_lyrics(&mut songs, &catalog, &lyrics);
        assert_eq!(stats.attempted, 1);
        assert_eq!(
            songs[0].lyrics.as_deref(),
            Some("You don't have to be beautiful")
        );

        // failed and empty searches come back on the next run
        assert_eq!(pending(&songs, SongStage::Search), vec![1, 2]);
    }

    #[test]
    fn search_limit_caps_the_work_list() {
        let sleeper = RecordingSleeper::default();
        let catalog = FakeCatalog::default();
        let mut songs = vec![
            SongRecord::new("Prince", "Kiss"),
            SongRecord::new("Nobody", "Unknown"),
        ];

        let search = CrawlLoop::new("search", Backoff::default(), &sleeper);
        let stats = search_songs(&mut songs, &catalog, Some(1), &search);
        assert_eq!(stats.attempted, 1);
        assert_eq!(*catalog.searched.borrow(), vec!["Kiss".to_string()]);
    }
}
