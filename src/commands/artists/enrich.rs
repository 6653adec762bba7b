//! The two MusicBrainz stages: identity lookup, then the relationships page.

use anyhow::Result;

use crate::clients::musicbrainz::{ArtistDetails, DetailPages, RegistrySearch};
use crate::model::ArtistRecord;
use crate::pipeline::crawl::{Backoff, CrawlLoop, CrawlStats, FetchOutcome, Sleeper};
use crate::pipeline::matcher::{Candidate, resolve};
use crate::pipeline::resume::{ArtistStage, pending};

/// Runs both stages over the pending rows, handing the dataset to
/// `checkpoint` after each one.
pub fn enrich_artists(
    rows: &mut [ArtistRecord],
    registry: &dyn RegistrySearch,
    details: &dyn DetailPages,
    backoff: Backoff,
    sleeper: &dyn Sleeper,
    mut checkpoint: impl FnMut(&[ArtistRecord]) -> Result<()>,
) -> Result<Vec<CrawlStats>> {
    let lookup = CrawlLoop::new(ArtistStage::RegistryLookup.as_str(), backoff, sleeper);
    let lookup_stats = lookup_registry(rows, registry, &lookup);
    checkpoint(&*rows)?;

    let scrape = CrawlLoop::new(ArtistStage::DetailScrape.as_str(), backoff, sleeper);
    let scrape_stats = scrape_details(rows, details, &scrape);
    checkpoint(&*rows)?;

    Ok(vec![lookup_stats, scrape_stats])
}

pub fn lookup_registry(
    rows: &mut [ArtistRecord],
    registry: &dyn RegistrySearch,
    crawl: &CrawlLoop<'_>,
) -> CrawlStats {
    let work = pending(rows, ArtistStage::RegistryLookup);
    crawl.run(
        rows,
        &work,
        |row| row.artist.clone(),
        |row| match registry.search_artists(&row.artist) {
            Ok(candidates) => match resolve(&row.artist, &candidates) {
                Some(best) => FetchOutcome::Found(best.clone()),
                None => FetchOutcome::Empty,
            },
            Err(error) => FetchOutcome::Failed(error),
        },
        apply_candidate,
    )
}

fn apply_candidate(row: &mut ArtistRecord, candidate: Candidate) {
    row.kind = candidate.kind;
    row.gender = candidate.gender;
    row.country = candidate.country;
    row.time_begin = candidate.time_begin;
    row.time_end = candidate.time_end;
    row.begin_area_id = candidate.begin_area_id;
    row.end_area_id = candidate.end_area_id;
    row.mb_id = Some(candidate.id);
}

pub fn scrape_details(
    rows: &mut [ArtistRecord],
    details: &dyn DetailPages,
    crawl: &CrawlLoop<'_>,
) -> CrawlStats {
    let work = pending(rows, ArtistStage::DetailScrape);
    crawl.run(
        rows,
        &work,
        |row| row.artist.clone(),
        |row| match row.mb_id.as_deref() {
            Some(mb_id) => match details.artist_details(mb_id) {
                Ok(found) => FetchOutcome::Found(found),
                Err(error) => FetchOutcome::Failed(error),
            },
            None => FetchOutcome::Empty,
        },
        apply_details,
    )
}

// a scraped page without a link still counts as done: store "" rather than null
fn apply_details(row: &mut ArtistRecord, found: ArtistDetails) {
    row.wikidata_id = Some(found.wikidata_id.unwrap_or_default());
    row.discogs_id = Some(found.discogs_id.unwrap_or_default());
    row.genius_url = Some(found.genius_url.unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use super::*;
    use crate::error::FetchError;
    use crate::pipeline::crawl::testing::RecordingSleeper;

    #[derive(Default)]
    struct FakeRegistry {
        searched: RefCell<Vec<String>>,
    }

    impl RegistrySearch for FakeRegistry {
        fn search_artists(&self, name: &str) -> Result<Vec<Candidate>, FetchError> {
            self.searched.borrow_mut().push(name.to_string());
            match name {
                "beatles" => Ok(vec![
                    candidate("b10bbbfc", "The Beatles", 92),
                    candidate("0ba3ee6e", "Beatles Tribute", 88),
                ]),
                "nobody" => Ok(Vec::new()),
                _ => Err(FetchError::Transport("connection reset by peer".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeDetails {
        requested: RefCell<Vec<String>>,
    }

    impl DetailPages for FakeDetails {
        fn artist_details(&self, mb_id: &str) -> Result<ArtistDetails, FetchError> {
            self.requested.borrow_mut().push(mb_id.to_string());
            Ok(ArtistDetails {
                wikidata_id: Some("Q1299".to_string()),
                discogs_id: None,
                genius_url: None,
            })
        }
    }

    fn candidate(id: &str, name: &str, score: u8) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: name.to_string(),
            score,
            kind: Some("group".to_string()),
            country: Some("gb".to_string()),
            ..Candidate::default()
        }
    }

    fn resolved(artist: &str, mb_id: &str) -> ArtistRecord {
        ArtistRecord {
            mb_id: Some(mb_id.to_string()),
            ..ArtistRecord::new(artist)
        }
    }

    fn backoff() -> Backoff {
        Backoff {
            on_empty: Duration::from_secs(30),
            on_failure: Duration::from_secs(10),
        }
    }

    #[test]
    fn only_unresolved_rows_reach_the_registry() {
        let registry = FakeRegistry::default();
        let details = FakeDetails::default();
        let sleeper = RecordingSleeper::default();
        let mut rows = vec![resolved("queen", "0383dadf"), ArtistRecord::new("beatles")];
        let mut checkpoints = 0;

        let stats = enrich_artists(&mut rows, &registry, &details, backoff(), &sleeper, |_| {
            checkpoints += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(*registry.searched.borrow(), vec!["beatles".to_string()]);
        assert_eq!(rows[1].mb_id.as_deref(), Some("b10bbbfc"));
        assert_eq!(rows[1].kind.as_deref(), Some("group"));
        assert_eq!(rows[0].kind, None);
        assert_eq!(checkpoints, 2);
        assert_eq!(stats[0].attempted, 1);
        assert_eq!(stats[1].attempted, 2);
    }

    #[test]
    fn transport_error_leaves_row_pending() {
        let registry = FakeRegistry::default();
        let sleeper = RecordingSleeper::default();
        let mut rows = vec![ArtistRecord::new("offline"), ArtistRecord::new("beatles")];

        let crawl = CrawlLoop::new("registry-lookup", backoff(), &sleeper);
        let stats = lookup_registry(&mut rows, &registry, &crawl);

        assert_eq!(rows[0], ArtistRecord::new("offline"));
        assert_eq!(stats.failed_items, vec!["offline".to_string()]);
        assert_eq!(pending(&rows, ArtistStage::RegistryLookup), vec![0]);
        assert_eq!(*sleeper.calls.borrow(), vec![Duration::from_secs(10)]);
    }

    #[test]
    fn unknown_artist_is_empty_not_failed() {
        let registry = FakeRegistry::default();
        let sleeper = RecordingSleeper::default();
        let mut rows = vec![ArtistRecord::new("nobody"), ArtistRecord::new("beatles")];

        let crawl = CrawlLoop::new("registry-lookup", backoff(), &sleeper);
        let stats = lookup_registry(&mut rows, &registry, &crawl);

        assert_eq!((stats.empty, stats.found), (1, 1));
        assert_eq!(rows[0].mb_id, None);
        assert_eq!(*sleeper.calls.borrow(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn scraped_rows_record_absent_links_as_empty() {
        let details = FakeDetails::default();
        let sleeper = RecordingSleeper::default();
        let mut rows = vec![resolved("beatles", "b10bbbfc"), ArtistRecord::new("nobody")];

        let crawl = CrawlLoop::new("detail-scrape", backoff(), &sleeper);
        scrape_details(&mut rows, &details, &crawl);

        assert_eq!(*details.requested.borrow(), vec!["b10bbbfc".to_string()]);
        assert_eq!(rows[0].wikidata_id.as_deref(), Some("Q1299"));
        assert_eq!(rows[0].genius_url.as_deref(), Some(""));
        assert_eq!(rows[0].discogs_id.as_deref(), Some(""));
        assert!(pending(&rows, ArtistStage::DetailScrape).is_empty());
    }
}
