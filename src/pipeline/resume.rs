use serde::Serialize;

use crate::model::{ArtistRecord, SongRecord};

/// Lyrics placeholders Genius serves for songs without real lyrics.
pub const LYRICS_PLACEHOLDERS: [&str; 2] = ["Instrumental", "Lyrics not available"];

/// A row type whose enrichment progress is recorded in its own fields.
pub trait StageMarkers {
    type Stage: Copy;

    fn is_pending(&self, stage: Self::Stage) -> bool;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtistStage {
    RegistryLookup,
    DetailScrape,
}

impl ArtistStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegistryLookup => "registry-lookup",
            Self::DetailScrape => "detail-scrape",
        }
    }
}

impl StageMarkers for ArtistRecord {
    type Stage = ArtistStage;

    fn is_pending(&self, stage: ArtistStage) -> bool {
        match stage {
            ArtistStage::RegistryLookup => self.mb_id.is_none(),
            // details are keyed by the registry id, so they wait for it
            ArtistStage::DetailScrape => self.genius_url.is_none() && self.mb_id.is_some(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SongStage {
    Search,
    Lyrics,
    Summary,
}

impl SongStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Lyrics => "lyrics",
            Self::Summary => "summary",
        }
    }
}

impl StageMarkers for SongRecord {
    type Stage = SongStage;

    fn is_pending(&self, stage: SongStage) -> bool {
        match stage {
            SongStage::Search => self.genius_url.is_none(),
            SongStage::Lyrics => self.genius_url.is_some() && self.lyrics.is_none(),
            SongStage::Summary => {
                self.summary.is_none()
                    && self
                        .lyrics
                        .as_deref()
                        .is_some_and(|lyrics| !LYRICS_PLACEHOLDERS.contains(&lyrics))
            }
        }
    }
}

/// Indices of the rows that still need `stage`, in snapshot order.
///
/// Nothing is queued between runs; the work-list is always rebuilt from the
/// snapshot, so an interrupted run resumes wherever the markers left off.
pub fn pending<R: StageMarkers>(rows: &[R], stage: R::Stage) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| row.is_pending(stage))
        .map(|(index, _)| index)
        .collect()
}
