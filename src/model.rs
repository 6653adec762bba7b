use serde::{Deserialize, Serialize};

use crate::pipeline::crawl::CrawlStats;

/// One row of the artists dataset.
///
/// `mb_id` marks the registry lookup as done; `genius_url` marks the detail
/// scrape as done. An empty string in a detail field means the page was
/// scraped and carried no such link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub artist: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub time_begin: Option<String>,
    pub time_end: Option<String>,
    pub begin_area_id: Option<String>,
    pub end_area_id: Option<String>,
    pub mb_id: Option<String>,
    pub wikidata_id: Option<String>,
    pub discogs_id: Option<String>,
    pub genius_url: Option<String>,
}

impl ArtistRecord {
    pub fn new(artist: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub artist: String,
    pub song: String,
    pub genius_artist: Option<String>,
    pub genius_song: Option<String>,
    pub genius_url: Option<String>,
    pub genius_song_id: Option<String>,
    pub lyrics: Option<String>,
    pub summary: Option<String>,
}

impl SongRecord {
    pub fn new(artist: impl Into<String>, song: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            song: song.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub artist: String,
    pub song: String,
    pub chart_week: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationEntry {
    pub artist: String,
    pub category: String,
    pub name: String,
    pub release_year: i32,
    pub period_from: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPaths {
    pub data_root: String,
    pub input_path: Option<String>,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub command: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub paths: RunPaths,
    pub row_count: usize,
    pub stages: Vec<CrawlStats>,
    pub warnings: Vec<String>,
}
