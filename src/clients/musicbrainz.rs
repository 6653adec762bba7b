//! MusicBrainz artist search (JSON web service) and the relationships page
//! that links an artist to Wikidata, Discogs and Genius.

use scraper::{Html, Selector};
use serde::Deserialize;

use crate::clients::http::{PageFetcher, fill_template};
use crate::error::FetchError;
use crate::pipeline::matcher::Candidate;

pub trait RegistrySearch {
    /// Ranked candidates for `name`; empty when the registry knows nothing.
    fn search_artists(&self, name: &str) -> Result<Vec<Candidate>, FetchError>;
}

pub trait DetailPages {
    fn artist_details(&self, mb_id: &str) -> Result<ArtistDetails, FetchError>;
}

/// External identifiers listed on an artist's relationships page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistDetails {
    pub wikidata_id: Option<String>,
    pub discogs_id: Option<String>,
    pub genius_url: Option<String>,
}

pub struct MusicBrainz<'a> {
    fetcher: &'a dyn PageFetcher,
    search_url: &'a str,
    detail_url: &'a str,
}

impl<'a> MusicBrainz<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, search_url: &'a str, detail_url: &'a str) -> Self {
        Self {
            fetcher,
            search_url,
            detail_url,
        }
    }
}

impl RegistrySearch for MusicBrainz<'_> {
    fn search_artists(&self, name: &str) -> Result<Vec<Candidate>, FetchError> {
        let encoded = urlencoding::encode(name);
        let url = fill_template(self.search_url, &[("QUERY", encoded.as_ref())]);
        let body = self.fetcher.get_text(&url)?;
        parse_search_response(&body)
    }
}

impl DetailPages for MusicBrainz<'_> {
    fn artist_details(&self, mb_id: &str) -> Result<ArtistDetails, FetchError> {
        let url = fill_template(self.detail_url, &[("MB_ID", mb_id)]);
        let body = self.fetcher.get_text(&url)?;
        parse_relationships_page(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: Option<Vec<ArtistHit>>,
}

#[derive(Debug, Deserialize)]
struct ArtistHit {
    id: String,
    name: String,
    #[serde(default)]
    score: u32,
    #[serde(rename = "type")]
    kind: Option<String>,
    gender: Option<String>,
    country: Option<String>,
    #[serde(rename = "life-span")]
    life_span: Option<LifeSpan>,
    #[serde(rename = "begin-area")]
    begin_area: Option<AreaRef>,
    #[serde(rename = "end-area")]
    end_area: Option<AreaRef>,
}

#[derive(Debug, Deserialize)]
struct LifeSpan {
    begin: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AreaRef {
    id: String,
}

fn classification(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

impl From<ArtistHit> for Candidate {
    fn from(hit: ArtistHit) -> Self {
        let (time_begin, time_end) = hit
            .life_span
            .map(|span| (span.begin, span.end))
            .unwrap_or_default();

        Self {
            id: hit.id.trim().to_lowercase(),
            name: hit.name,
            score: hit.score.min(100) as u8,
            kind: classification(hit.kind),
            gender: classification(hit.gender),
            country: classification(hit.country),
            time_begin,
            time_end,
            begin_area_id: hit.begin_area.map(|area| area.id),
            end_area_id: hit.end_area.map(|area| area.id),
        }
    }
}

pub fn parse_search_response(body: &str) -> Result<Vec<Candidate>, FetchError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let hits = response
        .artists
        .ok_or_else(|| FetchError::Shape("artists".to_string()))?;
    Ok(hits.into_iter().map(Candidate::from).collect())
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|err| FetchError::Parse(format!("selector {css}: {err}")))
}

pub fn parse_relationships_page(html: &str) -> Result<ArtistDetails, FetchError> {
    let document = Html::parse_document(html);
    let wikidata = selector("li.wikidata-favicon a")?;
    let discogs = selector("li.discogs-favicon a")?;
    let genius = selector("li.genius-favicon a")?;

    let wikidata_id = document.select(&wikidata).next().and_then(|link| {
        let text = link.text().collect::<String>();
        text.rsplit(':')
            .next()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    });

    let discogs_id = document
        .select(&discogs)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
        .map(ToOwned::to_owned)
        .filter(|id| !id.is_empty());

    let genius_url = document
        .select(&genius)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty());

    Ok(ArtistDetails {
        wikidata_id,
        discogs_id,
        genius_url,
    })
}
