//! Genius search API and lyrics pages.

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::clients::http::{PageFetcher, fill_template};
use crate::error::FetchError;
use crate::util::normalize_whitespace;

/// The Genius entry identified for a chart song.
#[derive(Debug, Clone, PartialEq)]
pub struct GeniusSong {
    pub song_id: String,
    pub artist_names: String,
    pub title: String,
    pub url: String,
}

pub trait SongCatalog {
    /// Exact title and artist match for a song, if Genius has one.
    fn find_song(&self, song: &str, artist: &str) -> Result<Option<GeniusSong>, FetchError>;

    /// Lyrics text of a song page; `None` when the page carries none.
    fn lyrics(&self, url: &str) -> Result<Option<String>, FetchError>;
}

pub struct Genius<'a> {
    fetcher: &'a dyn PageFetcher,
    search_url: &'a str,
    access_token: String,
}

impl<'a> Genius<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, search_url: &'a str, access_token: String) -> Self {
        Self {
            fetcher,
            search_url,
            access_token,
        }
    }

    fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError> {
        let encoded = urlencoding::encode(query);
        let url = fill_template(
            self.search_url,
            &[
                ("ACCESS_TOKEN", self.access_token.as_str()),
                ("QUERY", encoded.as_ref()),
            ],
        );
        let body = self.fetcher.get_text(&url)?;
        parse_search_hits(&body)
    }
}

impl SongCatalog for Genius<'_> {
    fn find_song(&self, song: &str, artist: &str) -> Result<Option<GeniusSong>, FetchError> {
        // the bare title first, then the title qualified by the artist
        for query in [song.to_string(), format!("{song} by {artist}")] {
            let hits = self.search(&query)?;
            if let Some(index) = find_song_index(&hits, song, artist) {
                let hit = &hits[index].result;
                return Ok(Some(GeniusSong {
                    song_id: hit.id.to_string(),
                    artist_names: hit.artist_names.clone(),
                    title: hit.title.clone(),
                    url: hit.url.clone(),
                }));
            }
        }
        Ok(None)
    }

    fn lyrics(&self, url: &str) -> Result<Option<String>, FetchError> {
        let body = self.fetcher.get_text(url)?;
        parse_lyrics_page(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: String,
    pub result: HitResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HitResult {
    pub id: u64,
    pub title: String,
    pub artist_names: String,
    pub primary_artist_names: String,
    pub url: String,
}

pub fn parse_search_hits(body: &str) -> Result<Vec<SearchHit>, FetchError> {
    let envelope: SearchEnvelope = serde_json::from_str(body)?;
    Ok(envelope.response.hits)
}

/// Accent-, case- and punctuation-insensitive form used for exact matching.
pub fn normalize_for_match(value: &str) -> String {
    let stripped = value
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '_' || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect::<String>();
    normalize_whitespace(&stripped)
}

/// First song hit whose title and credited artists equal the targets.
///
/// Full artist credits are tried across all hits before primary artists.
pub fn find_song_index(hits: &[SearchHit], song: &str, artist: &str) -> Option<usize> {
    let target_title = normalize_for_match(song);
    let target_artist = normalize_for_match(artist);

    let matches = |credit: fn(&HitResult) -> &str| {
        hits.iter().position(|hit| {
            hit.kind == "song"
                && normalize_for_match(&hit.result.title) == target_title
                && normalize_for_match(credit(&hit.result)) == target_artist
        })
    };

    matches(full_credit).or_else(|| matches(primary_credit))
}

fn full_credit(result: &HitResult) -> &str {
    &result.artist_names
}

fn primary_credit(result: &HitResult) -> &str {
    &result.primary_artist_names
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|err| FetchError::Parse(format!("selector {css}: {err}")))
}

pub fn parse_lyrics_page(html: &str) -> Result<Option<String>, FetchError> {
    let document = Html::parse_document(html);
    let container = selector(r#"div[data-lyrics-container="true"]"#)?;

    let mut lines = Vec::<String>::new();
    for block in document.select(&container) {
        for node in block.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            // the song header sits inside the container but is not lyrics
            let excluded = node.ancestors().any(|ancestor| {
                ElementRef::wrap(ancestor)
                    .and_then(|element| element.value().attr("data-exclude-from-selection"))
                    == Some("true")
            });
            if excluded {
                continue;
            }
            let line = text.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
    }

    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(lines.join("\n")))
}
