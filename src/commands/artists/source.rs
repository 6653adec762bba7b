//! Builds the artist list from certification credits.

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::clients::llm::{CompletionRequest, StructuredCompletion};
use crate::config::PromptConfig;
use crate::model::{ArtistRecord, CertificationEntry};
use crate::pipeline::cache::{ResponseCache, cache_key, memoized};
use crate::pipeline::expand::{SplitMapping, expand, retain_composites};

pub const SPLIT_PLACEHOLDER: &str = "ARTIST_LIST";

const EXCLUDED_ARTISTS: [&str; 2] = ["various", "soundtrack"];
const COMPOSITE_PATTERN: &str = r"&| and | y |,";

/// Distinct credited artists in first-seen order, without compilation labels.
pub fn distinct_artists(certifications: &[CertificationEntry]) -> Vec<String> {
    let mut seen = HashSet::<&str>::new();
    certifications
        .iter()
        .map(|entry| entry.artist.as_str())
        .filter(|artist| !EXCLUDED_ARTISTS.contains(artist))
        .filter(|artist| seen.insert(*artist))
        .map(ToOwned::to_owned)
        .collect()
}

/// Credits that may name more than one artist.
pub fn composite_candidates(artists: &[String]) -> Result<Vec<String>> {
    let pattern = Regex::new(COMPOSITE_PATTERN).context("failed to compile composite pattern")?;
    Ok(artists
        .iter()
        .filter(|artist| pattern.is_match(artist))
        .cloned()
        .collect())
}

/// Asks the model how to split `composites`, reusing the cached reply for
/// the same prompt, model and batch unless `refresh` is set.
pub fn request_split(
    completion: &dyn StructuredCompletion,
    prompt: &PromptConfig,
    composites: &[String],
    cache: &dyn ResponseCache,
    refresh: bool,
) -> Result<SplitMapping> {
    if composites.is_empty() {
        return Ok(SplitMapping::new());
    }

    let batch = serde_json::to_string(composites).context("failed to serialize artist batch")?;
    let user = prompt.render_user(SPLIT_PLACEHOLDER, &batch);
    let key = cache_key(
        "artist-split",
        &json!({"model": prompt.model, "system": prompt.system, "user": user}),
    )?;

    let reply = memoized(cache, &key, refresh, || {
        let request = CompletionRequest {
            model: &prompt.model,
            system: &prompt.system,
            user: &user,
        };
        completion
            .complete_json(&request)
            .context("artist split completion failed")
    })?;

    mapping_from_reply(&reply)
}

/// Reads `{"credit": ["name", ...]}`, skipping entries that are not lists
/// of names.
pub fn mapping_from_reply(reply: &Value) -> Result<SplitMapping> {
    let Some(object) = reply.as_object() else {
        bail!("artist split reply is not a JSON object");
    };

    let mut mapping = SplitMapping::new();
    for (credit, names) in object {
        let Some(names) = names.as_array() else {
            warn!(credit = %credit, "split entry is not a list, ignored");
            continue;
        };
        let names = names
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .collect::<Vec<String>>();
        mapping.insert(credit.clone(), names);
    }
    Ok(mapping)
}

/// Fresh artist rows: one per individual artist, every enrichment field
/// empty. An artist named both alone and inside a composite appears once.
pub fn build_artist_rows(artists: &[String], mapping: &SplitMapping) -> Vec<ArtistRecord> {
    let rows = artists
        .iter()
        .map(|artist| ArtistRecord::new(artist.clone()))
        .collect::<Vec<ArtistRecord>>();

    let mut seen = HashSet::<String>::new();
    expand(&rows, mapping)
        .into_iter()
        .filter(|row| seen.insert(row.artist.clone()))
        .collect()
}

pub fn prepare_artists(
    certifications: &[CertificationEntry],
    completion: &dyn StructuredCompletion,
    prompt: &PromptConfig,
    cache: &dyn ResponseCache,
    refresh: bool,
) -> Result<Vec<ArtistRecord>> {
    let artists = distinct_artists(certifications);
    let composites = composite_candidates(&artists)?;
    info!(
        artists = artists.len(),
        composites = composites.len(),
        "artist credits collected"
    );

    let mapping = retain_composites(request_split(
        completion,
        prompt,
        &composites,
        cache,
        refresh,
    )?);
    let rows = build_artist_rows(&artists, &mapping);
    info!(split = mapping.len(), rows = rows.len(), "artist list built");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::llm::testing::ScriptedCompletion;
    use crate::config::ModelConfig;
    use crate::pipeline::cache::JsonFileCache;

    fn award(artist: &str) -> CertificationEntry {
        CertificationEntry {
            artist: artist.to_string(),
            category: "album".to_string(),
            name: "greatest hits".to_string(),
            release_year: 1990,
            period_from: "1990-01-01".to_string(),
        }
    }

    fn prompt() -> PromptConfig {
        PromptConfig {
            system: "Split artist credits into individual artists.".to_string(),
            user: "Credits: {ARTIST_LIST}".to_string(),
            model: ModelConfig {
                name: "gpt-4o-mini".to_string(),
                temperature: 0.0,
                seed: Some(1),
            },
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn distinct_artists_drop_compilations_and_repeats() {
        let certifications = vec![
            award("madonna"),
            award("various"),
            award("soundtrack"),
            award("queen"),
            award("madonna"),
        ];
        assert_eq!(
            distinct_artists(&certifications),
            strings(&["madonna", "queen"])
        );
    }

    #[test]
    fn composite_detection_needs_a_separator() {
        let artists = strings(&[
            "simon & garfunkel",
            "earth, wind & fire",
            "sly and the family stone",
            "juan y juan",
            "andy williams",
            "yes",
        ]);
        assert_eq!(
            composite_candidates(&artists).unwrap(),
            strings(&[
                "simon & garfunkel",
                "earth, wind & fire",
                "sly and the family stone",
                "juan y juan"
            ])
        );
    }

    #[test]
    fn reply_entries_that_are_not_lists_are_skipped() {
        let mapping = mapping_from_reply(&json!({
            "a & b": [" a ", "b", ""],
            "broken": "a"
        }))
        .unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["a & b"], strings(&["a", "b"]));
        assert!(mapping_from_reply(&json!(["a"])).is_err());
    }

    #[test]
    fn artist_rows_are_expanded_and_unique() {
        let artists = strings(&["marvin gaye", "marvin gaye & tammi terrell", "queen"]);
        let mut mapping = SplitMapping::new();
        mapping.insert(
            "marvin gaye & tammi terrell".to_string(),
            strings(&["marvin gaye", "tammi terrell"]),
        );

        let rows = build_artist_rows(&artists, &mapping);
        let names = rows.iter().map(|row| row.artist.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["marvin gaye", "tammi terrell", "queen"]);
        assert!(rows.iter().all(|row| row.mb_id.is_none()));
    }

    #[test]
    fn split_reply_is_cached_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path());
        let certifications = vec![
            award("earth, wind & fire"),
            award("marvin gaye & tammi terrell"),
            award("queen"),
        ];
        let completion = ScriptedCompletion::default().with_reply(json!({
            "earth, wind & fire": ["earth, wind & fire"],
            "marvin gaye & tammi terrell": ["marvin gaye", "tammi terrell"]
        }));

        let first = prepare_artists(&certifications, &completion, &prompt(), &cache, false).unwrap();
        // the scripted service has no reply left, so this must come from the cache
        let second = prepare_artists(&certifications, &completion, &prompt(), &cache, false).unwrap();

        let names = first.iter().map(|row| row.artist.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["earth, wind & fire", "marvin gaye", "tammi terrell", "queen"]
        );
        assert_eq!(first, second);
        assert_eq!(completion.prompts.borrow().len(), 1);
        assert!(completion.prompts.borrow()[0].starts_with("Credits: [\"earth, wind & fire\""));
    }

    #[test]
    fn override_asks_again() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path());
        let composites = strings(&["a & b"]);
        let completion = ScriptedCompletion::default()
            .with_reply(json!({"a & b": ["a", "b"]}))
            .with_reply(json!({"a & b": ["a & b"]}));

        request_split(&completion, &prompt(), &composites, &cache, false).unwrap();
        let refreshed = request_split(&completion, &prompt(), &composites, &cache, true).unwrap();

        assert_eq!(refreshed["a & b"], strings(&["a & b"]));
        assert_eq!(completion.prompts.borrow().len(), 2);
    }

    #[test]
    fn no_composites_means_no_completion() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path());
        let completion = ScriptedCompletion::default();
        let mapping = request_split(&completion, &prompt(), &[], &cache, false).unwrap();
        assert!(mapping.is_empty());
        assert!(completion.prompts.borrow().is_empty());
    }
}
