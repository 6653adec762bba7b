mod enrich;
mod source;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ArtistsArgs;
use crate::clients::http::HttpFetcher;
use crate::clients::llm::OpenAiClient;
use crate::clients::musicbrainz::MusicBrainz;
use crate::commands::{DataLayout, RunLog};
use crate::config::{OPENAI_API_KEY_VAR, load_prompt_config, load_scrape_config, require_env};
use crate::model::{ArtistRecord, CertificationEntry};
use crate::pipeline::cache::JsonFileCache;
use crate::pipeline::crawl::ThreadSleeper;
use crate::store::{SnapshotStore, load_existing};

use enrich::enrich_artists;
use source::{SPLIT_PLACEHOLDER, prepare_artists};

pub fn run(args: ArtistsArgs) -> Result<()> {
    let config = load_scrape_config(&args.scrape_config)?;
    let layout = DataLayout::new(&args.data.data_root);
    let certifications_path = args
        .certifications_path
        .clone()
        .unwrap_or_else(|| layout.certifications());
    let output_path = args.output_path.clone().unwrap_or_else(|| layout.artists());
    let rebuild = args.rebuild || !output_path.exists();

    let http = HttpFetcher::new(&config.params.header, config.timeout());
    let mut log = RunLog::start("artists");

    // the snapshot file is only created once the artist list exists
    let prepared = if rebuild {
        let prompt = load_prompt_config(&args.prompt_config, SPLIT_PLACEHOLDER)?;
        let api_key = require_env(OPENAI_API_KEY_VAR)?;
        let certifications = load_existing::<CertificationEntry>(&certifications_path)?
            .with_context(|| {
                format!(
                    "artists are built from the certifications snapshot, which is missing: {}",
                    certifications_path.display()
                )
            })?;

        let client = OpenAiClient::new(&http, api_key);
        let cache = JsonFileCache::new(layout.prompts());
        if args.override_prompt {
            log.warn("artist split requested fresh from the model");
        }
        Some(prepare_artists(
            &certifications,
            &client,
            &prompt,
            &cache,
            args.override_prompt,
        )?)
    } else {
        None
    };

    let mut store = SnapshotStore::open(&output_path)?;
    let mut rows = match prepared {
        Some(rows) => {
            store.save(&rows)?;
            rows
        }
        None => store.load::<ArtistRecord>()?,
    };
    info!(path = %output_path.display(), rows = rows.len(), rebuild, "artists loaded");

    let musicbrainz = MusicBrainz::new(
        &http,
        &config.params.musicbrainz_search_url,
        &config.params.musicbrainz_detail_url,
    );
    let sleeper = ThreadSleeper;
    let stages = enrich_artists(
        &mut rows,
        &musicbrainz,
        &musicbrainz,
        config.backoff.crawl_backoff(),
        &sleeper,
        |rows| store.save(rows),
    )?;
    for stats in stages {
        log.record(stats);
    }

    log.finish(&layout, Some(&certifications_path), &output_path, rows.len())?;
    Ok(())
}
