use anyhow::Result;
use serde_json::Value;
use tracing::info;

use crate::cli::SummariesArgs;
use crate::clients::http::HttpFetcher;
use crate::clients::llm::{CompletionRequest, OpenAiClient, StructuredCompletion};
use crate::commands::{DataLayout, RunLog};
use crate::config::{
    OPENAI_API_KEY_VAR, PromptConfig, load_prompt_config, load_scrape_config, require_env,
};
use crate::error::FetchError;
use crate::model::SongRecord;
use crate::pipeline::crawl::{CrawlLoop, CrawlStats, FetchOutcome, ThreadSleeper};
use crate::pipeline::resume::{SongStage, pending};
use crate::store::{SnapshotStore, load_required};

pub const LYRICS_PLACEHOLDER: &str = "LYRICS_TEXT";

pub fn run(args: SummariesArgs) -> Result<()> {
    let scrape = load_scrape_config(&args.scrape_config)?;
    let prompt = load_prompt_config(&args.prompt_config, LYRICS_PLACEHOLDER)?;
    let api_key = require_env(OPENAI_API_KEY_VAR)?;
    let layout = DataLayout::new(&args.data.data_root);
    let songs_path = args.songs_path.clone().unwrap_or_else(|| layout.songs());

    let mut songs = load_required::<SongRecord>(&songs_path, "songs")?;
    let mut store = SnapshotStore::open(&songs_path)?;
    info!(path = %songs_path.display(), rows = songs.len(), model = %prompt.model.name, "songs loaded");

    let http = HttpFetcher::new(&scrape.params.header, scrape.timeout());
    let client = OpenAiClient::new(&http, api_key);
    let sleeper = ThreadSleeper;
    let crawl = CrawlLoop::new(
        SongStage::Summary.as_str(),
        scrape.backoff.crawl_backoff(),
        &sleeper,
    );

    let mut log = RunLog::start("summaries");
    log.record(summarize_songs(&mut songs, &client, &prompt, args.limit, &crawl));
    store.save(&songs)?;

    log.finish(&layout, None, &songs_path, songs.len())?;
    Ok(())
}

pub fn summarize_songs(
    songs: &mut [SongRecord],
    completion: &dyn StructuredCompletion,
    prompt: &PromptConfig,
    limit: Option<usize>,
    crawl: &CrawlLoop<'_>,
) -> CrawlStats {
    let mut work = pending(songs, SongStage::Summary);
    if let Some(limit) = limit {
        work.truncate(limit);
    }

    crawl.run(
        songs,
        &work,
        |row| format!("{} - {}", row.artist, row.song),
        |row| {
            let Some(lyrics) = row.lyrics.as_deref() else {
                return FetchOutcome::Empty;
            };
            let user = prompt.render_user(LYRICS_PLACEHOLDER, lyrics);
            let request = CompletionRequest {
                model: &prompt.model,
                system: &prompt.system,
                user: &user,
            };
            match completion
                .complete_json(&request)
                .and_then(|reply| summary_from_reply(&reply))
            {
                Ok(summary) => FetchOutcome::Found(summary),
                Err(error) => FetchOutcome::Failed(error),
            }
        },
        |row, summary| row.summary = Some(summary),
    )
}

fn summary_from_reply(reply: &Value) -> Result<String, FetchError> {
    reply
        .get("summary")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| FetchError::Shape("reply has no summary string".to_string()))
}
