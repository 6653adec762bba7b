use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::info;

use crate::cli::{EmbedArgs, EmbedRefreshMode};
use crate::commands::DataLayout;
use crate::embedding::{
    HashingEmbedder, decode_embedding_blob, encode_embedding_blob, summary_text_hash,
};
use crate::model::SongRecord;
use crate::store::{load_required, open_connection};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

const EMBEDDING_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone)]
struct ExistingEmbedding {
    text_hash: String,
    embedding_dim: usize,
    embedding: Vec<u8>,
}

impl ExistingEmbedding {
    fn is_current(&self, text_hash: &str, embedder: &HashingEmbedder) -> bool {
        self.text_hash == text_hash
            && self.embedding_dim == embedder.dimensions
            && decode_embedding_blob(&self.embedding, embedder.dimensions).is_some()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedCounts {
    pub eligible_songs: usize,
    pub stale_before: usize,
    pub updated_songs: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRunManifest {
    manifest_version: u32,
    run_id: String,
    generated_at: String,
    model_id: String,
    embedding_dim: usize,
    schema_version: String,
    refresh_mode: String,
    batch_size: usize,
    counts: EmbedCounts,
    duration_ms: u128,
    status: String,
}

pub fn run(args: EmbedArgs) -> Result<()> {
    let layout = DataLayout::new(&args.data.data_root);
    let songs_path = args.songs_path.clone().unwrap_or_else(|| layout.songs());
    let embedder = HashingEmbedder::new(&args.model_id, args.dimensions);
    let batch_size = args.batch_size.max(1);
    let started = Instant::now();
    let started_ts = chrono::Utc::now();

    let songs = load_required::<SongRecord>(&songs_path, "songs")?;
    let mut connection = open_connection(&songs_path)?;
    ensure_embedding_schema(&connection)?;

    let counts = refresh_embeddings(
        &mut connection,
        &songs,
        &embedder,
        args.refresh_mode,
        batch_size,
    )?;

    let manifest = EmbeddingRunManifest {
        manifest_version: 1,
        run_id: format!("embed-{}", utc_compact_string(started_ts)),
        generated_at: now_utc_string(),
        model_id: embedder.model_id.clone(),
        embedding_dim: embedder.dimensions,
        schema_version: EMBEDDING_SCHEMA_VERSION.to_string(),
        refresh_mode: args.refresh_mode.as_str().to_string(),
        batch_size,
        counts: counts.clone(),
        duration_ms: started.elapsed().as_millis(),
        status: "completed".to_string(),
    };
    let manifest_path = layout
        .manifests()
        .join(format!("embed_run_{}.json", utc_compact_string(started_ts)));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        model_id = %embedder.model_id,
        eligible = counts.eligible_songs,
        updated = counts.updated_songs,
        "embedding refresh completed"
    );
    Ok(())
}

pub fn ensure_embedding_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS summary_embeddings (
              genius_song_id TEXT NOT NULL,
              model_id TEXT NOT NULL,
              embedding BLOB NOT NULL,
              embedding_dim INTEGER NOT NULL,
              text_hash TEXT NOT NULL,
              generated_at TEXT NOT NULL,
              PRIMARY KEY (genius_song_id, model_id)
            );
            ",
        )
        .context("failed to create summary_embeddings")?;
    Ok(())
}

/// Embeds every summarized song with a Genius id, skipping rows whose stored
/// vector already matches the summary text and dimensions unless `mode` is
/// `Full`. Writes are committed every `batch_size` rows.
pub fn refresh_embeddings(
    connection: &mut Connection,
    songs: &[SongRecord],
    embedder: &HashingEmbedder,
    mode: EmbedRefreshMode,
    batch_size: usize,
) -> Result<EmbedCounts> {
    let mut counts = EmbedCounts::default();
    let mut seen = HashSet::<&str>::new();
    let mut batch = Vec::<(String, String, Vec<u8>)>::new();

    for song in songs {
        let (Some(song_id), Some(summary)) = (song.genius_song_id.as_deref(), song.summary.as_deref())
        else {
            continue;
        };
        if summary.trim().is_empty() || !seen.insert(song_id) {
            continue;
        }
        counts.eligible_songs += 1;

        let text_hash = summary_text_hash(summary);
        let stale = load_existing_embedding(connection, song_id, &embedder.model_id)?
            .is_none_or(|existing| !existing.is_current(&text_hash, embedder));
        if stale {
            counts.stale_before += 1;
        }
        if mode == EmbedRefreshMode::MissingOrStale && !stale {
            continue;
        }

        let blob = encode_embedding_blob(&embedder.embed(summary));
        batch.push((song_id.to_string(), text_hash, blob));
        if batch.len() >= batch_size {
            counts.updated_songs += flush_batch(connection, embedder, &mut batch)?;
            info!(
                model_id = %embedder.model_id,
                updated = counts.updated_songs,
                "embed batch committed"
            );
        }
    }

    counts.updated_songs += flush_batch(connection, embedder, &mut batch)?;
    Ok(counts)
}

fn load_existing_embedding(
    connection: &Connection,
    song_id: &str,
    model_id: &str,
) -> Result<Option<ExistingEmbedding>> {
    let existing = connection
        .query_row(
            "
            SELECT text_hash, embedding_dim, embedding
            FROM summary_embeddings
            WHERE genius_song_id = ?1 AND model_id = ?2
            ",
            params![song_id, model_id],
            |row| {
                Ok(ExistingEmbedding {
                    text_hash: row.get(0)?,
                    embedding_dim: row.get::<_, i64>(1)? as usize,
                    embedding: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(existing)
}

fn flush_batch(
    connection: &mut Connection,
    embedder: &HashingEmbedder,
    batch: &mut Vec<(String, String, Vec<u8>)>,
) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }

    let tx = connection.transaction()?;
    let generated_at = now_utc_string();
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO summary_embeddings(genius_song_id, model_id, embedding, embedding_dim, text_hash, generated_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(genius_song_id, model_id) DO UPDATE SET
              embedding=excluded.embedding,
              embedding_dim=excluded.embedding_dim,
              text_hash=excluded.text_hash,
              generated_at=excluded.generated_at
            ",
        )?;
        for (song_id, text_hash, blob) in batch.iter() {
            statement.execute(params![
                song_id,
                embedder.model_id,
                blob,
                embedder.dimensions as i64,
                text_hash,
                generated_at,
            ])?;
        }
    }
    tx.commit()?;

    let written = batch.len();
    batch.clear();
    Ok(written)
}
