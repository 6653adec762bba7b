//! SQLite snapshot files: one file per dataset, one table per record type.
//!
//! A snapshot is always read and written whole. `row_idx` keeps the dataset
//! order stable across saves.

use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::model::{ArtistRecord, CertificationEntry, ChartEntry, SongRecord};
use crate::util::{ensure_parent_directory, now_utc_string};

pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";

/// A record type that can live in a snapshot table.
///
/// `COLUMNS` are SQL column definitions whose first word is the column name;
/// `from_row` and `to_values` use the same order.
pub trait SnapshotRow: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn to_values(&self) -> Vec<Value>;
}

pub fn open_connection(path: &Path) -> Result<Connection> {
    ensure_parent_directory(path)?;
    let connection = Connection::open(path)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub struct SnapshotStore {
    connection: Connection,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = open_connection(path)?;
        connection.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self { connection })
    }

    /// All rows of `R`'s table in dataset order; empty when never saved.
    pub fn load<R: SnapshotRow>(&self) -> Result<Vec<R>> {
        ensure_table::<R>(&self.connection)?;

        let columns = column_names::<R>()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY row_idx ASC",
            columns.join(", "),
            R::TABLE
        );
        let mut statement = self.connection.prepare(&sql)?;
        let mut rows = statement.query([])?;
        let mut out = Vec::<R>::new();
        while let Some(row) = rows.next()? {
            out.push(
                R::from_row(row).with_context(|| format!("failed to decode row of {}", R::TABLE))?,
            );
        }
        Ok(out)
    }

    /// Replaces the table contents with `rows` in one transaction.
    pub fn save<R: SnapshotRow>(&mut self, rows: &[R]) -> Result<()> {
        let tx = self.connection.transaction()?;
        ensure_table::<R>(&tx)?;

        let columns = column_names::<R>()?;
        tx.execute(&format!("DELETE FROM {}", R::TABLE), [])?;
        {
            let placeholders = (1..=columns.len() + 1)
                .map(|index| format!("?{index}"))
                .collect::<Vec<String>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {}(row_idx, {}) VALUES({placeholders})",
                R::TABLE,
                columns.join(", ")
            );
            let mut statement = tx.prepare(&sql)?;
            for (index, row) in rows.iter().enumerate() {
                let mut values = Vec::<Value>::with_capacity(columns.len() + 1);
                values.push(Value::Integer(index as i64));
                values.extend(row.to_values());
                statement
                    .execute(params_from_iter(values))
                    .with_context(|| format!("failed to write row {index} of {}", R::TABLE))?;
            }
        }

        let saved_at_key = format!("{}_saved_at", R::TABLE);
        for (key, value) in [
            ("schema_version", SNAPSHOT_SCHEMA_VERSION.to_string()),
            (saved_at_key.as_str(), now_utc_string()),
        ] {
            tx.execute(
                "INSERT INTO metadata(key, value) VALUES(?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// Loads a snapshot file if it exists.
pub fn load_existing<R: SnapshotRow>(path: &Path) -> Result<Option<Vec<R>>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(SnapshotStore::open(path)?.load::<R>()?))
}

/// Loads a snapshot that an earlier command must have produced.
///
/// Fails without creating the file, so a later producer run still sees it
/// as absent.
pub fn load_required<R: SnapshotRow>(path: &Path, producer: &str) -> Result<Vec<R>> {
    match load_existing::<R>(path)? {
        Some(rows) => Ok(rows),
        None => bail!(
            "{} snapshot is missing at {}; run `{producer}` first",
            R::TABLE,
            path.display()
        ),
    }
}

fn column_names<R: SnapshotRow>() -> Result<Vec<&'static str>> {
    R::COLUMNS
        .iter()
        .map(|definition| match definition.split_whitespace().next() {
            Some(name) => Ok(name),
            None => bail!("invalid column definition on {}: {definition}", R::TABLE),
        })
        .collect()
}

fn ensure_table<R: SnapshotRow>(connection: &Connection) -> Result<()> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (row_idx INTEGER PRIMARY KEY, {})",
        R::TABLE,
        R::COLUMNS.join(", ")
    );
    connection
        .execute_batch(&sql)
        .with_context(|| format!("failed to create table {}", R::TABLE))?;

    // older snapshots may predate a column
    for definition in R::COLUMNS {
        ensure_column_exists(connection, R::TABLE, definition)?;
    }
    Ok(())
}

fn ensure_column_exists(
    connection: &Connection,
    table_name: &str,
    column_definition: &str,
) -> Result<()> {
    let Some(column_name) = column_definition.split_whitespace().next() else {
        bail!("invalid column definition: {column_definition}");
    };

    let mut statement = connection
        .prepare(&format!("PRAGMA table_info({table_name})"))
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let existing_name: String = row.get(1)?;
        if existing_name == column_name {
            return Ok(());
        }
    }

    // SQLite rejects NOT NULL without a default on ALTER TABLE
    let relaxed = column_definition.replace(" NOT NULL", "");
    connection
        .execute(&format!("ALTER TABLE {table_name} ADD COLUMN {relaxed}"), [])
        .with_context(|| format!("failed to add column {column_name} on {table_name}"))?;
    Ok(())
}

fn text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

impl SnapshotRow for ArtistRecord {
    const TABLE: &'static str = "artists";
    const COLUMNS: &'static [&'static str] = &[
        "artist TEXT NOT NULL",
        "type TEXT",
        "gender TEXT",
        "country TEXT",
        "time_begin TEXT",
        "time_end TEXT",
        "begin_area_id TEXT",
        "end_area_id TEXT",
        "mb_id TEXT",
        "wikidata_id TEXT",
        "discogs_id TEXT",
        "genius_url TEXT",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            artist: row.get(0)?,
            kind: row.get(1)?,
            gender: row.get(2)?,
            country: row.get(3)?,
            time_begin: row.get(4)?,
            time_end: row.get(5)?,
            begin_area_id: row.get(6)?,
            end_area_id: row.get(7)?,
            mb_id: row.get(8)?,
            wikidata_id: row.get(9)?,
            discogs_id: row.get(10)?,
            genius_url: row.get(11)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist.clone()),
            text(&self.kind),
            text(&self.gender),
            text(&self.country),
            text(&self.time_begin),
            text(&self.time_end),
            text(&self.begin_area_id),
            text(&self.end_area_id),
            text(&self.mb_id),
            text(&self.wikidata_id),
            text(&self.discogs_id),
            text(&self.genius_url),
        ]
    }
}

impl SnapshotRow for SongRecord {
    const TABLE: &'static str = "songs";
    const COLUMNS: &'static [&'static str] = &[
        "artist TEXT NOT NULL",
        "song TEXT NOT NULL",
        "genius_artist TEXT",
        "genius_song TEXT",
        "genius_url TEXT",
        "genius_song_id TEXT",
        "lyrics TEXT",
        "summary TEXT",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            artist: row.get(0)?,
            song: row.get(1)?,
            genius_artist: row.get(2)?,
            genius_song: row.get(3)?,
            genius_url: row.get(4)?,
            genius_song_id: row.get(5)?,
            lyrics: row.get(6)?,
            summary: row.get(7)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist.clone()),
            Value::Text(self.song.clone()),
            text(&self.genius_artist),
            text(&self.genius_song),
            text(&self.genius_url),
            text(&self.genius_song_id),
            text(&self.lyrics),
            text(&self.summary),
        ]
    }
}

impl SnapshotRow for ChartEntry {
    const TABLE: &'static str = "charts";
    const COLUMNS: &'static [&'static str] = &[
        "artist TEXT NOT NULL",
        "song TEXT NOT NULL",
        "chart_week TEXT NOT NULL",
        "position INTEGER NOT NULL",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            artist: row.get(0)?,
            song: row.get(1)?,
            chart_week: row.get(2)?,
            position: row.get(3)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist.clone()),
            Value::Text(self.song.clone()),
            Value::Text(self.chart_week.clone()),
            Value::Integer(i64::from(self.position)),
        ]
    }
}

impl SnapshotRow for CertificationEntry {
    const TABLE: &'static str = "certifications";
    const COLUMNS: &'static [&'static str] = &[
        "artist TEXT NOT NULL",
        "category TEXT NOT NULL",
        "name TEXT NOT NULL",
        "release_year INTEGER NOT NULL",
        "period_from TEXT NOT NULL",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            artist: row.get(0)?,
            category: row.get(1)?,
            name: row.get(2)?,
            release_year: row.get(3)?,
            period_from: row.get(4)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist.clone()),
            Value::Text(self.category.clone()),
            Value::Text(self.name.clone()),
            Value::Integer(i64::from(self.release_year)),
            Value::Text(self.period_from.clone()),
        ]
    }
}
