use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "lyrics-pipeline",
    version,
    about = "Chart, certification, lyrics and artist data collection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape Billboard Hot 100 weekly charts.
    Charts(ChartsArgs),
    /// Scrape RIAA gold and platinum awards.
    Certifications(CertificationsArgs),
    /// Find chart songs on Genius and scrape their lyrics.
    Songs(SongsArgs),
    /// Resolve certified artists against MusicBrainz.
    Artists(ArtistsArgs),
    /// Summarize song lyrics with a chat-completion model.
    Summaries(SummariesArgs),
    /// Embed song summaries.
    Embed(EmbedArgs),
    /// Report row and pending counts of every snapshot.
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ChartsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value = "configs/scrape.toml")]
    pub scrape_config: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Chart weeks (YYYY-MM-DD) to scrape instead of the configured years.
    #[arg(long = "week")]
    pub weeks: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CertificationsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value = "configs/scrape.toml")]
    pub scrape_config: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SongsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value = "configs/scrape.toml")]
    pub scrape_config: PathBuf,

    #[arg(long)]
    pub charts_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Maximum number of Genius searches in this run.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ArtistsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value = "configs/scrape.toml")]
    pub scrape_config: PathBuf,

    #[arg(long, default_value = "configs/prompts/artist_split.toml")]
    pub prompt_config: PathBuf,

    #[arg(long)]
    pub certifications_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Rebuild the artist list from the certifications snapshot.
    #[arg(long, default_value_t = false)]
    pub rebuild: bool,

    /// Ask the model again even when a cached split exists.
    #[arg(long, default_value_t = false)]
    pub override_prompt: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SummariesArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value = "configs/prompts/summarize.toml")]
    pub prompt_config: PathBuf,

    #[arg(long, default_value = "configs/scrape.toml")]
    pub scrape_config: PathBuf,

    #[arg(long)]
    pub songs_path: Option<PathBuf>,

    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbedRefreshMode {
    Full,
    MissingOrStale,
}

impl EmbedRefreshMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::MissingOrStale => "missing-or-stale",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long)]
    pub songs_path: Option<PathBuf>,

    #[arg(long, default_value = "summary-hash-v1")]
    pub model_id: String,

    #[arg(long, default_value_t = 384)]
    pub dimensions: usize,

    #[arg(long, value_enum, default_value_t = EmbedRefreshMode::MissingOrStale)]
    pub refresh_mode: EmbedRefreshMode,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub data: DataArgs,
}
