use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::pipeline::crawl::Backoff;

pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const GENIUS_API_KEY_VAR: &str = "GENIUS_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    pub params: ScrapeParams,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Remote endpoints and request settings.
///
/// URL templates use `{NAME}` placeholders that are substituted per request.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeParams {
    pub header: String,
    #[serde(default = "default_billboard_base_url")]
    pub billboard_base_url: String,
    pub riaa_base_url_album: Option<String>,
    pub riaa_base_url_single: Option<String>,
    #[serde(default = "default_genius_search_url")]
    pub genius_search_url: String,
    #[serde(default = "default_musicbrainz_search_url")]
    pub musicbrainz_search_url: String,
    #[serde(default = "default_musicbrainz_detail_url")]
    pub musicbrainz_detail_url: String,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_empty_secs")]
    pub empty_secs: u64,
    #[serde(default = "default_failure_secs")]
    pub failure_secs: u64,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            empty_secs: default_empty_secs(),
            failure_secs: default_failure_secs(),
            period_secs: default_period_secs(),
        }
    }
}

impl BackoffConfig {
    pub fn crawl_backoff(&self) -> Backoff {
        Backoff {
            on_empty: Duration::from_secs(self.empty_secs),
            on_failure: Duration::from_secs(self.failure_secs),
        }
    }

    pub fn period_pause(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.params.timeout_secs)
    }

    pub fn riaa_urls(&self) -> Result<(&str, &str)> {
        let album = self
            .params
            .riaa_base_url_album
            .as_deref()
            .context("scrape config is missing params.riaa_base_url_album")?;
        let single = self
            .params
            .riaa_base_url_single
            .as_deref()
            .context("scrape config is missing params.riaa_base_url_single")?;
        Ok((album, single))
    }

    fn validate(&self) -> Result<()> {
        if self.params.header.trim().is_empty() {
            bail!("params.header must not be empty");
        }
        if self.params.start_year > self.params.end_year {
            bail!(
                "params.start_year ({}) is after params.end_year ({})",
                self.params.start_year,
                self.params.end_year
            );
        }
        Ok(())
    }
}

/// System and user prompt plus the model settings used to run them.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub system: String,
    pub user: String,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub temperature: f32,
    pub seed: Option<i64>,
}

impl PromptConfig {
    /// Fills `{placeholder}` in the user template.
    pub fn render_user(&self, placeholder: &str, value: &str) -> String {
        self.user.replace(&format!("{{{placeholder}}}"), value)
    }

    fn validate(&self, placeholder: &str) -> Result<()> {
        if !self.user.contains(&format!("{{{placeholder}}}")) {
            bail!("user prompt template has no {{{placeholder}}} placeholder");
        }
        if self.model.name.trim().is_empty() {
            bail!("model.name must not be empty");
        }
        Ok(())
    }
}

pub fn load_scrape_config(path: &Path) -> Result<ScrapeConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_scrape_config(&raw).with_context(|| format!("invalid scrape config {}", path.display()))
}

pub fn load_prompt_config(path: &Path, placeholder: &str) -> Result<PromptConfig> {
    let config: PromptConfig = load_toml(path)?;
    config
        .validate(placeholder)
        .with_context(|| format!("invalid prompt config {}", path.display()))?;
    Ok(config)
}

pub fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("environment variable {name} is not set"),
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn parse_scrape_config(raw: &str) -> Result<ScrapeConfig> {
    let config: ScrapeConfig = toml::from_str(raw).context("failed to parse scrape config")?;
    config.validate()?;
    Ok(config)
}

fn default_billboard_base_url() -> String {
    "https://www.billboard.com/charts/hot-100/{CHART_WEEK}/".to_string()
}

fn default_genius_search_url() -> String {
    "https://api.genius.com/search?access_token={ACCESS_TOKEN}&q={QUERY}".to_string()
}

fn default_musicbrainz_search_url() -> String {
    "https://musicbrainz.org/ws/2/artist/?query=artist:{QUERY}&fmt=json".to_string()
}

fn default_musicbrainz_detail_url() -> String {
    "https://musicbrainz.org/artist/{MB_ID}/relationships".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_empty_secs() -> u64 {
    30
}

fn default_failure_secs() -> u64 {
    10
}

fn default_period_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [params]
        header = "lyrics-pipeline/0.1 (research)"
        start_year = 1990
        end_year = 1991
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_scrape_config(MINIMAL).unwrap();
        assert_eq!(config.params.timeout_secs, 30);
        assert_eq!(config.backoff.crawl_backoff(), Backoff::default());
        assert!(config.params.musicbrainz_search_url.contains("{QUERY}"));
        assert!(config.riaa_urls().is_err());
    }

    #[test]
    fn backoff_table_overrides_defaults() {
        let raw = format!("{MINIMAL}\n[backoff]\nempty_secs = 0\nfailure_secs = 1\n");
        let config = parse_scrape_config(&raw).unwrap();
        assert_eq!(config.backoff.crawl_backoff().on_empty, Duration::ZERO);
        assert_eq!(config.backoff.crawl_backoff().on_failure, Duration::from_secs(1));
        assert_eq!(config.backoff.period_secs, 10);
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let raw = "[params]\nstart_year = 1990\nend_year = 1991\n";
        assert!(parse_scrape_config(raw).is_err());
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        let raw = MINIMAL.replace("end_year = 1991", "end_year = 1980");
        assert!(parse_scrape_config(&raw).is_err());
    }

    #[test]
    fn prompt_template_renders_placeholder() {
        let prompt: PromptConfig = toml::from_str(
            r#"
            system = "You split artist credits."
            user = "Split these: {ARTIST_LIST}"
            [model]
            name = "gpt-4o-mini"
            seed = 7
            "#,
        )
        .unwrap();
        prompt.validate("ARTIST_LIST").unwrap();
        assert!(prompt.validate("LYRICS_TEXT").is_err());
        assert_eq!(prompt.render_user("ARTIST_LIST", "[\"A & B\"]"), "Split these: [\"A & B\"]");
    }
}
