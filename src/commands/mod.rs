//! One module per subcommand, plus the dataset layout and run manifests
//! they share.

pub mod artists;
pub mod certifications;
pub mod charts;
pub mod embed;
pub mod songs;
pub mod status;
pub mod summaries;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::model::{PipelineRunManifest, RunPaths};
use crate::pipeline::crawl::CrawlStats;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

/// Where each dataset lives under the data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn charts(&self) -> PathBuf {
        self.root.join("raw").join("charts.sqlite")
    }

    pub fn certifications(&self) -> PathBuf {
        self.root.join("raw").join("certifications.sqlite")
    }

    pub fn songs(&self) -> PathBuf {
        self.root.join("songs").join("songs.sqlite")
    }

    pub fn artists(&self) -> PathBuf {
        self.root.join("artists").join("artists.sqlite")
    }

    pub fn manifests(&self) -> PathBuf {
        self.root.join("manifests")
    }

    pub fn prompts(&self) -> PathBuf {
        self.root.join("prompts")
    }
}

/// Collects stage stats and warnings for one command invocation.
pub struct RunLog {
    command: &'static str,
    started_ts: DateTime<Utc>,
    started_at: String,
    stages: Vec<CrawlStats>,
    warnings: Vec<String>,
}

impl RunLog {
    pub fn start(command: &'static str) -> Self {
        Self {
            command,
            started_ts: Utc::now(),
            started_at: now_utc_string(),
            stages: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record(&mut self, stats: CrawlStats) {
        self.stages.push(stats);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Writes `<command>_run_<timestamp>.json` under the manifest directory.
    pub fn finish(
        self,
        layout: &DataLayout,
        input_path: Option<&Path>,
        output_path: &Path,
        row_count: usize,
    ) -> Result<PathBuf> {
        let stamp = utc_compact_string(self.started_ts);
        let manifest = PipelineRunManifest {
            manifest_version: 1,
            run_id: format!("{}-{stamp}", self.command),
            command: self.command.to_string(),
            status: "completed".to_string(),
            started_at: self.started_at,
            updated_at: now_utc_string(),
            paths: RunPaths {
                data_root: layout.root().display().to_string(),
                input_path: input_path.map(|path| path.display().to_string()),
                output_path: output_path.display().to_string(),
            },
            row_count,
            stages: self.stages,
            warnings: self.warnings,
        };

        let path = layout
            .manifests()
            .join(format!("{}_run_{stamp}.json", self.command));
        write_json_pretty(&path, &manifest)?;
        info!(path = %path.display(), command = self.command, row_count, "run manifest written");
        Ok(path)
    }
}
