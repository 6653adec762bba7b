use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::DataLayout;
use crate::model::{ArtistRecord, CertificationEntry, ChartEntry, SongRecord};
use crate::pipeline::resume::{ArtistStage, SongStage, StageMarkers, pending};
use crate::store::{SnapshotRow, load_existing};

pub fn run(args: StatusArgs) -> Result<()> {
    let layout = DataLayout::new(&args.data.data_root);
    info!(data_root = %layout.root().display(), "status requested");

    report_rows::<ChartEntry>("charts", &layout.charts())?;
    report_rows::<CertificationEntry>("certifications", &layout.certifications())?;

    if let Some(songs) = report_rows::<SongRecord>("songs", &layout.songs())? {
        for stage in [SongStage::Search, SongStage::Lyrics, SongStage::Summary] {
            report_pending(&songs, stage, stage.as_str());
        }
    }

    if let Some(artists) = report_rows::<ArtistRecord>("artists", &layout.artists())? {
        for stage in [ArtistStage::RegistryLookup, ArtistStage::DetailScrape] {
            report_pending(&artists, stage, stage.as_str());
        }
    }

    Ok(())
}

fn report_rows<R: SnapshotRow>(dataset: &str, path: &Path) -> Result<Option<Vec<R>>> {
    let rows = load_existing::<R>(path)?;
    match &rows {
        Some(rows) => info!(dataset, path = %path.display(), rows = rows.len(), "snapshot status"),
        None => warn!(dataset, path = %path.display(), "snapshot missing"),
    }
    Ok(rows)
}

fn report_pending<R: StageMarkers>(rows: &[R], stage: R::Stage, label: &str) -> usize {
    let count = pending(rows, stage).len();
    info!(stage = label, pending = count, done = rows.len() - count, "stage status");
    count
}
