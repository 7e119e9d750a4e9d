/// Data layer: store access, per-group reading, merging and features.
///
/// Architecture:
/// ```text
///  .h5 / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  store    │  open read-only → HierarchicalStore (group → dataset → array)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  selective / full read → per-group arrays + LoadReport
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  merge    │  concatenate by name, check row alignment → MergedDataset
///   └──────────┘
///        │
///        ▼
///   feature matrix + label vector
/// ```
use std::path::Path;

pub mod loader;
pub mod merge;
pub mod model;
pub mod store;
pub mod summary;

use crate::error::Result;
use loader::ReadMode;
use merge::MergedDataset;
use model::LoadReport;

/// Result of a complete load: merged arrays plus what happened to each group.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub merged: MergedDataset,
    pub report: LoadReport,
}

/// Read, merge and verify a store in one call.
///
/// The store is closed before this returns. Every merged dataset is checked
/// to line up row-for-row with the label vector.
pub fn load_dataset(path: &Path, mode: &ReadMode) -> Result<LoadedDataset> {
    let raw = loader::load(path, mode)?;
    let report = raw.report.clone();
    for (group, missing) in report.skipped() {
        log::info!("Group '{group}' skipped, missing {missing:?}");
    }

    let merged = merge::merge(raw)?;
    merge::check_alignment(&merged)?;
    log::info!(
        "Merged {} samples across {} datasets",
        merged.len(),
        merged.names().count()
    );
    Ok(LoadedDataset { merged, report })
}
