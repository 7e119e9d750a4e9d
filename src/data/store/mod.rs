use std::path::Path;

use ndarray::ArrayD;

use crate::error::{EmiError, Result};

#[cfg(feature = "hdf5")]
pub mod hdf5_store;
pub mod json_store;
pub mod parquet_store;

pub use self::json_store::write_json_store;
pub use self::parquet_store::write_parquet_store;

// ---------------------------------------------------------------------------
// HierarchicalStore – groups of named numeric arrays
// ---------------------------------------------------------------------------

/// A read-only container of top-level groups, each mapping dataset names to
/// numeric arrays. The set of datasets per group is only known at run time.
///
/// Implementations report names in the store's own enumeration order and
/// callers must not re-sort them: row alignment between channels and labels
/// depends on every read seeing the same order.
pub trait HierarchicalStore {
    fn group_names(&self) -> Result<Vec<String>>;

    fn dataset_names(&self, group: &str) -> Result<Vec<String>>;

    /// Owned copy of a dataset, never a view into the store's buffers.
    fn read(&self, group: &str, dataset: &str) -> Result<ArrayD<f64>>;

    fn contains(&self, group: &str, dataset: &str) -> Result<bool> {
        Ok(self.dataset_names(group)?.iter().any(|d| d == dataset))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store that keeps groups and datasets in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    groups: Vec<(String, Vec<(String, ArrayD<f64>)>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) `dataset` in `group`, creating the group on first use.
    pub fn insert(&mut self, group: &str, dataset: &str, array: ArrayD<f64>) {
        let idx = match self.groups.iter().position(|(g, _)| g == group) {
            Some(idx) => idx,
            None => {
                self.groups.push((group.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        let datasets = &mut self.groups[idx].1;
        match datasets.iter_mut().find(|(d, _)| d == dataset) {
            Some((_, slot)) => *slot = array,
            None => datasets.push((dataset.to_string(), array)),
        }
    }

    /// Builder-style [`MemoryStore::insert`].
    pub fn with(mut self, group: &str, dataset: &str, array: ArrayD<f64>) -> Self {
        self.insert(group, dataset, array);
        self
    }

    /// Register an empty group.
    pub fn add_group(&mut self, group: &str) {
        if !self.groups.iter().any(|(g, _)| g == group) {
            self.groups.push((group.to_string(), Vec::new()));
        }
    }

    pub fn has_dataset(&self, group: &str, dataset: &str) -> bool {
        self.group(group)
            .is_ok_and(|datasets| datasets.iter().any(|(d, _)| d == dataset))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate `(group, [(dataset, array)])` in store order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[(String, ArrayD<f64>)])> {
        self.groups.iter().map(|(g, ds)| (g.as_str(), ds.as_slice()))
    }

    fn group(&self, group: &str) -> Result<&[(String, ArrayD<f64>)]> {
        self.groups
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, ds)| ds.as_slice())
            .ok_or_else(|| EmiError::format(format!("no group named '{group}'")))
    }
}

impl HierarchicalStore for MemoryStore {
    fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.groups.iter().map(|(g, _)| g.clone()).collect())
    }

    fn dataset_names(&self, group: &str) -> Result<Vec<String>> {
        Ok(self.group(group)?.iter().map(|(d, _)| d.clone()).collect())
    }

    fn read(&self, group: &str, dataset: &str) -> Result<ArrayD<f64>> {
        self.group(group)?
            .iter()
            .find(|(d, _)| d == dataset)
            .map(|(_, a)| a.clone())
            .ok_or_else(|| EmiError::format(format!("group '{group}' has no dataset '{dataset}'")))
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Open a store read-only.  Dispatch by extension.
///
/// Supported formats:
/// * `.h5` / `.hdf5` / `.he5` – HDF5 file (needs the `hdf5` feature)
/// * `.json`   – `{ "group": { "dataset": [[...], ...], ... }, ... }`
/// * `.parquet` – long table, one row per (group, dataset)
///
/// The returned handle is the only open resource; dropping it releases the file.
pub fn open_store(path: &Path) -> Result<Box<dyn HierarchicalStore>> {
    std::fs::File::open(path).map_err(|e| EmiError::FileAccess {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "h5" | "hdf5" | "he5" => open_hdf5(path),
        "json" => Ok(Box::new(json_store::load_json_store(path)?)),
        "parquet" | "pq" => Ok(Box::new(parquet_store::load_parquet_store(path)?)),
        other => Err(EmiError::UnsupportedFormat(format!(".{other}"))),
    }
}

#[cfg(feature = "hdf5")]
fn open_hdf5(path: &Path) -> Result<Box<dyn HierarchicalStore>> {
    Ok(Box::new(hdf5_store::Hdf5Store::open(path)?))
}

#[cfg(not(feature = "hdf5"))]
fn open_hdf5(path: &Path) -> Result<Box<dyn HierarchicalStore>> {
    Err(EmiError::UnsupportedFormat(format!(
        "{}: built without the `hdf5` feature",
        path.display()
    )))
}
