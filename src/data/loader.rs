use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};

use super::model::{GroupArray, GroupOutcome, LoadReport, LABEL};
use super::store::{open_store, HierarchicalStore};
use crate::error::{EmiError, Result};

// ---------------------------------------------------------------------------
// Read strategies
// ---------------------------------------------------------------------------

/// Which datasets to pull out of each group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadMode {
    /// Only groups carrying every listed dataset (plus `Label`) contribute,
    /// and only those datasets are read.
    Selective(Vec<String>),
    /// Every dataset of every group is read, whatever the group exposes.
    Full,
}

impl ReadMode {
    pub fn selective<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReadMode::Selective(names.into_iter().map(Into::into).collect())
    }

    /// Names a group must contain to be read at all, each listed once in
    /// first-seen order. `Label` goes last unless it was already named.
    pub fn required(&self) -> Vec<String> {
        match self {
            ReadMode::Selective(names) => {
                let mut required: Vec<String> = Vec::with_capacity(names.len() + 1);
                for name in names.iter().map(String::as_str).chain([LABEL]) {
                    if !required.iter().any(|n| n == name) {
                        required.push(name.to_string());
                    }
                }
                required
            }
            ReadMode::Full => Vec::new(),
        }
    }
}

/// Per-group arrays, not yet concatenated.
#[derive(Debug, Clone, Default)]
pub struct RawLoad {
    /// dataset name → one entry per group that had it, in group order.
    pub arrays: BTreeMap<String, Vec<GroupArray>>,
    /// One 1-D label array per contributing group, in group order.
    pub labels: Vec<GroupArray>,
    pub report: LoadReport,
    /// Names the selective read asked for (empty for a full read).
    pub required: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Open the store at `path`, read it and release it before returning.
pub fn load(path: &Path, mode: &ReadMode) -> Result<RawLoad> {
    let store = open_store(path)?;
    let raw = read_store(store.as_ref(), mode)?;
    log::info!(
        "Read {} of {} groups from {}",
        raw.report.matched(),
        raw.report.inspected(),
        path.display()
    );
    Ok(raw)
}

/// Walk every group of `store` in its own enumeration order.
pub fn read_store(store: &dyn HierarchicalStore, mode: &ReadMode) -> Result<RawLoad> {
    let mut raw = RawLoad {
        required: mode.required(),
        ..RawLoad::default()
    };

    for group in store.group_names()? {
        match mode {
            ReadMode::Selective(_) => read_selective(store, &group, &mut raw)?,
            ReadMode::Full => read_full(store, &group, &mut raw)?,
        }
    }

    if raw.report.matched() == 0 {
        log::warn!(
            "No group out of {} matched; required datasets: {:?}",
            raw.report.inspected(),
            raw.required
        );
    }
    Ok(raw)
}

fn read_selective(store: &dyn HierarchicalStore, group: &str, raw: &mut RawLoad) -> Result<()> {
    let mut missing = Vec::new();
    for name in &raw.required {
        if !store.contains(group, name)? {
            missing.push(name.clone());
        }
    }

    if !missing.is_empty() {
        log::debug!("Skipping group '{group}': missing {missing:?}");
        raw.report.record(group, GroupOutcome::SkippedMissingKeys(missing));
        return Ok(());
    }

    for name in raw.required.clone() {
        let array = store.read(group, &name)?;
        push_dataset(raw, group, &name, array)?;
    }
    log::debug!("Included group '{group}'");
    raw.report.record(group, GroupOutcome::Included);
    Ok(())
}

fn read_full(store: &dyn HierarchicalStore, group: &str, raw: &mut RawLoad) -> Result<()> {
    let names = store.dataset_names(group)?;
    for name in &names {
        let array = store.read(group, name)?;
        push_dataset(raw, group, name, array)?;
    }
    if !names.iter().any(|n| n == LABEL) {
        log::debug!("Group '{group}' has no '{LABEL}'; it contributes no labels");
    }
    raw.report.record(group, GroupOutcome::Included);
    Ok(())
}

fn push_dataset(raw: &mut RawLoad, group: &str, name: &str, array: ArrayD<f64>) -> Result<()> {
    if name == LABEL {
        raw.labels.push(GroupArray {
            group: group.to_string(),
            array: label_vector(group, array)?,
        });
    } else {
        if array.ndim() == 0 {
            return Err(EmiError::format(format!(
                "{group}/{name} is a scalar; expected one row per sample"
            )));
        }
        raw.arrays.entry(name.to_string()).or_default().push(GroupArray {
            group: group.to_string(),
            array,
        });
    }
    Ok(())
}

/// Labels are one scalar per sample: accept `(n,)` or `(n, 1)`.
fn label_vector(group: &str, array: ArrayD<f64>) -> Result<ArrayD<f64>> {
    let shape = array.shape().to_vec();
    match shape.as_slice() {
        [_] => Ok(array),
        &[n, 1] => ArrayD::from_shape_vec(IxDyn(&[n]), array.iter().copied().collect())
            .map_err(|e| EmiError::format(format!("{group}/{LABEL}: {e}"))),
        _ => Err(EmiError::format(format!(
            "{group}/{LABEL} has shape {shape:?}; expected one value per sample"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CON_SENSOR_I, CON_SENSOR_R, CON_SENSOR_RB};
    use crate::data::store::MemoryStore;
    use ndarray::{arr1, arr2, Array2};

    fn channel(rows: usize, base: f64) -> ArrayD<f64> {
        Array2::from_shape_fn((rows, 3), |(i, j)| base + (i * 3 + j) as f64).into_dyn()
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with("A", CON_SENSOR_I, channel(2, 0.0))
            .with("A", CON_SENSOR_R, channel(2, 100.0))
            .with("A", LABEL, arr1(&[1.0, 2.0]).into_dyn())
            .with("B", CON_SENSOR_R, channel(1, 200.0))
            .with("B", LABEL, arr1(&[3.0]).into_dyn())
            .with("C", CON_SENSOR_I, channel(3, 300.0))
            .with("C", CON_SENSOR_R, channel(3, 400.0))
            .with("C", CON_SENSOR_RB, channel(3, 500.0))
            .with("C", LABEL, arr2(&[[4.0], [5.0], [6.0]]).into_dyn())
    }

    #[test]
    fn selective_read_skips_groups_missing_keys() {
        let raw = read_store(&store(), &ReadMode::selective([CON_SENSOR_I, CON_SENSOR_R])).unwrap();

        assert_eq!(raw.required, vec![CON_SENSOR_I, CON_SENSOR_R, LABEL]);
        assert_eq!(raw.report.matched(), 2);
        assert_eq!(
            raw.report.outcomes[1],
            (
                "B".to_string(),
                GroupOutcome::SkippedMissingKeys(vec![CON_SENSOR_I.to_string()])
            )
        );

        let groups: Vec<_> = raw.arrays[CON_SENSOR_I].iter().map(|g| g.group.as_str()).collect();
        assert_eq!(groups, vec!["A", "C"]);
        // Only the requested names are read, even when the group has more.
        assert!(!raw.arrays.contains_key(CON_SENSOR_RB));
        assert_eq!(raw.labels.len(), 2);
    }

    #[test]
    fn repeated_names_are_read_once() {
        let mode = ReadMode::selective([CON_SENSOR_I, CON_SENSOR_I, LABEL, LABEL]);
        assert_eq!(mode.required(), vec![CON_SENSOR_I, LABEL]);

        let raw = read_store(&store(), &mode).unwrap();
        let groups: Vec<_> = raw.arrays[CON_SENSOR_I].iter().map(|g| g.group.as_str()).collect();
        assert_eq!(groups, vec!["A", "C"]);
        let label_groups: Vec<_> = raw.labels.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(label_groups, vec!["A", "C"]);
    }

    #[test]
    fn label_keeps_its_position_when_named() {
        let mode = ReadMode::selective([LABEL, CON_SENSOR_R]);
        assert_eq!(mode.required(), vec![LABEL, CON_SENSOR_R]);
    }

    #[test]
    fn column_labels_are_flattened() {
        let raw = read_store(&store(), &ReadMode::selective([CON_SENSOR_R])).unwrap();
        let c = raw.labels.iter().find(|g| g.group == "C").unwrap();
        assert_eq!(c.array, arr1(&[4.0, 5.0, 6.0]).into_dyn());
    }

    #[test]
    fn full_read_collects_every_dataset() {
        let raw = read_store(&store(), &ReadMode::Full).unwrap();

        assert_eq!(raw.report.matched(), 3);
        assert_eq!(raw.arrays[CON_SENSOR_R].len(), 3);
        assert_eq!(raw.arrays[CON_SENSOR_I].len(), 2);
        assert_eq!(raw.arrays[CON_SENSOR_RB].len(), 1);
        assert!(!raw.arrays.contains_key(LABEL));
        let label_groups: Vec<_> = raw.labels.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(label_groups, vec!["A", "B", "C"]);
    }

    #[test]
    fn zero_matching_groups_is_not_an_error_at_read_time() {
        let raw = read_store(&store(), &ReadMode::selective(["con_sensor_XX"])).unwrap();
        assert_eq!(raw.report.matched(), 0);
        assert_eq!(raw.report.inspected(), 3);
        assert!(raw.arrays.is_empty());
        assert!(raw.labels.is_empty());
    }

    #[test]
    fn matrix_label_is_format_error() {
        let store = MemoryStore::new()
            .with("A", CON_SENSOR_R, channel(2, 0.0))
            .with("A", LABEL, channel(2, 0.0));
        let err = read_store(&store, &ReadMode::Full).unwrap_err();
        assert!(matches!(err, EmiError::Format(ref m) if m.contains("A/Label")));
    }

    #[test]
    fn scalar_dataset_is_format_error() {
        let store = MemoryStore::new().with("A", "Age", ArrayD::from_elem(IxDyn(&[]), 7.0));
        assert!(matches!(
            read_store(&store, &ReadMode::Full),
            Err(EmiError::Format(_))
        ));
    }

    #[test]
    fn load_missing_path_is_file_access_error() {
        let err = load(Path::new("/no/such/store.json"), &ReadMode::Full).unwrap_err();
        assert!(matches!(err, EmiError::FileAccess { .. }));
    }
}
