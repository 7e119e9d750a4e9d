use std::path::Path;

use hdf5::{File, Group};
use ndarray::{ArrayD, IxDyn};

use super::HierarchicalStore;
use crate::error::{EmiError, Result};

// ---------------------------------------------------------------------------
// HDF5 store
// ---------------------------------------------------------------------------

/// Read-only HDF5 file: top-level groups hold one dataset per channel/series.
///
/// The file handle lives exactly as long as this value. Every read copies
/// the dataset into an owned array, so nothing handed out refers back to
/// the file once it is closed.
pub struct Hdf5Store {
    file: File,
}

impl Hdf5Store {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| EmiError::FileAccess {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        log::debug!("Opened HDF5 store {}", path.display());
        Ok(Self { file })
    }

    fn group(&self, name: &str) -> Result<Group> {
        self.file
            .group(name)
            .map_err(|e| EmiError::format(format!("entry '{name}' is not a group: {e}")))
    }
}

impl HierarchicalStore for Hdf5Store {
    fn group_names(&self) -> Result<Vec<String>> {
        let names = self
            .file
            .member_names()
            .map_err(|e| EmiError::format(format!("listing groups: {e}")))?;
        // Probe each entry so a stray top-level dataset is reported up front.
        for name in &names {
            self.group(name)?;
        }
        Ok(names)
    }

    fn dataset_names(&self, group: &str) -> Result<Vec<String>> {
        self.group(group)?
            .member_names()
            .map_err(|e| EmiError::format(format!("listing datasets of '{group}': {e}")))
    }

    fn read(&self, group: &str, dataset: &str) -> Result<ArrayD<f64>> {
        let ds = self
            .group(group)?
            .dataset(dataset)
            .map_err(|e| EmiError::format(format!("{group}/{dataset} is not a dataset: {e}")))?;
        let shape = ds.shape();
        let values: Vec<f64> = ds
            .read_raw::<f64>()
            .map_err(|e| EmiError::format(format!("reading {group}/{dataset}: {e}")))?;
        log::trace!("Read {group}/{dataset} with shape {shape:?}");
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| EmiError::format(format!("{group}/{dataset}: {e}")))
    }

    fn contains(&self, group: &str, dataset: &str) -> Result<bool> {
        Ok(self.group(group)?.link_exists(dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::load_dataset;
    use crate::data::loader::ReadMode;
    use crate::data::merge::extract_features;
    use crate::data::model::{CON_SENSOR_I, CON_SENSOR_R, LABEL};
    use ndarray::arr1;

    fn write(group: &Group, name: &str, shape: &[usize], values: &[f64]) {
        let ds = group
            .new_dataset::<f64>()
            .shape(shape.to_vec())
            .create(name)
            .unwrap();
        ds.write_raw(values).unwrap();
    }

    fn channel(group: &Group, name: &str, rows: usize, base: f64) {
        let values: Vec<f64> = (0..rows * 5).map(|k| base + k as f64).collect();
        write(group, name, &[rows, 5], &values);
    }

    /// Group A: 3 samples, group B: 2 samples. B is created first.
    fn two_group_file(path: &Path) {
        let file = File::create(path).unwrap();
        let b = file.create_group("B").unwrap();
        channel(&b, CON_SENSOR_I, 2, 300.0);
        channel(&b, CON_SENSOR_R, 2, 400.0);
        write(&b, LABEL, &[2, 1], &[40.0, 50.0]);

        let a = file.create_group("A").unwrap();
        channel(&a, CON_SENSOR_I, 3, 100.0);
        channel(&a, CON_SENSOR_R, 3, 200.0);
        write(&a, LABEL, &[3], &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn groups_come_back_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.h5");
        two_group_file(&path);

        let store = Hdf5Store::open(&path).unwrap();
        assert_eq!(store.group_names().unwrap(), vec!["A", "B"]);
        assert_eq!(
            store.dataset_names("A").unwrap(),
            vec![LABEL, CON_SENSOR_I, CON_SENSOR_R]
        );
        assert!(store.contains("A", CON_SENSOR_I).unwrap());
        assert!(!store.contains("A", "con_sensor_RB").unwrap());
    }

    #[test]
    fn reads_are_owned_copies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.h5");
        two_group_file(&path);

        let mut first = {
            let store = Hdf5Store::open(&path).unwrap();
            store.read("A", CON_SENSOR_I).unwrap()
        };
        assert_eq!(first.shape(), &[3, 5]);
        assert_eq!(first[[2, 4]], 114.0);

        first[[0, 0]] = -1.0;
        let store = Hdf5Store::open(&path).unwrap();
        assert_eq!(store.read("A", CON_SENSOR_I).unwrap()[[0, 0]], 100.0);
    }

    #[test]
    fn two_groups_load_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.h5");
        two_group_file(&path);

        let loaded = load_dataset(&path, &ReadMode::selective([CON_SENSOR_I, CON_SENSOR_R])).unwrap();
        let x = extract_features(&loaded.merged, &[CON_SENSOR_I, CON_SENSOR_R]).unwrap();
        assert_eq!(x.dim(), (5, 10));
        assert_eq!(x[[3, 0]], 300.0);
        assert_eq!(x[[0, 5]], 200.0);
        // B's (2, 1) label column is flattened onto A's vector.
        assert_eq!(
            loaded.merged.labels().unwrap(),
            &arr1(&[10.0, 20.0, 30.0, 40.0, 50.0])
        );
    }

    #[test]
    fn top_level_dataset_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.h5");
        {
            let file = File::create(&path).unwrap();
            write(&file, LABEL, &[3], &[1.0, 2.0, 3.0]);
        }

        let store = Hdf5Store::open(&path).unwrap();
        let err = store.group_names().unwrap_err();
        assert!(matches!(err, EmiError::Format(ref m) if m.contains("'Label'")));
        assert!(matches!(
            load_dataset(&path, &ReadMode::Full),
            Err(EmiError::Format(_))
        ));
    }
}
