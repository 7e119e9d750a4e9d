use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::model::SCALAR_SERIES;
use super::store::HierarchicalStore;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Store inspection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub datasets: Vec<DatasetSummary>,
    /// Values of the per-sample series (`Age`, `Label`, `Temp`) present in the group.
    pub series: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub groups: Vec<GroupSummary>,
}

/// Describe every group of a store: dataset shapes plus the curing age,
/// strength and temperature series.
pub fn summarize(store: &dyn HierarchicalStore) -> Result<StoreSummary> {
    let mut groups = Vec::new();
    for group in store.group_names()? {
        let mut datasets = Vec::new();
        let mut series = BTreeMap::new();
        for name in store.dataset_names(&group)? {
            let array = store.read(&group, &name)?;
            if array.ndim() == 1 && SCALAR_SERIES.contains(&name.as_str()) {
                series.insert(name.clone(), array.iter().copied().collect());
            }
            datasets.push(DatasetSummary {
                name,
                shape: array.shape().to_vec(),
            });
        }
        groups.push(GroupSummary {
            name: group,
            datasets,
            series,
        });
    }
    Ok(StoreSummary { groups })
}

impl fmt::Display for StoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(f, "{}", group.name)?;
            for ds in &group.datasets {
                writeln!(f, "  {:<16} {:?}", ds.name, ds.shape)?;
            }
            for (name, values) in &group.series {
                let shown: Vec<String> = values.iter().map(|v| format!("{v:.2}")).collect();
                writeln!(f, "  {name}: [{}]", shown.join(", "))?;
            }
        }
        Ok(())
    }
}
