use std::collections::BTreeMap;

use ndarray::{concatenate, Array1, Array2, ArrayD, ArrayViewD, Axis, Ix1, Ix2, Slice};

use super::loader::RawLoad;
use super::model::{FeatureLayout, GroupArray, GroupSegment, LABEL};
use crate::error::{EmiError, Result};

// ---------------------------------------------------------------------------
// MergedDataset – one array per dataset name, rows in group order
// ---------------------------------------------------------------------------

/// Arrays concatenated across groups along the sample axis.
///
/// Row `i` of every merged array and of the label vector refers to the same
/// physical sample once [`check_alignment`] has passed. Each merged array
/// remembers which rows came from which group.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDataset {
    arrays: BTreeMap<String, ArrayD<f64>>,
    segments: BTreeMap<String, Vec<GroupSegment>>,
    labels: Array1<f64>,
    label_segments: Vec<GroupSegment>,
}

impl MergedDataset {
    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.arrays.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// Dataset names, excluding `Label`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn rows(&self, name: &str) -> Option<usize> {
        self.arrays.get(name).map(|a| a.len_of(Axis(0)))
    }

    /// The merged label vector, one value per sample.
    pub fn labels(&self) -> Result<&Array1<f64>> {
        if self.labels.is_empty() {
            return Err(EmiError::MissingKey(LABEL.to_string()));
        }
        Ok(&self.labels)
    }

    pub fn segments(&self, name: &str) -> Option<&[GroupSegment]> {
        self.segments.get(name).map(Vec::as_slice)
    }

    pub fn label_segments(&self) -> &[GroupSegment] {
        &self.label_segments
    }

    /// The rows of `name` that came from `group`.
    pub fn group_slice(&self, name: &str, group: &str) -> Option<ArrayViewD<'_, f64>> {
        let seg = self.segments.get(name)?.iter().find(|s| s.group == group)?;
        let array = self.arrays.get(name)?;
        Some(array.slice_axis(Axis(0), Slice::from(seg.offset..seg.offset + seg.rows)))
    }

    /// The labels that came from `group`.
    pub fn group_labels(&self, group: &str) -> Option<Array1<f64>> {
        let seg = self.label_segments.iter().find(|s| s.group == group)?;
        Some(
            self.labels
                .slice_axis(Axis(0), Slice::from(seg.offset..seg.offset + seg.rows))
                .to_owned(),
        )
    }

    /// Number of samples, as given by the label vector.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Concatenate every dataset name's per-group arrays, and the labels, along
/// the sample axis in group-enumeration order.
///
/// A name missing from some groups is merged over the groups that have it;
/// use [`check_alignment`] to catch the resulting row mismatch.
pub fn merge(raw: RawLoad) -> Result<MergedDataset> {
    if raw.arrays.is_empty() && raw.labels.is_empty() {
        return Err(EmiError::EmptyResult {
            inspected: raw.report.inspected(),
            matched: raw.report.matched(),
            required: raw.required,
        });
    }

    let mut arrays = BTreeMap::new();
    let mut segments = BTreeMap::new();
    for (name, parts) in raw.arrays {
        let (merged, segs) = concat_rows(&name, &parts)?;
        log::debug!("Merged '{name}' from {} groups into {:?}", segs.len(), merged.shape());
        arrays.insert(name.clone(), merged);
        segments.insert(name, segs);
    }

    let (labels, label_segments) = if raw.labels.is_empty() {
        (Array1::zeros(0), Vec::new())
    } else {
        let (merged, segs) = concat_rows(LABEL, &raw.labels)?;
        let labels = merged
            .into_dimensionality::<Ix1>()
            .map_err(|e| EmiError::shape(LABEL, e.to_string()))?;
        (labels, segs)
    };

    Ok(MergedDataset {
        arrays,
        segments,
        labels,
        label_segments,
    })
}

fn concat_rows(name: &str, parts: &[GroupArray]) -> Result<(ArrayD<f64>, Vec<GroupSegment>)> {
    let first = parts
        .first()
        .ok_or_else(|| EmiError::shape(name, "nothing to concatenate"))?;
    if first.array.ndim() == 0 {
        return Err(EmiError::shape(name, format!("group '{}' holds a scalar", first.group)));
    }
    let trailing = &first.array.shape()[1..];

    let mut segments = Vec::with_capacity(parts.len());
    let mut offset = 0;
    for part in parts {
        if part.array.ndim() == 0 || &part.array.shape()[1..] != trailing {
            return Err(EmiError::shape(
                name,
                format!(
                    "group '{}' has shape {:?}, group '{}' has {:?}",
                    part.group,
                    part.array.shape(),
                    first.group,
                    first.array.shape()
                ),
            ));
        }
        segments.push(GroupSegment {
            group: part.group.clone(),
            offset,
            rows: part.rows(),
        });
        offset += part.rows();
    }

    let views: Vec<_> = parts.iter().map(|p| p.array.view()).collect();
    let merged = concatenate(Axis(0), &views).map_err(|e| EmiError::shape(name, e.to_string()))?;
    Ok((merged, segments))
}

// ---------------------------------------------------------------------------
// Alignment check
// ---------------------------------------------------------------------------

/// Verify that every merged dataset lines up row-for-row with the labels.
///
/// Walks the groups that contributed labels and checks each dataset
/// contributed the same number of rows from the same group, exactly once.
/// The first divergence is reported with the dataset and group responsible.
pub fn check_alignment(merged: &MergedDataset) -> Result<()> {
    merged.labels()?;

    if let Some(seg) = repeated_group(&merged.label_segments) {
        return Err(EmiError::Alignment {
            dataset: LABEL.to_string(),
            group: seg.group.clone(),
            detail: "group contributed labels more than once".to_string(),
        });
    }

    for (name, segs) in &merged.segments {
        if let Some(seg) = repeated_group(segs) {
            return Err(EmiError::Alignment {
                dataset: name.clone(),
                group: seg.group.clone(),
                detail: "group contributed rows more than once".to_string(),
            });
        }

        for label_seg in &merged.label_segments {
            match segs.iter().find(|s| s.group == label_seg.group) {
                None => {
                    return Err(EmiError::Alignment {
                        dataset: name.clone(),
                        group: label_seg.group.clone(),
                        detail: "dataset is absent from this group".to_string(),
                    })
                }
                Some(seg) if seg.rows != label_seg.rows => {
                    return Err(EmiError::Alignment {
                        dataset: name.clone(),
                        group: label_seg.group.clone(),
                        detail: format!("{} rows against {} labels", seg.rows, label_seg.rows),
                    })
                }
                Some(_) => {}
            }
        }

        if let Some(seg) = segs
            .iter()
            .find(|s| !merged.label_segments.iter().any(|l| l.group == s.group))
        {
            return Err(EmiError::Alignment {
                dataset: name.clone(),
                group: seg.group.clone(),
                detail: format!("group has {} rows but no labels", seg.rows),
            });
        }

        let rows = merged.rows(name).unwrap_or(0);
        if rows != merged.len() {
            let group = segs.last().map_or_else(String::new, |s| s.group.clone());
            return Err(EmiError::Alignment {
                dataset: name.clone(),
                group,
                detail: format!("{rows} merged rows against {} labels", merged.len()),
            });
        }
    }
    Ok(())
}

/// The second segment claiming a group already seen earlier in `segs`.
fn repeated_group(segs: &[GroupSegment]) -> Option<&GroupSegment> {
    segs.iter()
        .enumerate()
        .find(|(i, seg)| segs[..*i].iter().any(|prev| prev.group == seg.group))
        .map(|(_, seg)| seg)
}

// ---------------------------------------------------------------------------
// Feature extraction
// ---------------------------------------------------------------------------

/// Stack the named arrays side by side, in exactly the order given.
///
/// 1-D arrays contribute a single column, 2-D arrays all of theirs.
pub fn extract_features<S: AsRef<str>>(merged: &MergedDataset, names: &[S]) -> Result<Array2<f64>> {
    if names.is_empty() {
        return Err(EmiError::InvalidArgument(
            "at least one dataset name is needed for a feature matrix".to_string(),
        ));
    }

    let mut blocks = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let array = merged
            .get(name)
            .ok_or_else(|| EmiError::MissingKey(name.to_string()))?;
        let block = match array.ndim() {
            1 => array
                .view()
                .into_dimensionality::<Ix1>()
                .map(|a| a.insert_axis(Axis(1)))
                .map_err(|e| EmiError::shape(name, e.to_string()))?,
            2 => array
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|e| EmiError::shape(name, e.to_string()))?,
            n => {
                return Err(EmiError::shape(
                    name,
                    format!("{n}-dimensional arrays cannot be used as features"),
                ))
            }
        };
        blocks.push((name, block));
    }

    let (first_name, first) = &blocks[0];
    for (name, block) in &blocks[1..] {
        if block.nrows() != first.nrows() {
            return Err(EmiError::shape(
                name,
                format!(
                    "{} rows, but '{first_name}' has {}",
                    block.nrows(),
                    first.nrows()
                ),
            ));
        }
    }

    let views: Vec<_> = blocks.iter().map(|(_, b)| b.view()).collect();
    concatenate(Axis(1), &views).map_err(|e| EmiError::shape(first_name, e.to_string()))
}

/// Feature matrix for one of the canonical channel layouts.
pub fn layout_features(merged: &MergedDataset, layout: FeatureLayout) -> Result<Array2<f64>> {
    extract_features(merged, &layout.channels())
}
