use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue};

use super::MemoryStore;
use crate::error::{EmiError, Result};

// ---------------------------------------------------------------------------
// JSON store
// ---------------------------------------------------------------------------

/// Expected JSON layout (one object per group, one key per dataset):
///
/// ```json
/// {
///   "350 Slag-1": {
///     "Label": [21.4, 28.9],
///     "con_sensor_R": [[0.12, 0.14, ...], [0.11, 0.13, ...]]
///   },
///   ...
/// }
/// ```
///
/// Groups and datasets come back in key order, matching HDF5's native
/// name-ordered iteration. A key repeated within one object is a format
/// error rather than a silent overwrite.
pub fn load_json_store(path: &Path) -> Result<MemoryStore> {
    let text = std::fs::read_to_string(path).map_err(|e| EmiError::FileAccess {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    parse_json_store(&text)
}

pub fn parse_json_store(text: &str) -> Result<MemoryStore> {
    let UniqueEntries(mut groups): UniqueEntries<UniqueEntries<JsonValue>> =
        serde_json::from_str(text).map_err(|e| EmiError::format(format!("parsing JSON: {e}")))?;
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    let mut store = MemoryStore::new();
    for (group, UniqueEntries(mut datasets)) in groups {
        datasets.sort_by(|a, b| a.0.cmp(&b.0));
        store.add_group(&group);
        for (name, value) in datasets {
            let array = json_to_array(&value)
                .map_err(|e| EmiError::format(format!("{group}/{name}: {e}")))?;
            store.insert(&group, &name, array);
        }
    }
    Ok(store)
}

/// Object entries in document order; a repeated key fails deserialization.
struct UniqueEntries<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for UniqueEntries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = UniqueEntries<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of groups, each an object of datasets")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, V)> = Vec::new();
                while let Some(key) = map.next_key::<String>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        let msg = format!("duplicate entry '{key}'");
                        return Err(<A::Error as de::Error>::custom(msg));
                    }
                    let value = map
                        .next_value::<V>()
                        .map_err(|e| <A::Error as de::Error>::custom(format!("entry '{key}': {e}")))?;
                    entries.push((key, value));
                }
                Ok(UniqueEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Convert a nested numeric JSON array to an n-dimensional array.
/// A bare number becomes a 0-d array.
fn json_to_array(value: &JsonValue) -> std::result::Result<ArrayD<f64>, String> {
    let shape = infer_shape(value);
    let mut values = Vec::with_capacity(shape.iter().product());
    flatten(value, &shape, 0, &mut values)?;
    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| e.to_string())
}

/// Shape implied by following the first element at every nesting level.
fn infer_shape(value: &JsonValue) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut cur = value;
    while let JsonValue::Array(items) = cur {
        shape.push(items.len());
        match items.first() {
            Some(first) => cur = first,
            None => break,
        }
    }
    shape
}

fn flatten(
    value: &JsonValue,
    shape: &[usize],
    depth: usize,
    out: &mut Vec<f64>,
) -> std::result::Result<(), String> {
    if depth == shape.len() {
        return value
            .as_f64()
            .map(|v| out.push(v))
            .ok_or_else(|| format!("expected a number, found {value}"));
    }
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected an array at depth {depth}"))?;
    if items.len() != shape[depth] {
        return Err(format!(
            "ragged array: {} elements at depth {depth}, expected {}",
            items.len(),
            shape[depth]
        ));
    }
    for item in items {
        flatten(item, shape, depth + 1, out)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON writer (fixtures and sample generation)
// ---------------------------------------------------------------------------

/// Write `store` in the layout [`load_json_store`] reads back.
pub fn write_json_store(store: &MemoryStore, path: &Path) -> Result<()> {
    let mut root = Map::new();
    for (group, datasets) in store.iter() {
        let entries: Map<String, JsonValue> = datasets
            .iter()
            .map(|(name, array)| (name.clone(), array_to_json(array.view())))
            .collect();
        root.insert(group.to_string(), JsonValue::Object(entries));
    }

    let text = serde_json::to_string(&JsonValue::Object(root))
        .map_err(|e| EmiError::format(format!("serialising JSON store: {e}")))?;
    std::fs::write(path, text).map_err(|e| EmiError::FileAccess {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

fn array_to_json(view: ArrayViewD<'_, f64>) -> JsonValue {
    if view.ndim() == 0 {
        return view.iter().next().copied().map_or(JsonValue::Null, JsonValue::from);
    }
    JsonValue::Array(view.axis_iter(Axis(0)).map(array_to_json).collect())
}
