use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, Float32Array, Float64Array, Float64Builder, Int32Array, Int64Array, Int64Builder,
    LargeListArray, LargeStringArray, ListArray, ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::MemoryStore;
use crate::error::{EmiError, Result};

const GROUP_COL: &str = "group";
const DATASET_COL: &str = "dataset";
const SHAPE_COL: &str = "shape";
const VALUES_COL: &str = "values";

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a store flattened into a Parquet table, one row per (group, dataset).
///
/// Expected schema:
/// - `group`: Utf8 – group name
/// - `dataset`: Utf8 – dataset name within the group
/// - `shape`: List<Int64> (or List<Int32>) – array dimensions
/// - `values`: List<Float64> (or List<Float32>) – row-major array values
///
/// Groups are enumerated in order of first appearance; datasets keep their
/// row order within a group. A (group, dataset) pair may occur only once.
pub fn load_parquet_store(path: &Path) -> Result<MemoryStore> {
    let file = std::fs::File::open(path).map_err(|e| EmiError::FileAccess {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EmiError::format(format!("reading parquet metadata: {e}")))?;
    let reader = builder
        .build()
        .map_err(|e| EmiError::format(format!("building parquet reader: {e}")))?;

    let mut store = MemoryStore::new();

    for batch_result in reader {
        let batch =
            batch_result.map_err(|e| EmiError::format(format!("reading parquet batch: {e}")))?;
        let schema = batch.schema();

        let column = |name: &str| {
            schema
                .index_of(name)
                .map(|i| batch.column(i))
                .map_err(|_| EmiError::format(format!("parquet store missing '{name}' column")))
        };
        let group_col = column(GROUP_COL)?;
        let dataset_col = column(DATASET_COL)?;
        let shape_col = column(SHAPE_COL)?;
        let values_col = column(VALUES_COL)?;

        for row in 0..batch.num_rows() {
            let group = extract_string(group_col, row)
                .map_err(|e| EmiError::format(format!("row {row}, '{GROUP_COL}': {e}")))?;
            let dataset = extract_string(dataset_col, row)
                .map_err(|e| EmiError::format(format!("row {row}, '{DATASET_COL}': {e}")))?;
            if store.has_dataset(&group, &dataset) {
                return Err(EmiError::format(format!(
                    "{group}/{dataset} appears in more than one row"
                )));
            }

            let shape = extract_shape(shape_col, row)
                .map_err(|e| EmiError::format(format!("{group}/{dataset}: {e}")))?;
            let values = extract_f64_list(values_col, row)
                .map_err(|e| EmiError::format(format!("{group}/{dataset}: {e}")))?;

            let expected: usize = shape.iter().product();
            if values.len() != expected {
                return Err(EmiError::format(format!(
                    "{group}/{dataset}: shape {shape:?} needs {expected} values, found {}",
                    values.len()
                )));
            }
            let array = ArrayD::from_shape_vec(IxDyn(&shape), values)
                .map_err(|e| EmiError::format(format!("{group}/{dataset}: {e}")))?;
            store.insert(&group, &dataset, array);
        }
    }

    Ok(store)
}

// -- Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> std::result::Result<String, String> {
    if col.is_null(row) {
        return Err("null value".to_string());
    }
    if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
        Ok(s.value(row).to_string())
    } else if let Some(s) = col.as_any().downcast_ref::<LargeStringArray>() {
        Ok(s.value(row).to_string())
    } else {
        Err(format!("expected Utf8 column, got {:?}", col.data_type()))
    }
}

/// The list element at `row`, for List and LargeList columns alike.
fn list_value(col: &Arc<dyn Array>, row: usize) -> std::result::Result<Arc<dyn Array>, String> {
    if col.is_null(row) {
        return Err("null value in list column".to_string());
    }
    match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .map(|l| l.value(row))
            .ok_or_else(|| "expected ListArray".to_string()),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .map(|l| l.value(row))
            .ok_or_else(|| "expected LargeListArray".to_string()),
        other => Err(format!("expected List or LargeList column, got {other:?}")),
    }
}

fn extract_shape(col: &Arc<dyn Array>, row: usize) -> std::result::Result<Vec<usize>, String> {
    let dims = list_value(col, row)?;
    let to_dim = |d: Option<i64>| -> std::result::Result<usize, String> {
        let d = d.ok_or("null dimension")?;
        usize::try_from(d).map_err(|_| format!("negative dimension {d}"))
    };

    if let Some(arr) = dims.as_any().downcast_ref::<Int64Array>() {
        arr.iter().map(to_dim).collect()
    } else if let Some(arr) = dims.as_any().downcast_ref::<Int32Array>() {
        arr.iter().map(|d| to_dim(d.map(i64::from))).collect()
    } else {
        Err(format!("shape inner type is {:?}, expected Int64 or Int32", dims.data_type()))
    }
}

fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> std::result::Result<Vec<f64>, String> {
    let values = list_value(col, row)?;

    // Missing elements read as NaN, like pandas does.
    if let Some(f64_arr) = values.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        Err(format!(
            "values inner type is {:?}, expected Float64 or Float32",
            values.data_type()
        ))
    }
}

// ---------------------------------------------------------------------------
// Parquet writer (fixtures and sample generation)
// ---------------------------------------------------------------------------

/// Write `store` in the layout [`load_parquet_store`] reads back.
pub fn write_parquet_store(store: &MemoryStore, path: &Path) -> Result<()> {
    let mut groups = Vec::new();
    let mut datasets = Vec::new();
    let mut shape_builder = ListBuilder::new(Int64Builder::new());
    let mut values_builder = ListBuilder::new(Float64Builder::new());

    for (group, entries) in store.iter() {
        for (name, array) in entries {
            groups.push(group);
            datasets.push(name.as_str());

            for &d in array.shape() {
                shape_builder.values().append_value(d as i64);
            }
            shape_builder.append(true);

            let values = values_builder.values();
            for &v in array.iter() {
                values.append_value(v);
            }
            values_builder.append(true);
        }
    }

    let list_of = |dt: DataType| DataType::List(Arc::new(Field::new("item", dt, true)));
    let schema = Arc::new(Schema::new(vec![
        Field::new(GROUP_COL, DataType::Utf8, false),
        Field::new(DATASET_COL, DataType::Utf8, false),
        Field::new(SHAPE_COL, list_of(DataType::Int64), false),
        Field::new(VALUES_COL, list_of(DataType::Float64), false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(groups)),
            Arc::new(StringArray::from(datasets)),
            Arc::new(shape_builder.finish()),
            Arc::new(values_builder.finish()),
        ],
    )
    .map_err(|e| EmiError::format(format!("building record batch: {e}")))?;

    let file = std::fs::File::create(path).map_err(|e| EmiError::FileAccess {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    let mut writer = ArrowWriter::try_new(file, schema, None)
        .map_err(|e| EmiError::format(format!("creating parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| EmiError::format(format!("writing parquet batch: {e}")))?;
    writer
        .close()
        .map_err(|e| EmiError::format(format!("closing parquet writer: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::HierarchicalStore;
    use ndarray::{arr1, arr2, Array2};

    #[test]
    fn reads_back_groups_in_file_order() {
        let store = MemoryStore::new()
            .with("specimen-2", "Label", arr1(&[40.0, 50.0]).into_dyn())
            .with("specimen-2", "con_sensor_R", arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn())
            .with("specimen-1", "Label", arr1(&[10.0]).into_dyn());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.parquet");
        write_parquet_store(&store, &path).unwrap();

        let loaded = load_parquet_store(&path).unwrap();
        assert_eq!(loaded.group_names().unwrap(), vec!["specimen-2", "specimen-1"]);
        assert_eq!(loaded, store);
    }

    #[test]
    fn missing_column_is_format_error() {
        let schema = Arc::new(Schema::new(vec![Field::new(GROUP_COL, DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(StringArray::from(vec!["A"]))],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = load_parquet_store(&path).unwrap_err();
        assert!(matches!(err, EmiError::Format(ref m) if m.contains("'dataset'")));
    }

    /// Write raw long-format rows, bypassing the store writer.
    fn write_rows(path: &Path, rows: &[(&str, &str, Vec<i64>, Vec<f64>)]) {
        let mut shape = ListBuilder::new(Int64Builder::new());
        let mut values = ListBuilder::new(Float64Builder::new());
        for (_, _, dims, vals) in rows {
            shape.values().append_slice(dims);
            shape.append(true);
            values.values().append_slice(vals);
            values.append(true);
        }

        let list_of = |dt: DataType| DataType::List(Arc::new(Field::new("item", dt, true)));
        let schema = Arc::new(Schema::new(vec![
            Field::new(GROUP_COL, DataType::Utf8, false),
            Field::new(DATASET_COL, DataType::Utf8, false),
            Field::new(SHAPE_COL, list_of(DataType::Int64), false),
            Field::new(VALUES_COL, list_of(DataType::Float64), false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.0))),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
                Arc::new(shape.finish()),
                Arc::new(values.finish()),
            ],
        )
        .unwrap();

        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn shape_and_value_count_must_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.parquet");
        write_rows(&path, &[("A", "x", vec![2, 2], vec![1.0])]);

        let err = load_parquet_store(&path).unwrap_err();
        assert!(matches!(err, EmiError::Format(ref m) if m.contains("A/x")));
    }

    #[test]
    fn repeated_group_dataset_row_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.parquet");
        write_rows(
            &path,
            &[
                ("A", "Label", vec![2], vec![1.0, 2.0]),
                ("B", "Label", vec![1], vec![5.0]),
                ("A", "Label", vec![2], vec![9.0, 9.0]),
            ],
        );

        let err = load_parquet_store(&path).unwrap_err();
        assert!(matches!(
            err,
            EmiError::Format(ref m) if m.contains("A/Label") && m.contains("more than one row")
        ));
    }

    #[test]
    fn same_dataset_name_in_different_groups_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.parquet");
        write_rows(
            &path,
            &[("A", "Label", vec![1], vec![1.0]), ("B", "Label", vec![1], vec![2.0])],
        );

        let store = load_parquet_store(&path).unwrap();
        assert_eq!(store.read("B", "Label").unwrap(), arr1(&[2.0]).into_dyn());
    }

    #[test]
    fn zero_sized_arrays_survive() {
        let store = MemoryStore::new().with("g", "x", Array2::<f64>::zeros((0, 3)).into_dyn());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");
        write_parquet_store(&store, &path).unwrap();
        assert_eq!(load_parquet_store(&path).unwrap().read("g", "x").unwrap().shape(), &[0, 3]);
    }
}
