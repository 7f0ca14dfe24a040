//! Durable columnar representation of a cleaned table.
//!
//! Every column is an OPTIONAL leaf (missing cells are nulls):
//!
//! | storage | parquet physical | converted |
//! |---|---|---|
//! | int64 | INT64 | none |
//! | float64 | DOUBLE | none |
//! | bool | BOOLEAN | none |
//! | datetime | INT64 | TIMESTAMP_MICROS |
//! | utf8 | BYTE_ARRAY | UTF8 |
//!
//! The schema is built with the type builders rather than parsed from a message string, so column
//! names may contain spaces and punctuation. Reading maps the leaf types back to storage types and
//! zips the record fields positionally.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field as RecordField;
use parquet::schema::types::{ColumnDescriptor, Type, TypePtr};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Field, Schema, StorageType, Table, Value};

/// Write `table` to `path` as a single row group.
pub fn write_table(path: &Path, table: &Table) -> IngestionResult<()> {
    let schema = Arc::new(parquet_schema(&table.schema)?);
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    let mut rg = writer.next_row_group()?;
    let mut idx = 0usize;
    while let Some(mut col) = rg.next_column()? {
        let field = table
            .schema
            .fields
            .get(idx)
            .ok_or_else(|| {
                IngestionError::malformed("parquet writer produced more columns than the schema")
            })?;
        let cells: Vec<&Value> = table.column(idx).collect();
        let def_levels: Vec<i16> = cells.iter().map(|v| i16::from(!v.is_missing())).collect();
        let present = cells.iter().filter(|v| !v.is_missing());

        match col.untyped() {
            ColumnWriter::Int64ColumnWriter(w) => {
                let values = present
                    .map(|v| match v {
                        Value::Int64(n) => Ok(*n),
                        Value::Datetime(dt) => Ok(dt.and_utc().timestamp_micros()),
                        other => Err(cell_mismatch(field, other)),
                    })
                    .collect::<IngestionResult<Vec<i64>>>()?;
                w.write_batch(&values, Some(&def_levels[..]), None)?;
            }
            ColumnWriter::DoubleColumnWriter(w) => {
                let values = present
                    .map(|v| v.as_f64().ok_or_else(|| cell_mismatch(field, v)))
                    .collect::<IngestionResult<Vec<f64>>>()?;
                w.write_batch(&values, Some(&def_levels[..]), None)?;
            }
            ColumnWriter::BoolColumnWriter(w) => {
                let values = present
                    .map(|v| match v {
                        Value::Bool(b) => Ok(*b),
                        other => Err(cell_mismatch(field, other)),
                    })
                    .collect::<IngestionResult<Vec<bool>>>()?;
                w.write_batch(&values, Some(&def_levels[..]), None)?;
            }
            ColumnWriter::ByteArrayColumnWriter(w) => {
                let values = present
                    .map(|v| match v {
                        Value::Utf8(s) => Ok(ByteArray::from(s.as_str())),
                        other => Err(cell_mismatch(field, other)),
                    })
                    .collect::<IngestionResult<Vec<ByteArray>>>()?;
                w.write_batch(&values, Some(&def_levels[..]), None)?;
            }
            _ => {
                return Err(IngestionError::malformed(format!(
                    "column '{}' has no parquet writer",
                    field.name
                )));
            }
        }
        col.close()?;
        idx += 1;
    }
    rg.close()?;
    writer.close()?;
    Ok(())
}

/// Read a table written by [`write_table`].
pub fn read_table(path: &Path) -> IngestionResult<Table> {
    let reader = SerializedFileReader::try_from(path)?;
    let fields = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| Ok(Field::new(c.name(), storage_of(c)?)))
        .collect::<IngestionResult<Vec<Field>>>()?;
    let schema = Schema::new(fields);

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (idx0, row_res) in reader.into_iter().enumerate() {
        let row = row_res?;
        let mut out_row = Vec::with_capacity(schema.len());
        for (field, (_, cell)) in schema.fields.iter().zip(row.get_column_iter()) {
            out_row.push(convert_record_field(idx0 + 1, field, cell)?);
        }
        if out_row.len() != schema.len() {
            return Err(IngestionError::malformed(format!(
                "row {} has {} fields, expected {}",
                idx0 + 1,
                out_row.len(),
                schema.len()
            )));
        }
        rows.push(out_row);
    }

    Ok(Table::new(schema, rows))
}

fn parquet_schema(schema: &Schema) -> IngestionResult<Type> {
    let fields = schema
        .fields
        .iter()
        .map(|f| leaf_type(f).map(Arc::new))
        .collect::<IngestionResult<Vec<TypePtr>>>()?;
    Ok(Type::group_type_builder("schema").with_fields(fields).build()?)
}

fn leaf_type(field: &Field) -> IngestionResult<Type> {
    let (physical, converted) = match field.storage {
        StorageType::Int64 => (PhysicalType::INT64, ConvertedType::NONE),
        StorageType::Float64 => (PhysicalType::DOUBLE, ConvertedType::NONE),
        StorageType::Bool => (PhysicalType::BOOLEAN, ConvertedType::NONE),
        StorageType::Datetime => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS),
        StorageType::Utf8 => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
    };
    Ok(Type::primitive_type_builder(&field.name, physical)
        .with_repetition(Repetition::OPTIONAL)
        .with_converted_type(converted)
        .build()?)
}

fn storage_of(column: &ColumnDescriptor) -> IngestionResult<StorageType> {
    match (column.physical_type(), column.converted_type()) {
        (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS) => Ok(StorageType::Datetime),
        (PhysicalType::INT64 | PhysicalType::INT32, _) => Ok(StorageType::Int64),
        (PhysicalType::DOUBLE | PhysicalType::FLOAT, _) => Ok(StorageType::Float64),
        (PhysicalType::BOOLEAN, _) => Ok(StorageType::Bool),
        (PhysicalType::BYTE_ARRAY, _) => Ok(StorageType::Utf8),
        (other, _) => Err(IngestionError::malformed(format!(
            "column '{}' has unsupported parquet type {other:?}",
            column.name()
        ))),
    }
}

fn convert_record_field(row: usize, field: &Field, cell: &RecordField) -> IngestionResult<Value> {
    let value = match (field.storage, cell) {
        (_, RecordField::Null) => Some(Value::Null),
        (StorageType::Int64, RecordField::Long(v)) => Some(Value::Int64(*v)),
        (StorageType::Int64, RecordField::Int(v)) => Some(Value::Int64(i64::from(*v))),
        (StorageType::Float64, RecordField::Double(v)) => Some(Value::Float64(*v)),
        (StorageType::Float64, RecordField::Float(v)) => Some(Value::Float64(f64::from(*v))),
        (StorageType::Bool, RecordField::Bool(b)) => Some(Value::Bool(*b)),
        (StorageType::Datetime, RecordField::TimestampMicros(us)) => {
            datetime_from_micros(*us).map(Value::Datetime)
        }
        (StorageType::Utf8, RecordField::Str(s)) => Some(Value::Utf8(s.clone())),
        _ => None,
    };
    value.ok_or_else(|| {
        IngestionError::malformed(format!(
            "row {row}: column '{}' expected {} but found '{cell}'",
            field.name, field.storage
        ))
    })
}

fn datetime_from_micros(us: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(us).map(|d| d.naive_utc())
}

fn cell_mismatch(field: &Field, value: &Value) -> IngestionError {
    IngestionError::malformed(format!(
        "column '{}' ({}) holds an incompatible value '{value}'",
        field.name, field.storage
    ))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use chrono::NaiveDate;

    use super::{read_table, write_table};
    use crate::types::{Field, Schema, StorageType, Table, Value};

    fn tmp_path(stem: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("data_copilot_{stem}_{nanos}.parquet"))
    }

    #[test]
    fn every_storage_type_survives_a_write_and_read() {
        let when = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let schema = Schema::new(vec![
            Field::new("id", StorageType::Int64),
            Field::new("unit price", StorageType::Float64),
            Field::new("active", StorageType::Bool),
            Field::new("seen at", StorageType::Datetime),
            Field::new("name", StorageType::Utf8),
        ]);
        let table = Table::new(
            schema,
            vec![
                vec![
                    Value::Int64(1),
                    Value::Float64(2.5),
                    Value::Bool(true),
                    Value::Datetime(when),
                    Value::Utf8("Ada".to_string()),
                ],
                vec![Value::Null, Value::Null, Value::Null, Value::Null, Value::Null],
                vec![
                    Value::Int64(-7),
                    Value::Float64(0.0),
                    Value::Bool(false),
                    Value::Null,
                    Value::Utf8("Grace Hopper".to_string()),
                ],
            ],
        );

        let path = tmp_path("all_types");
        write_table(&path, &table).unwrap();
        let back = read_table(&path).unwrap();
        assert_eq!(back, table);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn datetimes_keep_microseconds() {
        let schema = Schema::new(vec![Field::new("at", StorageType::Datetime)]);
        let rows = [(0, 123_456), (59, 999_999), (1, 1)]
            .into_iter()
            .map(|(sec, micro)| {
                let dt = NaiveDate::from_ymd_opt(1969, 12, 31)
                    .unwrap()
                    .and_hms_micro_opt(23, 59, sec, micro)
                    .unwrap();
                vec![Value::Datetime(dt)]
            })
            .collect();
        let table = Table::new(schema, rows);

        let path = tmp_path("micros");
        write_table(&path, &table).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn empty_table_keeps_its_schema() {
        let schema = Schema::new(vec![
            Field::new("a", StorageType::Utf8),
            Field::new("b", StorageType::Float64),
        ]);
        let table = Table::new(schema, vec![]);
        let path = tmp_path("empty");
        write_table(&path, &table).unwrap();
        let back = read_table(&path).unwrap();
        assert_eq!(back.schema, table.schema);
        assert_eq!(back.row_count(), 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn incompatible_cell_is_rejected() {
        let schema = Schema::new(vec![Field::new("n", StorageType::Int64)]);
        let table = Table::new(schema, vec![vec![Value::Utf8("x".to_string())]]);
        let path = tmp_path("mismatch");
        assert!(write_table(&path, &table).is_err());
        let _ = std::fs::remove_file(path);
    }
}
