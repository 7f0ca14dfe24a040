use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use data_copilot::cleaning::clean;
use data_copilot::config::StoreConfig;
use data_copilot::ingestion::{load_raw, IngestionFormat};
use data_copilot::schema::LogicalType;
use data_copilot::store::{LruTableCache, TableCache, TableId, TableStore};
use data_copilot::types::{StorageType, Value};
use data_copilot::IngestionError;

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("data-copilot-{name}-{nanos}"));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn store_in(dir: &Path) -> TableStore {
    TableStore::new(StoreConfig::default().with_data_dir(dir.join("data")))
}

fn data_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.join("data"))
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

const SALES_CSV: &str = "\
 order id ,region,revenue,units,note
1,  north ,10.5,3,first
2,south,,4,
3,north,7.25,,
4,east,1.0,1,last
";

#[test]
fn get_table_returns_the_cleaned_table_before_and_after_restart() {
    let dir = tmp_dir("roundtrip");
    let src = write_file(&dir, "upload.tmp", SALES_CSV);
    let expected = clean(load_raw(&src, IngestionFormat::Csv, false).unwrap());

    let store = store_in(&dir);
    let (id, metadata) = store.ingest(&src, "sales.csv").unwrap();
    assert_eq!(*store.get_table(&id).unwrap(), expected);

    // A new store on the same directory has an empty cache and reads the parquet file.
    let fresh = store_in(&dir);
    let reloaded = fresh.get_table(&id).unwrap();
    assert_eq!(*reloaded, expected);
    assert_eq!(fresh.get_metadata(&id).unwrap(), metadata);

    let names: Vec<&str> = reloaded.schema.field_names().collect();
    assert_eq!(names, vec!["order id", "region", "revenue", "units", "note"]);
    assert_eq!(reloaded.rows[0][1], Value::Utf8("north".to_string()));
    assert_eq!(reloaded.rows[2][4], Value::Null);
}

#[test]
fn metadata_describes_the_table() {
    let dir = tmp_dir("metadata");
    let src = write_file(&dir, "upload.tmp", SALES_CSV);
    let store = store_in(&dir);
    let (id, metadata) = store.ingest(&src, "Sales.CSV").unwrap();

    assert_eq!(metadata.file_id, id);
    assert_eq!(metadata.filename, "Sales.CSV");
    assert_eq!((metadata.row_count, metadata.column_count), (4, 5));
    assert_eq!(metadata.schema.get("order id"), Some(LogicalType::Integer));
    assert_eq!(metadata.schema.get("revenue"), Some(LogicalType::Float));
    assert_eq!(metadata.schema.get("units"), Some(LogicalType::Integer));
    assert_eq!(metadata.schema.get("region"), Some(LogicalType::String));
    assert_eq!(metadata.sample_rows.len(), 4);

    let summary = &metadata.summary;
    assert_eq!(summary.missing("revenue"), 1);
    assert_eq!(summary.missing("units"), 1);
    assert_eq!(summary.missing("note"), 2);
    assert_eq!(summary.missing("region"), 0);
    let region = summary.categorical("region").unwrap();
    assert_eq!(region.top_values.get_index(0), Some((&"north".to_string(), &2)));

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.metadata_path(&id)).unwrap()).unwrap();
    assert_eq!(on_disk["file_id"], id.to_string());
    assert_eq!(on_disk["schema"]["revenue"], "float");
    assert_eq!(on_disk["sample_rows"][1]["revenue"], serde_json::Value::Null);
}

#[test]
fn missing_values_are_excluded_from_statistics() {
    let dir = tmp_dir("missing");
    let src = write_file(&dir, "upload.tmp", "id,value\n1,1\n2,\n3,3\n4,5\n");
    let store = store_in(&dir);
    let (id, metadata) = store.ingest(&src, "values.csv").unwrap();

    let stats = metadata.summary.numeric("value").unwrap();
    assert_eq!(stats.mean, 3.0);
    assert_eq!(stats.median, 3.0);
    assert_eq!((stats.min, stats.max), (1.0, 5.0));
    assert_eq!(metadata.summary.missing("value"), 1);

    let table = store.get_table(&id).unwrap();
    let value_idx = table.schema.index_of("value").unwrap();
    assert_eq!(table.schema.fields[value_idx].storage, StorageType::Int64);
    assert_eq!(table.rows[1][value_idx], Value::Null);
}

#[test]
fn tab_separated_files_are_supported() {
    let dir = tmp_dir("tsv");
    let src = write_file(&dir, "upload.tmp", "city\ttemp\nOslo\t-3.5\nLima\t19\n");
    let store = store_in(&dir);
    let (id, metadata) = store.ingest(&src, "weather.tsv").unwrap();
    assert_eq!(metadata.schema.get("temp"), Some(LogicalType::Float));
    assert_eq!(store.get_table(&id).unwrap().rows[1][1], Value::Float64(19.0));
}

#[test]
fn unknown_identifiers_are_not_found() {
    let dir = tmp_dir("not-found");
    let store = store_in(&dir);
    let id = TableId::new();
    assert!(store.get_metadata(&id).unwrap_err().is_not_found());
    assert!(store.get_table(&id).unwrap_err().is_not_found());
    assert!("not-a-uuid".parse::<TableId>().unwrap_err().is_not_found());
}

#[test]
fn unsupported_and_malformed_files_leave_nothing_behind() {
    let dir = tmp_dir("rejects");
    let store = store_in(&dir);

    let json = write_file(&dir, "a.tmp", "[{\"a\": 1}]");
    let err = store.ingest(&json, "records.json").unwrap_err();
    assert!(matches!(
        err,
        IngestionError::UnsupportedFormat { filename } if filename == "records.json"
    ));

    let colliding = write_file(&dir, "b.tmp", "a ,  a\n1,2\n");
    let err = store.ingest(&colliding, "dupes.csv").unwrap_err();
    assert!(matches!(err, IngestionError::MalformedInput { .. }));

    let ragged = write_file(&dir, "c.tmp", "a,b\n1,2,3\n");
    let err = store.ingest(&ragged, "ragged.csv").unwrap_err();
    assert!(matches!(err, IngestionError::MalformedInput { .. }));

    assert!(data_files(&dir).is_empty());
}

#[test]
fn evicted_tables_are_reloaded_from_disk() {
    let dir = tmp_dir("lru");
    let cache = Arc::new(LruTableCache::new(1));
    let store = store_in(&dir).with_cache(cache.clone());

    let first = write_file(&dir, "1.tmp", "n\n1\n2\n");
    let second = write_file(&dir, "2.tmp", "n\n3\n");
    let (a, _) = store.ingest(&first, "first.csv").unwrap();
    let (b, _) = store.ingest(&second, "second.csv").unwrap();

    assert_eq!(cache.len(), 1);
    assert!(cache.get(&a).is_none());
    assert_eq!(store.get_table(&a).unwrap().row_count(), 2);
    assert!(cache.get(&b).is_none());
    assert_eq!(store.get_table(&b).unwrap().row_count(), 1);
}

#[test]
fn configured_cache_capacity_bounds_the_store_cache() {
    let dir = tmp_dir("capacity");
    let config = StoreConfig::default()
        .with_data_dir(dir.join("data"))
        .with_cache_capacity(2);
    let store = TableStore::new(config);

    let ids: Vec<TableId> = (0..3)
        .map(|i| {
            let csv = format!("n\n{i}\n");
            store.ingest_upload(csv.as_bytes(), "n.csv").unwrap().0
        })
        .collect();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(store.get_table(id).unwrap().rows[0][0], Value::Int64(i as i64));
    }
    assert!(format!("{store:?}").contains("cached: 2"));
}

#[test]
fn fractional_second_datetimes_survive_a_restart() {
    let dir = tmp_dir("micros");
    let src = write_file(
        &dir,
        "upload.tmp",
        "when,n\n2024-01-02 10:00:00.123456,1\n2024-01-02 10:00:00.5,2\n2024-01-03,3\n",
    );
    let expected = clean(load_raw(&src, IngestionFormat::Csv, true).unwrap());
    assert_eq!(expected.schema.fields[0].storage, StorageType::Datetime);

    let mut config = StoreConfig::default().with_data_dir(dir.join("data"));
    config.parse_dates = true;
    let (id, metadata) = TableStore::new(config.clone()).ingest(&src, "events.csv").unwrap();
    assert_eq!(metadata.schema.get("when"), Some(LogicalType::Datetime));

    let fresh = TableStore::new(config);
    assert_eq!(*fresh.get_table(&id).unwrap(), expected);
}

#[test]
fn nan_spellings_load_as_missing_and_survive_a_restart() {
    let dir = tmp_dir("nan");
    let src = write_file(&dir, "upload.tmp", "x\n1.5\nNAN\n2.5\n");
    let store = store_in(&dir);
    let (id, metadata) = store.ingest(&src, "x.csv").unwrap();
    assert_eq!(metadata.summary.missing("x"), 1);
    assert_eq!(metadata.summary.numeric("x").unwrap().mean, 2.0);

    let reloaded = store_in(&dir).get_table(&id).unwrap();
    assert_eq!(reloaded.rows[1][0], Value::Null);
    assert_eq!(*reloaded, *store.get_table(&id).unwrap());
}

#[test]
fn headers_colliding_with_generated_suffixes_still_ingest() {
    let dir = tmp_dir("suffixes");
    let src = write_file(&dir, "upload.tmp", "a,a,a.1\n1,2,3\n");
    let store = store_in(&dir);
    let (id, metadata) = store.ingest(&src, "a.csv").unwrap();
    let names: Vec<&str> = metadata.schema.column_names().collect();
    assert_eq!(names, vec!["a", "a.1", "a.1.1"]);
    assert_eq!(store_in(&dir).get_table(&id).unwrap().rows[0][2], Value::Int64(3));
}

#[test]
fn table_without_metadata_record_is_not_found() {
    let dir = tmp_dir("commit-marker");
    let src = write_file(&dir, "upload.tmp", "n\n1\n");
    let store = store_in(&dir);
    let (id, _) = store.ingest(&src, "n.csv").unwrap();
    fs::remove_file(store.metadata_path(&id)).unwrap();
    assert!(store.table_path(&id).is_file());

    let fresh = store_in(&dir);
    assert!(fresh.get_table(&id).unwrap_err().is_not_found());
    assert!(fresh.get_metadata(&id).unwrap_err().is_not_found());
}

#[test]
fn durable_layout_is_one_table_and_one_metadata_file() {
    let dir = tmp_dir("layout");
    let src = write_file(&dir, "upload.tmp", "n\n1\n");
    let store = store_in(&dir);
    let (id, _) = store.ingest(&src, "n.csv").unwrap();
    assert_eq!(
        data_files(&dir),
        vec![format!("{id}.parquet"), format!("{id}_metadata.json")]
    );
}

#[test]
fn uploads_are_staged_ingested_and_cleaned_up() {
    let dir = tmp_dir("upload");
    let store = store_in(&dir);
    let (id, metadata) = store
        .ingest_upload("x,y\n1,2\n3,4\n".as_bytes(), "points.csv")
        .unwrap();
    assert_eq!(metadata.row_count, 2);
    assert!(data_files(&dir).iter().all(|name| !name.starts_with("temp_")));
    assert_eq!(store.get_table(&id).unwrap().column_count(), 2);
}

#[test]
fn oversize_upload_is_rejected() {
    let dir = tmp_dir("upload-big");
    let mut config = StoreConfig::default().with_data_dir(dir.join("data"));
    config.max_upload_bytes = 8;
    let store = TableStore::new(config);
    let err = store
        .ingest_upload("x,y\n1,2\n3,4\n".as_bytes(), "points.csv")
        .unwrap_err();
    assert!(matches!(err, IngestionError::PayloadTooLarge { limit: 8 }));
    assert!(data_files(&dir).is_empty());
}

#[test]
fn distinct_uploads_get_distinct_identifiers_across_threads() {
    let dir = tmp_dir("threads");
    let store = Arc::new(store_in(&dir));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let csv = format!("n\n{i}\n");
                store.ingest_upload(csv.as_bytes(), "n.csv").unwrap().0
            })
        })
        .collect();
    let mut ids: Vec<TableId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    for id in &ids {
        assert_eq!(store.get_table(id).unwrap().row_count(), 1);
    }
}
