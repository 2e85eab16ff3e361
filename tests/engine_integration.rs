// Engine integration: sequential/parallel equivalence, merge transparency,
// and error surfacing over real source files.
use std::path::{Path, PathBuf};

use scanspeed::core::clusters::{discover_clusters, merge_clusters};
use scanspeed::core::counter::{ByteStats, read_rows};
use scanspeed::core::engine::{EngineOptions, ScanSpec, eval_throughput};
use scanspeed::core::error::ErrorKind;
use scanspeed::store::field::{ColumnData, FieldType};
use scanspeed::store::writer::{CollectionOptions, SourceWriter};

fn write_source(path: &Path, collection: &str, columns: &[&str], rows: u64, rows_per_cluster: u64) {
    let mut writer = SourceWriter::create(path).expect("create source");
    let schema: Vec<(String, FieldType)> = columns
        .iter()
        .map(|name| (name.to_string(), FieldType::I32))
        .collect();
    let mut target = writer
        .collection(collection, &schema, CollectionOptions::new(rows_per_cluster))
        .expect("collection");
    let mut written = 0u64;
    while written < rows {
        let batch_rows = (64 * 1024).min(rows - written);
        let batch = ColumnData::I32(
            (written..written + batch_rows)
                .map(|row| row as i32)
                .collect(),
        );
        target
            .append(&vec![batch; columns.len()])
            .expect("append batch");
        written += batch_rows;
    }
    target.finish().expect("finish collection");
    writer.finish().expect("finish source");
}

fn scan_spec(collections: &[&str], sources: &[PathBuf], columns: &[&str], patterns: bool) -> ScanSpec {
    ScanSpec {
        collections: collections.iter().map(|name| name.to_string()).collect(),
        sources: sources.to_vec(),
        columns: columns.iter().map(|name| name.to_string()).collect(),
        use_patterns: patterns,
    }
}

fn sequential() -> EngineOptions {
    EngineOptions {
        threads: 0,
        ..EngineOptions::default()
    }
}

fn parallel(threads: usize) -> EngineOptions {
    EngineOptions {
        threads,
        ..EngineOptions::default()
    }
}

#[test]
fn two_sources_ten_million_rows_read_the_same_bytes_in_both_modes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("first.scol");
    let second = dir.path().join("second.scol");
    write_source(&first, "events", &["x"], 10_000_000, 250_000);
    write_source(&second, "events", &["x"], 10_000_000, 250_000);
    let sources = vec![first, second];

    let spec = scan_spec(&["events"], &sources, &["x"], false);

    let st = eval_throughput(&spec, &sequential()).expect("sequential run");
    assert_eq!(st.decoded_bytes, 80_000_000);
    assert_eq!(st.thread_pool_size, 0);
    assert_eq!(st.setup_wall_time.as_nanos(), 0);

    let mt = eval_throughput(&spec, &parallel(2)).expect("parallel run");
    assert_eq!(mt.decoded_bytes, 80_000_000);
    assert_eq!(mt.raw_bytes, st.raw_bytes);
    assert_eq!(mt.thread_pool_size, 2);

    // Idempotence: unchanged inputs, identical byte counts.
    let again = eval_throughput(&spec, &parallel(2)).expect("parallel rerun");
    assert_eq!(again.decoded_bytes, mt.decoded_bytes);
    assert_eq!(again.raw_bytes, mt.raw_bytes);
}

#[test]
fn merging_changes_scheduling_granularity_never_what_is_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("events.scol");
    write_source(&path, "events", &["x", "y"], 70_000, 10_000);

    let natural = discover_clusters(&path, "events").expect("discover");
    assert_eq!(natural.len(), 7);

    let columns = vec!["x".to_string(), "y".to_string()];
    let read_sum = |ranges: &[scanspeed::core::clusters::EntryRange]| -> ByteStats {
        ranges
            .iter()
            .map(|range| read_rows(&path, "events", &columns, Some(*range)).expect("read range"))
            .fold(ByteStats::default(), ByteStats::merge)
    };

    let natural_sum = read_sum(&natural);
    let merged = merge_clusters(natural.clone(), 3);
    assert_eq!(merged.len(), 3);
    let merged_sum = read_sum(&merged);
    assert_eq!(merged_sum, natural_sum);

    let whole = read_rows(&path, "events", &columns, None).expect("read whole");
    assert_eq!(whole, natural_sum);
    assert_eq!(whole.decoded_bytes, 70_000 * 4 * 2);
}

#[test]
fn column_subsets_and_patterns_select_what_is_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mixed.scol");
    write_source(
        &path,
        "events",
        &["x", "x_low", "y_high", "other"],
        100_000,
        10_000,
    );
    let sources = vec![path];

    let single = scan_spec(&["events"], &sources, &["x"], false);
    let result = eval_throughput(&single, &sequential()).expect("single column");
    assert_eq!(result.decoded_bytes, 400_000);

    let pair = scan_spec(&["events"], &sources, &["(x|y)_.*"], true);
    let result = eval_throughput(&pair, &sequential()).expect("pattern pair");
    assert_eq!(result.decoded_bytes, 800_000);

    let all = scan_spec(&["events"], &sources, &[".*"], true);
    let result = eval_throughput(&all, &sequential()).expect("all columns");
    assert_eq!(result.decoded_bytes, 1_600_000);

    // Exact name that only looks like a pattern: no such column.
    let missing = scan_spec(&["events"], &sources, &["x_.*"], false);
    let err = eval_throughput(&missing, &sequential()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    let text = err.to_string();
    assert!(text.contains("x_.*"));
    assert!(text.contains("events"));
    assert!(text.contains("mixed.scol"));

    let unmatched = scan_spec(&["events"], &sources, &["z_.*"], true);
    let err = eval_throughput(&unmatched, &sequential()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMatch);
}

#[test]
fn positional_collection_names_map_one_per_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = dir.path().join("y23.scol");
    let second = dir.path().join("y24.scol");
    write_source(&first, "ev2023", &["x"], 30_000, 4_000);
    write_source(&second, "ev2024", &["x"], 50_000, 4_000);
    let sources = vec![first, second];

    let spec = scan_spec(&["ev2023", "ev2024"], &sources, &["x"], false);
    let st = eval_throughput(&spec, &sequential()).expect("sequential run");
    assert_eq!(st.decoded_bytes, (30_000 + 50_000) * 4);

    let mt = eval_throughput(&spec, &parallel(3)).expect("parallel run");
    assert_eq!(mt.decoded_bytes, st.decoded_bytes);
    assert_eq!(mt.raw_bytes, st.raw_bytes);

    // A shared name that only exists in one source fails from the task.
    let wrong = scan_spec(&["ev2023"], &sources, &["x"], false);
    let err = eval_throughput(&wrong, &parallel(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollectionNotFound);
}

#[test]
fn empty_collection_cannot_be_scheduled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.scol");
    write_source(&path, "events", &["x"], 0, 1_000);
    let sources = vec![path];

    let spec = scan_spec(&["events"], &sources, &["x"], false);

    // Sequential mode reads zero rows and reports zero bytes.
    let st = eval_throughput(&spec, &sequential()).expect("sequential run");
    assert_eq!(st.decoded_bytes, 0);

    // Parallel mode has nothing to split.
    let err = eval_throughput(&spec, &parallel(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
