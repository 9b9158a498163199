//! Integration tests for the pull-based executors

use std::sync::Arc;

use silt::buffer::BufferPoolManager;
use silt::catalog::Catalog;
use silt::execution::{
    Executor, IndexScanExecutor, InsertExecutor, SeqScanExecutor, ValuesExecutor,
};
use silt::storage::disk::DiskManager;
use silt::tuple::{DataType, Schema, Value};

use tempfile::NamedTempFile;

fn people_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Integer(3), Value::from("carol")],
        vec![Value::Integer(1), Value::from("alice")],
        vec![Value::Integer(4), Value::from("dave")],
        vec![Value::Integer(2), Value::from("bob")],
    ]
}

fn setup() -> (Catalog, Arc<Schema>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(64, 2, dm));

    let catalog = Catalog::new(bpm);
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::VarChar(64))
        .build_arc();
    catalog.create_table("people", Arc::clone(&schema)).unwrap();

    (catalog, schema, temp_file)
}

fn run_insert(catalog: &Catalog, schema: &Arc<Schema>, rows: Vec<Vec<Value>>) -> i32 {
    let values = ValuesExecutor::new(Arc::clone(schema), rows);
    let mut insert = InsertExecutor::new(catalog, "people", Box::new(values)).unwrap();
    insert.init().unwrap();

    let (summary, _) = insert.next().unwrap().unwrap();
    let Some(Value::Integer(count)) = summary.value(0).cloned() else {
        panic!("insert summary must be a single INTEGER");
    };

    // The summary is emitted exactly once.
    assert!(insert.next().unwrap().is_none());
    count
}

#[test]
fn test_insert_reports_count() {
    let (catalog, schema, _temp) = setup();
    assert_eq!(run_insert(&catalog, &schema, people_rows()), 4);
    assert_eq!(run_insert(&catalog, &schema, vec![]), 0);
}

#[test]
fn test_seq_scan_returns_heap_order() {
    let (catalog, schema, _temp) = setup();
    run_insert(&catalog, &schema, people_rows());

    let mut scan = SeqScanExecutor::new(catalog.table("people").unwrap());
    scan.init().unwrap();

    let mut ids = Vec::new();
    while let Some((tuple, _rid)) = scan.next().unwrap() {
        ids.push(tuple.value(0).cloned().unwrap());
    }
    assert_eq!(
        ids,
        vec![
            Value::Integer(3),
            Value::Integer(1),
            Value::Integer(4),
            Value::Integer(2)
        ]
    );

    // init() rewinds the scan.
    scan.init().unwrap();
    assert_eq!(scan.next().unwrap().unwrap().0.value(1), Some(&Value::from("carol")));
}

#[test]
fn test_seq_scan_skips_tombstones() {
    let (catalog, schema, _temp) = setup();
    run_insert(&catalog, &schema, people_rows());

    // Tombstone "carol" directly in the heap.
    let table = catalog.table("people").unwrap();
    let mut scan = SeqScanExecutor::new(Arc::clone(&table));
    scan.init().unwrap();
    let (_, carol_rid) = scan.next().unwrap().unwrap();
    table.heap.delete_tuple(carol_rid).unwrap();

    scan.init().unwrap();
    let mut names = Vec::new();
    while let Some((tuple, _)) = scan.next().unwrap() {
        names.push(tuple.value(1).cloned().unwrap());
    }
    assert_eq!(
        names,
        vec![Value::from("alice"), Value::from("dave"), Value::from("bob")]
    );
}

#[test]
fn test_insert_maintains_indexes() {
    let (catalog, schema, _temp) = setup();
    catalog
        .create_index("people_by_id", "people", 0, 4, 4)
        .unwrap();

    run_insert(&catalog, &schema, people_rows());

    let index = catalog.index("people_by_id").unwrap();
    let table = catalog.table("people").unwrap();

    // Every key resolves through the tree to the right heap tuple.
    for id in 1..=4u32 {
        let rid = index.tree.get(id).unwrap().expect("indexed key");
        let bytes = table.heap.get_tuple(rid).unwrap();
        let tuple = silt::tuple::Tuple::from_bytes(Arc::clone(&schema), &bytes).unwrap();
        assert_eq!(tuple.value(0), Some(&Value::Integer(id as i32)));
    }
    assert_eq!(index.tree.get(5).unwrap(), None);
}

#[test]
fn test_create_index_backfills_existing_rows() {
    let (catalog, schema, _temp) = setup();

    // Rows first, index second.
    run_insert(&catalog, &schema, people_rows());
    catalog
        .create_index("people_by_id", "people", 0, 4, 4)
        .unwrap();

    let index = catalog.index("people_by_id").unwrap();
    for id in 1..=4u32 {
        assert!(index.tree.get(id).unwrap().is_some());
    }
}

#[test]
fn test_index_scan_key_order_and_bounds() {
    let (catalog, schema, _temp) = setup();
    catalog
        .create_index("people_by_id", "people", 0, 4, 4)
        .unwrap();
    run_insert(&catalog, &schema, people_rows());

    // Unbounded: all rows in key order, not heap order.
    let mut scan = IndexScanExecutor::new(&catalog, "people_by_id", None, None).unwrap();
    scan.init().unwrap();
    let mut names = Vec::new();
    while let Some((tuple, _)) = scan.next().unwrap() {
        names.push(tuple.value(1).cloned().unwrap());
    }
    assert_eq!(
        names,
        vec![
            Value::from("alice"),
            Value::from("bob"),
            Value::from("carol"),
            Value::from("dave")
        ]
    );

    // Bounded: 2 <= id <= 3.
    let mut scan = IndexScanExecutor::new(&catalog, "people_by_id", Some(2), Some(3)).unwrap();
    scan.init().unwrap();
    let mut ids = Vec::new();
    while let Some((tuple, _)) = scan.next().unwrap() {
        ids.push(tuple.value(0).cloned().unwrap());
    }
    assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3)]);

    // Range past all keys.
    let mut scan = IndexScanExecutor::new(&catalog, "people_by_id", Some(100), None).unwrap();
    scan.init().unwrap();
    assert!(scan.next().unwrap().is_none());
}

#[test]
fn test_index_scan_empty_table() {
    let (catalog, _schema, _temp) = setup();
    catalog
        .create_index("people_by_id", "people", 0, 4, 4)
        .unwrap();

    let mut scan = IndexScanExecutor::new(&catalog, "people_by_id", None, None).unwrap();
    scan.init().unwrap();
    assert!(scan.next().unwrap().is_none());
}

#[test]
fn test_missing_catalog_entries() {
    let (catalog, schema, _temp) = setup();

    let values = ValuesExecutor::new(Arc::clone(&schema), vec![]);
    assert!(InsertExecutor::new(&catalog, "nope", Box::new(values)).is_err());
    assert!(IndexScanExecutor::new(&catalog, "nope", None, None).is_err());
    assert!(catalog.create_table("people", schema).is_err());
}
