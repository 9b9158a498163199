use std::sync::Arc;

use silt::buffer::BufferPoolManager;
use silt::catalog::Catalog;
use silt::common::{DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K};
use silt::execution::{Executor, IndexScanExecutor, InsertExecutor, SeqScanExecutor, ValuesExecutor};
use silt::storage::disk::DiskManager;
use silt::tuple::{DataType, Schema, Value};

fn main() {
    println!("Silt - a disk-oriented storage engine in Rust");
    println!("=============================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    let bpm = Arc::new(BufferPoolManager::new(
        DEFAULT_BUFFER_POOL_SIZE,
        DEFAULT_LRUK_K,
        Arc::clone(&disk_manager),
    ));
    println!(
        "Created buffer pool with {} frames (LRU-{} replacement)",
        DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K
    );

    let catalog = Catalog::new(Arc::clone(&bpm));
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::VarChar(64))
        .build_arc();
    catalog
        .create_table("people", Arc::clone(&schema))
        .expect("Failed to create table");
    catalog
        .create_index("people_by_id", "people", 0, 64, 64)
        .expect("Failed to create index");
    println!("Created table 'people' with index 'people_by_id'\n");

    let rows = vec![
        vec![Value::Integer(3), Value::from("carol")],
        vec![Value::Integer(1), Value::from("alice")],
        vec![Value::Integer(2), Value::from("bob")],
        vec![Value::Integer(5), Value::from("eve")],
        vec![Value::Integer(4), Value::from("dave")],
    ];

    let values = ValuesExecutor::new(Arc::clone(&schema), rows);
    let mut insert = InsertExecutor::new(&catalog, "people", Box::new(values))
        .expect("Failed to build insert executor");
    insert.init().expect("Failed to init insert");
    let (summary, _) = insert
        .next()
        .expect("Insert failed")
        .expect("Insert emits a summary");
    println!("Inserted {} rows", summary.value(0).unwrap());

    let table = catalog.table("people").expect("table exists");
    let mut scan = SeqScanExecutor::new(table);
    scan.init().expect("Failed to init scan");
    println!("\nSequential scan (heap order):");
    while let Some((tuple, rid)) = scan.next().expect("Scan failed") {
        println!("  {} -> id={}, name={}", rid, tuple.value(0).unwrap(), tuple.value(1).unwrap());
    }

    let mut index_scan = IndexScanExecutor::new(&catalog, "people_by_id", Some(2), Some(4))
        .expect("Failed to build index scan");
    index_scan.init().expect("Failed to init index scan");
    println!("\nIndex scan for 2 <= id <= 4 (key order):");
    while let Some((tuple, _)) = index_scan.next().expect("Index scan failed") {
        println!("  id={}, name={}", tuple.value(0).unwrap(), tuple.value(1).unwrap());
    }

    bpm.flush_all_pages().expect("Failed to flush");
    disk_manager.sync().expect("Failed to sync");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
