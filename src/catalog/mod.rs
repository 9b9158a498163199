use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::BufferPoolManager;
use crate::common::{Result, SiltError};
use crate::index::BPlusTree;
use crate::storage::TableHeap;
use crate::tuple::{Schema, Tuple, Value};

/// Everything the executors need to know about one table.
pub struct TableInfo {
    pub oid: u32,
    pub name: String,
    pub schema: Arc<Schema>,
    pub heap: Arc<TableHeap>,
}

/// Everything the executors need to know about one index: the tree plus the
/// key projection (which column of the base table feeds the key).
pub struct IndexInfo {
    pub oid: u32,
    pub name: String,
    pub table_name: String,
    pub key_column: usize,
    pub tree: Arc<BPlusTree>,
}

/// Projects a tuple onto an index key. Index keys are non-negative INTEGER
/// columns.
pub fn key_from_tuple(tuple: &Tuple, key_column: usize) -> Result<u32> {
    match tuple.value(key_column) {
        Some(Value::Integer(v)) if *v >= 0 => Ok(*v as u32),
        _ => Err(SiltError::InvalidKeyColumn(key_column)),
    }
}

/// In-memory registry of tables and indexes, backed by heaps and trees in
/// the shared buffer pool.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<String, Arc<TableInfo>>>,
    indexes: RwLock<HashMap<String, Arc<IndexInfo>>>,
    /// table name -> its indexes, in creation order
    table_indexes: RwLock<HashMap<String, Vec<Arc<IndexInfo>>>>,
    next_table_oid: AtomicU32,
    next_index_oid: AtomicU32,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            table_indexes: RwLock::new(HashMap::new()),
            next_table_oid: AtomicU32::new(0),
            next_index_oid: AtomicU32::new(0),
        }
    }

    /// Creates an empty table with the given schema.
    pub fn create_table(&self, name: &str, schema: Arc<Schema>) -> Result<Arc<TableInfo>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(SiltError::TableAlreadyExists(name.to_string()));
        }

        let heap = Arc::new(TableHeap::new(Arc::clone(&self.bpm))?);
        let info = Arc::new(TableInfo {
            oid: self.next_table_oid.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            schema,
            heap,
        });

        tables.insert(name.to_string(), Arc::clone(&info));
        self.table_indexes
            .write()
            .insert(name.to_string(), Vec::new());
        Ok(info)
    }

    pub fn table(&self, name: &str) -> Result<Arc<TableInfo>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SiltError::TableNotFound(name.to_string()))
    }

    /// Creates a B+Tree index over one column of an existing table and
    /// backfills it from the heap.
    pub fn create_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_column: usize,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Arc<IndexInfo>> {
        let table = self.table(table_name)?;
        if table.schema.column(key_column).is_none() {
            return Err(SiltError::InvalidKeyColumn(key_column));
        }

        let mut indexes = self.indexes.write();
        if indexes.contains_key(index_name) {
            return Err(SiltError::IndexAlreadyExists(index_name.to_string()));
        }

        let tree = Arc::new(BPlusTree::new(
            Arc::clone(&self.bpm),
            leaf_max_size,
            internal_max_size,
        )?);

        let mut iter = table.heap.iter();
        while let Some((rid, bytes)) = iter.next_tuple()? {
            let tuple = Tuple::from_bytes(Arc::clone(&table.schema), &bytes)
                .ok_or(SiltError::TupleEncoding)?;
            let key = key_from_tuple(&tuple, key_column)?;
            tree.insert(key, rid)?;
        }

        let info = Arc::new(IndexInfo {
            oid: self.next_index_oid.fetch_add(1, Ordering::Relaxed),
            name: index_name.to_string(),
            table_name: table_name.to_string(),
            key_column,
            tree,
        });

        indexes.insert(index_name.to_string(), Arc::clone(&info));
        self.table_indexes
            .write()
            .entry(table_name.to_string())
            .or_default()
            .push(Arc::clone(&info));
        Ok(info)
    }

    pub fn index(&self, name: &str) -> Result<Arc<IndexInfo>> {
        self.indexes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SiltError::IndexNotFound(name.to_string()))
    }

    /// All indexes over a table, in creation order.
    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        self.table_indexes
            .read()
            .get(table_name)
            .cloned()
            .unwrap_or_default()
    }
}
