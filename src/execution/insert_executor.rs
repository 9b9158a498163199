use std::sync::Arc;

use crate::catalog::{key_from_tuple, Catalog, IndexInfo, TableInfo};
use crate::common::{RecordId, Result, SiltError};
use crate::tuple::{DataType, Schema, Tuple, Value};

use super::Executor;

/// Schema of the single summary tuple an insert emits.
pub fn insert_output_schema() -> Arc<Schema> {
    Schema::builder().column("count", DataType::Integer).build_arc()
}

/// Drains its child, appending every tuple to the table heap and to each of
/// the table's indexes via key projection. Emits one `{INTEGER: count}`
/// summary tuple, then reports end-of-stream until re-initialized.
pub struct InsertExecutor {
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    child: Box<dyn Executor>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(catalog: &Catalog, table_name: &str, child: Box<dyn Executor>) -> Result<Self> {
        let table = catalog.table(table_name)?;
        let indexes = catalog.table_indexes(table_name);
        Ok(Self {
            table,
            indexes,
            child,
            done: false,
        })
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        while let Some((tuple, _)) = self.child.next()? {
            let bytes = tuple.to_bytes().ok_or(SiltError::TupleEncoding)?;
            let rid = self.table.heap.insert_tuple(&bytes)?;

            for index in &self.indexes {
                let key = key_from_tuple(&tuple, index.key_column)?;
                index.tree.insert(key, rid)?;
            }

            count += 1;
        }

        self.done = true;
        let summary = Tuple::new(insert_output_schema(), vec![Value::Integer(count)]);
        Ok(Some((summary, RecordId::invalid())))
    }
}
