use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::{RecordId, Result, SiltError};
use crate::storage::TableIterator;
use crate::tuple::Tuple;

use super::Executor;

/// Full scan over a table heap. Tombstoned tuples never surface: the heap
/// iterator skips dead slots.
pub struct SeqScanExecutor {
    table: Arc<TableInfo>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(table: Arc<TableInfo>) -> Self {
        Self { table, iter: None }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(self.table.heap.iter());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };

        match iter.next_tuple()? {
            Some((rid, bytes)) => {
                let tuple = Tuple::from_bytes(Arc::clone(&self.table.schema), &bytes)
                    .ok_or(SiltError::TupleEncoding)?;
                Ok(Some((tuple, rid)))
            }
            None => Ok(None),
        }
    }
}
