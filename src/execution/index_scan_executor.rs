use std::sync::Arc;

use crate::catalog::{Catalog, IndexInfo, TableInfo};
use crate::common::{RecordId, Result, SiltError};
use crate::index::BTreeIterator;
use crate::tuple::Tuple;

use super::Executor;

/// Key-range scan driven by a B+Tree index. Positions at the first key >=
/// `start_key` (or the smallest key), stops after the optional inclusive
/// `end_key`, and resolves every record id against the table heap.
pub struct IndexScanExecutor {
    table: Arc<TableInfo>,
    index: Arc<IndexInfo>,
    start_key: Option<u32>,
    end_key: Option<u32>,
    iter: Option<BTreeIterator>,
}

impl IndexScanExecutor {
    pub fn new(
        catalog: &Catalog,
        index_name: &str,
        start_key: Option<u32>,
        end_key: Option<u32>,
    ) -> Result<Self> {
        let index = catalog.index(index_name)?;
        let table = catalog.table(&index.table_name)?;
        Ok(Self {
            table,
            index,
            start_key,
            end_key,
            iter: None,
        })
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(match self.start_key {
            Some(key) => self.index.tree.iter_from(key)?,
            None => self.index.tree.iter()?,
        });
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let entry = match self.iter.as_mut() {
            Some(iter) => iter.next_entry()?,
            None => return Ok(None),
        };

        let Some((key, rid)) = entry else {
            self.iter = None;
            return Ok(None);
        };

        if let Some(end) = self.end_key {
            if key > end {
                self.iter = None;
                return Ok(None);
            }
        }

        let bytes = self.table.heap.get_tuple(rid)?;
        let tuple = Tuple::from_bytes(Arc::clone(&self.table.schema), &bytes)
            .ok_or(SiltError::TupleEncoding)?;
        Ok(Some((tuple, rid)))
    }
}
