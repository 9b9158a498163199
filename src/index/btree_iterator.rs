use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{RecordId, Result};

use super::btree_page::BTreeNodeRef;

/// Forward scan over the tree's leaves in key order.
///
/// The iterator keeps a read latch on its current leaf for as long as it is
/// positioned there, so structural changes to that leaf are blocked while
/// plain readers proceed. Crossing a leaf boundary latches the successor
/// before the current leaf is released.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    leaf: Option<ReadPageGuard>,
    index: usize,
}

impl BTreeIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, leaf: ReadPageGuard, index: usize) -> Self {
        Self {
            bpm,
            leaf: Some(leaf),
            index,
        }
    }

    /// An exhausted iterator; compares positionally equal to any iterator
    /// that has run off the last leaf.
    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            leaf: None,
            index: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.leaf.is_none()
    }

    /// Yields the current entry and advances, following `next_page_id`
    /// across leaf boundaries.
    pub fn next_entry(&mut self) -> Result<Option<(u32, RecordId)>> {
        loop {
            let Some(guard) = &self.leaf else {
                return Ok(None);
            };

            let next_page = {
                let node = BTreeNodeRef::new(guard.data());
                if self.index < node.size() {
                    let entry = (node.key_at(self.index), node.rid_at(self.index));
                    self.index += 1;
                    return Ok(Some(entry));
                }
                node.next_page_id()
            };

            match next_page {
                Some(pid) => {
                    // Latch the successor before letting go of this leaf.
                    let next = self.bpm.fetch_page_read(pid)?;
                    self.leaf = Some(next);
                    self.index = 0;
                }
                None => {
                    self.leaf = None;
                    return Ok(None);
                }
            }
        }
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
