use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result, SlotId};

use super::page::{TablePage, TablePageRef};

/// A table heap: a singly linked chain of table pages. Inserts append to
/// the tail, deletes tombstone in place, and scans walk the chain from the
/// head skipping tombstones.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    first_page_id: PageId,
    /// Tail of the page chain; inserts serialize on this lock
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates a heap with one empty page.
    pub fn new(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let mut guard = bpm.new_page()?.upgrade_write();
        let first_page_id = guard.page_id();
        TablePage::new(guard.data_mut()).init(first_page_id);
        drop(guard);

        Ok(Self {
            bpm,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    /// Reopens a heap persisted earlier, walking the chain to find its tail.
    pub fn open(bpm: Arc<BufferPoolManager>, first_page_id: PageId) -> Result<Self> {
        let mut last = first_page_id;
        loop {
            let guard = bpm.fetch_page_read(last)?;
            match TablePageRef::new(guard.data()).next_page_id() {
                Some(next) => last = next,
                None => break,
            }
        }

        Ok(Self {
            bpm,
            first_page_id,
            last_page_id: Mutex::new(last),
        })
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple, rolling over to a freshly allocated page when the
    /// tail is full.
    pub fn insert_tuple(&self, tuple: &[u8]) -> Result<RecordId> {
        let mut last_page_id = self.last_page_id.lock();

        let mut guard = self.bpm.fetch_page_write(*last_page_id)?;
        {
            let mut page = TablePage::new(guard.data_mut());
            if page.can_insert(tuple.len()) {
                return page.insert_tuple(tuple);
            }
        }

        let mut new_guard = self.bpm.new_page()?.upgrade_write();
        let new_page_id = new_guard.page_id();
        let rid = {
            let mut new_page = TablePage::new(new_guard.data_mut());
            new_page.init(new_page_id);
            new_page.insert_tuple(tuple)?
        };

        TablePage::new(guard.data_mut()).set_next_page_id(Some(new_page_id));
        *last_page_id = new_page_id;

        Ok(rid)
    }

    pub fn get_tuple(&self, rid: RecordId) -> Result<Vec<u8>> {
        let guard = self.bpm.fetch_page_read(rid.page_id)?;
        let page = TablePageRef::new(guard.data());
        Ok(page.get_tuple(rid.slot_id)?.to_vec())
    }

    /// Tombstones a tuple; its record id stays dead forever.
    pub fn delete_tuple(&self, rid: RecordId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(rid.page_id)?;
        TablePage::new(guard.data_mut()).delete_tuple(rid.slot_id)
    }

    /// Iterator over live tuples in chain order.
    pub fn iter(&self) -> TableIterator {
        TableIterator {
            bpm: Arc::clone(&self.bpm),
            current_page_id: Some(self.first_page_id),
            next_slot: 0,
        }
    }
}

/// Pull-based scan over a table heap. Latches one page at a time, so
/// concurrent appends past the scan position are picked up and tombstones
/// are skipped.
pub struct TableIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: Option<PageId>,
    next_slot: u16,
}

impl TableIterator {
    /// Yields the next live tuple, or None at the end of the chain.
    pub fn next_tuple(&mut self) -> Result<Option<(RecordId, Vec<u8>)>> {
        while let Some(page_id) = self.current_page_id {
            let next_page = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let page = TablePageRef::new(guard.data());

                while self.next_slot < page.num_slots() {
                    let slot_id = SlotId::new(self.next_slot);
                    self.next_slot += 1;
                    if page.is_live(slot_id) {
                        let rid = RecordId::new(page_id, slot_id);
                        return Ok(Some((rid, page.get_tuple(slot_id)?.to_vec())));
                    }
                }

                page.next_page_id()
            };

            self.current_page_id = next_page;
            self.next_slot = 0;
        }

        Ok(None)
    }
}

impl Iterator for TableIterator {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_tuple() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
