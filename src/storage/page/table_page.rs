use crate::common::{PageId, RecordId, Result, SlotId};

use super::slotted_page::{SlottedPage, SlottedPageRef};

/// Table page header layout (after the slotted page header):
///
/// | Field        | Offset | Size |
/// |--------------|--------|------|
/// | next_page_id | 12     | 4    |
///
/// Table pages form a singly linked list in insertion order; the table heap
/// appends to the tail and scans from the head.
const NEXT_PAGE_ID_OFFSET: usize = 12;
const TABLE_HEADER_SIZE: usize = NEXT_PAGE_ID_OFFSET + 4;

const INVALID_PAGE: u32 = u32::MAX;

/// TablePage extends SlottedPage with the heap's page chaining.
pub struct TablePage<'a> {
    inner: SlottedPage<'a>,
}

impl<'a> TablePage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            inner: SlottedPage::new(data),
        }
    }

    /// Initializes a fresh table page.
    pub fn init(&mut self, page_id: PageId) {
        self.inner.init(page_id);
        // Push the free region past the extended header
        self.inner.set_free_space_start(TABLE_HEADER_SIZE as u16);
        self.set_next_page_id(None);
    }

    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        let bytes: [u8; 4] = self.inner.data[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        let value = u32::from_le_bytes(bytes);
        if value == INVALID_PAGE {
            None
        } else {
            Some(PageId::new(value))
        }
    }

    pub fn set_next_page_id(&mut self, page_id: Option<PageId>) {
        let value = page_id.map(|p| p.as_u32()).unwrap_or(INVALID_PAGE);
        self.inner.data[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4]
            .copy_from_slice(&value.to_le_bytes());
    }

    /// Inserts a tuple and returns its record ID.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<RecordId> {
        let slot_id = self.inner.insert_tuple(tuple)?;
        Ok(RecordId::new(self.page_id(), slot_id))
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        self.inner.get_tuple(slot_id)
    }

    /// Tombstones a tuple.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        self.inner.delete_tuple(slot_id)
    }

    pub fn can_insert(&self, tuple_size: usize) -> bool {
        self.inner.can_insert(tuple_size)
    }

    pub fn tuple_count(&self) -> usize {
        self.inner.tuple_count()
    }
}

/// Read-only view of a table page.
pub struct TablePageRef<'a> {
    inner: SlottedPageRef<'a>,
}

impl<'a> TablePageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: SlottedPageRef::new(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.inner.page_id()
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        let bytes: [u8; 4] = self.inner.data[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        let value = u32::from_le_bytes(bytes);
        if value == INVALID_PAGE {
            None
        } else {
            Some(PageId::new(value))
        }
    }

    pub fn num_slots(&self) -> u16 {
        self.inner.num_slots()
    }

    /// Whether the slot exists and is not a tombstone.
    pub fn is_live(&self, slot_id: SlotId) -> bool {
        self.inner
            .get_slot(slot_id)
            .map(|e| !e.is_tombstone())
            .unwrap_or(false)
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        self.inner.get_tuple(slot_id)
    }

    pub fn tuple_count(&self) -> usize {
        self.inner.tuple_count()
    }
}
