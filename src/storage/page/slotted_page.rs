use crate::common::{PageId, Result, SiltError, SlotId, PAGE_SIZE};

/// Slotted page layout:
///
/// +------------------+
/// | Page Header      |  (HEADER_SIZE bytes)
/// +------------------+
/// | Slot Array       |  (grows downward)
/// +------------------+
/// | Free Space       |
/// +------------------+
/// | Tuple Data       |  (grows upward from the page end)
/// +------------------+
///
/// Each slot entry stores the tuple's offset and length as u16s. A length
/// of zero marks a tombstone: the slot stays allocated (so record ids of
/// later tuples never shift) but scans skip it.
const HEADER_SIZE: usize = 12;

const SLOT_SIZE: usize = 4;

const PAGE_ID_OFFSET: usize = 0;
const NUM_SLOTS_OFFSET: usize = 4;
const FREE_SPACE_START_OFFSET: usize = 6;
const FREE_SPACE_END_OFFSET: usize = 8;

/// A slot array entry
#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    /// Offset from the start of the page to the tuple bytes
    pub offset: u16,
    /// Length of the tuple (0 = tombstone)
    pub length: u16,
}

impl SlotEntry {
    pub fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }

    pub fn tombstone() -> Self {
        Self {
            offset: 0,
            length: 0,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.length == 0
    }
}

/// Mutable view interpreting a page buffer as a slotted page.
pub struct SlottedPage<'a> {
    pub(crate) data: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh slotted page with the given page ID.
    pub fn init(&mut self, page_id: PageId) {
        self.data.fill(0);
        self.set_page_id(page_id);
        self.set_num_slots(0);
        self.set_free_space_start(HEADER_SIZE as u16);
        self.set_free_space_end(PAGE_SIZE as u16);
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    fn set_page_id(&mut self, page_id: PageId) {
        write_u32(self.data, PAGE_ID_OFFSET, page_id.as_u32());
    }

    pub fn num_slots(&self) -> u16 {
        read_u16(self.data, NUM_SLOTS_OFFSET)
    }

    fn set_num_slots(&mut self, num_slots: u16) {
        write_u16(self.data, NUM_SLOTS_OFFSET, num_slots);
    }

    /// End of the slot array / start of the free region.
    pub fn free_space_start(&self) -> u16 {
        read_u16(self.data, FREE_SPACE_START_OFFSET)
    }

    pub(crate) fn set_free_space_start(&mut self, offset: u16) {
        write_u16(self.data, FREE_SPACE_START_OFFSET, offset);
    }

    /// Start of the tuple data region / end of the free region.
    pub fn free_space_end(&self) -> u16 {
        read_u16(self.data, FREE_SPACE_END_OFFSET)
    }

    fn set_free_space_end(&mut self, offset: u16) {
        write_u16(self.data, FREE_SPACE_END_OFFSET, offset);
    }

    pub fn free_space(&self) -> usize {
        (self.free_space_end() as usize).saturating_sub(self.free_space_start() as usize)
    }

    /// Whether a tuple of the given size fits (data plus a new slot entry).
    pub fn can_insert(&self, tuple_size: usize) -> bool {
        self.free_space() >= tuple_size + SLOT_SIZE
    }

    fn slot_offset(&self, slot: u16) -> usize {
        (self.free_space_start() as usize) - (self.num_slots() as usize - slot as usize) * SLOT_SIZE
    }

    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        let slot = slot_id.as_u16();
        if slot >= self.num_slots() {
            return None;
        }
        let offset = self.slot_offset(slot);
        Some(SlotEntry::new(
            read_u16(self.data, offset),
            read_u16(self.data, offset + 2),
        ))
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        let offset = self.slot_offset(slot_id.as_u16());
        write_u16(self.data, offset, entry.offset);
        write_u16(self.data, offset + 2, entry.length);
    }

    /// Appends a tuple, claiming a fresh slot. Slots are never reused, so a
    /// record id stays valid (or tombstoned) for the page's lifetime.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotId> {
        let tuple_size = tuple.len();

        if !self.can_insert(tuple_size) {
            return Err(SiltError::PageOverflow {
                tuple_size,
                available: self.free_space().saturating_sub(SLOT_SIZE),
            });
        }

        let slot_id = SlotId::new(self.num_slots());
        self.set_num_slots(slot_id.as_u16() + 1);
        self.set_free_space_start(self.free_space_start() + SLOT_SIZE as u16);

        let tuple_offset = self.free_space_end() - tuple_size as u16;
        self.data[tuple_offset as usize..tuple_offset as usize + tuple_size]
            .copy_from_slice(tuple);
        self.set_free_space_end(tuple_offset);

        self.set_slot(slot_id, SlotEntry::new(tuple_offset, tuple_size as u16));

        Ok(slot_id)
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(SiltError::InvalidSlotId(slot_id.as_u16()))?;

        if entry.is_tombstone() {
            return Err(SiltError::EmptySlot(slot_id.as_u16()));
        }

        let start = entry.offset as usize;
        Ok(&self.data[start..start + entry.length as usize])
    }

    /// Tombstones a tuple. The bytes stay where they are; only the slot is
    /// marked dead.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<()> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(SiltError::InvalidSlotId(slot_id.as_u16()))?;
        if entry.is_tombstone() {
            return Err(SiltError::EmptySlot(slot_id.as_u16()));
        }

        self.set_slot(slot_id, SlotEntry::tombstone());
        Ok(())
    }

    /// Number of live (non-tombstone) tuples.
    pub fn tuple_count(&self) -> usize {
        (0..self.num_slots())
            .filter(|&i| {
                self.get_slot(SlotId::new(i))
                    .map(|e| !e.is_tombstone())
                    .unwrap_or(false)
            })
            .count()
    }
}

/// Read-only view of a slotted page.
pub struct SlottedPageRef<'a> {
    pub(crate) data: &'a [u8],
}

impl<'a> SlottedPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn num_slots(&self) -> u16 {
        read_u16(self.data, NUM_SLOTS_OFFSET)
    }

    fn slot_offset(&self, slot: u16) -> usize {
        let start = read_u16(self.data, FREE_SPACE_START_OFFSET) as usize;
        start - (self.num_slots() as usize - slot as usize) * SLOT_SIZE
    }

    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        let slot = slot_id.as_u16();
        if slot >= self.num_slots() {
            return None;
        }
        let offset = self.slot_offset(slot);
        Some(SlotEntry::new(
            read_u16(self.data, offset),
            read_u16(self.data, offset + 2),
        ))
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(SiltError::InvalidSlotId(slot_id.as_u16()))?;

        if entry.is_tombstone() {
            return Err(SiltError::EmptySlot(slot_id.as_u16()));
        }

        let start = entry.offset as usize;
        Ok(&self.data[start..start + entry.length as usize])
    }

    pub fn tuple_count(&self) -> usize {
        (0..self.num_slots())
            .filter(|&i| {
                self.get_slot(SlotId::new(i))
                    .map(|e| !e.is_tombstone())
                    .unwrap_or(false)
            })
            .count()
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slotted_page_init() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut data);
        page.init(PageId::new(1));

        assert_eq!(page.page_id(), PageId::new(1));
        assert_eq!(page.num_slots(), 0);
        assert_eq!(page.free_space_start(), HEADER_SIZE as u16);
        assert_eq!(page.free_space_end(), PAGE_SIZE as u16);
    }

    #[test]
    fn test_slotted_page_insert_and_get() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut data);
        page.init(PageId::new(1));

        let tuple = b"Hello, World!";
        let slot_id = page.insert_tuple(tuple).unwrap();

        assert_eq!(slot_id, SlotId::new(0));
        assert_eq!(page.num_slots(), 1);
        assert_eq!(page.get_tuple(slot_id).unwrap(), tuple);
    }

    #[test]
    fn test_slotted_page_multiple_inserts() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut data);
        page.init(PageId::new(1));

        let tuples = [b"First".as_slice(), b"Second", b"Third"];
        let mut slot_ids = Vec::new();

        for tuple in &tuples {
            slot_ids.push(page.insert_tuple(tuple).unwrap());
        }

        assert_eq!(page.num_slots(), 3);
        assert_eq!(page.tuple_count(), 3);

        for (i, tuple) in tuples.iter().enumerate() {
            assert_eq!(page.get_tuple(slot_ids[i]).unwrap(), *tuple);
        }
    }

    #[test]
    fn test_slotted_page_delete_is_tombstone() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut data);
        page.init(PageId::new(1));

        let slot1 = page.insert_tuple(b"First").unwrap();
        let slot2 = page.insert_tuple(b"Second").unwrap();

        page.delete_tuple(slot1).unwrap();
        assert_eq!(page.tuple_count(), 1);
        assert!(page.get_tuple(slot1).is_err());

        // Slots are never reused; the next insert gets a fresh one and the
        // survivor is untouched.
        let slot3 = page.insert_tuple(b"Third").unwrap();
        assert_eq!(slot3, SlotId::new(2));
        assert_eq!(page.get_tuple(slot2).unwrap(), b"Second");

        assert!(page.delete_tuple(slot1).is_err());
    }

    #[test]
    fn test_slotted_page_full() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = SlottedPage::new(&mut data);
        page.init(PageId::new(1));

        let large_tuple = [0u8; 1000];
        let mut count = 0;

        while page.can_insert(large_tuple.len()) {
            page.insert_tuple(&large_tuple).unwrap();
            count += 1;
        }

        assert!(count > 0);
        assert!(page.insert_tuple(&large_tuple).is_err());
    }

    #[test]
    fn test_slotted_page_ref() {
        let mut data = [0u8; PAGE_SIZE];
        {
            let mut page = SlottedPage::new(&mut data);
            page.init(PageId::new(1));
            page.insert_tuple(b"Test").unwrap();
        }

        let page_ref = SlottedPageRef::new(&data);
        assert_eq!(page_ref.page_id(), PageId::new(1));
        assert_eq!(page_ref.tuple_count(), 1);
        assert_eq!(page_ref.get_tuple(SlotId::new(0)).unwrap(), b"Test");
    }
}
