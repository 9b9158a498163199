use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, SiltError, PAGE_SIZE};
use crate::storage::disk::DiskManager;

use super::page_guard::ReleaseCallback;
use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Bookkeeping mutated under the pool latch.
struct PoolInner {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently hosting any page
    free_list: VecDeque<FrameId>,
    /// Monotonic page id allocator
    next_page_id: u32,
}

/// State shared between the manager and the guards it hands out.
struct PoolState {
    /// The buffer pool frames; the Vec is never resized, so frame
    /// references stay valid for the pool's lifetime
    frames: Vec<Arc<FrameHeader>>,
    /// The pool latch: linearizes pin/unpin/evict/new/delete
    inner: Mutex<PoolInner>,
    /// LRU-K replacer, only ever consulted while the pool latch is held
    replacer: LruKReplacer,
    /// Page store; misses and write-backs block on it with the pool latch
    /// held
    disk_manager: Arc<DiskManager>,
}

impl PoolState {
    /// Decrements a page's pin count, ORs in the dirty hint, and hands the
    /// frame to the replacer once the last pin is gone. Returns false if the
    /// page is not resident or not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.set_evictable(frame_id, true);
                }
                true
            }
        }
    }
}

/// BufferPoolManager keeps the hottest disk pages resident in a fixed set
/// of frames. It guarantees at most one frame per page, delegates victim
/// selection to the LRU-K replacer, and hands out RAII guards that pin a
/// page for their lifetime.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<PoolState>,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value for
    /// LRU-K, and disk manager.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        // Resume allocation after the pages already in the file.
        let next_page_id = disk_manager.num_pages().unwrap_or(0);

        let state = Arc::new(PoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
                next_page_id,
            }),
            replacer: LruKReplacer::new(k, pool_size),
            disk_manager,
        });

        Self { pool_size, state }
    }

    /// Allocates a fresh page and returns it pinned (pin count 1) as a basic
    /// guard. The page bytes start zeroed. Fails with `BufferPoolFull` when
    /// no free or evictable frame exists.
    pub fn new_page(&self) -> Result<BasicPageGuard> {
        let state = &self.state;
        let (page_id, frame) = {
            let mut inner = state.inner.lock();

            let frame_id = Self::acquire_frame(state, &mut inner)?;
            let page_id = PageId::new(inner.next_page_id);
            inner.next_page_id += 1;

            let frame = &state.frames[frame_id.as_usize()];
            frame.set_page_id(page_id);
            frame.pin();

            inner.page_table.insert(page_id, frame_id);
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);

            (page_id, Arc::clone(frame))
        };

        Ok(BasicPageGuard::new(page_id, frame, self.release_callback()))
    }

    /// Fetches a page and returns it pinned with no latch held.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame = self.fetch_frame(page_id)?;
        Ok(BasicPageGuard::new(page_id, frame, self.release_callback()))
    }

    /// Fetches a page pinned and holding its shared latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.fetch_frame(page_id)?;
        Ok(ReadPageGuard::new(page_id, frame, self.release_callback()))
    }

    /// Fetches a page pinned and holding its exclusive latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.fetch_frame(page_id)?;
        Ok(WritePageGuard::new(page_id, frame, self.release_callback()))
    }

    /// Decrements a page's pin count and ORs in the dirty hint. Returns
    /// false if the page is not resident or already unpinned. Guards call
    /// this implicitly on drop; it is public for callers that manage pins by
    /// hand.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin_page(page_id, is_dirty)
    }

    /// Writes a page's current buffer to disk and clears its dirty bit,
    /// regardless of pin state. Returns false if the page is not resident.
    ///
    /// The pool latch is dropped before the page's shared latch is taken:
    /// a writer blocked on the pool latch may be holding that page latch,
    /// so holding both here would deadlock. Residency is revalidated after
    /// the latch is acquired.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(SiltError::InvalidPageId(page_id));
        }

        let frame = {
            let inner = self.state.inner.lock();
            let Some(&frame_id) = inner.page_table.get(&page_id) else {
                return Ok(false);
            };
            Arc::clone(&self.state.frames[frame_id.as_usize()])
        };

        self.flush_frame(page_id, &frame)
    }

    /// Flushes every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<(PageId, Arc<FrameHeader>)> = {
            let inner = self.state.inner.lock();
            inner
                .page_table
                .iter()
                .map(|(&page_id, &frame_id)| {
                    (page_id, Arc::clone(&self.state.frames[frame_id.as_usize()]))
                })
                .collect()
        };

        for (page_id, frame) in resident {
            if frame.is_dirty() {
                self.flush_frame(page_id, &frame)?;
            }
        }

        Ok(())
    }

    /// Writes one frame's image out, tolerating a concurrent eviction that
    /// rehomed the frame since the caller looked it up.
    fn flush_frame(&self, page_id: PageId, frame: &FrameHeader) -> Result<bool> {
        let data_guard = frame.data.read();
        if frame.page_id() != page_id {
            return Ok(false);
        }

        self.state.disk_manager.write_page(page_id, &data_guard[..])?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Drops a page from the pool: removes the page-table entry, deregisters
    /// the frame from the replacer, and returns it to the free list. Refuses
    /// pinned pages; returns false for pages that are not resident. The page
    /// id itself is not reused.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();

        let Some(frame_id) = inner.page_table.remove(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            inner.page_table.insert(page_id, frame_id);
            return Err(SiltError::PageStillPinned(page_id));
        }

        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        Ok(true)
    }

    /// Returns the pin count of a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Brings a page into the pool (if it is not already resident) and
    /// returns its frame, pinned.
    fn fetch_frame(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if !page_id.is_valid() {
            return Err(SiltError::InvalidPageId(page_id));
        }

        let state = &self.state;
        let mut inner = state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &state.frames[frame_id.as_usize()];
            frame.pin();
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            return Ok(Arc::clone(frame));
        }

        let frame_id = Self::acquire_frame(state, &mut inner)?;
        let frame = &state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = state.disk_manager.read_page(page_id, &mut data) {
            // The frame was already detached from its old page; hand it to
            // the free list so the pool stays consistent.
            inner.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        inner.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        Ok(Arc::clone(frame))
    }

    /// Finds a host frame: the free list first, then a replacer victim.
    /// A dirty victim is written back before its frame is recycled.
    fn acquire_frame(state: &PoolState, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = state.replacer.evict() else {
            return Err(SiltError::BufferPoolFull);
        };
        let frame = &state.frames[frame_id.as_usize()];
        assert_eq!(frame.pin_count(), 0, "evicted a pinned frame");

        let old_page_id = frame.page_id();
        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            if let Err(e) = state.disk_manager.write_page(old_page_id, &data) {
                // Put the victim back so a retry can still find it.
                state.replacer.record_access(frame_id);
                state.replacer.set_evictable(frame_id, true);
                return Err(e);
            }
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }

    fn release_callback(&self) -> ReleaseCallback {
        let state = Arc::clone(&self.state);
        Box::new(move |page_id, is_dirty| {
            state.unpin_page(page_id, is_dirty);
        })
    }
}
