use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::FrameHeader;

/// Callback invoked exactly once when a guard releases its page.
/// Receives the page id and whether the guard dirtied the page.
pub(crate) type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// State shared by all three guard flavors: the pin on the frame and the
/// deferred unpin callback. Dropping the core without a callback (after an
/// upgrade moved it out) is a no-op, which makes release idempotent.
struct GuardCore {
    page_id: PageId,
    frame: Arc<FrameHeader>,
    release: Option<ReleaseCallback>,
    is_dirty: bool,
}

impl GuardCore {
    fn new(page_id: PageId, frame: Arc<FrameHeader>, release: ReleaseCallback) -> Self {
        Self {
            page_id,
            frame,
            release: Some(release),
            is_dirty: false,
        }
    }

    fn release(&mut self) {
        if let Some(callback) = self.release.take() {
            callback(self.page_id, self.is_dirty);
        }
    }

    /// Moves the pin and callback out, leaving a disarmed core behind.
    fn transfer(&mut self) -> GuardCore {
        GuardCore {
            page_id: self.page_id,
            frame: Arc::clone(&self.frame),
            release: self.release.take(),
            is_dirty: self.is_dirty,
        }
    }
}

/// Scoped handle to a pinned page with no latch held.
/// Dropping it unpins the page; upgrading converts the pin into a latched
/// guard without ever letting go of it.
pub struct BasicPageGuard {
    core: GuardCore,
}

impl BasicPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, release: ReleaseCallback) -> Self {
        Self {
            core: GuardCore::new(page_id, frame, release),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    /// Converts this guard into a read guard, acquiring the page's shared
    /// latch. The pin is carried over.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        ReadPageGuard::from_core(self.core.transfer())
    }

    /// Converts this guard into a write guard, acquiring the page's
    /// exclusive latch. The pin is carried over.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        WritePageGuard::from_core(self.core.transfer())
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.core.release();
    }
}

/// Scoped handle to a pinned page holding the shared per-page latch.
/// Dropping it releases the latch and then the pin.
pub struct ReadPageGuard {
    core: GuardCore,
    data: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, release: ReleaseCallback) -> Self {
        Self::from_core(GuardCore::new(page_id, frame, release))
    }

    fn from_core(core: GuardCore) -> Self {
        // Safety: the guard borrows from the frame's RwLock. The 'static
        // lifetime is a lie the Arc in `core` makes true: the frame outlives
        // the lock guard because we hold it until the guard is dropped.
        let data = unsafe {
            std::mem::transmute::<
                RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>>,
                RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
            >(core.frame.data.read())
        };

        Self {
            core,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("latch held until drop")[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Latch first, pin second.
        self.data.take();
        self.core.release();
    }
}

/// Scoped handle to a pinned page holding the exclusive per-page latch.
/// Mutable access marks the page dirty; dropping releases the latch, then
/// unpins with the dirty hint.
pub struct WritePageGuard {
    core: GuardCore,
    data: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, release: ReleaseCallback) -> Self {
        Self::from_core(GuardCore::new(page_id, frame, release))
    }

    fn from_core(core: GuardCore) -> Self {
        // Safety: as in ReadPageGuard::from_core; the Arc keeps the frame
        // (and its RwLock) alive for the guard's whole lifetime.
        let data = unsafe {
            std::mem::transmute::<
                RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>>,
                RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>,
            >(core.frame.data.write())
        };

        Self {
            core,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("latch held until drop")[..]
    }

    /// Mutable view of the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.core.is_dirty = true;
        &mut self.data.as_mut().expect("latch held until drop")[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Latch first, pin second.
        self.data.take();
        self.core.release();
    }
}
