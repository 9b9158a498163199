use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Tracks access history for a single frame
#[derive(Debug, Default)]
struct LruKNode {
    /// History of access timestamps (oldest at the front, at most k entries)
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
    /// Position inside whichever heap currently hosts the node.
    /// Only meaningful while `is_evictable` is set.
    heap_pos: usize,
}

/// A binary min-heap of (timestamp key, frame id) pairs that writes each
/// frame's position back into its node, so arbitrary entries can be removed
/// in O(log n).
///
/// The key is `history.front()` at insertion time: for a frame with fewer
/// than k accesses that is its first access ever, for a frame with exactly k
/// accesses it is the k-th most recent one. Either way the smallest key is
/// the next victim, and the key never changes while the entry is in the heap
/// (accesses reposition the node by remove + push).
#[derive(Debug, Default)]
struct LruHeap {
    entries: Vec<(Timestamp, FrameId)>,
}

impl LruHeap {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, key: Timestamp, frame_id: FrameId, nodes: &mut HashMap<FrameId, LruKNode>) {
        let i = self.entries.len();
        self.entries.push((key, frame_id));
        Self::set_pos(nodes, frame_id, i);
        self.sift_up(i, nodes);
    }

    /// Removes the entry at position `i`, filling the hole with the last
    /// entry and re-sifting it.
    fn remove(&mut self, i: usize, nodes: &mut HashMap<FrameId, LruKNode>) {
        let last = self.entries.len() - 1;
        assert!(i <= last, "heap index out of range");
        self.entries.swap(i, last);
        self.entries.pop();
        if i < self.entries.len() {
            Self::set_pos(nodes, self.entries[i].1, i);
            self.sift_down(i, nodes);
            self.sift_up(i, nodes);
        }
    }

    fn pop(&mut self, nodes: &mut HashMap<FrameId, LruKNode>) -> Option<FrameId> {
        if self.entries.is_empty() {
            return None;
        }
        let frame_id = self.entries[0].1;
        self.remove(0, nodes);
        Some(frame_id)
    }

    fn sift_up(&mut self, mut i: usize, nodes: &mut HashMap<FrameId, LruKNode>) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.entries[parent].0 <= self.entries[i].0 {
                return;
            }
            self.entries.swap(parent, i);
            Self::set_pos(nodes, self.entries[i].1, i);
            Self::set_pos(nodes, self.entries[parent].1, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize, nodes: &mut HashMap<FrameId, LruKNode>) {
        loop {
            let mut smallest = i;
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            if left < self.entries.len() && self.entries[left].0 < self.entries[smallest].0 {
                smallest = left;
            }
            if right < self.entries.len() && self.entries[right].0 < self.entries[smallest].0 {
                smallest = right;
            }
            if smallest == i {
                return;
            }
            self.entries.swap(i, smallest);
            Self::set_pos(nodes, self.entries[i].1, i);
            Self::set_pos(nodes, self.entries[smallest].1, smallest);
            i = smallest;
        }
    }

    fn set_pos(nodes: &mut HashMap<FrameId, LruKNode>, frame_id: FrameId, pos: usize) {
        nodes
            .get_mut(&frame_id)
            .expect("heap entry references an untracked frame")
            .heap_pos = pos;
    }
}

#[derive(Debug, Default)]
struct ReplacerInner {
    /// Logical clock, bumped on every recorded access
    current_timestamp: Timestamp,
    /// Number of evictable frames
    curr_size: usize,
    /// Access bookkeeping for every tracked frame
    nodes: HashMap<FrameId, LruKNode>,
    /// Evictable frames with fewer than k recorded accesses,
    /// keyed by first access (+inf backward k-distance, LRU tie-break)
    cold_heap: LruHeap,
    /// Evictable frames with exactly k recorded accesses,
    /// keyed by the k-th most recent access
    hot_heap: LruHeap,
}

/// LRU-K replacement policy.
///
/// Evicts the frame whose backward k-distance (time since the k-th most
/// recent access) is largest. Frames with fewer than k recorded accesses
/// have +inf distance and are always preferred as victims; among those, the
/// frame with the earliest first access wins. Both orders are maintained as
/// binary heaps so every operation is O(log n).
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    num_frames: usize,
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer for `num_frames` frames.
    pub fn new(k: usize, num_frames: usize) -> Self {
        assert!(k > 0, "k must be at least 1");
        Self {
            k,
            num_frames,
            inner: Mutex::new(ReplacerInner::default()),
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance and
    /// drops its access history. Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.curr_size == 0 {
            return None;
        }

        let victim = if inner.cold_heap.len() > 0 {
            inner.cold_heap.pop(&mut inner.nodes)
        } else {
            inner.hot_heap.pop(&mut inner.nodes)
        };
        let frame_id = victim?;

        inner.nodes.remove(&frame_id);
        inner.curr_size -= 1;
        Some(frame_id)
    }

    /// Records an access to the given frame at the current logical
    /// timestamp, creating its history on first sight. An evictable frame is
    /// repositioned in (or migrated between) the heaps.
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id out of range"
        );

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let timestamp = inner.current_timestamp;
        inner.current_timestamp += 1;

        let node = inner.nodes.entry(frame_id).or_default();
        let was_cold = node.history.len() < self.k;
        let is_evictable = node.is_evictable;
        let pos = node.heap_pos;

        node.history.push_back(timestamp);
        while node.history.len() > self.k {
            node.history.pop_front();
        }
        let key = *node.history.front().expect("history cannot be empty");
        let now_cold = node.history.len() < self.k;

        if is_evictable {
            let heap = if was_cold {
                &mut inner.cold_heap
            } else {
                &mut inner.hot_heap
            };
            heap.remove(pos, &mut inner.nodes);

            let heap = if now_cold {
                &mut inner.cold_heap
            } else {
                &mut inner.hot_heap
            };
            heap.push(key, frame_id, &mut inner.nodes);
        }
    }

    /// Sets whether a frame is evictable, inserting it into or removing it
    /// from its heap and adjusting the replacer size. No-op if the flag is
    /// unchanged. The frame must have been seen by `record_access` first.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        assert!(
            frame_id.as_usize() < self.num_frames,
            "frame id out of range"
        );

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let node = inner
            .nodes
            .get_mut(&frame_id)
            .expect("frame is not tracked by the replacer");
        if node.is_evictable == is_evictable {
            return;
        }
        node.is_evictable = is_evictable;

        let cold = node.history.len() < self.k;
        let key = *node.history.front().expect("history cannot be empty");
        let pos = node.heap_pos;

        let heap = if cold {
            &mut inner.cold_heap
        } else {
            &mut inner.hot_heap
        };
        if is_evictable {
            heap.push(key, frame_id, &mut inner.nodes);
            inner.curr_size += 1;
        } else {
            heap.remove(pos, &mut inner.nodes);
            inner.curr_size -= 1;
        }
    }

    /// Removes an evictable frame from the replacer entirely, along with its
    /// access history. Silently returns if the frame is not tracked; aborts
    /// if it is tracked but non-evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(node) = inner.nodes.get(&frame_id) else {
            return;
        };
        assert!(node.is_evictable, "can't remove a non-evictable frame");

        let cold = node.history.len() < self.k;
        let pos = node.heap_pos;

        let heap = if cold {
            &mut inner.cold_heap
        } else {
            &mut inner.hot_heap
        };
        heap.remove(pos, &mut inner.nodes);
        inner.nodes.remove(&frame_id);
        inner.curr_size -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().curr_size
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
