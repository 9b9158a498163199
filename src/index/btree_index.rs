use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{PageId, RecordId, Result};

use super::btree_iterator::BTreeIterator;
use super::btree_page::{
    internal_capacity, leaf_capacity, BTreeHeaderPage, BTreeHeaderPageRef, BTreeNode, BTreeNodeRef,
};

/// A concurrent B+Tree index mapping unique u32 keys to record ids.
///
/// The tree lives entirely in buffer-pool pages. A dedicated header page
/// holds the root pointer and doubles as the serialization point for
/// structure changes: mutations write-latch it first and keep it latched
/// until the descent proves the root cannot change.
///
/// Latching protocol (crabbing): descents acquire page latches strictly
/// top-down along one root-to-leaf path. Writers stack their guards and
/// release the whole stack as soon as the current node is *safe* - below
/// max for inserts, above min for deletes - because no split or merge can
/// propagate past a safe node. Sibling latches for borrow/merge are only
/// taken while the parent is latched.
pub struct BPlusTree {
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree {
    /// Creates a new empty tree, allocating its header page.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        assert!((2..=leaf_capacity()).contains(&leaf_max_size));
        assert!((3..=internal_capacity()).contains(&internal_max_size));

        let mut header_wg = bpm.new_page()?.upgrade_write();
        let header_page_id = header_wg.page_id();
        BTreeHeaderPage::new(header_wg.data_mut()).init();
        drop(header_wg);

        Ok(Self {
            header_page_id,
            bpm,
            leaf_max_size,
            internal_max_size,
        })
    }

    /// Creates a tree with page-capacity fan-outs.
    pub fn with_default_sizes(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        Self::new(bpm, leaf_capacity(), internal_capacity())
    }

    /// Reopens a tree whose header page already exists.
    pub fn open(
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        Self {
            header_page_id,
            bpm,
            leaf_max_size,
            internal_max_size,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Current root page id, if the tree is non-empty.
    pub fn root_page_id(&self) -> Result<Option<PageId>> {
        let header_rg = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(BTreeHeaderPageRef::new(header_rg.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root_page_id()?.is_none())
    }

    /// Point lookup. Read-latch coupling: the child is latched before the
    /// parent is released.
    pub fn get(&self, key: u32) -> Result<Option<RecordId>> {
        let header_rg = self.bpm.fetch_page_read(self.header_page_id)?;
        let Some(root) = BTreeHeaderPageRef::new(header_rg.data()).root_page_id() else {
            return Ok(None);
        };

        let mut guard = self.bpm.fetch_page_read(root)?;
        drop(header_rg);

        loop {
            let child = {
                let node = BTreeNodeRef::new(guard.data());
                if node.is_leaf() {
                    let (index, found) = node.leaf_index_of_first_ge(key);
                    return Ok(if found { Some(node.rid_at(index)) } else { None });
                }
                node.internal_lookup(key).0
            };
            let next = self.bpm.fetch_page_read(child)?;
            guard = next;
        }
    }

    /// Inserts a key/rid pair. Returns false (leaving the tree untouched)
    /// if the key is already present.
    pub fn insert(&self, key: u32, rid: RecordId) -> Result<bool> {
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root = BTreeHeaderPageRef::new(header.data()).root_page_id();
        let mut header_wg = Some(header);

        // Empty tree: the first leaf becomes the root.
        let Some(mut pid) = root else {
            let mut leaf_wg = self.bpm.new_page()?.upgrade_write();
            let leaf_pid = leaf_wg.page_id();
            {
                let mut node = BTreeNode::new(leaf_wg.data_mut());
                node.init_leaf(self.leaf_max_size);
                node.leaf_insert_at(0, key, rid);
            }
            let mut header = header_wg.take().expect("header guard is still held");
            BTreeHeaderPage::new(header.data_mut()).set_root_page_id(Some(leaf_pid));
            return Ok(true);
        };

        let mut guards: VecDeque<WritePageGuard> = VecDeque::new();
        let mut indexes: VecDeque<usize> = VecDeque::new();

        loop {
            let wg = self.bpm.fetch_page_write(pid)?;
            let node = BTreeNodeRef::new(wg.data());
            let safe = node.size() < node.max_size();
            let next = if node.is_leaf() {
                None
            } else {
                Some(node.internal_lookup(key))
            };

            if safe {
                // No split can propagate above this node.
                header_wg = None;
                guards.clear();
                indexes.clear();
            }
            guards.push_back(wg);

            match next {
                None => break,
                Some((child, index)) => {
                    indexes.push_back(index);
                    pid = child;
                }
            }
        }

        let mut leaf_wg = guards.pop_back().expect("descent always ends at a leaf");
        let (index, found, leaf_size, leaf_max) = {
            let node = BTreeNodeRef::new(leaf_wg.data());
            let (index, found) = node.leaf_index_of_first_ge(key);
            (index, found, node.size(), node.max_size())
        };

        if found {
            return Ok(false);
        }

        if leaf_size < leaf_max {
            BTreeNode::new(leaf_wg.data_mut()).leaf_insert_at(index, key, rid);
            return Ok(true);
        }

        // Split the leaf and insert into the proper half.
        let mut new_wg = self.bpm.new_page()?.upgrade_write();
        let new_pid = new_wg.page_id();
        let mut last = leaf_wg.page_id();
        let (mut up_key, mut up_pid) = {
            let mut cur = BTreeNode::new(leaf_wg.data_mut());
            let mut new_node = BTreeNode::new(new_wg.data_mut());
            new_node.init_leaf(self.leaf_max_size);
            cur.move_half_to(&mut new_node);
            new_node.set_next_page_id(cur.next_page_id());
            cur.set_next_page_id(Some(new_pid));
            if index <= cur.size() {
                cur.leaf_insert_at(index, key, rid);
            } else {
                new_node.leaf_insert_at(index - cur.size(), key, rid);
            }
            (new_node.key_at(0), new_pid)
        };
        drop(new_wg);
        drop(leaf_wg);

        // Propagate the separator up the retained ancestors.
        while let Some(mut wg) = guards.pop_back() {
            let child_index = indexes.pop_back().expect("index stack mirrors guard stack");
            let (size, max) = {
                let node = BTreeNodeRef::new(wg.data());
                (node.size(), node.max_size())
            };

            if size < max {
                BTreeNode::new(wg.data_mut()).internal_insert_at(child_index + 1, up_key, up_pid);
                return Ok(true);
            }

            last = wg.page_id();
            let mut new_wg = self.bpm.new_page()?.upgrade_write();
            let new_internal_pid = new_wg.page_id();
            {
                let mut cur = BTreeNode::new(wg.data_mut());
                let mut new_node = BTreeNode::new(new_wg.data_mut());
                new_node.init_internal(self.internal_max_size);
                cur.move_half_to(&mut new_node);
                if child_index < cur.size() {
                    cur.internal_insert_at(child_index + 1, up_key, up_pid);
                } else {
                    new_node.internal_insert_at(child_index - cur.size() + 1, up_key, up_pid);
                }
                // Tiny fan-outs can leave the new node below minimum.
                if new_node.size() < new_node.min_size() {
                    cur.move_last_to_front_of(&mut new_node);
                }
                up_key = new_node.key_at(0);
            }
            up_pid = new_internal_pid;
        }

        // The split escaped the root: grow the tree by one level.
        let mut root_wg = self.bpm.new_page()?.upgrade_write();
        let root_pid = root_wg.page_id();
        BTreeNode::new(root_wg.data_mut()).init_internal_root(
            self.internal_max_size,
            last,
            up_key,
            up_pid,
        );
        let mut header = header_wg
            .take()
            .expect("header guard is held whenever the root can change");
        BTreeHeaderPage::new(header.data_mut()).set_root_page_id(Some(root_pid));
        Ok(true)
    }

    /// Removes a key. Absent keys are a no-op.
    pub fn remove(&self, key: u32) -> Result<()> {
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root = BTreeHeaderPageRef::new(header.data()).root_page_id();
        let mut header_wg = Some(header);

        let Some(mut pid) = root else {
            return Ok(());
        };

        let mut guards: VecDeque<WritePageGuard> = VecDeque::new();
        let mut indexes: VecDeque<usize> = VecDeque::new();

        loop {
            let wg = self.bpm.fetch_page_write(pid)?;
            let node = BTreeNodeRef::new(wg.data());
            let safe = node.size() > node.min_size();
            let next = if node.is_leaf() {
                None
            } else {
                Some(node.internal_lookup(key))
            };

            if safe {
                // No merge or borrow can propagate above this node.
                header_wg = None;
                guards.clear();
                indexes.clear();
            }
            guards.push_back(wg);

            match next {
                None => break,
                Some((child, index)) => {
                    indexes.push_back(index);
                    pid = child;
                }
            }
        }

        {
            let leaf_wg = guards.back_mut().expect("descent always ends at a leaf");
            let (index, found) = BTreeNodeRef::new(leaf_wg.data()).leaf_index_of_first_ge(key);
            if !found {
                return Ok(());
            }
            let mut node = BTreeNode::new(leaf_wg.data_mut());
            node.remove_at(index);
            if node.size() >= node.min_size() {
                return Ok(());
            }
        }

        // Repair the underflow, walking back up the retained ancestors.
        // Every node still on the stack was unsafe, so losing a child below
        // necessarily re-underflows it; a successful borrow stops the
        // cascade.
        while guards.len() >= 2 {
            let mut child = guards.pop_back().expect("stack length checked");
            let parent = guards.back_mut().expect("stack length checked");
            let child_index = indexes.pop_back().expect("index stack mirrors guard stack");

            if self.borrow_from_sibling(parent, &mut child, child_index)? {
                return Ok(());
            }
            self.merge_with_sibling(parent, &mut child, child_index)?;
        }

        // If the root emptied down to a single child, promote that child.
        if let Some(mut header) = header_wg.take() {
            let root_wg = guards.back().expect("root guard is retained");
            let node = BTreeNodeRef::new(root_wg.data());
            if !node.is_leaf() && node.size() == 1 {
                let new_root = node.child_at(0);
                BTreeHeaderPage::new(header.data_mut()).set_root_page_id(Some(new_root));
            }
        }

        Ok(())
    }

    /// Tries to refill an underflowed child from a sibling. Left sibling
    /// first, then right; a sibling lends only if it stays at or above
    /// minimum. Updates the parent separator and returns true on success.
    fn borrow_from_sibling(
        &self,
        parent: &mut WritePageGuard,
        child: &mut WritePageGuard,
        child_index: usize,
    ) -> Result<bool> {
        let parent_size = BTreeNodeRef::new(parent.data()).size();

        let mut candidates = [None, None];
        if child_index > 0 {
            candidates[0] = Some(child_index - 1);
        }
        if child_index + 1 < parent_size {
            candidates[1] = Some(child_index + 1);
        }

        for sibling_index in candidates.into_iter().flatten() {
            let sibling_pid = BTreeNodeRef::new(parent.data()).child_at(sibling_index);
            let mut sibling_wg = self.bpm.fetch_page_write(sibling_pid)?;
            if !BTreeNodeRef::new(sibling_wg.data()).can_borrow() {
                continue;
            }

            let mut parent_node = BTreeNode::new(parent.data_mut());
            let mut child_node = BTreeNode::new(child.data_mut());
            let mut sibling_node = BTreeNode::new(sibling_wg.data_mut());

            if sibling_index < child_index {
                sibling_node.move_last_to_front_of(&mut child_node);
                parent_node.set_key_at(child_index, child_node.key_at(0));
            } else {
                sibling_node.move_first_to_back_of(&mut child_node);
                parent_node.set_key_at(child_index + 1, sibling_node.key_at(0));
            }
            return Ok(true);
        }

        Ok(false)
    }

    /// Coalesces an underflowed child with a sibling, preferring the left
    /// one, and drops the dead child pointer from the parent. For internal
    /// merges the parent separator is first written into the right node's
    /// sentinel key slot so the merged node keeps a valid bound for every
    /// subtree. Leaves relink `next_page_id` instead.
    fn merge_with_sibling(
        &self,
        parent: &mut WritePageGuard,
        child: &mut WritePageGuard,
        child_index: usize,
    ) -> Result<()> {
        if child_index > 0 {
            // Merge the child into its left sibling.
            let (sibling_pid, separator) = {
                let parent_node = BTreeNodeRef::new(parent.data());
                (
                    parent_node.child_at(child_index - 1),
                    parent_node.key_at(child_index),
                )
            };
            let mut sibling_wg = self.bpm.fetch_page_write(sibling_pid)?;
            let mut sibling_node = BTreeNode::new(sibling_wg.data_mut());
            let mut child_node = BTreeNode::new(child.data_mut());

            if child_node.is_leaf() {
                sibling_node.set_next_page_id(child_node.next_page_id());
            } else {
                child_node.set_key_at(0, separator);
            }
            child_node.move_all_to(&mut sibling_node);
            BTreeNode::new(parent.data_mut()).remove_at(child_index);
        } else {
            // Leftmost child: pull the right sibling into it.
            let (sibling_pid, separator) = {
                let parent_node = BTreeNodeRef::new(parent.data());
                (
                    parent_node.child_at(child_index + 1),
                    parent_node.key_at(child_index + 1),
                )
            };
            let mut sibling_wg = self.bpm.fetch_page_write(sibling_pid)?;
            let mut sibling_node = BTreeNode::new(sibling_wg.data_mut());
            let mut child_node = BTreeNode::new(child.data_mut());

            if child_node.is_leaf() {
                child_node.set_next_page_id(sibling_node.next_page_id());
            } else {
                sibling_node.set_key_at(0, separator);
            }
            sibling_node.move_all_to(&mut child_node);
            BTreeNode::new(parent.data_mut()).remove_at(child_index + 1);
        }

        // TODO: hand merged-away pages back to the buffer pool free list
        Ok(())
    }

    /// Iterator positioned at the smallest key.
    pub fn iter(&self) -> Result<BTreeIterator> {
        let header_rg = self.bpm.fetch_page_read(self.header_page_id)?;
        let Some(root) = BTreeHeaderPageRef::new(header_rg.data()).root_page_id() else {
            return Ok(BTreeIterator::end(Arc::clone(&self.bpm)));
        };

        let mut guard = self.bpm.fetch_page_read(root)?;
        drop(header_rg);

        loop {
            let child = {
                let node = BTreeNodeRef::new(guard.data());
                if node.is_leaf() {
                    return Ok(BTreeIterator::new(Arc::clone(&self.bpm), guard, 0));
                }
                node.child_at(0)
            };
            let next = self.bpm.fetch_page_read(child)?;
            guard = next;
        }
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn iter_from(&self, key: u32) -> Result<BTreeIterator> {
        let header_rg = self.bpm.fetch_page_read(self.header_page_id)?;
        let Some(root) = BTreeHeaderPageRef::new(header_rg.data()).root_page_id() else {
            return Ok(BTreeIterator::end(Arc::clone(&self.bpm)));
        };

        let mut guard = self.bpm.fetch_page_read(root)?;
        drop(header_rg);

        loop {
            let child = {
                let node = BTreeNodeRef::new(guard.data());
                if node.is_leaf() {
                    let (index, _) = node.leaf_index_of_first_ge(key);
                    return Ok(BTreeIterator::new(Arc::clone(&self.bpm), guard, index));
                }
                node.internal_lookup(key).0
            };
            let next = self.bpm.fetch_page_read(child)?;
            guard = next;
        }
    }
}
