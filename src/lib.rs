//! Silt - the storage-engine core of an educational relational database.
//!
//! The engine keeps fixed-size pages on disk, caches the hottest ones in a
//! fixed set of in-memory frames, and builds a concurrent B+Tree index on
//! top of those pages.
//!
//! # Architecture
//!
//! - **Storage layer** (`storage`): page-granular disk I/O and page formats
//!   - `DiskManager`: file-backed page store
//!   - `SlottedPage` / `TablePage` / `TableHeap`: variable-length tuple
//!     storage with tombstoned deletes
//!
//! - **Buffer pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames and writes victims back
//!   - `LruKReplacer`: LRU-K victim selection over two ordered heaps
//!   - `BasicPageGuard` / `ReadPageGuard` / `WritePageGuard`: scoped
//!     handles that unpin (and unlatch) on every exit path
//!
//! - **Index** (`index`): a concurrent B+Tree with latch crabbing, borrow/
//!   merge deletes, and a leaf-chain range iterator
//!
//! - **Catalog & execution** (`catalog`, `execution`): a registry of tables
//!   and indexes plus pull-based executors (sequential scan, insert, index
//!   scan)
//!
//! - **Trie** (`trie`): a standalone copy-on-write persistent map
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use silt::buffer::BufferPoolManager;
//! use silt::index::BPlusTree;
//! use silt::common::{RecordId, PageId, SlotId};
//! use silt::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let tree = BPlusTree::with_default_sizes(Arc::clone(&bpm)).unwrap();
//! let rid = RecordId::new(PageId::new(9), SlotId::new(0));
//! tree.insert(42, rid).unwrap();
//! assert_eq!(tree.get(42).unwrap(), Some(rid));
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod index;
pub mod storage;
pub mod trie;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SiltError, SlotId};
