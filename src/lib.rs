//! Strata - a transactional page cache for a single-node storage engine
//!
//! The crate sits between on-disk heap files and query operators. It caches
//! fixed-size slotted pages in memory and enforces strict two-phase locking so
//! concurrent transactions see a consistent view of every page.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page formats and disk I/O
//!   - `DiskManager`: whole-page reads and writes, one file per table
//!   - `DiskScheduler`: serializes I/O through a background worker
//!   - `SlottedPage`: fixed-size tuple slots behind an occupancy bitmap
//!
//! - **Buffer Pool** (`buffer`): `BufferManager` pins pages and evicts with a
//!   clock (second-chance) replacer
//!
//! - **Transactions** (`transaction`): `LockManager` grants shared/exclusive
//!   page locks and reports a deadlock when a wait times out
//!
//! - **Access** (`access`): `AccessManager` ties pins and locks to transactions
//!   and applies the force/no-force policy at commit; `HeapFile` stores a
//!   table's tuples on top of it
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::access::{AccessManager, HeapFile};
//! use strata::common::StorageConfig;
//! use strata::storage::disk::MemoryDiskManager;
//! use strata::transaction::TransactionId;
//! use strata::tuple::{DataType, Schema, TupleBuilder};
//!
//! let config = StorageConfig::default();
//! let disk_manager = Arc::new(MemoryDiskManager::new(config.page_size));
//! let access_manager = Arc::new(AccessManager::with_config(&config, disk_manager).unwrap());
//!
//! let schema = Schema::builder().column("id", DataType::Integer).build_arc();
//! let heap_file = HeapFile::new(1, schema.clone(), access_manager.clone()).unwrap();
//!
//! let tid = TransactionId::new();
//! let mut tuple = TupleBuilder::new(schema).value(42).build().unwrap();
//! heap_file.insert_tuple(tid, &mut tuple).unwrap();
//! access_manager.commit_transaction(tid).unwrap();
//! ```

pub mod access;
pub mod buffer;
pub mod common;
pub mod storage;
pub mod transaction;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StrataError};
