//! docbase-core - Chunked document store engine
//!
//! This crate implements the storage engine of a lightweight embedded
//! document database:
//! - Chunk: one shard file, lazy loading, dirty tracking, background commit
//!   pipeline with write-then-rename durability.
//! - Table: routing of puts/gets/deletes across chunks, active-chunk
//!   rollover, scans, field indexing.
//! - Database: directory layout, table registry, properties metadata,
//!   exit-time flush.

pub mod chunk;
pub mod database;
pub mod document;
pub mod table;

pub use chunk::Chunk;
pub use database::Database;
pub use document::Document;
pub use table::{Table, TableIndexCommitter};
