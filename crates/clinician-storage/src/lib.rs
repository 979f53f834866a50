//! Clinician Storage crate - SQLite persistence for clinical records and
//! assistant conversations.
//!
//! Provides a WAL-mode SQLite database with migrations, the SQLite
//! implementations of the core `RecordStore` and `ConversationStore` seams,
//! and an in-memory record store for demos and tests.

pub mod conversations;
pub mod db;
pub mod demo;
pub mod memory;
pub mod migrations;
pub mod records;

pub use conversations::SqliteConversationStore;
pub use db::Database;
pub use demo::seed_demo_records;
pub use memory::MemoryRecordStore;
pub use records::SqliteRecordStore;
