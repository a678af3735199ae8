//! mp3 catalog database

pub mod catalog;
pub mod init;

pub use catalog::{Catalog, Page, Paging, Query, Record, TrackRecord, FIELDS};
pub use init::{init_database, init_memory_database, open_database};
