// Pipeline ingestion: reading raw records produced by the crawler

pub mod raw_source;

pub use raw_source::{load_raw_records, RawFormat};
