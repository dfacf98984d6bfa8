//! daft.fm catalog pipeline - shared modules for the CLI.

pub mod canonical;
pub mod collect;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod providers;
pub mod qualifiers;
pub mod safety;
pub mod schema;
pub mod slug;
pub mod staging;
pub mod store;
pub mod throttle;
