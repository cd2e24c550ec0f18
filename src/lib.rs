//! Country catalog: imports the REST Countries dataset into a normalized
//! relational store and serves it over a REST API.

pub mod api;
pub mod cli;
pub mod database_ops;
pub mod fetch;
pub mod model;
pub mod reconcile;
pub mod record;
pub mod reset;
pub mod store;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use reconcile::{import_from_source, reconcile, ImportError, ImportOptions, ImportSummary};
pub use store::{CountryStore, MemoryStore, StoreError};
