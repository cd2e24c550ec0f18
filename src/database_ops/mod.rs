pub mod countries;
pub mod db;

pub use countries::PgStore;
