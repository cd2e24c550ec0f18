// REST API over the country catalog

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use errors::ApiError;
pub use server::ApiServer;
