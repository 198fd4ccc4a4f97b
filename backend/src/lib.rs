pub mod bootstrap;
pub mod config;
pub mod error;
pub mod inference;
pub mod model;
pub mod preprocessing;
pub mod routes;
pub mod storage;

pub use error::ServeError;
