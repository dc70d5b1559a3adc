pub mod archive;
pub mod backend;
pub mod cache;
pub mod db;
pub mod models;
pub mod postgres;
pub mod qdrant;
pub mod schema;

mod error;

pub use backend::{BoxFuture, HealthReport, TierBackend, TierHit, TierQuery};
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
