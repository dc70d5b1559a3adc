pub mod breaker;
pub mod health;
pub mod memory;
pub mod rag;
pub mod routing;
pub mod selection;
pub mod text;
pub mod tier;

mod error;

pub use error::{Error, Result};
pub use memory::{Context, Entry, LocationToken, Metadata, MetadataPatch, Priority};
pub use tier::Tier;
