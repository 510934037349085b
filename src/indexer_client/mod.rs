pub mod client;
pub mod error;
pub mod schema;

pub use client::{DEFAULT_URL, IndexerClient};
pub use error::Error;
