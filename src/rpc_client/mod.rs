pub mod client;
pub mod error;
pub mod types;

pub use client::Client;
pub use error::Error;
