pub mod config;
pub mod error;
pub mod fetch;
pub mod item;

pub use config::Config;
pub use error::*;
pub use fetch::FetchAndCache;
pub use item::*;
