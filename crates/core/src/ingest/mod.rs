pub mod cache;
pub mod provider;
pub mod types;

pub use cache::PriceCache;
pub use provider::{FilePriceProvider, PriceProvider, StooqProvider};
