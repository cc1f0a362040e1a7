//! Core business logic abstractions

pub mod aggregate;
pub mod alert;
pub mod cache;
pub mod config;
pub mod currency;
pub mod holding;
pub mod log;
pub mod price;
pub mod resolver;
pub mod tactical;

// Re-export main types for cleaner imports
pub use currency::CurrencyRateProvider;
pub use holding::{Category, Holding, Market};
pub use price::{PriceProvider, PriceResult};
pub use resolver::PriceResolver;
