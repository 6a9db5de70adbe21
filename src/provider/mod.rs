pub mod client;
pub mod model;

pub use client::{FundDataSource, ProviderClient, RatingInfo};
