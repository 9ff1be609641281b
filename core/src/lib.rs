pub mod admin;
pub mod card;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod loader;
pub mod metrics;
pub mod outcome;
pub mod processor;
pub mod rider;
pub mod ridership;
pub mod rng;
pub mod store;
pub mod topology;
pub mod trip;
pub mod types;
