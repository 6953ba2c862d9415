pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
pub mod planner;
pub mod rate_limiter;
pub mod retry;
