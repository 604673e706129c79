pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod normalize;
pub mod reshape;
pub mod scheduler;
pub mod store;
pub mod validate;
