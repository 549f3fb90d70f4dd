//! s3failover - Round-robin S3 endpoint pool with time-windowed failover

pub mod config;
pub mod core;
pub mod lb;
pub mod s3;

pub use crate::config::Config;
pub use crate::core::Core;
pub use crate::lb::{EndpointPool, PoolError, Selection};
