//! Endpoint pool for s3failover
//!
//! This module selects one usable backend per request from a fixed set of
//! interchangeable S3/MinIO endpoints.
//!
//! # Components
//!
//! - [`EndpointHandle`]: A connected client for one endpoint that can report liveness
//! - [`EndpointFactory`]: Builds handles and runs their startup health probe
//! - [`EndpointPool`]: Round-robin selection with time-windowed failure tracking
//!
//! # Selection
//!
//! Each [`EndpointPool::acquire`] call starts at the cursor left by the previous
//! call and walks the pool at most once:
//!
//! - An endpoint that reports online is returned immediately
//! - An endpoint seen offline for the first time is marked failed and skipped
//! - A failed endpoint is skipped without probing until the cool-down
//!   (10 minutes by default) has elapsed, then rechecked once
//! - If the walk comes back to its starting point, the call returns
//!   [`Selection::Exhausted`]
//!
//! Health state is only refreshed by `acquire` itself; there is no background
//! polling.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use s3failover::lb::{ConnectOptions, Credentials, EndpointPool, Selection};
//! use s3failover::s3::S3ClientFactory;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let endpoints = vec![
//!     "s3-1.example.com:9000".to_string(),
//!     "s3-2.example.com:9000".to_string(),
//!     "s3-3.example.com:9000".to_string(),
//! ];
//! let options = ConnectOptions::new(Credentials::new("ACCESS", "SECRET"), false);
//!
//! // Every endpoint must answer its health probe or construction fails
//! let pool = EndpointPool::connect(
//!     &S3ClientFactory::new(),
//!     &endpoints,
//!     &options,
//!     Duration::from_secs(5),
//! )
//! .await?;
//!
//! match pool.acquire().await {
//!     Selection::Selected { index, handle } => {
//!         println!("Selected endpoint {}: {}", index, handle.base_url());
//!     }
//!     Selection::Exhausted => println!("no servers available"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The cursor and failure timestamps live behind one `tokio::sync::Mutex`, held
//! for the whole `acquire` call. Concurrent callers are serialized, including
//! while a cooled-down endpoint is being rechecked over the network.

pub mod endpoint;
pub mod pool;

pub use endpoint::{ConnectOptions, Credentials, EndpointFactory, EndpointHandle};
pub use pool::{
    EndpointPool, EndpointStats, PoolError, PoolSnapshot, Selection, DEFAULT_COOLDOWN,
};
