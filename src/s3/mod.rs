//! S3 storage client used as the pool's endpoint handle
//!
//! This module provides:
//! - AWS Signature V4 signing
//! - A per-endpoint client with MinIO liveness probing
//! - The factory that connects and probes endpoints for an [`EndpointPool`](crate::lb::EndpointPool)

pub mod client;
pub mod signer;

pub use client::{S3Client, S3ClientFactory, S3Error, HEALTH_PATH};
pub use signer::S3SignerV4;
