use crate::config::Config;
use crate::lb::{EndpointPool, PoolSnapshot};
use crate::s3::{S3Client, S3ClientFactory};
use anyhow::Result;
use std::sync::Arc;

/// Application entry point: a connected endpoint pool built from configuration
///
/// Clones share the same pool, so round-robin order and failure tracking are
/// global to the process.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    pool: Arc<EndpointPool<S3Client>>,
}

impl Core {
    /// Connect every endpoint of the default profile.
    ///
    /// Fails if the profile is missing or any endpoint does not answer its
    /// health probe.
    pub async fn new(config: Config) -> Result<Self> {
        let profile = config
            .get_profile(None)
            .ok_or_else(|| anyhow::anyhow!("No profile found in configuration"))?;

        let timeout = config.pool.health_check_timeout();
        let factory = S3ClientFactory::new().with_health_timeout(timeout);

        let pool = EndpointPool::connect(
            &factory,
            &profile.endpoints,
            &profile.connect_options(),
            timeout,
        )
        .await?
        .with_cooldown(config.pool.cooldown());

        tracing::info!(
            endpoints = pool.len(),
            cooldown_secs = pool.cooldown().as_secs(),
            "core initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            pool: Arc::new(pool),
        })
    }

    /// Select a healthy endpoint client and its pool index
    ///
    /// Each call may return a different endpoint. Returns
    /// [`PoolError::NoServersAvailable`](crate::lb::PoolError::NoServersAvailable)
    /// when every endpoint is down or cooling down.
    pub async fn acquire(&self) -> Result<(usize, &S3Client)> {
        Ok(self.pool.acquire().await.into_result()?)
    }

    pub fn pool(&self) -> &EndpointPool<S3Client> {
        &self.pool
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot().await
    }
}
