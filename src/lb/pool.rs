use super::endpoint::{ConnectOptions, EndpointFactory, EndpointHandle};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long a failed endpoint is skipped before it is probed again
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// Error types for pool construction and selection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("no servers available")]
    NoServersAvailable,
}

/// Outcome of a single [`EndpointPool::acquire`] call
#[derive(Debug)]
pub enum Selection<'a, H> {
    /// A handle that was healthy when it was checked
    Selected { index: usize, handle: &'a H },
    /// Every endpoint was unhealthy or cooling down
    Exhausted,
}

impl<'a, H> Selection<'a, H> {
    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::Selected { .. })
    }

    /// Index of the selected endpoint, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            Selection::Selected { index, .. } => Some(*index),
            Selection::Exhausted => None,
        }
    }

    pub fn into_result(self) -> std::result::Result<(usize, &'a H), PoolError> {
        match self {
            Selection::Selected { index, handle } => Ok((index, handle)),
            Selection::Exhausted => Err(PoolError::NoServersAvailable),
        }
    }
}

/// Point-in-time view of one endpoint
#[derive(Debug, Clone)]
pub struct EndpointStats {
    pub index: usize,
    pub address: String,
    pub online: bool,
    /// Time since the endpoint was last observed unhealthy, if it is marked failed
    pub failing_for: Option<Duration>,
}

/// Point-in-time view of the whole pool
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    /// Index the next `acquire` call starts from
    pub cursor: usize,
    pub endpoints: Vec<EndpointStats>,
}

struct Slot<H> {
    address: String,
    handle: H,
}

struct SelectionState {
    current_index: usize,
    /// Parallel to the slots; `None` means not known to be failing
    failures: Vec<Option<Instant>>,
}

/// Fixed set of endpoint handles with round-robin selection and
/// time-windowed failure tracking
pub struct EndpointPool<H> {
    slots: Vec<Slot<H>>,
    cooldown: Duration,
    state: Mutex<SelectionState>,
}

impl<H: EndpointHandle> EndpointPool<H> {
    /// Connect and probe every endpoint in order.
    ///
    /// Fails with the first connect or probe error; no partial pool is
    /// ever returned.
    pub async fn connect<F>(
        factory: &F,
        endpoints: &[String],
        options: &ConnectOptions,
        health_check_timeout: Duration,
    ) -> Result<Self>
    where
        F: EndpointFactory<Handle = H>,
    {
        if endpoints.is_empty() {
            return Err(PoolError::NoEndpoints.into());
        }

        let mut handles = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let handle = factory
                .connect(endpoint, options)
                .await
                .with_context(|| format!("Failed to connect endpoint {}", endpoint))?;

            factory
                .health_check(&handle, health_check_timeout)
                .await
                .with_context(|| format!("Health check failed for endpoint {}", endpoint))?;

            debug!(endpoint = %endpoint, "endpoint connected");
            handles.push((endpoint.clone(), handle));
        }

        let pool = Self::from_handles(handles)?;
        info!(endpoints = pool.len(), "endpoint pool ready");
        Ok(pool)
    }

    /// Build a pool from already-connected handles without probing them
    pub fn from_handles<I, S>(handles: I) -> std::result::Result<Self, PoolError>
    where
        I: IntoIterator<Item = (S, H)>,
        S: Into<String>,
    {
        let slots: Vec<Slot<H>> = handles
            .into_iter()
            .map(|(address, handle)| Slot {
                address: address.into(),
                handle,
            })
            .collect();

        if slots.is_empty() {
            return Err(PoolError::NoEndpoints);
        }

        let failures = vec![None; slots.len()];
        Ok(Self {
            slots,
            cooldown: DEFAULT_COOLDOWN,
            state: Mutex::new(SelectionState {
                current_index: 0,
                failures,
            }),
        })
    }

    /// Override the cool-down window
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Select the next usable endpoint.
    ///
    /// Visits each endpoint at most once, starting where the previous call
    /// stopped. The cursor advances past every endpoint it looks at, so
    /// consecutive successful calls rotate through the pool.
    ///
    /// The selection lock is held for the whole sweep, including any
    /// `recheck` of an endpoint whose cool-down has elapsed. A slow recheck
    /// therefore stalls every concurrent caller until it returns.
    pub async fn acquire(&self) -> Selection<'_, H> {
        let mut state = self.state.lock().await;
        let len = self.slots.len();
        let start_index = state.current_index;

        loop {
            let idx = state.current_index % len;
            state.current_index = (state.current_index + 1) % len;
            let slot = &self.slots[idx];

            if slot.handle.is_online() {
                if state.failures[idx].take().is_some() {
                    info!(endpoint = %slot.address, index = idx, "endpoint back online");
                }
                return Selection::Selected {
                    index: idx,
                    handle: &slot.handle,
                };
            }

            let failed_at = state.failures[idx];
            match failed_at {
                None => {
                    warn!(endpoint = %slot.address, index = idx, "endpoint marked unhealthy");
                    state.failures[idx] = Some(Instant::now());
                }
                Some(since) if since.elapsed() >= self.cooldown => {
                    debug!(
                        endpoint = %slot.address,
                        index = idx,
                        failing_for_secs = since.elapsed().as_secs(),
                        "cool-down elapsed, rechecking endpoint"
                    );
                    if slot.handle.recheck().await {
                        state.failures[idx] = None;
                        info!(endpoint = %slot.address, index = idx, "endpoint recovered");
                        return Selection::Selected {
                            index: idx,
                            handle: &slot.handle,
                        };
                    }
                    state.failures[idx] = Some(Instant::now());
                }
                Some(_) => {}
            }

            if state.current_index == start_index {
                warn!(endpoints = len, "no servers available");
                return Selection::Exhausted;
            }
        }
    }

    /// Number of endpoints in the pool
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: empty pools are rejected at construction
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn address(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|s| s.address.as_str())
    }

    pub fn handle(&self, index: usize) -> Option<&H> {
        self.slots.get(index).map(|s| &s.handle)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Capture the cursor and per-endpoint failure state
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        let endpoints = self
            .slots
            .iter()
            .zip(state.failures.iter())
            .enumerate()
            .map(|(index, (slot, failed_at))| EndpointStats {
                index,
                address: slot.address.clone(),
                online: slot.handle.is_online(),
                failing_for: failed_at.map(|t| t.elapsed()),
            })
            .collect();

        PoolSnapshot {
            cursor: state.current_index,
            endpoints,
        }
    }
}
