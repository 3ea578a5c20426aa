//! Location port and the adapters the bridge ships with.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{fmt::Debug, time::Duration};
use tokio::time::Instant;

use crate::{error::LocationError, model::Coordinates};

/// Options for a single position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// How long the bridge waits for a fix before giving up.
    pub timeout: Duration,
    /// Oldest cached fix that may be reused.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            maximum_age: Duration::from_secs(60),
        }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, LocationError>;
}

/// Coordinates supplied up front, from config or the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticLocation {
    coords: Option<Coordinates>,
}

impl StaticLocation {
    pub fn new(coords: Option<Coordinates>) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        self.coords.ok_or(LocationError::Unavailable)
    }
}

/// Reuses the last fix from `inner` while it is younger than `maximum_age`.
#[derive(Debug)]
pub struct CachedLocation<L> {
    inner: L,
    last_fix: Mutex<Option<(Coordinates, Instant)>>,
}

impl<L: LocationProvider> CachedLocation<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            last_fix: Mutex::new(None),
        }
    }

    fn fresh_fix(&self, maximum_age: Duration) -> Option<Coordinates> {
        let fix = *self.last_fix.lock();
        fix.filter(|(_, taken_at)| taken_at.elapsed() <= maximum_age)
            .map(|(coords, _)| coords)
    }
}

#[async_trait]
impl<L: LocationProvider> LocationProvider for CachedLocation<L> {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        if let Some(coords) = self.fresh_fix(options.maximum_age) {
            tracing::debug!("Reusing cached position");
            return Ok(coords);
        }

        let coords = self.inner.current_position(options).await?;
        *self.last_fix.lock() = Some((coords, Instant::now()));
        Ok(coords)
    }
}
