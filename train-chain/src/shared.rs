//! A train chain shared between tasks.
//!
//! Topology changes and permits take the write lock, so they are applied
//! one at a time in a single order. Position estimates only take the read
//! lock and can be evaluated by any number of tasks at once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::chain::{ChainError, TrainChain};
use crate::domain::{CouplerId, MeasuredPosition, PredictedPosition, Railcar, RailcarId, TrainId};
use crate::geometry::Location;
use crate::train::Train;

/// Cloneable handle to a [`TrainChain`].
#[derive(Debug)]
pub struct SharedChain<L> {
    inner: Arc<RwLock<TrainChain<L>>>,
}

impl<L> Clone for SharedChain<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Location> From<TrainChain<L>> for SharedChain<L> {
    fn from(chain: TrainChain<L>) -> Self {
        Self::new(chain)
    }
}

impl<L: Location> SharedChain<L> {
    pub fn new(chain: TrainChain<L>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Runs `f` against the chain under the read lock.
    pub async fn read<R>(&self, f: impl FnOnce(&TrainChain<L>) -> R) -> R {
        let chain = self.inner.read().await;
        f(&chain)
    }

    /// Runs `f` against the chain under the write lock.
    pub async fn write<R>(&self, f: impl FnOnce(&mut TrainChain<L>) -> R) -> R {
        let mut chain = self.inner.write().await;
        f(&mut chain)
    }

    pub async fn commission(
        &self,
        railcar: Railcar,
        time: DateTime<Utc>,
    ) -> Result<TrainId, ChainError> {
        self.write(|chain| chain.commission(railcar, time)).await
    }

    pub async fn withdraw(
        &self,
        railcar: &RailcarId,
        time: DateTime<Utc>,
    ) -> Result<Railcar, ChainError> {
        self.write(|chain| chain.withdraw(railcar, time)).await
    }

    pub async fn couple(
        &self,
        source: &CouplerId,
        target: &CouplerId,
        time: DateTime<Utc>,
    ) -> Result<TrainId, ChainError> {
        self.write(|chain| chain.couple(source, target, time)).await
    }

    pub async fn uncouple(
        &self,
        coupler: &CouplerId,
        time: DateTime<Utc>,
    ) -> Result<TrainId, ChainError> {
        self.write(|chain| chain.uncouple(coupler, time)).await
    }

    pub async fn permit(
        &self,
        train: &TrainId,
        speed: f64,
        issued: DateTime<Utc>,
    ) -> Result<(), ChainError> {
        self.write(|chain| chain.permit(train, speed, issued)).await
    }

    pub async fn locate(
        &self,
        train: &TrainId,
        fix: MeasuredPosition<L>,
    ) -> Result<(), ChainError> {
        self.write(|chain| chain.locate(train, fix)).await
    }

    /// Subscribes to disband events.
    pub async fn on_disband(
        &self,
        listener: impl FnMut(&Train<L>, &[RailcarId]) + Send + Sync + 'static,
    ) {
        self.write(|chain| chain.on_disband(listener)).await;
    }

    /// Predicted head of a train; `None` for unknown or unlocated trains.
    pub async fn head(&self, train: &TrainId, now: DateTime<Utc>) -> Option<PredictedPosition<L>> {
        self.read(|chain| chain.train(train)?.head(now)).await
    }

    /// Predicted tail of a train; `None` for unknown or unlocated trains.
    pub async fn tail(&self, train: &TrainId, now: DateTime<Utc>) -> Option<PredictedPosition<L>> {
        self.read(|chain| chain.train(train)?.tail(now)).await
    }

    /// Commanded speed of a train; `None` for unknown trains.
    pub async fn speed(&self, train: &TrainId, now: DateTime<Utc>) -> Option<f64> {
        self.read(|chain| Some(chain.train(train)?.current_speed(now)))
            .await
    }

    pub async fn digest(&self) -> String {
        self.read(TrainChain::digest).await
    }
}
