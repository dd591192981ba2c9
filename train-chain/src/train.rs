//! Trains: coupled railcars sharing one position estimate.
//!
//! A [`Train`] only stores identifiers of its railcars; anything that needs
//! railcar data (length, braking, couplers) goes through a [`TrainView`],
//! which pairs the train with the chain's railcar registry.

use std::collections::BTreeMap;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::chain::ChainError;
use crate::config::PermitConfig;
use crate::domain::{
    Coupler, CouplerId, CouplerType, End, MeasuredPosition, PredictedPosition, Railcar, RailcarId,
    TrainId,
};
use crate::geometry::Location;
use crate::permit::{Braking, SpeedPermit};

/// An ordered sequence of coupled railcars, head first.
///
/// # Invariants
///
/// - At least one railcar while the train exists
/// - At least one permit, issue times strictly increasing
#[derive(Debug, Clone, PartialEq)]
pub struct Train<L> {
    identifier: TrainId,
    created: DateTime<Utc>,
    changed: DateTime<Utc>,
    reversed: bool,
    railcars: Vec<RailcarId>,
    last_fix: Option<MeasuredPosition<L>>,
    permits: Vec<SpeedPermit>,
}

impl<L: Location> Train<L> {
    /// Creates an empty train holding a zero-speed permit issued at `created`.
    pub(crate) fn new(
        identifier: TrainId,
        created: DateTime<Utc>,
        last_fix: Option<MeasuredPosition<L>>,
        reversed: bool,
    ) -> Self {
        let permit = SpeedPermit::new(created, 0.0, identifier.clone());
        Self {
            identifier,
            created,
            changed: created,
            reversed,
            railcars: Vec::new(),
            last_fix,
            permits: vec![permit],
        }
    }

    /// Rebuilds a train from persisted parts. The caller checks the invariants.
    pub(crate) fn restore(
        identifier: TrainId,
        created: DateTime<Utc>,
        changed: DateTime<Utc>,
        reversed: bool,
        railcars: Vec<RailcarId>,
        last_fix: Option<MeasuredPosition<L>>,
        permits: Vec<SpeedPermit>,
    ) -> Self {
        Self {
            identifier,
            created,
            changed,
            reversed,
            railcars,
            last_fix,
            permits,
        }
    }

    /// The train identifier.
    pub fn identifier(&self) -> &TrainId {
        &self.identifier
    }

    /// When the train was formed.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// When the composition last changed.
    pub fn changed(&self) -> DateTime<Utc> {
        self.changed
    }

    /// Direction flag carried over to fixes.
    pub fn reversed(&self) -> bool {
        self.reversed
    }

    /// Member railcars, head first.
    pub fn railcars(&self) -> &[RailcarId] {
        &self.railcars
    }

    /// Number of member railcars.
    pub fn railcar_count(&self) -> usize {
        self.railcars.len()
    }

    /// Returns true if the railcar is a member.
    pub fn contains(&self, railcar: &RailcarId) -> bool {
        self.railcars.contains(railcar)
    }

    /// The last trusted position fix, if the train was ever located.
    pub fn last_fix(&self) -> Option<&MeasuredPosition<L>> {
        self.last_fix.as_ref()
    }

    /// All permits, oldest first.
    pub fn permits(&self) -> &[SpeedPermit] {
        &self.permits
    }

    /// The most recently issued permit.
    pub fn current_permit(&self) -> Option<&SpeedPermit> {
        self.permits.last()
    }

    /// Issues a new speed permit.
    ///
    /// Permits are never removed; the newest one governs. Issue times must
    /// be strictly increasing.
    pub(crate) fn permit(&mut self, speed: f64, issued: DateTime<Utc>) -> Result<(), ChainError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(ChainError::InvalidSpeed(speed));
        }

        if let Some(current) = self.current_permit()
            && issued <= current.issued()
        {
            return Err(ChainError::PermitOutOfOrder {
                train: self.identifier.clone(),
                issued,
                current: current.issued(),
            });
        }

        debug!(train = %self.identifier, speed, %issued, "speed permit issued");
        self.permits
            .push(SpeedPermit::new(issued, speed, self.identifier.clone()));
        Ok(())
    }

    /// Replaces the last fix.
    pub(crate) fn locate(&mut self, fix: MeasuredPosition<L>) {
        debug!(train = %self.identifier, head = %fix.head(), time = %fix.time(), "position fix");
        self.last_fix = Some(fix);
    }

    pub(crate) fn set_railcars(&mut self, railcars: Vec<RailcarId>) {
        self.railcars = railcars;
    }

    pub(crate) fn railcars_mut(&mut self) -> &mut Vec<RailcarId> {
        &mut self.railcars
    }

    pub(crate) fn touch(&mut self, time: DateTime<Utc>) {
        self.changed = time;
    }

    /// Distance travelled since the last fix, following the permits.
    ///
    /// Walks the permit active at the fix time and every later one, each
    /// contributing the distance it governs from its issue time until the
    /// next permit (or `now`).
    pub fn distance_since_fix(&self, now: DateTime<Utc>, braking: &Braking) -> Option<f64> {
        let fix = self.last_fix.as_ref()?;
        let start = self
            .permits
            .iter()
            .rposition(|permit| permit.issued() <= fix.time())
            .unwrap_or(0);

        let mut distance = 0.0;
        for (index, permit) in self.permits.iter().enumerate().skip(start) {
            let until = self
                .permits
                .get(index + 1)
                .map_or(now, |next| next.issued().min(now));

            distance += permit.distance_between(permit.issued(), until, braking);
        }

        Some(distance)
    }

    /// Predicted head position at `now`.
    ///
    /// `minimal` is the head at the last fix, `nominal` follows the permits,
    /// `maximal` adds half of the travelled distance again.
    pub fn head(&self, now: DateTime<Utc>, braking: &Braking) -> Option<PredictedPosition<L>> {
        let fix = self.last_fix.as_ref()?;
        let distance = self.distance_since_fix(now, braking)?;

        let minimal = fix.head();
        let nominal = minimal.advance(distance);
        let maximal = nominal.advance(distance / 2.0);

        Some(PredictedPosition::new(minimal, nominal, maximal))
    }
}

/// The two halves of a train split at a coupler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Railcars ahead of the coupler
    pub before: Vec<RailcarId>,
    /// Railcars behind the coupler
    pub after: Vec<RailcarId>,
}

impl Split {
    /// Returns true if the coupler actually joins two railcars.
    pub fn is_engaged(&self) -> bool {
        !self.before.is_empty() && !self.after.is_empty()
    }
}

/// A train resolved against the railcar registry of its chain.
#[derive(Debug)]
pub struct TrainView<'a, L> {
    train: &'a Train<L>,
    railcars: &'a BTreeMap<RailcarId, Railcar>,
    config: &'a PermitConfig,
}

impl<L> Clone for TrainView<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for TrainView<'_, L> {}

impl<L> Deref for TrainView<'_, L> {
    type Target = Train<L>;

    fn deref(&self) -> &Self::Target {
        self.train
    }
}

impl<'a, L: Location> TrainView<'a, L> {
    pub(crate) fn new(
        train: &'a Train<L>,
        railcars: &'a BTreeMap<RailcarId, Railcar>,
        config: &'a PermitConfig,
    ) -> Self {
        Self {
            train,
            railcars,
            config,
        }
    }

    /// The underlying train.
    pub fn train(&self) -> &'a Train<L> {
        self.train
    }

    /// Member railcars, head first.
    pub fn members(&self) -> impl Iterator<Item = &'a Railcar> + 'a {
        let railcars = self.railcars;
        self.train
            .railcars
            .iter()
            .filter_map(move |id| railcars.get(id))
    }

    /// Sum of member lengths.
    pub fn coupled_length(&self) -> f64 {
        self.members().map(|railcar| railcar.length).sum()
    }

    /// Acceleration of the weakest traction unit; 0 without traction.
    pub fn maximal_acceleration(&self) -> f64 {
        self.members()
            .flat_map(|railcar| railcar.traction.iter())
            .map(|traction| traction.maximal_acceleration)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Mean braking deceleration of the members.
    pub fn maximal_deceleration(&self) -> f64 {
        let (total, count) = self
            .members()
            .fold((0.0, 0usize), |(total, count), railcar| {
                (total + railcar.maximal_deceleration, count + 1)
            });

        if count == 0 {
            return 0.0;
        }
        total / count as f64
    }

    /// Braking parameters for permit evaluation.
    pub fn braking(&self) -> Braking {
        Braking::new(*self.config, self.maximal_deceleration())
    }

    /// Coupler at the head end of the first railcar.
    pub fn head_coupler(&self) -> Option<&'a Coupler> {
        self.members().next()?.end_coupler(End::Head)
    }

    /// Coupler at the tail end of the last railcar.
    pub fn tail_coupler(&self) -> Option<&'a Coupler> {
        self.members().last()?.end_coupler(End::Tail)
    }

    /// Type of the head coupler.
    pub fn head_coupler_type(&self) -> Option<&'a CouplerType> {
        self.head_coupler().map(|coupler| &coupler.coupler_type)
    }

    /// Type of the tail coupler.
    pub fn tail_coupler_type(&self) -> Option<&'a CouplerType> {
        self.tail_coupler().map(|coupler| &coupler.coupler_type)
    }

    /// The speed the train should be running at `now`.
    pub fn current_speed(&self, now: DateTime<Utc>) -> f64 {
        let braking = self.braking();
        self.current_permit()
            .map_or(0.0, |permit| permit.speed_at(now, &braking))
    }

    /// Predicted head position at `now`; `None` until the train is located.
    pub fn head(&self, now: DateTime<Utc>) -> Option<PredictedPosition<L>> {
        self.train.head(now, &self.braking())
    }

    /// Predicted tail position at `now`: the head moved back by the train length.
    pub fn tail(&self, now: DateTime<Utc>) -> Option<PredictedPosition<L>> {
        Some(self.head(now)?.advance(-self.coupled_length()))
    }

    /// Track covered by the train at its nominal position.
    pub fn nominal_trail(&self, now: DateTime<Utc>) -> Option<L::Trail> {
        let head = self.head(now)?;
        Some(head.nominal.trail(-self.coupled_length()))
    }

    /// Track the train may occupy: from the minimal tail to the maximal head.
    ///
    /// Only one train may ever be inside a span, and no route may change
    /// within it.
    pub fn span(&self, now: DateTime<Utc>) -> Option<L::Span> {
        let head = self.head(now)?;
        let tail = head.advance(-self.coupled_length());
        Some(L::span(&tail.minimal, &head.maximal))
    }

    /// Splits the railcar sequence at a coupler.
    ///
    /// A head-end coupler starts the second half, a tail-end coupler ends
    /// the first half. Either half may be empty when the coupler sits at an
    /// extremity of the train.
    pub fn split(&self, coupler: &CouplerId) -> Result<Split, ChainError> {
        let carries = |end: End| {
            move |railcar: &Railcar| {
                railcar
                    .end_coupler(end)
                    .is_some_and(|c| &c.identifier == coupler)
            }
        };

        let at = if let Some(index) = self.members().position(carries(End::Head)) {
            index
        } else if let Some(index) = self.members().position(carries(End::Tail)) {
            index + 1
        } else {
            return Err(ChainError::CouplerNotInTrain {
                coupler: coupler.clone(),
                train: self.train.identifier.clone(),
            });
        };

        let (before, after) = self.train.railcars.split_at(at);
        Ok(Split {
            before: before.to_vec(),
            after: after.to_vec(),
        })
    }
}
