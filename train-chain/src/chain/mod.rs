//! The train chain: registry of every railcar on the layout and of the
//! trains they form.
//!
//! All topology changes go through [`TrainChain`]. Each operation validates
//! completely before touching anything, so a rejected operation leaves the
//! registry and the audit digest exactly as they were.

mod audit;
mod error;
mod invariants;

#[cfg(test)]
mod tests;

pub use audit::AuditLog;
pub use error::ChainError;
pub use invariants::Inconsistency;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::PermitConfig;
use crate::domain::{CouplerId, End, MeasuredPosition, Railcar, RailcarId, TrainId};
use crate::geometry::Location;
use crate::train::{Split, Train, TrainView};

/// Callback invoked with a train that ceased to exist and the railcars it
/// held at that moment.
pub type DisbandListener<L> = Box<dyn FnMut(&Train<L>, &[RailcarId]) + Send + Sync>;

/// How two extremities meet when coupling.
///
/// Named after the source end first, then the target end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CouplingCase {
    TailToHead,
    HeadToTail,
    TailToTail,
    HeadToHead,
}

impl CouplingCase {
    fn turns_target(self) -> bool {
        matches!(self, CouplingCase::TailToTail | CouplingCase::HeadToHead)
    }

    fn target_ahead(self) -> bool {
        matches!(self, CouplingCase::HeadToTail | CouplingCase::HeadToHead)
    }
}

struct Coupling {
    case: CouplingCase,
    source_railcar: RailcarId,
    target_railcar: RailcarId,
    source_train: TrainId,
    target_train: TrainId,
}

struct Uncoupling {
    train: TrainId,
    split: Split,
    keep_front: bool,
    front_length: f64,
}

struct Withdrawal {
    train: TrainId,
    index: usize,
}

/// Registry of railcars and trains.
///
/// Every owned railcar belongs to exactly one train, and every train holds
/// at least one railcar.
pub struct TrainChain<L> {
    trains: BTreeMap<TrainId, Train<L>>,
    railcars: BTreeMap<RailcarId, Railcar>,
    audit: AuditLog,
    config: PermitConfig,
    listeners: Vec<DisbandListener<L>>,
}

impl<L: Location> Default for TrainChain<L> {
    fn default() -> Self {
        Self::new(PermitConfig::default())
    }
}

impl<L: fmt::Debug> fmt::Debug for TrainChain<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainChain")
            .field("trains", &self.trains)
            .field("railcars", &self.railcars)
            .field("audit", &self.audit)
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<L: Location> TrainChain<L> {
    /// Creates an empty chain.
    pub fn new(config: PermitConfig) -> Self {
        Self {
            trains: BTreeMap::new(),
            railcars: BTreeMap::new(),
            audit: AuditLog::new(),
            config,
            listeners: Vec::new(),
        }
    }

    /// Reassembles a chain from persisted parts. The caller verifies it.
    pub(crate) fn restore(
        trains: BTreeMap<TrainId, Train<L>>,
        railcars: BTreeMap<RailcarId, Railcar>,
        audit: AuditLog,
        config: PermitConfig,
    ) -> Self {
        Self {
            trains,
            railcars,
            audit,
            config,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &PermitConfig {
        &self.config
    }

    /// The audit log covering every accepted topology change.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The current audit digest as lowercase hex.
    pub fn digest(&self) -> String {
        self.audit.to_hex()
    }

    /// Subscribes to disband events.
    ///
    /// Listeners run synchronously, after the disbanding operation has
    /// fully committed.
    pub fn on_disband(
        &mut self,
        listener: impl FnMut(&Train<L>, &[RailcarId]) + Send + Sync + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    pub fn train(&self, identifier: &TrainId) -> Option<TrainView<'_, L>> {
        self.trains
            .get(identifier)
            .map(|train| TrainView::new(train, &self.railcars, &self.config))
    }

    /// All trains, ordered by identifier.
    pub fn trains(&self) -> impl Iterator<Item = TrainView<'_, L>> {
        self.trains
            .values()
            .map(|train| TrainView::new(train, &self.railcars, &self.config))
    }

    pub fn train_count(&self) -> usize {
        self.trains.len()
    }

    pub fn railcar(&self, identifier: &RailcarId) -> Option<&Railcar> {
        self.railcars.get(identifier)
    }

    /// All owned railcars, ordered by identifier.
    pub fn railcars(&self) -> impl Iterator<Item = &Railcar> {
        self.railcars.values()
    }

    /// The train a railcar currently belongs to.
    pub fn train_of(&self, railcar: &RailcarId) -> Option<TrainView<'_, L>> {
        let identifier = self.railcars.get(railcar)?.train()?;
        self.train(identifier)
    }

    /// The railcar carrying a coupler.
    pub fn owner_of(&self, coupler: &CouplerId) -> Option<&Railcar> {
        self.railcars.values().find(|railcar| railcar.owns(coupler))
    }

    /// Adds a railcar to the chain as a new single-railcar train.
    ///
    /// Returns the identifier of the new train.
    pub fn commission(
        &mut self,
        mut railcar: Railcar,
        time: DateTime<Utc>,
    ) -> Result<TrainId, ChainError> {
        self.check_unknown(&railcar).inspect_err(
            |err| warn!(railcar = %railcar.identifier, %err, "commission rejected"),
        )?;

        self.audit.record(&["add", railcar.identifier.as_str()]);
        let identifier = self.allocate_train_id();

        railcar.clear_targets();
        railcar.set_train(Some(identifier.clone()));

        let mut train = Train::new(identifier.clone(), time, None, false);
        train.set_railcars(vec![railcar.identifier.clone()]);

        info!(railcar = %railcar.identifier, train = %identifier, "railcar commissioned");
        self.railcars.insert(railcar.identifier.clone(), railcar);
        self.trains.insert(identifier.clone(), train);

        Ok(identifier)
    }

    /// Removes a railcar from the chain and hands it back.
    ///
    /// A railcar in the middle of a train is cut out and its neighbours are
    /// coupled to each other, which requires their facing couplers to be of
    /// the same type. A train left without railcars is disbanded.
    pub fn withdraw(
        &mut self,
        railcar: &RailcarId,
        time: DateTime<Utc>,
    ) -> Result<Railcar, ChainError> {
        let plan = self
            .plan_withdrawal(railcar)
            .inspect_err(|err| warn!(%railcar, %err, "withdrawal rejected"))?;

        let mut unit = self
            .railcars
            .remove(railcar)
            .ok_or_else(|| ChainError::RailcarNotInChain(railcar.clone()))?;
        self.audit.record(&["withdraw", railcar.as_str()]);

        let mut emptied = false;
        let mut neighbours = (None, None);
        if let Some(train) = self.trains.get_mut(&plan.train) {
            train.railcars_mut().remove(plan.index);
            train.touch(time);

            let members = train.railcars();
            neighbours = (
                plan.index
                    .checked_sub(1)
                    .and_then(|index| members.get(index))
                    .cloned(),
                members.get(plan.index).cloned(),
            );
            emptied = members.is_empty();

            if plan.index == 0
                && !emptied
                && let Some(fix) = train.last_fix().map(|fix| fix.shifted(-unit.length))
            {
                train.locate(fix);
            }
        }

        match neighbours {
            (Some(before), Some(after)) => {
                self.link(&before, End::Tail, Some(after.clone()));
                self.link(&after, End::Head, Some(before));
            }
            (Some(before), None) => self.link(&before, End::Tail, None),
            (None, Some(after)) => self.link(&after, End::Head, None),
            (None, None) => {}
        }

        unit.clear_targets();
        unit.set_train(None);
        info!(railcar = %railcar, train = %plan.train, "railcar withdrawn");

        if emptied && let Some(train) = self.trains.remove(&plan.train) {
            self.disband(train, vec![railcar.clone()]);
        }

        Ok(unit)
    }

    /// Breaks a train apart at a coupler.
    ///
    /// The half containing the railcar that carries the coupler keeps the
    /// train identifier; the other half becomes a new train, whose
    /// identifier is returned.
    pub fn uncouple(
        &mut self,
        coupler: &CouplerId,
        time: DateTime<Utc>,
    ) -> Result<TrainId, ChainError> {
        let plan = self
            .plan_uncoupling(coupler)
            .inspect_err(|err| warn!(%coupler, %err, "uncoupling rejected"))?;

        self.audit.record(&["uncouple", coupler.as_str()]);
        let identifier = self.allocate_train_id();

        let Uncoupling {
            train: parent,
            split: Split { before, after },
            keep_front,
            front_length,
        } = plan;

        if let (Some(last), Some(first)) = (before.last(), after.first()) {
            self.link(last, End::Tail, None);
            self.link(first, End::Head, None);
        }

        let mut departing = Vec::new();
        let mut departing_fix = None;
        let mut reversed = false;
        if let Some(train) = self.trains.get_mut(&parent) {
            reversed = train.reversed();

            let fix = train.last_fix().cloned();
            let rear_fix = fix.as_ref().map(|fix| fix.shifted(-front_length));

            let kept = if keep_front {
                departing = after;
                departing_fix = rear_fix;
                before
            } else {
                if let Some(rear_fix) = rear_fix {
                    train.locate(rear_fix);
                }
                departing = before;
                departing_fix = fix;
                after
            };

            train.set_railcars(kept);
            train.touch(time);
        }

        for member in &departing {
            if let Some(railcar) = self.railcars.get_mut(member) {
                railcar.set_train(Some(identifier.clone()));
            }
        }

        let mut train = Train::new(identifier.clone(), time, departing_fix, reversed);
        train.set_railcars(departing);
        self.trains.insert(identifier.clone(), train);

        info!(%coupler, train = %parent, split_off = %identifier, "train uncoupled");
        Ok(identifier)
    }

    /// Couples the extremity carrying `source` to the extremity carrying
    /// `target`.
    ///
    /// The source train survives, taking over all railcars of the target
    /// train, which is turned around if both sides meet with the same end.
    /// The target train is disbanded. Returns the surviving train.
    pub fn couple(
        &mut self,
        source: &CouplerId,
        target: &CouplerId,
        time: DateTime<Utc>,
    ) -> Result<TrainId, ChainError> {
        let plan = self
            .plan_coupling(source, target)
            .inspect_err(|err| warn!(%source, %target, %err, "coupling rejected"))?;

        let mut target_train = self
            .trains
            .remove(&plan.target_train)
            .ok_or_else(|| ChainError::TrainNotInChain(plan.target_train.clone()))?;
        self.audit
            .record(&["couple", source.as_str(), target.as_str()]);

        debug!(case = ?plan.case, source = %plan.source_train, target = %plan.target_train, "coupling");

        if plan.case.turns_target() {
            turn_around(&mut target_train, &mut self.railcars);
        }

        let (front, rear) = if plan.case.target_ahead() {
            (&plan.target_railcar, &plan.source_railcar)
        } else {
            (&plan.source_railcar, &plan.target_railcar)
        };
        self.link(front, End::Tail, Some(rear.clone()));
        self.link(rear, End::Head, Some(front.clone()));

        let absorbed = target_train.railcars().to_vec();
        for member in &absorbed {
            if let Some(railcar) = self.railcars.get_mut(member) {
                railcar.set_train(Some(plan.source_train.clone()));
            }
        }

        let target_length = self.length_of(&absorbed);
        let target_fix = target_train.last_fix().cloned();

        if let Some(train) = self.trains.get_mut(&plan.source_train) {
            let source_length: f64 = train
                .railcars()
                .iter()
                .filter_map(|member| self.railcars.get(member))
                .map(|railcar| railcar.length)
                .sum();

            let members: Vec<RailcarId> = if plan.case.target_ahead() {
                absorbed.iter().chain(train.railcars()).cloned().collect()
            } else {
                train.railcars().iter().chain(&absorbed).cloned().collect()
            };

            // the fix describes the head of the merged train
            let fix = match (train.last_fix(), target_fix) {
                (Some(fix), _) => plan
                    .case
                    .target_ahead()
                    .then(|| fix.shifted(target_length)),
                (None, Some(fix)) if !plan.case.turns_target() => {
                    Some(if plan.case.target_ahead() {
                        fix
                    } else {
                        fix.shifted(source_length)
                    })
                }
                (None, _) => None,
            };

            train.set_railcars(members);
            if let Some(fix) = fix {
                train.locate(fix);
            }
            train.touch(time);
        }

        info!(%source, %target, train = %plan.source_train, "railcars coupled");
        self.disband(target_train, absorbed);

        Ok(plan.source_train)
    }

    /// Issues a speed permit to a train.
    pub fn permit(
        &mut self,
        train: &TrainId,
        speed: f64,
        issued: DateTime<Utc>,
    ) -> Result<(), ChainError> {
        self.trains
            .get_mut(train)
            .ok_or_else(|| ChainError::TrainNotInChain(train.clone()))
            .and_then(|entry| entry.permit(speed, issued))
            .inspect_err(|err| warn!(%train, speed, %err, "permit rejected"))
    }

    /// Records a trusted position fix for a train.
    pub fn locate(&mut self, train: &TrainId, fix: MeasuredPosition<L>) -> Result<(), ChainError> {
        let entry = self
            .trains
            .get_mut(train)
            .ok_or_else(|| ChainError::TrainNotInChain(train.clone()))
            .inspect_err(|err| warn!(%train, %err, "fix rejected"))?;
        entry.locate(fix);
        Ok(())
    }

    fn check_unknown(&self, railcar: &Railcar) -> Result<(), ChainError> {
        if self.railcars.contains_key(&railcar.identifier) {
            return Err(ChainError::DuplicateIdentifier(
                railcar.identifier.to_string(),
            ));
        }

        if let (Some(head), Some(tail)) = (railcar.head_coupler(), railcar.tail_coupler())
            && head.identifier == tail.identifier
        {
            return Err(ChainError::DuplicateIdentifier(head.identifier.to_string()));
        }

        if let Some(coupler) = railcar
            .couplers()
            .find(|coupler| self.owner_of(&coupler.identifier).is_some())
        {
            return Err(ChainError::DuplicateIdentifier(
                coupler.identifier.to_string(),
            ));
        }

        Ok(())
    }

    fn membership(&self, railcar: &RailcarId) -> Result<(&Railcar, &Train<L>), ChainError> {
        let not_found = || ChainError::RailcarNotInChain(railcar.clone());
        let unit = self.railcars.get(railcar).ok_or_else(not_found)?;
        let train = unit
            .train()
            .and_then(|identifier| self.trains.get(identifier))
            .ok_or_else(not_found)?;
        Ok((unit, train))
    }

    fn plan_withdrawal(&self, railcar: &RailcarId) -> Result<Withdrawal, ChainError> {
        let (_, train) = self.membership(railcar)?;
        let members = train.railcars();
        let index = members
            .iter()
            .position(|member| member == railcar)
            .ok_or_else(|| ChainError::RailcarNotInChain(railcar.clone()))?;

        if index > 0 && index + 1 < members.len() {
            let facing = |member: &RailcarId, end: End| {
                self.railcars
                    .get(member)
                    .and_then(|unit| unit.end_coupler(end))
                    .map(|coupler| coupler.coupler_type.clone())
            };
            let before = facing(&members[index - 1], End::Tail);
            let after = facing(&members[index + 1], End::Head);

            if before.is_none() || before != after {
                return Err(ChainError::CouplerTypeMismatch {
                    railcar: railcar.clone(),
                    train: train.identifier().clone(),
                });
            }
        }

        Ok(Withdrawal {
            train: train.identifier().clone(),
            index,
        })
    }

    fn plan_uncoupling(&self, coupler: &CouplerId) -> Result<Uncoupling, ChainError> {
        let owner = self
            .owner_of(coupler)
            .ok_or_else(|| ChainError::CouplerNotInChain(coupler.clone()))?;
        let (_, train) = self.membership(&owner.identifier)?;

        let split = TrainView::new(train, &self.railcars, &self.config).split(coupler)?;
        if !split.is_engaged() {
            return Err(ChainError::LooseCoupler(coupler.clone()));
        }

        Ok(Uncoupling {
            train: train.identifier().clone(),
            keep_front: owner.end_of(coupler) == Some(End::Tail),
            front_length: self.length_of(&split.before),
            split,
        })
    }

    fn plan_coupling(&self, source: &CouplerId, target: &CouplerId) -> Result<Coupling, ChainError> {
        let source_unit = self
            .owner_of(source)
            .ok_or_else(|| ChainError::CouplerNotInChain(source.clone()))?;
        let target_unit = self
            .owner_of(target)
            .ok_or_else(|| ChainError::CouplerNotInChain(target.clone()))?;

        if source_unit.identifier == target_unit.identifier {
            return Err(ChainError::SelfCoupling(source_unit.identifier.clone()));
        }

        if target_unit.is_fully_coupled() {
            return Err(ChainError::TargetAlreadyCoupled(
                target_unit.identifier.clone(),
            ));
        }

        let (_, source_train) = self.membership(&source_unit.identifier)?;
        let (_, target_train) = self.membership(&target_unit.identifier)?;
        if source_train.identifier() == target_train.identifier() {
            return Err(ChainError::CircularCoupling(
                source_train.identifier().clone(),
            ));
        }

        let case = match (free_end(source_unit, source), free_end(target_unit, target)) {
            (Some(End::Tail), Some(End::Head)) => CouplingCase::TailToHead,
            (Some(End::Head), Some(End::Tail)) => CouplingCase::HeadToTail,
            (Some(End::Tail), Some(End::Tail)) => CouplingCase::TailToTail,
            (Some(End::Head), Some(End::Head)) => CouplingCase::HeadToHead,
            _ => {
                return Err(ChainError::UnmatchedCouplingGeometry {
                    source_coupler: source.clone(),
                    target_coupler: target.clone(),
                });
            }
        };

        Ok(Coupling {
            case,
            source_railcar: source_unit.identifier.clone(),
            target_railcar: target_unit.identifier.clone(),
            source_train: source_train.identifier().clone(),
            target_train: target_train.identifier().clone(),
        })
    }

    /// Draws train identifiers from the audit log until one is free.
    fn allocate_train_id(&mut self) -> TrainId {
        loop {
            let identifier = TrainId::from_digest(self.audit.allocate_identifier());
            if !self.trains.contains_key(&identifier) {
                return identifier;
            }
        }
    }

    fn link(&mut self, railcar: &RailcarId, end: End, target: Option<RailcarId>) {
        if let Some(unit) = self.railcars.get_mut(railcar) {
            unit.set_target(end, target);
        }
    }

    fn length_of(&self, members: &[RailcarId]) -> f64 {
        members
            .iter()
            .filter_map(|member| self.railcars.get(member))
            .map(|railcar| railcar.length)
            .sum()
    }

    fn disband(&mut self, train: Train<L>, railcars: Vec<RailcarId>) {
        info!(train = %train.identifier(), railcars = ?railcars, "train disbanded");
        for listener in &mut self.listeners {
            listener(&train, &railcars);
        }
    }
}

/// The end of `railcar` carrying `coupler`, if nothing is coupled there yet.
fn free_end(railcar: &Railcar, coupler: &CouplerId) -> Option<End> {
    railcar
        .end_of(coupler)
        .filter(|end| !railcar.end(*end).is_engaged())
}

/// Reverses the railcar order of a train and turns every member.
fn turn_around<L: Location>(train: &mut Train<L>, railcars: &mut BTreeMap<RailcarId, Railcar>) {
    train.railcars_mut().reverse();
    for member in train.railcars() {
        if let Some(railcar) = railcars.get_mut(member) {
            railcar.turn();
        }
    }
}

impl<L: Location> fmt::Display for TrainChain<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = |target: Option<&RailcarId>| target.map(RailcarId::to_string);

        for train in self.trains.values().filter(|train| train.railcar_count() != 1) {
            writeln!(f, "  {}", train.identifier())?;
            for railcar in train
                .railcars()
                .iter()
                .filter_map(|member| self.railcars.get(member))
            {
                writeln!(
                    f,
                    "    <{} (( {} )) {}>",
                    end(railcar.head_end().target()).unwrap_or_else(|| "**".to_string()),
                    railcar.identifier,
                    end(railcar.tail_end().target()).unwrap_or_else(|| "**".to_string()),
                )?;
            }
        }

        let singles: Vec<String> = self
            .trains
            .values()
            .filter(|train| train.railcar_count() == 1)
            .filter_map(|train| train.railcars().first())
            .map(RailcarId::to_string)
            .collect();
        writeln!(f, "  singles: {}", singles.join(" "))
    }
}
