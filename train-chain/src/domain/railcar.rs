//! Railcars: the unit of coupling.
//!
//! A railcar has two fixed couplers (one per physical side) and two ends
//! that depend on how it currently sits in its train. Turning a railcar
//! swaps which physical side is at the head end; the couplers never move.

use super::{Coupler, CouplerId, CouplerType, RailcarId, Side, TrainId};

/// An end of a railcar in its current orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum End {
    /// The end facing the head of the train.
    Head,
    /// The end facing the tail of the train.
    Tail,
}

/// The current state of one railcar end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RailcarEnd {
    side: Side,
    target: Option<RailcarId>,
}

impl RailcarEnd {
    fn new(side: Side) -> Self {
        Self { side, target: None }
    }

    /// The physical side (and thus coupler) at this end.
    pub fn side(&self) -> Side {
        self.side
    }

    /// The railcar coupled to this end, if any.
    pub fn target(&self) -> Option<&RailcarId> {
        self.target.as_ref()
    }

    /// Returns true if something is coupled to this end.
    pub fn is_engaged(&self) -> bool {
        self.target.is_some()
    }
}

/// A traction unit (motor) mounted in a railcar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Traction {
    /// Acceleration this unit can deliver, in length units per second squared
    pub maximal_acceleration: f64,
    /// Top speed of this unit, in length units per second
    pub maximal_speed: f64,
}

/// Opaque reference to an external control channel.
///
/// Stored and persisted, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRef {
    /// Device name on the layout
    pub device: String,
    /// Channel on that device
    pub channel: String,
}

/// A physical vehicle.
///
/// Created standalone, then handed to a [`TrainChain`](crate::chain::TrainChain)
/// which owns it until it is withdrawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Railcar {
    /// Identifier painted on the vehicle
    pub identifier: RailcarId,
    /// Length over couplers
    pub length: f64,
    /// How fast it can be pulled
    pub maximal_speed: f64,
    /// Braking power, in length units per second squared
    pub maximal_deceleration: f64,
    /// Traction units; empty for unpowered stock
    pub traction: Vec<Traction>,
    /// External control channels
    pub controllers: Vec<ControllerRef>,

    head_coupler: Option<Coupler>,
    tail_coupler: Option<Coupler>,

    head: RailcarEnd,
    tail: RailcarEnd,

    train: Option<TrainId>,
}

impl Railcar {
    /// Creates an uncoupled, forward-facing railcar without couplers or traction.
    pub fn new(
        identifier: RailcarId,
        length: f64,
        maximal_speed: f64,
        maximal_deceleration: f64,
    ) -> Self {
        Self {
            identifier,
            length,
            maximal_speed,
            maximal_deceleration,
            traction: Vec::new(),
            controllers: Vec::new(),
            head_coupler: None,
            tail_coupler: None,
            head: RailcarEnd::new(Side::Head),
            tail: RailcarEnd::new(Side::Tail),
            train: None,
        }
    }

    /// Mounts a coupler on the given physical side.
    pub fn with_coupler(
        mut self,
        side: Side,
        identifier: CouplerId,
        coupler_type: CouplerType,
        backlash: f64,
    ) -> Self {
        let coupler = Coupler::new(
            identifier,
            coupler_type,
            backlash,
            self.identifier.clone(),
        );
        match side {
            Side::Head => self.head_coupler = Some(coupler),
            Side::Tail => self.tail_coupler = Some(coupler),
        }
        self
    }

    /// Adds a traction unit.
    pub fn with_traction(mut self, traction: Traction) -> Self {
        self.traction.push(traction);
        self
    }

    /// Adds a controller reference.
    pub fn with_controller(mut self, controller: ControllerRef) -> Self {
        self.controllers.push(controller);
        self
    }

    /// The coupler on the physical head side.
    pub fn head_coupler(&self) -> Option<&Coupler> {
        self.head_coupler.as_ref()
    }

    /// The coupler on the physical tail side.
    pub fn tail_coupler(&self) -> Option<&Coupler> {
        self.tail_coupler.as_ref()
    }

    /// The coupler on a physical side.
    pub fn coupler(&self, side: Side) -> Option<&Coupler> {
        match side {
            Side::Head => self.head_coupler(),
            Side::Tail => self.tail_coupler(),
        }
    }

    /// Both couplers, head side first.
    pub fn couplers(&self) -> impl Iterator<Item = &Coupler> {
        self.head_coupler.iter().chain(self.tail_coupler.iter())
    }

    /// The current head end.
    pub fn head_end(&self) -> &RailcarEnd {
        &self.head
    }

    /// The current tail end.
    pub fn tail_end(&self) -> &RailcarEnd {
        &self.tail
    }

    /// One of the current ends.
    pub fn end(&self, end: End) -> &RailcarEnd {
        match end {
            End::Head => &self.head,
            End::Tail => &self.tail,
        }
    }

    /// The coupler currently at one of the ends.
    pub fn end_coupler(&self, end: End) -> Option<&Coupler> {
        self.coupler(self.end(end).side)
    }

    /// Returns true if the physical head faces the tail of the train.
    pub fn reversed(&self) -> bool {
        self.head.side != Side::Head
    }

    /// The train currently owning this railcar.
    pub fn train(&self) -> Option<&TrainId> {
        self.train.as_ref()
    }

    /// Returns true if the coupler is mounted on this railcar.
    pub fn owns(&self, coupler: &CouplerId) -> bool {
        self.couplers().any(|c| &c.identifier == coupler)
    }

    /// The current end carrying the given coupler.
    pub fn end_of(&self, coupler: &CouplerId) -> Option<End> {
        [End::Head, End::Tail]
            .into_iter()
            .find(|end| self.end_coupler(*end).is_some_and(|c| &c.identifier == coupler))
    }

    /// Returns true if both ends are coupled to something.
    pub fn is_fully_coupled(&self) -> bool {
        self.head.is_engaged() && self.tail.is_engaged()
    }

    pub(crate) fn set_train(&mut self, train: Option<TrainId>) {
        self.train = train;
    }

    pub(crate) fn set_target(&mut self, end: End, target: Option<RailcarId>) {
        match end {
            End::Head => self.head.target = target,
            End::Tail => self.tail.target = target,
        }
    }

    /// Swaps the head and tail ends, keeping their link targets.
    pub(crate) fn turn(&mut self) {
        std::mem::swap(&mut self.head, &mut self.tail);
    }

    /// Places the physical head at the head end (forward) or tail end (reversed).
    pub(crate) fn orient(&mut self, reversed: bool) {
        if self.reversed() != reversed {
            self.turn();
        }
    }

    pub(crate) fn clear_targets(&mut self) {
        self.head.target = None;
        self.tail.target = None;
    }
}
