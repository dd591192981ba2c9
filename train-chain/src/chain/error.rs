//! Errors from chain operations.
//!
//! Every failing operation leaves the chain exactly as it was, so all of
//! these are safe to report and retry with corrected input.

use chrono::{DateTime, Utc};

use crate::domain::{CouplerId, RailcarId, TrainId};

/// Errors from topology mutations and train operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    /// A railcar, coupler or train with this identifier already exists
    #[error("duplicate identifier '{0}'")]
    DuplicateIdentifier(String),

    /// The railcar is not owned by the chain
    #[error("railcar '{0}' not in chain")]
    RailcarNotInChain(RailcarId),

    /// The train is not owned by the chain
    #[error("train '{0}' not in chain")]
    TrainNotInChain(TrainId),

    /// No railcar in the chain carries this coupler
    #[error("coupler '{0}' not in chain")]
    CouplerNotInChain(CouplerId),

    /// Removing a railcar would join two incompatible couplers
    #[error(
        "railcar '{railcar}' cannot be removed from '{train}': the railcars around it do not have the same coupler type"
    )]
    CouplerTypeMismatch { railcar: RailcarId, train: TrainId },

    /// The coupler does not join two railcars
    #[error("cannot uncouple loose coupler '{0}'")]
    LooseCoupler(CouplerId),

    /// The coupler is not mounted on any railcar of the train
    #[error("coupler '{coupler}' not in train '{train}'")]
    CouplerNotInTrain { coupler: CouplerId, train: TrainId },

    /// Source and target couplers are on the same railcar
    #[error("railcar '{0}' cannot be coupled to itself")]
    SelfCoupling(RailcarId),

    /// Source and target railcars already belong to the same train
    #[error("coupling would close train '{0}' into a ring")]
    CircularCoupling(TrainId),

    /// The target railcar has no free end
    #[error("target '{0}' is coupled at both ends")]
    TargetAlreadyCoupled(RailcarId),

    /// The couplers are not on facing, free train extremities
    #[error("couplers '{source_coupler}' and '{target_coupler}' are not on free facing ends")]
    UnmatchedCouplingGeometry {
        source_coupler: CouplerId,
        target_coupler: CouplerId,
    },

    /// A permit must be issued after the current one
    #[error("permit for '{train}' issued at {issued} is not after the current permit ({current})")]
    PermitOutOfOrder {
        train: TrainId,
        issued: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Permitted speeds are finite and not negative
    #[error("invalid permit speed {0}")]
    InvalidSpeed(f64),
}
