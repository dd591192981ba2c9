//! Domain types for the train tracking core.
//!
//! Couplers, railcars and positions are plain data. Everything that has to
//! keep several of them consistent lives in [`crate::chain`].

mod coupler;
mod ids;
mod position;
mod railcar;

pub use coupler::{Coupler, CouplerType, Side};
pub use ids::{CouplerId, InvalidIdentifier, RailcarId, TrainId};
pub use position::{MeasuredPosition, PredictedPosition};
pub use railcar::{ControllerRef, End, Railcar, RailcarEnd, Traction};
