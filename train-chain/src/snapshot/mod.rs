//! Persisted snapshots of a train chain.
//!
//! A snapshot is a versioned JSON document holding every railcar, every
//! train with its permits and last fix, and the audit digest. Link targets
//! between railcars are not stored; they follow from train order.

mod convert;
mod error;
mod file;
mod types;

pub use convert::{export, from_json, import, to_json};
pub use error::SnapshotError;
pub use file::{load, save};
pub use types::{
    ControllerRecord, CouplerRecord, CouplerSide, CouplerTypeRecord, Direction, FixRecord,
    PermitRecord, RailcarRecord, RailcarReference, SNAPSHOT_VERSION, Snapshot, TractionRecord,
    TrainRecord,
};
