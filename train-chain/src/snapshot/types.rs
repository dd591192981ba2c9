//! Snapshot DTOs.
//!
//! These types map one to one onto the JSON document. Every record rejects
//! unknown fields so a document from a different layout of the format fails
//! loudly instead of losing data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CouplerId, RailcarId, TrainId};

/// The only format version this crate reads and writes.
pub const SNAPSHOT_VERSION: &str = "1";

/// Root of a snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Snapshot<L> {
    /// Format version, currently always "1".
    pub version: String,

    /// Audit digest of the chain, lowercase hex.
    pub hash: String,

    /// Coupler types, referenced from couplers by index.
    pub coupler_types: Vec<CouplerTypeRecord>,

    /// Every railcar owned by the chain.
    pub railcars: Vec<RailcarRecord>,

    /// Every train, referencing railcars by identifier.
    pub trains: Vec<TrainRecord<L>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouplerTypeRecord {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RailcarRecord {
    pub identifier: RailcarId,
    pub length: f64,
    pub maximal_speed: f64,
    pub maximal_deceleration: f64,

    #[serde(default)]
    pub traction: Vec<TractionRecord>,

    /// At most one coupler per side.
    #[serde(default)]
    pub couplers: Vec<CouplerRecord>,

    #[serde(default)]
    pub controllers: Vec<ControllerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TractionRecord {
    pub maximal_acceleration: f64,
    pub maximal_speed: f64,
}

/// Physical side a coupler is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouplerSide {
    Head,
    Tail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouplerRecord {
    pub side: CouplerSide,

    /// Index into the snapshot's coupler types.
    #[serde(rename = "type")]
    pub coupler_type: usize,

    pub identifier: CouplerId,
    pub backlash: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerRecord {
    pub device: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TrainRecord<L> {
    pub identifier: TrainId,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub reversed: bool,

    /// Absent until the train has been located.
    pub last_positioner: Option<FixRecord<L>>,

    /// Members, head first.
    pub railcars: Vec<RailcarReference>,

    /// Permit history, oldest first.
    pub speed_permits: Vec<PermitRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FixRecord<L> {
    pub time: DateTime<Utc>,
    pub location: L,
    pub reversed: bool,
    pub train_offset: f64,
}

/// Whether a railcar's physical head faces the head of its train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RailcarReference {
    pub identifier: RailcarId,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermitRecord {
    pub issued: DateTime<Utc>,
    pub speed: f64,
}

/// Just enough of a document to tell its version.
#[derive(Debug, Deserialize)]
pub(super) struct VersionProbe {
    pub version: String,
}
