//! Couplers and coupler types.

use std::fmt;
use std::sync::Arc;

use super::{CouplerId, RailcarId};

/// A category of mechanically compatible couplers (e.g. "nem362", "kadee").
///
/// Types are deduplicated by name within a chain, so two types are equal
/// exactly when their names are.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CouplerType(Arc<str>);

impl CouplerType {
    /// Create a coupler type with the given name.
    pub fn new(name: &str) -> Self {
        CouplerType(Arc::from(name))
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CouplerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CouplerType({})", self.0)
    }
}

impl fmt::Display for CouplerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A physical side of a railcar, independent of its current orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The side the manufacturer calls the head.
    Head,
    /// The opposite side.
    Tail,
}

/// One mechanical connection point, permanently mounted on one railcar.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupler {
    /// Chain-wide unique identifier
    pub identifier: CouplerId,
    /// Compatibility category
    pub coupler_type: CouplerType,
    /// Slack between coupled railcars, in layout length units
    pub backlash: f64,
    /// Railcar this coupler is mounted on
    pub railcar: RailcarId,
}

impl Coupler {
    /// Creates a coupler mounted on `railcar`.
    pub fn new(
        identifier: CouplerId,
        coupler_type: CouplerType,
        backlash: f64,
        railcar: RailcarId,
    ) -> Self {
        Self {
            identifier,
            coupler_type,
            backlash,
            railcar,
        }
    }
}
