//! Measured and predicted train positions.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::geometry::Location;

/// A trusted position fix, e.g. from a track sensor.
///
/// The sensor sits somewhere under the train; `offset` is the distance from
/// the sensed location to the head of the train.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredPosition<L> {
    time: DateTime<Utc>,
    location: L,
    reversed: bool,
    offset: f64,
}

impl<L: Location> MeasuredPosition<L> {
    /// Creates a fix taken at `time`.
    pub fn new(time: DateTime<Utc>, location: L, reversed: bool, offset: f64) -> Self {
        Self {
            time,
            location,
            reversed,
            offset,
        }
    }

    /// A fix that sits exactly at the train head.
    pub fn at_head(time: DateTime<Utc>, head: L, reversed: bool) -> Self {
        Self::new(time, head, reversed, 0.0)
    }

    /// When the fix was taken.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// The sensed location.
    pub fn location(&self) -> &L {
        &self.location
    }

    /// Train direction at the time of the fix.
    pub fn reversed(&self) -> bool {
        self.reversed
    }

    /// Distance from the sensed location to the train head.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The train head at the time of the fix.
    pub fn head(&self) -> L {
        if self.reversed {
            self.location.advance(-self.offset)
        } else {
            self.location.advance(self.offset)
        }
    }

    /// The same fix with its head moved by `distance`.
    ///
    /// Used when the composition changes at the head of a train; the fix
    /// time is kept.
    pub fn shifted(&self, distance: f64) -> Self {
        Self::at_head(self.time, self.head().advance(distance), self.reversed)
    }
}

/// A three-valued position estimate.
///
/// `minimal` is where the train is if it did not move since its last fix,
/// `nominal` follows the commanded speeds and `maximal` adds a safety margin.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedPosition<L> {
    /// No-motion bound
    pub minimal: L,
    /// Expected position
    pub nominal: L,
    /// Overshoot bound
    pub maximal: L,
}

impl<L: Location> PredictedPosition<L> {
    /// Creates an estimate.
    pub fn new(minimal: L, nominal: L, maximal: L) -> Self {
        Self {
            minimal,
            nominal,
            maximal,
        }
    }

    /// Moves all three bounds by the same distance.
    pub fn advance(&self, distance: f64) -> Self {
        Self {
            minimal: self.minimal.advance(distance),
            nominal: self.nominal.advance(distance),
            maximal: self.maximal.advance(distance),
        }
    }
}

impl<L: fmt::Display> fmt::Display for PredictedPosition<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "< {} [ {} ] {} >", self.minimal, self.nominal, self.maximal)
    }
}
