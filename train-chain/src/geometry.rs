//! Track geometry collaborator.
//!
//! The tracking core never interprets a location. It only asks the geometry
//! to move a location along the track and to describe the track covered by
//! a train, so any layout model can be plugged in by implementing
//! [`Location`].
//!
//! [`LinearPosition`] is a minimal geometry where every section is an
//! unbounded straight line. It is what the inspection binary and the tests
//! use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A position on the layout.
pub trait Location: Clone + fmt::Debug + fmt::Display {
    /// Track covered behind (or ahead of) a position.
    type Trail;

    /// Track reserved between two positions.
    type Span;

    /// Moves the position by a signed distance in its own direction.
    fn advance(&self, distance: f64) -> Self;

    /// Track covered from this position over a signed `length` along its
    /// own direction; a negative length walks back towards the tail.
    fn trail(&self, length: f64) -> Self::Trail;

    /// Track between `from` and `to`.
    fn span(from: &Self, to: &Self) -> Self::Span;
}

/// Error returned when parsing a [`LinearPosition`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid position '{input}': {reason}")]
pub struct InvalidPosition {
    input: String,
    reason: &'static str,
}

/// A position on a straight section.
///
/// The textual form is `section@offset` followed by `f` (facing increasing
/// offsets) or `r` (facing decreasing offsets), e.g. `depot@12.5f`.
///
/// # Examples
///
/// ```
/// use train_chain::geometry::{LinearPosition, Location};
///
/// let head: LinearPosition = "depot@10f".parse().unwrap();
/// assert_eq!(head.advance(2.5).to_string(), "depot@12.5f");
///
/// let head: LinearPosition = "depot@10r".parse().unwrap();
/// assert_eq!(head.advance(2.5).offset, 7.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinearPosition {
    /// Section name
    pub section: String,
    /// Distance from the section origin
    pub offset: f64,
    /// True when facing decreasing offsets
    pub reversed: bool,
}

impl LinearPosition {
    /// Creates a position.
    pub fn new(section: impl Into<String>, offset: f64, reversed: bool) -> Self {
        Self {
            section: section.into(),
            offset,
            reversed,
        }
    }

    fn direction(&self) -> f64 {
        if self.reversed { -1.0 } else { 1.0 }
    }
}

/// A stretch of one straight section, `start <= end`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterval {
    /// Section name
    pub section: String,
    /// Lower offset
    pub start: f64,
    /// Upper offset
    pub end: f64,
}

impl LinearInterval {
    fn between(section: &str, a: f64, b: f64) -> Self {
        Self {
            section: section.to_string(),
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Length of the interval.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Returns true if the offset lies inside the interval.
    pub fn contains(&self, offset: f64) -> bool {
        self.start <= offset && offset <= self.end
    }
}

impl Location for LinearPosition {
    type Trail = LinearInterval;
    type Span = Option<LinearInterval>;

    fn advance(&self, distance: f64) -> Self {
        Self {
            section: self.section.clone(),
            offset: self.offset + distance * self.direction(),
            reversed: self.reversed,
        }
    }

    fn trail(&self, length: f64) -> LinearInterval {
        let other = self.advance(length);
        LinearInterval::between(&self.section, self.offset, other.offset)
    }

    /// Positions on different sections have no span in this geometry.
    fn span(from: &Self, to: &Self) -> Option<LinearInterval> {
        if from.section != to.section {
            return None;
        }
        Some(LinearInterval::between(&from.section, from.offset, to.offset))
    }
}

impl fmt::Display for LinearPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.reversed { 'r' } else { 'f' };
        write!(f, "{}@{}{}", self.section, self.offset, direction)
    }
}

impl FromStr for LinearPosition {
    type Err = InvalidPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| InvalidPosition {
            input: s.to_string(),
            reason,
        };

        let (section, rest) = s.rsplit_once('@').ok_or_else(|| invalid("missing '@'"))?;
        if section.is_empty() {
            return Err(invalid("empty section name"));
        }

        let reversed = match rest.chars().last() {
            Some('f') => false,
            Some('r') => true,
            _ => return Err(invalid("expected direction 'f' or 'r'")),
        };

        let offset: f64 = rest[..rest.len() - 1]
            .parse()
            .map_err(|_| invalid("invalid offset"))?;
        if !offset.is_finite() {
            return Err(invalid("offset must be finite"));
        }

        Ok(Self::new(section, offset, reversed))
    }
}

impl TryFrom<String> for LinearPosition {
    type Error = InvalidPosition;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LinearPosition> for String {
    fn from(position: LinearPosition) -> Self {
        position.to_string()
    }
}
