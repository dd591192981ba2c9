//! Speed permit timing configuration.

use chrono::Duration;

/// Timing of the permit decay profile.
///
/// A train runs at its permitted speed for `validity + hold`, then brakes
/// gently (`breaking_factor` of its maximal deceleration) for `emergency`,
/// then brakes at full deceleration until it stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermitConfig {
    /// How long a permit is usually valid (milliseconds).
    /// A new permit should be issued within this interval.
    pub validity_ms: i64,

    /// Grace period after validity before braking starts (milliseconds).
    pub hold_ms: i64,

    /// Duration of gentle braking before full braking (milliseconds).
    pub emergency_ms: i64,

    /// Share of the maximal deceleration applied during gentle braking.
    pub breaking_factor: f64,
}

impl PermitConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(validity_ms: i64, hold_ms: i64, emergency_ms: i64, breaking_factor: f64) -> Self {
        Self {
            validity_ms,
            hold_ms,
            emergency_ms,
            breaking_factor,
        }
    }

    /// Returns the validity as a Duration.
    pub fn validity(&self) -> Duration {
        Duration::milliseconds(self.validity_ms)
    }

    /// Returns the hold as a Duration.
    pub fn hold(&self) -> Duration {
        Duration::milliseconds(self.hold_ms)
    }

    /// Returns the gentle braking phase as a Duration.
    pub fn emergency(&self) -> Duration {
        Duration::milliseconds(self.emergency_ms)
    }

    /// Time after issue at which braking starts.
    pub fn braking_onset(&self) -> Duration {
        self.validity() + self.hold()
    }

    /// Time after issue at which full braking starts.
    pub fn full_braking_onset(&self) -> Duration {
        self.braking_onset() + self.emergency()
    }
}

impl Default for PermitConfig {
    fn default() -> Self {
        Self {
            validity_ms: 1000,
            hold_ms: 500,
            emergency_ms: 5000,
            breaking_factor: 0.1,
        }
    }
}
