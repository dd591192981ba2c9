//! Speed permits and their braking curve.
//!
//! A permit authorises a speed for a short time. If control does not issue
//! a fresh permit, the train is expected to brake on its own:
//!
//! ```text
//! speed
//!   |________________
//!   |                \__  gentle braking
//!   |                   \__
//!   |                      \    full braking
//!   |                       \
//!   +--------+------+--------+-------- time
//!   0     validity  +emergency
//!            +hold
//! ```
//!
//! Because the curve is fixed at issue time, the distance a train can cover
//! on a permit is bounded and computable, which is what the position
//! envelope relies on.

use chrono::{DateTime, Duration, Utc};

use crate::config::PermitConfig;
use crate::domain::TrainId;

/// Braking parameters a permit is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Braking {
    /// Platform timing
    pub config: PermitConfig,
    /// Full deceleration of the train
    pub maximal_deceleration: f64,
}

impl Braking {
    /// Creates braking parameters.
    pub fn new(config: PermitConfig, maximal_deceleration: f64) -> Self {
        Self {
            config,
            maximal_deceleration,
        }
    }

    /// Deceleration during the gentle braking phase.
    pub fn default_breaking_deceleration(&self) -> f64 {
        self.maximal_deceleration * self.config.breaking_factor
    }
}

/// A timestamped speed authorisation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedPermit {
    issued: DateTime<Utc>,
    speed: f64,
    train: TrainId,
}

impl SpeedPermit {
    /// Creates a permit for `train`.
    pub fn new(issued: DateTime<Utc>, speed: f64, train: TrainId) -> Self {
        Self {
            issued,
            speed,
            train,
        }
    }

    /// When the permit was issued.
    pub fn issued(&self) -> DateTime<Utc> {
        self.issued
    }

    /// The permitted speed, in length units per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The train the permit was issued to.
    pub fn train(&self) -> &TrainId {
        &self.train
    }

    /// The speed the train should be running at `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use train_chain::config::PermitConfig;
    /// use train_chain::domain::TrainId;
    /// use train_chain::permit::{Braking, SpeedPermit};
    ///
    /// let issued = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
    /// let permit = SpeedPermit::new(issued, 10.0, TrainId::new("a1b2c3").unwrap());
    /// let braking = Braking::new(PermitConfig::default(), 2.0);
    ///
    /// // still inside validity + hold
    /// assert_eq!(permit.speed_at(issued + Duration::milliseconds(1200), &braking), 10.0);
    ///
    /// // half a second into gentle braking at 0.2 per second squared
    /// let speed = permit.speed_at(issued + Duration::milliseconds(2000), &braking);
    /// assert!((speed - 9.9).abs() < 1e-9);
    /// ```
    pub fn speed_at(&self, now: DateTime<Utc>, braking: &Braking) -> f64 {
        let elapsed = now - self.issued;
        let config = &braking.config;

        if elapsed < config.braking_onset() {
            return self.speed;
        }

        if elapsed < config.full_braking_onset() {
            let braking_time = seconds(elapsed - config.braking_onset());
            return decelerate(self.speed, braking.default_breaking_deceleration(), braking_time);
        }

        let gentle = decelerate(
            self.speed,
            braking.default_breaking_deceleration(),
            seconds(config.emergency()),
        );
        let braking_time = seconds(elapsed - config.full_braking_onset());
        decelerate(gentle, braking.maximal_deceleration, braking_time)
    }

    /// Distance covered on this permit between issue and `now`.
    ///
    /// Integrates the speed curve phase by phase. Returns 0 for any `now`
    /// before the issue time, and never grows once the train has stopped.
    pub fn distance_at(&self, now: DateTime<Utc>, braking: &Braking) -> f64 {
        let config = &braking.config;
        let mut remaining = seconds(now - self.issued);
        let mut distance = 0.0;
        let mut speed = self.speed;

        // constant speed
        if remaining > 0.0 {
            let time = remaining.min(seconds(config.braking_onset()));
            distance += speed * time;
            remaining -= time;
        }

        // gentle braking
        if remaining > 0.0 {
            let time = remaining.min(seconds(config.emergency()));
            let final_speed = decelerate(speed, braking.default_breaking_deceleration(), time);
            distance += (speed + final_speed) / 2.0 * time;
            remaining -= time;
            speed = final_speed;
        }

        // full braking
        if remaining > 0.0 {
            let time = remaining.min(time_to_stop(speed, braking.maximal_deceleration));
            let final_speed = decelerate(speed, braking.maximal_deceleration, time);
            distance += (speed + final_speed) / 2.0 * time;
        }

        distance
    }

    /// Distance covered on this permit between `from` and `to`.
    pub fn distance_between(&self, from: DateTime<Utc>, to: DateTime<Utc>, braking: &Braking) -> f64 {
        (self.distance_at(to, braking) - self.distance_at(from, braking)).max(0.0)
    }

    /// The latest time at which the train will have stopped on this permit.
    pub fn stopped_by(&self, braking: &Braking) -> DateTime<Utc> {
        let seconds_to_stop = time_to_stop(self.speed, braking.maximal_deceleration);
        if !seconds_to_stop.is_finite() {
            return DateTime::<Utc>::MAX_UTC;
        }
        // one extra microsecond absorbs rounding in the conversion
        let stopping = Duration::microseconds((seconds_to_stop * 1e6).ceil() as i64 + 1);
        self.issued
            .checked_add_signed(braking.config.full_braking_onset())
            .and_then(|onset| onset.checked_add_signed(stopping))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn seconds(duration: Duration) -> f64 {
    duration.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6
}

fn decelerate(speed: f64, deceleration: f64, time: f64) -> f64 {
    (speed - deceleration * time).max(0.0)
}

fn time_to_stop(speed: f64, deceleration: f64) -> f64 {
    if speed <= 0.0 {
        return 0.0;
    }
    if deceleration <= 0.0 {
        return f64::INFINITY;
    }
    speed / deceleration
}
