//! Train chain tracking core.
//!
//! Keeps track of which railcars are coupled into which trains on a model
//! railway, and estimates where each train is from its last position fix
//! and the speed permits issued to it since.
//!
//! - [`chain::TrainChain`] owns every railcar and train and performs the
//!   topology operations: commission, withdraw, couple, uncouple
//! - [`permit::SpeedPermit`] describes how a train slows down when no new
//!   permit arrives
//! - [`train::TrainView`] turns fixes and permits into a position envelope
//! - [`snapshot`] persists a chain as JSON
//! - [`shared::SharedChain`] shares a chain between async tasks

pub mod chain;
pub mod config;
pub mod domain;
pub mod geometry;
pub mod permit;
pub mod shared;
pub mod snapshot;
pub mod train;
