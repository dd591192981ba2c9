//! Structural checks over a whole chain.
//!
//! The chain maintains these on its own; the checks exist for restored
//! snapshots, which come from outside, and for tests.

use std::collections::BTreeSet;

use crate::domain::{End, RailcarId};
use crate::geometry::Location;

use super::TrainChain;

/// A broken structural rule, described in words.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("inconsistent chain: {0}")]
pub struct Inconsistency(String);

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(Inconsistency(format!($($arg)+)));
        }
    };
}

impl<L: Location> TrainChain<L> {
    /// Checks partition, ownership, link and permit rules.
    ///
    /// - every railcar belongs to exactly one train, and back-references agree
    /// - every train has at least one railcar and at least one permit, with
    ///   strictly increasing issue times
    /// - neighbours in a train are linked to each other, extremities are free
    /// - couplers are unique across the chain
    pub fn verify(&self) -> Result<(), Inconsistency> {
        let mut seen = BTreeSet::new();

        for (identifier, train) in &self.trains {
            ensure!(
                train.identifier() == identifier,
                "train '{}' registered as '{}'",
                train.identifier(),
                identifier
            );
            ensure!(
                !train.railcars().is_empty(),
                "train '{identifier}' has no railcars"
            );
            ensure!(
                !train.permits().is_empty(),
                "train '{identifier}' has no permits"
            );
            ensure!(
                train
                    .permits()
                    .windows(2)
                    .all(|pair| pair[0].issued() < pair[1].issued()),
                "permits of train '{identifier}' are not strictly increasing"
            );

            let members = train.railcars();
            for (index, member) in members.iter().enumerate() {
                ensure!(
                    seen.insert(member.clone()),
                    "railcar '{member}' appears in more than one place"
                );

                let Some(railcar) = self.railcars.get(member) else {
                    return Err(Inconsistency(format!(
                        "train '{identifier}' lists unknown railcar '{member}'"
                    )));
                };
                ensure!(
                    railcar.train() == Some(identifier),
                    "railcar '{member}' does not point back to train '{identifier}'"
                );

                let previous = index.checked_sub(1).map(|index| &members[index]);
                let next = members.get(index + 1);
                ensure!(
                    railcar.end(End::Head).target() == previous,
                    "head end of '{member}' is not linked to its predecessor"
                );
                ensure!(
                    railcar.end(End::Tail).target() == next,
                    "tail end of '{member}' is not linked to its successor"
                );
            }
        }

        let orphans: Vec<&RailcarId> = self
            .railcars
            .keys()
            .filter(|identifier| !seen.contains(*identifier))
            .collect();
        ensure!(orphans.is_empty(), "railcars without a train: {orphans:?}");

        let mut couplers = BTreeSet::new();
        for coupler in self.railcars.values().flat_map(|railcar| railcar.couplers()) {
            ensure!(
                couplers.insert(&coupler.identifier),
                "coupler '{}' mounted twice",
                coupler.identifier
            );
        }

        Ok(())
    }
}
