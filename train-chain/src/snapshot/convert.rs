//! Conversion between a live chain and its snapshot.

use std::collections::{BTreeMap, btree_map::Entry};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::chain::{AuditLog, TrainChain};
use crate::config::PermitConfig;
use crate::domain::{
    ControllerRef, CouplerType, End, MeasuredPosition, Railcar, RailcarId, Side, Traction,
};
use crate::geometry::Location;
use crate::permit::SpeedPermit;
use crate::train::Train;

use super::error::SnapshotError;
use super::types::{
    ControllerRecord, CouplerRecord, CouplerSide, CouplerTypeRecord, Direction, FixRecord,
    PermitRecord, RailcarRecord, RailcarReference, SNAPSHOT_VERSION, Snapshot, TractionRecord,
    TrainRecord, VersionProbe,
};

/// Captures the state of a chain.
pub fn export<L: Location>(chain: &TrainChain<L>) -> Snapshot<L> {
    let mut coupler_types: Vec<CouplerType> = Vec::new();
    for coupler in chain.railcars().flat_map(Railcar::couplers) {
        if !coupler_types.contains(&coupler.coupler_type) {
            coupler_types.push(coupler.coupler_type.clone());
        }
    }

    let railcars = chain
        .railcars()
        .map(|railcar| export_railcar(railcar, &coupler_types))
        .collect();

    let trains = chain
        .trains()
        .map(|train| TrainRecord {
            identifier: train.identifier().clone(),
            created: train.created(),
            changed: train.changed(),
            reversed: train.reversed(),
            last_positioner: train.last_fix().map(|fix| FixRecord {
                time: fix.time(),
                location: fix.location().clone(),
                reversed: fix.reversed(),
                train_offset: fix.offset(),
            }),
            railcars: train
                .members()
                .map(|railcar| RailcarReference {
                    identifier: railcar.identifier.clone(),
                    direction: if railcar.reversed() {
                        Direction::Reverse
                    } else {
                        Direction::Forward
                    },
                })
                .collect(),
            speed_permits: train
                .permits()
                .iter()
                .map(|permit| PermitRecord {
                    issued: permit.issued(),
                    speed: permit.speed(),
                })
                .collect(),
        })
        .collect();

    Snapshot {
        version: SNAPSHOT_VERSION.to_string(),
        hash: chain.digest(),
        coupler_types: coupler_types
            .iter()
            .map(|coupler_type| CouplerTypeRecord {
                name: coupler_type.name().to_string(),
            })
            .collect(),
        railcars,
        trains,
    }
}

fn export_railcar(railcar: &Railcar, coupler_types: &[CouplerType]) -> RailcarRecord {
    let couplers = [(CouplerSide::Head, Side::Head), (CouplerSide::Tail, Side::Tail)]
        .into_iter()
        .filter_map(|(tag, side)| {
            let coupler = railcar.coupler(side)?;
            Some(CouplerRecord {
                side: tag,
                coupler_type: coupler_types
                    .iter()
                    .position(|known| known == &coupler.coupler_type)?,
                identifier: coupler.identifier.clone(),
                backlash: coupler.backlash,
            })
        })
        .collect();

    RailcarRecord {
        identifier: railcar.identifier.clone(),
        length: railcar.length,
        maximal_speed: railcar.maximal_speed,
        maximal_deceleration: railcar.maximal_deceleration,
        traction: railcar
            .traction
            .iter()
            .map(|traction| TractionRecord {
                maximal_acceleration: traction.maximal_acceleration,
                maximal_speed: traction.maximal_speed,
            })
            .collect(),
        couplers,
        controllers: railcar
            .controllers
            .iter()
            .map(|controller| ControllerRecord {
                device: controller.device.clone(),
                channel: controller.channel.clone(),
            })
            .collect(),
    }
}

/// Rebuilds a chain from a snapshot.
///
/// Coupler types are resolved by index, railcars are oriented by their
/// per-train direction tag, and neighbour links are rebuilt from train
/// order. The result is checked for structural consistency before it is
/// returned.
pub fn import<L: Location>(
    snapshot: Snapshot<L>,
    config: PermitConfig,
) -> Result<TrainChain<L>, SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }

    let audit = AuditLog::from_hex(&snapshot.hash)
        .map_err(|err| SnapshotError::Malformed(format!("hash '{}': {err}", snapshot.hash)))?;

    let coupler_types: Vec<CouplerType> = snapshot
        .coupler_types
        .iter()
        .map(|record| CouplerType::new(&record.name))
        .collect();

    let mut pending = BTreeMap::new();
    for record in snapshot.railcars {
        let railcar = import_railcar(record, &coupler_types)?;
        match pending.entry(railcar.identifier.clone()) {
            Entry::Occupied(_) => {
                return Err(SnapshotError::DuplicateIdentifier(
                    railcar.identifier.to_string(),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(railcar);
            }
        }
    }

    let mut railcars = BTreeMap::new();
    let mut trains = BTreeMap::new();
    for record in snapshot.trains {
        let identifier = record.identifier.clone();
        if trains.contains_key(&identifier) {
            return Err(SnapshotError::DuplicateIdentifier(identifier.to_string()));
        }

        let train = import_train(record, &mut pending, &mut railcars)?;
        trains.insert(identifier, train);
    }

    if let Some(orphan) = pending.keys().next() {
        return Err(SnapshotError::Malformed(format!(
            "railcar '{orphan}' does not belong to any train"
        )));
    }

    let chain = TrainChain::restore(trains, railcars, audit, config);
    chain
        .verify()
        .map_err(|err| SnapshotError::Malformed(err.to_string()))?;

    info!(
        trains = chain.train_count(),
        digest = %chain.digest(),
        "snapshot imported"
    );
    Ok(chain)
}

/// Rejects negative or non-finite physical figures.
fn measure(owner: &str, what: &str, value: f64) -> Result<f64, SnapshotError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SnapshotError::Malformed(format!(
            "{owner}: {what} must be a non-negative number, got {value}"
        )))
    }
}

fn import_railcar(
    record: RailcarRecord,
    coupler_types: &[CouplerType],
) -> Result<Railcar, SnapshotError> {
    let owner = format!("railcar '{}'", record.identifier);
    measure(&owner, "length", record.length)?;
    measure(&owner, "maximal speed", record.maximal_speed)?;
    measure(&owner, "maximal deceleration", record.maximal_deceleration)?;

    let mut railcar = Railcar::new(
        record.identifier,
        record.length,
        record.maximal_speed,
        record.maximal_deceleration,
    );

    for coupler in record.couplers {
        let side = match coupler.side {
            CouplerSide::Head => Side::Head,
            CouplerSide::Tail => Side::Tail,
        };
        if railcar.coupler(side).is_some() {
            return Err(SnapshotError::Malformed(format!(
                "railcar '{}' has two couplers on one side",
                railcar.identifier
            )));
        }

        let coupler_type = coupler_types
            .get(coupler.coupler_type)
            .ok_or_else(|| {
                SnapshotError::Malformed(format!(
                    "coupler '{}' references unknown type {}",
                    coupler.identifier, coupler.coupler_type
                ))
            })?
            .clone();
        railcar = railcar.with_coupler(side, coupler.identifier, coupler_type, coupler.backlash);
    }

    for traction in record.traction {
        railcar = railcar.with_traction(Traction {
            maximal_acceleration: measure(
                &owner,
                "traction acceleration",
                traction.maximal_acceleration,
            )?,
            maximal_speed: measure(&owner, "traction speed", traction.maximal_speed)?,
        });
    }

    for controller in record.controllers {
        railcar = railcar.with_controller(ControllerRef {
            device: controller.device,
            channel: controller.channel,
        });
    }

    Ok(railcar)
}

fn import_train<L: Location>(
    record: TrainRecord<L>,
    pending: &mut BTreeMap<RailcarId, Railcar>,
    railcars: &mut BTreeMap<RailcarId, Railcar>,
) -> Result<Train<L>, SnapshotError> {
    let identifier = record.identifier;

    let mut members: Vec<RailcarId> = Vec::with_capacity(record.railcars.len());
    for reference in record.railcars {
        let mut railcar = pending.remove(&reference.identifier).ok_or_else(|| {
            SnapshotError::Malformed(format!(
                "train '{identifier}' references unknown or already placed railcar '{}'",
                reference.identifier
            ))
        })?;

        railcar.orient(reference.direction == Direction::Reverse);
        railcar.set_train(Some(identifier.clone()));

        if let Some(previous) = members.last() {
            railcar.set_target(End::Head, Some(previous.clone()));
            if let Some(front) = railcars.get_mut(previous) {
                front.set_target(End::Tail, Some(railcar.identifier.clone()));
            }
        }

        members.push(railcar.identifier.clone());
        railcars.insert(railcar.identifier.clone(), railcar);
    }

    if members.is_empty() {
        return Err(SnapshotError::Malformed(format!(
            "train '{identifier}' has no railcars"
        )));
    }

    let owner = format!("train '{identifier}'");
    let permits = record
        .speed_permits
        .iter()
        .map(|permit| {
            let speed = measure(&owner, "permit speed", permit.speed)?;
            Ok(SpeedPermit::new(permit.issued, speed, identifier.clone()))
        })
        .collect::<Result<Vec<SpeedPermit>, SnapshotError>>()?;

    let last_fix = record.last_positioner.map(|fix| {
        MeasuredPosition::new(fix.time, fix.location, fix.reversed, fix.train_offset)
    });

    Ok(Train::restore(
        identifier,
        record.created,
        record.changed,
        record.reversed,
        members,
        last_fix,
        permits,
    ))
}

/// Serializes a chain to a pretty-printed JSON snapshot.
pub fn to_json<L: Location + Serialize>(chain: &TrainChain<L>) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(&export(chain))?)
}

/// Reads a chain from a JSON snapshot.
///
/// The version is checked before the rest of the document, so a snapshot
/// from another format version is reported as such rather than as a shape
/// mismatch.
pub fn from_json<L: Location + DeserializeOwned>(
    json: &str,
    config: PermitConfig,
) -> Result<TrainChain<L>, SnapshotError> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    if probe.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(probe.version));
    }

    let snapshot: Snapshot<L> = serde_json::from_str(json)?;
    import(snapshot, config)
}
