//! Scenario tests for the topology operations.

use super::*;
use crate::domain::{CouplerType, Side};
use crate::geometry::LinearPosition;
use chrono::{Duration, TimeZone};
use std::sync::{Arc, Mutex};

type Chain = TrainChain<LinearPosition>;
type Disbanded = Arc<Mutex<Vec<(TrainId, Vec<RailcarId>)>>>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
}

fn ms(n: i64) -> DateTime<Utc> {
    t0() + Duration::milliseconds(n)
}

fn rid(s: &str) -> RailcarId {
    RailcarId::new(s).unwrap()
}

fn cid(s: &str) -> CouplerId {
    CouplerId::new(s).unwrap()
}

fn ids(names: &[&str]) -> Vec<RailcarId> {
    names.iter().map(|name| rid(name)).collect()
}

fn typed_car(name: &str, length: f64, head: &str, tail: &str) -> Railcar {
    Railcar::new(rid(name), length, 30.0, 1.0)
        .with_coupler(Side::Head, cid(&format!("{name}-h")), CouplerType::new(head), 0.0)
        .with_coupler(Side::Tail, cid(&format!("{name}-t")), CouplerType::new(tail), 0.0)
}

fn car(name: &str, length: f64) -> Railcar {
    typed_car(name, length, "nem", "nem")
}

fn commission(chain: &mut Chain, railcar: Railcar) -> TrainId {
    chain.commission(railcar, t0()).unwrap()
}

/// Commissions the railcars and couples them tail to head, in order.
fn formed(chain: &mut Chain, cars: Vec<Railcar>) -> TrainId {
    let names: Vec<String> = cars.iter().map(|c| c.identifier.to_string()).collect();
    let mut trains: Vec<TrainId> = cars.into_iter().map(|c| commission(chain, c)).collect();
    let train = trains.remove(0);

    for pair in names.windows(2) {
        chain
            .couple(
                &cid(&format!("{}-t", pair[0])),
                &cid(&format!("{}-h", pair[1])),
                t0(),
            )
            .unwrap();
    }
    train
}

fn members(chain: &Chain, train: &TrainId) -> Vec<RailcarId> {
    chain.train(train).unwrap().railcars().to_vec()
}

fn recorder(chain: &mut Chain) -> Disbanded {
    let log: Disbanded = Arc::default();
    let sink = Arc::clone(&log);
    chain.on_disband(move |train, railcars| {
        sink.lock()
            .unwrap()
            .push((train.identifier().clone(), railcars.to_vec()));
    });
    log
}

fn locate_at(chain: &mut Chain, train: &TrainId, offset: f64) {
    chain
        .locate(
            train,
            MeasuredPosition::at_head(t0(), LinearPosition::new("main", offset, false), false),
        )
        .unwrap();
}

fn head_offset(chain: &Chain, train: &TrainId) -> f64 {
    chain.train(train).unwrap().last_fix().unwrap().head().offset
}

/// Asserts that a rejected call left the chain untouched.
fn assert_rejected<T: fmt::Debug>(
    chain: &mut Chain,
    expected: ChainError,
    operation: impl FnOnce(&mut Chain) -> Result<T, ChainError>,
) {
    let digest = chain.digest();
    let state = format!("{chain:?}");

    let result = operation(chain);

    assert_eq!(result.unwrap_err(), expected);
    assert_eq!(chain.digest(), digest);
    assert_eq!(format!("{chain:?}"), state);
}

#[test]
fn commission_forms_single_railcar_train() {
    let mut chain = Chain::default();
    let train = commission(&mut chain, car("a", 10.0));

    assert_eq!(train.as_str().len(), 6);
    assert!(train.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(members(&chain, &train), ids(&["a"]));
    assert_eq!(chain.railcar(&rid("a")).unwrap().train(), Some(&train));
    assert_eq!(chain.train_of(&rid("a")).unwrap().identifier(), &train);

    let view = chain.train(&train).unwrap();
    assert_eq!(view.permits().len(), 1);
    assert_eq!(view.current_speed(ms(10)), 0.0);
    assert!(view.last_fix().is_none());

    assert_ne!(chain.digest(), AuditLog::new().to_hex());
    chain.verify().unwrap();
}

#[test]
fn commission_rejects_known_identifiers() {
    let mut chain = Chain::default();
    commission(&mut chain, car("a", 10.0));

    assert_rejected(
        &mut chain,
        ChainError::DuplicateIdentifier("a".to_string()),
        |chain| chain.commission(car("a", 12.0), t0()),
    );

    let clash = Railcar::new(rid("b"), 5.0, 30.0, 1.0).with_coupler(
        Side::Tail,
        cid("a-h"),
        CouplerType::new("nem"),
        0.0,
    );
    assert_rejected(
        &mut chain,
        ChainError::DuplicateIdentifier("a-h".to_string()),
        |chain| chain.commission(clash, t0()),
    );
}

#[test]
fn train_identifiers_are_deterministic() {
    let build = || {
        let mut chain = Chain::default();
        let a = commission(&mut chain, car("a", 10.0));
        let b = commission(&mut chain, car("b", 10.0));
        chain.couple(&cid("a-t"), &cid("b-h"), t0()).unwrap();
        let c = chain.uncouple(&cid("a-t"), ms(5)).unwrap();
        (chain.digest(), a, b, c)
    };

    let first = build();
    assert_eq!(first, build());
    assert_ne!(first.1, first.2);
    assert_ne!(first.1, first.3);
}

#[test]
fn couple_tail_to_head() {
    let mut chain = Chain::default();
    let disbanded = recorder(&mut chain);
    let a = commission(&mut chain, car("a", 10.0));
    let b = commission(&mut chain, car("b", 8.0));

    let survivor = chain.couple(&cid("a-t"), &cid("b-h"), ms(100)).unwrap();

    assert_eq!(survivor, a);
    assert_eq!(members(&chain, &a), ids(&["a", "b"]));
    assert!(chain.train(&b).is_none());
    assert_eq!(chain.train_count(), 1);

    let railcar_a = chain.railcar(&rid("a")).unwrap();
    let railcar_b = chain.railcar(&rid("b")).unwrap();
    assert_eq!(railcar_a.tail_end().target(), Some(&rid("b")));
    assert_eq!(railcar_b.head_end().target(), Some(&rid("a")));
    assert_eq!(railcar_b.train(), Some(&a));
    assert!(!railcar_b.reversed());

    assert_eq!(chain.train(&a).unwrap().changed(), ms(100));
    assert_eq!(*disbanded.lock().unwrap(), vec![(b, ids(&["b"]))]);
    chain.verify().unwrap();
}

#[test]
fn couple_head_to_tail_puts_target_in_front() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    commission(&mut chain, car("b", 8.0));

    chain.couple(&cid("a-h"), &cid("b-t"), t0()).unwrap();

    assert_eq!(members(&chain, &a), ids(&["b", "a"]));
    assert!(!chain.railcar(&rid("b")).unwrap().reversed());
    chain.verify().unwrap();
}

#[test]
fn couple_tail_to_tail_turns_target() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    commission(&mut chain, car("b", 8.0));

    chain.couple(&cid("a-t"), &cid("b-t"), t0()).unwrap();

    assert_eq!(members(&chain, &a), ids(&["a", "b"]));
    let b = chain.railcar(&rid("b")).unwrap();
    assert!(b.reversed());
    assert_eq!(b.end_of(&cid("b-t")), Some(End::Head));
    assert_eq!(b.head_end().target(), Some(&rid("a")));
    chain.verify().unwrap();
}

#[test]
fn couple_head_to_head_turns_target_in_front() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    commission(&mut chain, car("b", 8.0));

    chain.couple(&cid("a-h"), &cid("b-h"), t0()).unwrap();

    assert_eq!(members(&chain, &a), ids(&["b", "a"]));
    assert!(chain.railcar(&rid("b")).unwrap().reversed());
    assert!(!chain.railcar(&rid("a")).unwrap().reversed());
    chain.verify().unwrap();
}

#[test]
fn coupling_turns_the_whole_target_train() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    let x = formed(&mut chain, vec![car("c", 5.0), car("d", 6.0)]);
    let disbanded = recorder(&mut chain);

    chain.couple(&cid("a-t"), &cid("d-t"), t0()).unwrap();

    assert_eq!(members(&chain, &a), ids(&["a", "d", "c"]));
    assert!(chain.railcar(&rid("c")).unwrap().reversed());
    assert!(chain.railcar(&rid("d")).unwrap().reversed());
    assert_eq!(*disbanded.lock().unwrap(), vec![(x, ids(&["d", "c"]))]);
    chain.verify().unwrap();
}

#[test]
fn coupling_rejections_leave_chain_untouched() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0), car("c", 1.0)]);
    commission(&mut chain, car("d", 1.0));

    assert_rejected(&mut chain, ChainError::SelfCoupling(rid("d")), |chain| {
        chain.couple(&cid("d-h"), &cid("d-t"), t0())
    });
    assert_rejected(
        &mut chain,
        ChainError::TargetAlreadyCoupled(rid("b")),
        |chain| chain.couple(&cid("d-t"), &cid("b-h"), t0()),
    );
    assert_rejected(&mut chain, ChainError::CircularCoupling(train), |chain| {
        chain.couple(&cid("a-h"), &cid("c-t"), t0())
    });
    assert_rejected(
        &mut chain,
        ChainError::UnmatchedCouplingGeometry {
            source_coupler: cid("d-t"),
            target_coupler: cid("a-t"),
        },
        |chain| chain.couple(&cid("d-t"), &cid("a-t"), t0()),
    );
    assert_rejected(
        &mut chain,
        ChainError::CouplerNotInChain(cid("z-h")),
        |chain| chain.couple(&cid("z-h"), &cid("a-h"), t0()),
    );
}

#[test]
fn railcar_with_one_coupler_couples() {
    let mut chain = Chain::default();
    commission(&mut chain, car("a", 1.0));
    let bare = Railcar::new(rid("b"), 1.0, 30.0, 1.0).with_coupler(
        Side::Tail,
        cid("b-t"),
        CouplerType::new("nem"),
        0.0,
    );
    commission(&mut chain, bare);

    chain.couple(&cid("a-t"), &cid("b-t"), t0()).unwrap();
    assert_eq!(chain.train_count(), 1);
    chain.verify().unwrap();
}

#[test]
fn uncouple_at_tail_coupler_keeps_front() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0), car("c", 1.0)]);

    let split_off = chain.uncouple(&cid("b-t"), ms(200)).unwrap();

    assert_ne!(split_off, train);
    assert_eq!(members(&chain, &train), ids(&["a", "b"]));
    assert_eq!(members(&chain, &split_off), ids(&["c"]));
    assert_eq!(chain.railcar(&rid("c")).unwrap().train(), Some(&split_off));
    assert!(chain.railcar(&rid("b")).unwrap().tail_end().target().is_none());
    assert!(chain.railcar(&rid("c")).unwrap().head_end().target().is_none());

    let new = chain.train(&split_off).unwrap();
    assert_eq!(new.created(), ms(200));
    assert_eq!(new.permits().len(), 1);
    assert_eq!(new.current_speed(ms(300)), 0.0);
    chain.verify().unwrap();
}

#[test]
fn uncouple_at_head_coupler_keeps_rear() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0), car("c", 1.0)]);

    let split_off = chain.uncouple(&cid("b-h"), t0()).unwrap();

    assert_eq!(members(&chain, &train), ids(&["b", "c"]));
    assert_eq!(members(&chain, &split_off), ids(&["a"]));
    chain.verify().unwrap();
}

#[test]
fn uncouple_loose_coupler_is_rejected() {
    let mut chain = Chain::default();
    formed(&mut chain, vec![car("a", 1.0), car("b", 1.0)]);

    assert_rejected(&mut chain, ChainError::LooseCoupler(cid("a-h")), |chain| {
        chain.uncouple(&cid("a-h"), t0())
    });
    assert_rejected(
        &mut chain,
        ChainError::CouplerNotInChain(cid("q-t")),
        |chain| chain.uncouple(&cid("q-t"), t0()),
    );
}

#[test]
fn uncouple_undoes_couple() {
    let mut chain = Chain::default();
    let a = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0)]);
    let c = formed(&mut chain, vec![car("c", 1.0), car("d", 1.0)]);

    chain.couple(&cid("b-t"), &cid("c-h"), t0()).unwrap();
    assert_eq!(members(&chain, &a), ids(&["a", "b", "c", "d"]));
    assert!(chain.train(&c).is_none());

    let split_off = chain.uncouple(&cid("b-t"), t0()).unwrap();
    assert_eq!(members(&chain, &a), ids(&["a", "b"]));
    assert_eq!(members(&chain, &split_off), ids(&["c", "d"]));
    chain.verify().unwrap();
}

#[test]
fn uncouple_derives_fixes_from_parent() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 10.0), car("b", 5.0)]);
    chain.permit(&train, 2.0, ms(1)).unwrap();
    locate_at(&mut chain, &train, 100.0);

    let split_off = chain.uncouple(&cid("a-t"), ms(5000)).unwrap();

    assert_eq!(head_offset(&chain, &train), 100.0);
    assert_eq!(head_offset(&chain, &split_off), 90.0);
    let fix_time = chain.train(&split_off).unwrap().last_fix().unwrap().time();
    assert_eq!(fix_time, t0());

    // the parent keeps its permits, the new train starts stopped
    assert_eq!(chain.train(&train).unwrap().permits().len(), 2);
    assert_eq!(chain.train(&split_off).unwrap().permits().len(), 1);
}

#[test]
fn uncouple_keeping_rear_moves_parent_fix_back() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 10.0), car("b", 5.0)]);
    locate_at(&mut chain, &train, 100.0);

    let split_off = chain.uncouple(&cid("b-h"), t0()).unwrap();

    assert_eq!(members(&chain, &train), ids(&["b"]));
    assert_eq!(head_offset(&chain, &train), 90.0);
    assert_eq!(head_offset(&chain, &split_off), 100.0);
}

#[test]
fn split_off_train_inherits_direction() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0)]);
    let parent = chain.train(&train).unwrap().reversed();

    let split_off = chain.uncouple(&cid("a-t"), t0()).unwrap();
    assert_eq!(chain.train(&split_off).unwrap().reversed(), parent);
}

#[test]
fn coupling_in_front_moves_fix_forward() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    commission(&mut chain, car("b", 8.0));
    locate_at(&mut chain, &a, 50.0);

    chain.couple(&cid("a-h"), &cid("b-t"), t0()).unwrap();
    assert_eq!(head_offset(&chain, &a), 58.0);
}

#[test]
fn coupling_behind_keeps_fix() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    commission(&mut chain, car("b", 8.0));
    locate_at(&mut chain, &a, 50.0);

    chain.couple(&cid("a-t"), &cid("b-h"), t0()).unwrap();
    assert_eq!(head_offset(&chain, &a), 50.0);
}

#[test]
fn coupling_head_to_head_moves_fix_forward() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    commission(&mut chain, car("b", 8.0));
    locate_at(&mut chain, &a, 50.0);

    chain.couple(&cid("a-h"), &cid("b-h"), t0()).unwrap();

    assert_eq!(members(&chain, &a), ids(&["b", "a"]));
    assert!(chain.railcar(&rid("b")).unwrap().reversed());
    assert_eq!(head_offset(&chain, &a), 58.0);
}

#[test]
fn reversed_fix_extends_behind_head() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 10.0), car("b", 5.0)]);
    chain
        .locate(
            &train,
            MeasuredPosition::at_head(t0(), LinearPosition::new("main", 50.0, true), true),
        )
        .unwrap();
    chain.permit(&train, 2.0, ms(1)).unwrap();

    let view = chain.train(&train).unwrap();
    let head = view.head(ms(1001)).unwrap();
    assert_eq!(head.minimal.offset, 50.0);
    assert!((head.nominal.offset - 48.0).abs() < 1e-9);
    assert!((head.maximal.offset - 47.0).abs() < 1e-9);

    let tail = view.tail(ms(1001)).unwrap();
    assert_eq!(tail.minimal.offset, 65.0);
    assert!((tail.nominal.offset - 63.0).abs() < 1e-9);

    let span = view.span(ms(1001)).unwrap().unwrap();
    assert!((span.start - 47.0).abs() < 1e-9);
    assert_eq!(span.end, 65.0);

    // the occupied track lies on the tail side of the head
    let trail = view.nominal_trail(ms(1001)).unwrap();
    assert!((trail.start - 48.0).abs() < 1e-9);
    assert!((trail.end - 63.0).abs() < 1e-9);
}

#[test]
fn unlocated_source_adopts_target_fix() {
    let mut chain = Chain::default();
    let a = commission(&mut chain, car("a", 10.0));
    let b = commission(&mut chain, car("b", 8.0));
    locate_at(&mut chain, &b, 30.0);

    chain.couple(&cid("a-t"), &cid("b-h"), t0()).unwrap();
    assert_eq!(head_offset(&chain, &a), 40.0);
}

#[test]
fn withdraw_from_middle_fuses_neighbours() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0), car("c", 1.0)]);

    let railcar = chain.withdraw(&rid("b"), ms(50)).unwrap();

    assert_eq!(members(&chain, &train), ids(&["a", "c"]));
    assert_eq!(
        chain.railcar(&rid("a")).unwrap().tail_end().target(),
        Some(&rid("c"))
    );
    assert_eq!(
        chain.railcar(&rid("c")).unwrap().head_end().target(),
        Some(&rid("a"))
    );
    assert!(chain.railcar(&rid("b")).is_none());

    assert_eq!(railcar.identifier, rid("b"));
    assert!(railcar.train().is_none());
    assert!(!railcar.head_end().is_engaged());
    assert!(!railcar.tail_end().is_engaged());
    assert_eq!(chain.train(&train).unwrap().changed(), ms(50));
    chain.verify().unwrap();
}

#[test]
fn withdraw_from_end_clears_neighbour() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0)]);

    chain.withdraw(&rid("b"), t0()).unwrap();

    assert_eq!(members(&chain, &train), ids(&["a"]));
    assert!(chain.railcar(&rid("a")).unwrap().tail_end().target().is_none());
    chain.verify().unwrap();
}

#[test]
fn withdraw_rejects_incompatible_neighbours() {
    let mut chain = Chain::default();
    let train = formed(
        &mut chain,
        vec![
            typed_car("a", 1.0, "nem", "nem"),
            typed_car("b", 1.0, "nem", "kadee"),
            typed_car("c", 1.0, "kadee", "kadee"),
        ],
    );

    assert_rejected(
        &mut chain,
        ChainError::CouplerTypeMismatch {
            railcar: rid("b"),
            train,
        },
        |chain| chain.withdraw(&rid("b"), t0()),
    );
    assert_rejected(
        &mut chain,
        ChainError::RailcarNotInChain(rid("x")),
        |chain| chain.withdraw(&rid("x"), t0()),
    );
}

#[test]
fn withdrawing_last_railcar_disbands_train() {
    let mut chain = Chain::default();
    let disbanded = recorder(&mut chain);
    let train = commission(&mut chain, car("a", 1.0));

    chain.withdraw(&rid("a"), t0()).unwrap();

    assert_eq!(chain.train_count(), 0);
    assert_eq!(chain.railcars().count(), 0);
    assert_eq!(*disbanded.lock().unwrap(), vec![(train, ids(&["a"]))]);
    chain.verify().unwrap();
}

#[test]
fn withdrawing_head_moves_fix_back() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 10.0), car("b", 5.0)]);
    locate_at(&mut chain, &train, 100.0);

    chain.withdraw(&rid("a"), t0()).unwrap();
    assert_eq!(head_offset(&chain, &train), 90.0);
}

#[test]
fn withdrawn_railcar_can_return() {
    let mut chain = Chain::default();
    formed(&mut chain, vec![car("a", 1.0), car("b", 1.0)]);

    let railcar = chain.withdraw(&rid("b"), t0()).unwrap();
    let train = chain.commission(railcar, ms(10)).unwrap();

    assert_eq!(members(&chain, &train), ids(&["b"]));
    chain.verify().unwrap();
}

#[test]
fn permits_and_fixes_through_chain() {
    let mut chain = Chain::default();
    let train = commission(&mut chain, car("a", 10.0));
    let unknown = TrainId::new("ffffff").unwrap();

    chain.permit(&train, 3.0, ms(10)).unwrap();
    assert_eq!(chain.train(&train).unwrap().current_speed(ms(20)), 3.0);

    assert_rejected(
        &mut chain,
        ChainError::PermitOutOfOrder {
            train: train.clone(),
            issued: ms(5),
            current: ms(10),
        },
        |chain| chain.permit(&train, 4.0, ms(5)),
    );
    assert_rejected(
        &mut chain,
        ChainError::TrainNotInChain(unknown.clone()),
        |chain| chain.permit(&unknown, 4.0, ms(50)),
    );

    let digest = chain.digest();
    locate_at(&mut chain, &train, 0.0);
    assert_eq!(chain.digest(), digest);

    let head = chain.train(&train).unwrap().head(ms(1010)).unwrap();
    assert!((head.nominal.offset - 3.0).abs() < 1e-9);
}

#[test]
fn dump_lists_trains_then_singles() {
    let mut chain = Chain::default();
    let train = formed(&mut chain, vec![car("a", 1.0), car("b", 1.0)]);
    commission(&mut chain, car("c", 1.0));

    let expected = format!(
        "  {train}\n    <** (( a )) b>\n    <a (( b )) **>\n  singles: c\n"
    );
    assert_eq!(chain.to_string(), expected);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    const CARS: usize = 5;

    #[derive(Debug, Clone)]
    enum Step {
        Commission(usize),
        Withdraw(usize),
        Couple(usize, bool, usize, bool),
        Uncouple(usize, bool),
    }

    fn coupler(index: usize, head: bool) -> CouplerId {
        cid(&format!("r{index}-{}", if head { "h" } else { "t" }))
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0..CARS).prop_map(Step::Commission),
            (0..CARS).prop_map(Step::Withdraw),
            (0..CARS, any::<bool>(), 0..CARS, any::<bool>())
                .prop_map(|(a, x, b, y)| Step::Couple(a, x, b, y)),
            (0..CARS, any::<bool>()).prop_map(|(a, x)| Step::Uncouple(a, x)),
        ]
    }

    fn apply(chain: &mut Chain, step: &Step) -> Result<(), ChainError> {
        match *step {
            Step::Commission(i) => chain
                .commission(car(&format!("r{i}"), 1.0 + i as f64), t0())
                .map(drop),
            Step::Withdraw(i) => chain.withdraw(&rid(&format!("r{i}")), t0()).map(drop),
            Step::Couple(a, x, b, y) => chain
                .couple(&coupler(a, x), &coupler(b, y), t0())
                .map(drop),
            Step::Uncouple(a, x) => chain.uncouple(&coupler(a, x), t0()).map(drop),
        }
    }

    proptest! {
        /// Partition and link symmetry hold after any sequence of operations,
        /// and rejected operations change nothing.
        #[test]
        fn structure_survives_any_sequence(steps in prop::collection::vec(step(), 0..40)) {
            let mut chain = Chain::default();
            for i in 0..CARS {
                chain.commission(car(&format!("r{i}"), 1.0 + i as f64), t0()).unwrap();
            }

            for step in &steps {
                let digest = chain.digest();
                let state = format!("{chain:?}");

                if apply(&mut chain, step).is_err() {
                    prop_assert_eq!(chain.digest(), digest);
                    prop_assert_eq!(format!("{chain:?}"), state);
                }
                prop_assert!(chain.verify().is_ok(), "{:?}", chain.verify());
            }
        }

        /// The same history always produces the same digest and trains.
        #[test]
        fn history_is_deterministic(steps in prop::collection::vec(step(), 0..20)) {
            let run = || {
                let mut chain = Chain::default();
                for i in 0..CARS {
                    chain.commission(car(&format!("r{i}"), 1.0), t0()).unwrap();
                }
                for step in &steps {
                    let _ = apply(&mut chain, step);
                }
                (chain.digest(), chain.to_string())
            };

            prop_assert_eq!(run(), run());
        }
    }
}
