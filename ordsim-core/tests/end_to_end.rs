use std::collections::{BTreeMap, BTreeSet};

use ordsim_core::{
    Dataset, FOLLOW_UP_DAYS, MissingnessConfig, Outcome, ParticipantId, Record, SimulationConfig,
    Treatment, complete, inject_missing, reallocate, simulate,
};
use ordsim_core::{OrdinalSum, validate};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn toy_rows() -> Vec<Record> {
    use Outcome::{Dead, Home, InHospital, VentArds};
    let trajectories: [(u32, f64, f64, [Outcome; 5]); 3] = [
        (1, 54.0, 3.0, [VentArds, InHospital, InHospital, Home, Home]),
        (2, 78.0, 11.0, [VentArds, VentArds, Dead, Dead, Dead]),
        (3, 63.0, 6.0, [InHospital, Home, Home, Home, Home]),
    ];
    let mut rows = Vec::new();
    for (id, age, sofa, days) in trajectories {
        let mut prev = None;
        for (y, time) in days.into_iter().zip(1u8..) {
            rows.push(Record {
                id: ParticipantId(id),
                time,
                y: Some(y),
                yprev: prev,
                age,
                sofa,
                tx: Treatment::Control,
                gap: Some(2.0),
            });
            prev = Some(y);
        }
    }
    rows
}

#[test]
fn toy_trial_reallocates_and_completes() {
    let data = Dataset::from_records(toy_rows());
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let reallocated = reallocate(&data, 0.6, &OrdinalSum, &mut rng).unwrap();
    let completed = complete(&reallocated).unwrap();

    assert_eq!(completed.len(), 84);
    validate(&completed).unwrap();

    let trajectories = completed.trajectories();
    let deceased = &trajectories[&ParticipantId(2)];
    for record in deceased.iter().filter(|r| r.time >= 4) {
        assert_eq!(record.y, Some(Outcome::Dead), "day {}", record.time);
        assert_eq!(record.yprev, Some(Outcome::Dead), "day {}", record.time);
    }

    let mut arms: BTreeMap<ParticipantId, BTreeSet<Treatment>> = BTreeMap::new();
    for record in completed.records() {
        arms.entry(record.id).or_default().insert(record.tx);
    }
    assert!(arms.values().all(|set| set.len() == 1));

    let input_arms: BTreeMap<ParticipantId, Treatment> =
        reallocated.records().iter().map(|r| (r.id, r.tx)).collect();
    for record in completed.records() {
        assert_eq!(record.tx, input_arms[&record.id]);
    }
}

#[test]
fn every_participant_has_full_follow_up() {
    let completed = complete(&Dataset::from_records(toy_rows())).unwrap();
    for (id, rows) in completed.trajectories() {
        let days: Vec<u8> = rows.iter().map(|r| r.time).collect();
        let expected: Vec<u8> = (1..=FOLLOW_UP_DAYS).collect();
        assert_eq!(days, expected, "participant {id}");
        assert!(rows.iter().all(|r| r.gap == Some(2.0)));
    }
}

#[test]
fn fixed_seed_reproduces_assignment() {
    let data = Dataset::from_records(toy_rows());
    let arms = |seed: u64| -> Vec<Treatment> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        reallocate(&data, 0.6, &OrdinalSum, &mut rng)
            .unwrap()
            .records()
            .iter()
            .map(|r| r.tx)
            .collect()
    };
    assert_eq!(arms(42), arms(42));
}

#[test]
fn missingness_only_touches_post_discharge_days() {
    let completed = complete(&Dataset::from_records(toy_rows())).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let masked = inject_missing(&completed, 1.0, 1.0, &mut rng).unwrap();

    for (id, rows) in masked.trajectories() {
        let discharge = match id.0 {
            1 => Some(4),
            3 => Some(2),
            _ => None,
        };
        for record in rows {
            let expect_missing = discharge.is_some_and(|day| record.time > day);
            assert_eq!(
                record.y.is_none(),
                expect_missing,
                "participant {id} day {}",
                record.time
            );
        }
    }
}

#[test]
fn pipeline_with_missingness_keeps_row_count() {
    let config = SimulationConfig {
        allocation_prob: 0.8,
        seed: 9,
        complete_follow_up: true,
        missingness: Some(MissingnessConfig {
            prob_missing_given_alive: 1.0,
            prob_missing_given_dead: 0.0,
        }),
    };
    let run = simulate(&Dataset::from_records(toy_rows()), &config, &OrdinalSum).unwrap();
    assert_eq!(run.dataset.len(), 84);
    // unobserved days complete as Dead, so every discharged participant died
    assert_eq!(run.missing_injected, 0);
}
