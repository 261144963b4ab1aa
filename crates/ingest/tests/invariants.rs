//! Property tests over random upload sequences.

mod common;

use common::{coded, no_adjacent_repeats, Fixture, MAC};
use proptest::prelude::*;
use ww_classifiers::ClassifierConfig;
use ww_core::{translate, EspEvent, MachineStatus};

/// Channel 2 is not linked on the fixture sensor.
fn upload() -> impl Strategy<Value = Vec<(i32, i64)>> {
    prop::collection::vec((0i32..3, -2i64..5), 0..8)
}

fn to_batch(elements: &[(i32, i64)]) -> Vec<EspEvent> {
    elements
        .iter()
        .map(|(local_id, code)| coded("adc", *local_id, *code))
        .collect()
}

proptest! {
    #[test]
    fn canonical_history_never_repeats_and_summary_tracks_it(
        uploads in prop::collection::vec(upload(), 1..20),
        window in 1u32..4,
    ) {
        let fx = Fixture::new(ClassifierConfig::debounce(window));
        let mut expected_raw = 0usize;

        for elements in &uploads {
            fx.clock.advance(1_000);
            let saved = fx.ingestor.ingest(MAC, &to_batch(elements)).unwrap();
            let valid = elements
                .iter()
                .filter(|(local_id, code)| *local_id < 2 && translate(*code).is_some())
                .count();
            prop_assert_eq!(saved.len(), valid);
            expected_raw += valid;
        }
        prop_assert_eq!(fx.store.raw_event_count(), expected_raw);

        for machine_id in [fx.washer.machine_id, fx.dryer.machine_id] {
            let statuses = fx.statuses(machine_id);
            prop_assert!(no_adjacent_repeats(&statuses), "repeated status in {:?}", statuses);

            let machine = fx.machine(machine_id);
            let current = statuses.last().copied().unwrap_or(MachineStatus::Unknown);
            prop_assert_eq!(machine.current_status, current);
            if statuses.len() >= 2 {
                prop_assert_eq!(machine.previous_status, statuses[statuses.len() - 2]);
            }
            prop_assert!(machine.last_change_time <= machine.last_updated);
        }
    }

    #[test]
    fn stabilized_status_is_idempotent(code in -1i64..4, repeats in 1usize..30) {
        let fx = Fixture::new(ClassifierConfig::debounce(3));
        let batch = vec![coded("adc", 0, code); 3];
        fx.ingestor.ingest(MAC, &batch).unwrap();
        let settled = fx.statuses(fx.washer.machine_id);

        for _ in 0..repeats {
            fx.ingestor.ingest(MAC, &[coded("adc", 0, code)]).unwrap();
        }
        prop_assert_eq!(fx.statuses(fx.washer.machine_id), settled);
        prop_assert_eq!(fx.machine(fx.washer.machine_id).current_status, translate(code).unwrap());
    }
}
