//! Property-based tests for the matrix projection
//!
//! The projection turns a sparse set of (model, process) priced pairings
//! into a dense grid. These tests verify completeness (every input cell
//! appears exactly once, nothing is invented) and the display-ordering rule
//! for model rows across randomly generated selections.
use piecework_quota::{
    matrix::model_sort_key,
    quota::{CalendarDay, CombinationKey, UnitPrice},
    service::QuotaService,
    store::QuotaStore,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn temp_service() -> QuotaService {
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .expect("temporary sled db");
    let store = QuotaStore::open(Arc::new(db)).expect("open store");
    QuotaService::new(store)
}

/// Strategy: a sparse selection as a map from (model index, process index)
/// to a price. Indexes map onto small code pools so collisions exercise the
/// distinct-row/column handling.
fn cells_strategy() -> impl Strategy<Value = BTreeMap<(usize, usize), u64>> {
    prop::collection::btree_map(((0usize..6), (0usize..5)), 1u64..=50_000u64, 1..=20)
}

fn model_code(index: usize) -> String {
    // mixed numeric and non-numeric prefixes on purpose
    match index {
        0 => "2-A".to_string(),
        1 => "10-B".to_string(),
        2 => "DX-1".to_string(),
        i => format!("{}-M", i),
    }
}

fn process_code(index: usize) -> String {
    format!("P-{:03}", index * 10)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the projection has exactly one row per distinct model and
    /// one column per distinct process, every input cell appears once with
    /// its price, and absent pairings stay absent rather than zero.
    #[test]
    fn prop_projection_is_complete_and_sparse(cells in cells_strategy()) {
        let service = temp_service();
        let effective = CalendarDay::new_with(2024, 1, 1);

        for (&(m, p), &price) in &cells {
            let key = CombinationKey::new("ASSY", "WIND", &model_code(m), &process_code(p));
            service
                .supersede_and_open(&key, UnitPrice::from_minor(price), effective, "user_prop")
                .expect("seed quota");
        }

        let projection = service
            .project("ASSY", "WIND", effective)
            .unwrap()
            .expect("non-empty selection");

        let distinct_models: std::collections::BTreeSet<usize> =
            cells.keys().map(|&(m, _)| m).collect();
        let distinct_processes: std::collections::BTreeSet<usize> =
            cells.keys().map(|&(_, p)| p).collect();

        prop_assert_eq!(projection.rows.len(), distinct_models.len());
        prop_assert_eq!(projection.columns.len(), distinct_processes.len());

        // every input cell appears exactly once with its price
        for (&(m, p), &price) in &cells {
            prop_assert_eq!(
                projection.price_at(&model_code(m), &process_code(p)),
                Some(UnitPrice::from_minor(price))
            );
        }
        // and the grid contains nothing that was not in the input
        let cell_count: usize = projection.rows.iter().map(|r| r.prices.len()).sum();
        prop_assert_eq!(cell_count, cells.len());

        for m in &distinct_models {
            for p in &distinct_processes {
                if !cells.contains_key(&(*m, *p)) {
                    prop_assert_eq!(
                        projection.price_at(&model_code(*m), &process_code(*p)),
                        None,
                        "missing pairing must stay absent, not zero"
                    );
                }
            }
        }
    }

    /// Property: rows come out in display order, i.e. sorted by the model
    /// sort key (numeric prefix before the first dash, ties lexicographic).
    #[test]
    fn prop_rows_follow_model_sort_order(cells in cells_strategy()) {
        let service = temp_service();
        let effective = CalendarDay::new_with(2024, 1, 1);

        for (&(m, p), &price) in &cells {
            let key = CombinationKey::new("ASSY", "WIND", &model_code(m), &process_code(p));
            service
                .supersede_and_open(&key, UnitPrice::from_minor(price), effective, "user_prop")
                .expect("seed quota");
        }

        let projection = service
            .project("ASSY", "WIND", effective)
            .unwrap()
            .expect("non-empty selection");

        for pair in projection.rows.windows(2) {
            prop_assert!(
                model_sort_key(&pair[0].model_code) <= model_sort_key(&pair[1].model_code),
                "rows out of display order: {} before {}",
                pair[0].model_code,
                pair[1].model_code
            );
        }
        // columns are plain lexicographic
        for pair in projection.columns.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
    }

    /// Property: the sort key itself is a total order consistent with its
    /// definition; numeric prefixes compare numerically, everything else
    /// collapses to zero and falls back to the full code.
    #[test]
    fn prop_model_sort_key_laws(prefix_a in 0u64..1000, prefix_b in 0u64..1000, suffix in "[A-Z]{1,3}") {
        let a = format!("{}-{}", prefix_a, suffix);
        let b = format!("{}-{}", prefix_b, suffix);

        prop_assert_eq!(
            model_sort_key(&a).cmp(&model_sort_key(&b)),
            prefix_a.cmp(&prefix_b).then_with(|| a.cmp(&b))
        );

        let non_numeric = format!("X{}-{}", prefix_a, suffix);
        prop_assert_eq!(model_sort_key(&non_numeric).0, 0);
    }
}
