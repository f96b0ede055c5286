mod common;

use dedup_bench::synthetic::{
    APPENDED, DELETED, EditPlan, Generator, INSERTED, UPDATED, delete_rows, updated_column_variant,
};
use proptest::prelude::*;

const SCHEMA: &str = r#"{"a": "int", "b": "str", "c": ["int"]}"#;

fn row(table: &dedup_bench::data::Table, idx: usize) -> Vec<dedup_bench::data::Value> {
    (0..table.schema().len())
        .map(|col| table.value(idx, col).clone())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn variant_row_counts_follow_the_edit_plan(
        rows in 200usize..1500,
        num_edits in 1usize..6,
        edit_size in 1usize..10,
        append_ratio in 0.0f64..0.3,
        seed in any::<u64>(),
    ) {
        let plan = EditPlan::evenly_spaced(num_edits, edit_size, append_ratio);
        let mut generator = Generator::new(common::schema(SCHEMA), seed);
        let columns = vec!["a".to_string(), "c".to_string()];
        let (original, variants) = generator
            .generate_synthetic_tables(rows, &plan, &columns)
            .unwrap();

        let edited = num_edits * edit_size;
        prop_assert_eq!(original.num_rows(), rows);
        prop_assert_eq!(variants[DELETED].num_rows(), rows - edited);
        prop_assert_eq!(variants[INSERTED].num_rows(), rows + edited);
        prop_assert_eq!(
            variants[APPENDED].num_rows(),
            rows + (append_ratio * rows as f64).floor() as usize
        );
        prop_assert_eq!(variants[UPDATED].num_rows(), rows);
        prop_assert_eq!(variants[&updated_column_variant("a")].num_rows(), rows);
        prop_assert_eq!(variants.len(), 6);
        for table in variants.values() {
            prop_assert_eq!(table.schema(), original.schema());
        }
    }

    #[test]
    fn deletes_keep_every_row_outside_the_clusters(
        rows in 100usize..800,
        num_edits in 1usize..5,
        edit_size in 1usize..8,
        seed in any::<u64>(),
    ) {
        let plan = EditPlan::evenly_spaced(num_edits, edit_size, 0.0);
        let original = Generator::new(common::schema(SCHEMA), seed)
            .generate_table(rows)
            .unwrap();
        let deleted = delete_rows(&original, &plan).unwrap();
        let boundaries = plan.boundaries(rows).unwrap();
        let kept = (0..rows)
            .filter(|&idx| !boundaries.iter().any(|&b| (b - edit_size..b).contains(&idx)))
            .collect::<Vec<_>>();
        prop_assert_eq!(kept.len(), deleted.num_rows());
        for (position, &idx) in kept.iter().enumerate() {
            prop_assert_eq!(row(&deleted, position), row(&original, idx));
        }
    }

    #[test]
    fn appends_preserve_the_prefix(
        rows in 1usize..500,
        append_ratio in 0.0f64..1.0,
        seed in any::<u64>(),
    ) {
        let mut generator = Generator::new(common::schema(SCHEMA), seed);
        let original = generator.generate_table(rows).unwrap();
        let appended = generator.append_rows(&original, append_ratio).unwrap();
        prop_assert_eq!(appended.slice(0, rows), original);
    }

    #[test]
    fn same_seed_generates_identical_variants(seed in any::<u64>()) {
        let plan = EditPlan::evenly_spaced(2, 3, 0.1);
        let run = || {
            Generator::new(common::schema(SCHEMA), seed)
                .generate_synthetic_tables(120, &plan, &[])
                .unwrap()
        };
        prop_assert_eq!(run(), run());
    }
}
