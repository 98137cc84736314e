//! Binder properties over randomly generated tables.

use lcfit_rs::parameters::{Parameter, ParameterBinder, ParameterTable, SlotConstraint};
use lcfit_rs::LcFitError;
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Table of `n` rows with a random mix of fixed, tied and per-visit rows
fn random_table(rng: &mut ChaCha8Rng, n: usize) -> ParameterTable {
    let rows = (0..n)
        .map(|i| {
            let kind = rng.gen_range(0..3);
            Parameter::new(&format!("p{}", i), rng.gen_range(-5.0..5.0))
                .with_fixed(kind == 0)
                .with_tied(kind == 1)
        })
        .collect();
    ParameterTable::from_rows(rows).unwrap()
}

fn random_vector(rng: &mut ChaCha8Rng, n: usize) -> Array1<f64> {
    (0..n).map(|_| rng.gen_range(-10.0..10.0)).collect()
}

#[test]
fn collapse_inverts_expand() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for _ in 0..50 {
        let n_rows = rng.gen_range(1..8);
        let table = random_table(&mut rng, n_rows);
        let n_visits = rng.gen_range(1..5);
        let binder = ParameterBinder::new(&table, n_visits).unwrap();

        let theta = random_vector(&mut rng, binder.n_free());
        let full = binder.expand(&theta).unwrap();
        assert_eq!(full.len(), table.len() * n_visits);
        assert_eq!(binder.collapse(&full).unwrap(), theta);
    }
}

#[test]
fn tied_row_follows_first_visit_slot() {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    for _ in 0..50 {
        let n_rows = rng.gen_range(1..8);
        let table = random_table(&mut rng, n_rows);
        let n_visits = rng.gen_range(2..5);
        let binder = ParameterBinder::new(&table, n_visits).unwrap();
        let mut full = binder.expand(&random_vector(&mut rng, binder.n_free())).unwrap();

        let tied: Vec<usize> = (0..table.len())
            .filter(|&i| table.rows()[i].tied && !table.rows()[i].fixed)
            .collect();
        for &i in &tied {
            full[binder.slot(i, 0)] = 42.0 + i as f64;
        }
        let back = binder.expand(&binder.collapse(&full).unwrap()).unwrap();
        for &i in &tied {
            for j in 0..n_visits {
                assert_eq!(back[binder.slot(i, j)], 42.0 + i as f64);
            }
        }
    }
}

#[test]
fn single_visit_ignores_tie_flags() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    for _ in 0..50 {
        let n_rows = rng.gen_range(1..8);
        let table = random_table(&mut rng, n_rows);
        let untied = ParameterTable::from_rows(
            table
                .iter()
                .cloned()
                .map(|p| p.with_tied(false))
                .collect(),
        )
        .unwrap();

        let tied_binder = ParameterBinder::new(&table, 1).unwrap();
        let untied_binder = ParameterBinder::new(&untied, 1).unwrap();
        assert_eq!(tied_binder.n_free(), untied_binder.n_free());
        assert_eq!(tied_binder.labels(), untied_binder.labels());

        let theta = random_vector(&mut rng, tied_binder.n_free());
        let full = tied_binder.expand(&theta).unwrap();
        assert_eq!(full, untied_binder.expand(&theta).unwrap());
        assert_eq!(tied_binder.collapse(&full).unwrap(), untied_binder.collapse(&full).unwrap());
    }
}

#[test]
fn labels_follow_row_order() {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    for _ in 0..50 {
        let n_rows = rng.gen_range(2..8);
        let table = random_table(&mut rng, n_rows);
        let n_visits = rng.gen_range(1..5);
        let binder = ParameterBinder::new(&table, n_visits).unwrap();
        let full = binder.expand(&random_vector(&mut rng, binder.n_free())).unwrap();

        // (label, value) entries of every row, in compact order
        let labels = binder.labels();
        let theta = binder.collapse(&full).unwrap();
        let mut per_row = Vec::with_capacity(n_rows);
        let mut k = 0;
        for row in table.iter() {
            let count = if row.fixed { 0 } else if row.tied { 1 } else { n_visits };
            let entries: Vec<(String, f64)> =
                (k..k + count).map(|c| (labels[c].clone(), theta[c])).collect();
            per_row.push(entries);
            k += count;
        }

        let mut order: Vec<usize> = (0..n_rows).collect();
        order.shuffle(&mut rng);
        let permuted = ParameterTable::from_rows(order.iter().map(|&i| table.rows()[i].clone()).collect()).unwrap();
        let permuted_binder = ParameterBinder::new(&permuted, n_visits).unwrap();
        let mut permuted_full = Array1::zeros(full.len());
        for (new_i, &old_i) in order.iter().enumerate() {
            for j in 0..n_visits {
                permuted_full[permuted_binder.slot(new_i, j)] = full[binder.slot(old_i, j)];
            }
        }

        let expected: Vec<(String, f64)> = order.iter().flat_map(|&i| per_row[i].clone()).collect();
        let permuted_theta = permuted_binder.collapse(&permuted_full).unwrap();
        let actual: Vec<(String, f64)> = permuted_binder
            .labels()
            .into_iter()
            .zip(permuted_theta.iter().copied())
            .collect();
        assert_eq!(actual, expected);
    }
}

#[test]
fn single_tied_row_fills_every_visit() {
    let table = ParameterTable::from_rows(vec![Parameter::new("C", 1.0).with_tied(true)]).unwrap();
    let binder = ParameterBinder::new(&table, 4).unwrap();
    assert_eq!(binder.labels(), vec!["C"]);
    let full = binder.expand(&Array1::from_vec(vec![2.5])).unwrap();
    assert_eq!(full, Array1::from_elem(4, 2.5));
    assert_eq!(binder.collapse(&full).unwrap(), Array1::from_vec(vec![2.5]));
}

#[test]
fn expanded_slots_follow_bindings() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..50 {
        let n_rows = rng.gen_range(1..8);
        let table = random_table(&mut rng, n_rows);
        let n_visits = rng.gen_range(1..5);
        let binder = ParameterBinder::new(&table, n_visits).unwrap();
        let full = binder.expand(&random_vector(&mut rng, binder.n_free())).unwrap();

        for (i, row) in table.iter().enumerate() {
            let slots: Vec<f64> = (0..n_visits).map(|j| full[binder.slot(i, j)]).collect();
            if row.fixed {
                assert!(slots.iter().all(|&x| x == row.value()), "fixed row {} changed", row.name());
            } else if row.tied {
                assert!(slots.iter().all(|&x| x == slots[0]), "tied row {} differs by visit", row.name());
            }
        }
    }
}

#[test]
fn labels_and_constraints_match_free_count() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..50 {
        let n_rows = rng.gen_range(1..8);
        let table = random_table(&mut rng, n_rows);
        let n_visits = rng.gen_range(1..5);
        let binder = ParameterBinder::new(&table, n_visits).unwrap();

        let expected: usize = table
            .iter()
            .map(|p| if p.fixed { 0 } else if p.tied { 1 } else { n_visits })
            .sum();
        assert_eq!(binder.n_free(), expected);
        assert_eq!(binder.labels().len(), expected);
        assert_eq!(binder.free_rows().len(), expected);

        let constraints = binder.slot_constraints();
        assert_eq!(constraints.len(), binder.n_expanded());
        let free = constraints
            .iter()
            .filter(|c| matches!(c, SlotConstraint::Free { .. }))
            .count();
        assert_eq!(free, expected);
    }
}

#[test]
fn wrong_lengths_are_mapping_errors() {
    let table = ParameterTable::from_rows(vec![
        Parameter::new("a", 1.0),
        Parameter::new("b", 2.0).with_tied(true),
    ])
    .unwrap();
    let binder = ParameterBinder::new(&table, 3).unwrap();
    assert_eq!(binder.n_free(), 4);

    match binder.expand(&Array1::zeros(3)) {
        Err(LcFitError::MappingMismatch { expected, actual, .. }) => {
            assert_eq!(expected, 4);
            assert_eq!(actual, 3);
        }
        other => panic!("expected MappingMismatch, got {:?}", other),
    }
    assert!(matches!(
        binder.collapse(&Array1::zeros(5)),
        Err(LcFitError::MappingMismatch { .. })
    ));
}

#[test]
fn fit_par_table_drives_binder() {
    let text = "\
#parameter fixed tied value lo_lim lo_val hi_lim hi_val prior p1 p2 step_size
t0 false true 0.01 false 0 false 0 N 0.0 0.01 0.0
per true false 3.5 false 0 false 0 X 0 0 0.0
rp false false 0.1 true 0.0 true 0.5 U 0.0 0.5 0.001
c false -1 1.0 false 0 false 0 U 0.9 1.1 0.0
";
    let mut table = ParameterTable::parse_fit_par(text).unwrap();
    let binder = ParameterBinder::new(&table, 2).unwrap();
    assert_eq!(binder.labels(), vec!["t0", "rp0", "rp1", "c"]);

    let full = binder.expand(&Array1::from_vec(vec![0.02, 0.11, 0.12, 1.01])).unwrap();
    table.apply_fit(&binder, &full).unwrap();

    assert_eq!(table.get("rp").unwrap().fitted(), Some(&[0.11, 0.12][..]));
    assert_eq!(table.get("rp").unwrap().value(), 0.11);
    assert_eq!(table.get("per").unwrap().value(), 3.5);
    assert_eq!(table.get("c").unwrap().fitted(), Some(&[1.01, 1.01][..]));
}
