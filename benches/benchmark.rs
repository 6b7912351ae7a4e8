use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use avl_finger::AvlTree;

const N: usize = 100_000;

fn filled(values: &[i32]) -> AvlTree<i32, i32> {
    let mut tree = AvlTree::new();
    for value in values {
        let _ = tree.insert(*value, *value);
    }
    tree
}

pub fn benchmarks(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let values: Vec<i32> = (1..=N).map(|_| rng.gen()).collect();
    let mut ascending: Vec<i32> = values.clone();
    ascending.sort();
    ascending.dedup();

    c.bench_function("tree_insert", |b| b.iter(|| filled(&values)));

    c.bench_function("tree_finger_insert_ascending", |b| {
        b.iter(|| {
            let mut tree = AvlTree::new();
            for value in &ascending {
                let _ = tree.finger_insert(*value, *value);
            }
            tree
        })
    });

    let tree = filled(&values);

    c.bench_function("tree_search", |b| {
        b.iter(|| {
            for value in &values {
                black_box(tree.search(value));
            }
        })
    });

    let near_max = &ascending[ascending.len() - 1_000..];
    c.bench_function("tree_search_near_max", |b| {
        b.iter(|| {
            for value in near_max {
                black_box(tree.search(value));
            }
        })
    });

    c.bench_function("tree_finger_search_near_max", |b| {
        b.iter(|| {
            for value in near_max {
                black_box(tree.finger_search(value));
            }
        })
    });

    c.bench_function("tree_delete", |b| {
        b.iter_batched(
            || filled(&values),
            |mut tree| {
                for value in &values {
                    let _ = tree.delete(value);
                }
                tree
            },
            BatchSize::LargeInput,
        )
    });

    let middle = ascending[ascending.len() / 2];
    c.bench_function("tree_split_join", |b| {
        b.iter_batched(
            || filled(&values),
            |mut tree| {
                let split = tree.split(&middle).unwrap();
                let (mut left, mut right) = (split.left, split.right);
                left.join(&mut right, split.separator.0, split.separator.1).unwrap();
                left
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
