// ============================================================
// Layer 4: Train/Validation Splitter
// ============================================================
// Shuffles samples with a SEEDED generator and splits them into
// a training set and a held-out validation set.
//
// The seed makes the split reproducible: the same dataset and
// seed always produce the same validation examples, so two
// training runs can be compared epoch by epoch.
//
// Validation size = ceil(n * validation_fraction), so any
// non-zero fraction holds out at least one example.
//
// The split is stratified. Validation slots are dealt class by
// class over the shuffled order: the first example of every
// class, then the second of every class, and so on. No class
// gets a second slot before each class has one.
//
//   shuffled:  a1 b1 a2 c1 a3 b2      (3 held out)
//   dealt:     a1 b1 c1 | a2 b2 | a3
//   val:       a1 b1 c1

use std::collections::HashMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation),
/// spreading the validation set across the classes `class_of` reports.
pub fn split_train_val<T, F>(
    mut samples:         Vec<T>,
    validation_fraction: f64,
    seed:                u64,
    class_of:            F,
) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> usize,
{
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let val_size = (((total as f64) * validation_fraction.clamp(0.0, 1.0)).ceil() as usize).min(total);

    // (rank within class, class, position); sorting deals the slots
    let mut seen: HashMap<usize, usize> = HashMap::new();
    let mut deal: Vec<(usize, usize, usize)> = samples
        .iter()
        .enumerate()
        .map(|(pos, sample)| {
            let class = class_of(sample);
            let rank  = seen.entry(class).or_insert(0);
            *rank += 1;
            (*rank - 1, class, pos)
        })
        .collect();
    deal.sort_unstable();

    let mut held_out = vec![false; total];
    for &(_, _, pos) in deal.iter().take(val_size) {
        held_out[pos] = true;
    }

    let mut train = Vec::with_capacity(total - val_size);
    let mut val   = Vec::with_capacity(val_size);
    for (sample, is_val) in samples.into_iter().zip(held_out) {
        if is_val {
            val.push(sample);
        } else {
            train.push(sample);
        }
    }

    tracing::debug!(
        "Dataset split: {} training, {} validation over {} classes (seed {})",
        train.len(),
        val.len(),
        seen.len(),
        seed,
    );

    (train, val)
}
