//! RNG plumbing for the random augmentations.
//!
//! Each [`DatasetIter`](crate::iterator::DatasetIter) owns the `StdRng` of its current pass and
//! lends it to this thread with [`scoped`] for the duration of one batch load. Augmentations
//! draw through [`with_pass_rng`] without the RNG appearing in the `Transform` signature.
//! Outside a scope, draws fall back to `rand::rng()`.

use rand::rngs::StdRng;
use rand::{Rng as _, RngCore, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static PASS_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// The augmentation RNG for one pass.
///
/// Seed formula: `base_seed + (pass << 32)`. The high bits keep it apart from the
/// `base_seed + pass` stream the planner shuffles with.
pub fn pass_rng(pass: usize, base_seed: u64) -> StdRng {
    StdRng::seed_from_u64(base_seed.wrapping_add((pass as u64) << 32))
}

/// Installs `rng` as this thread's augmentation RNG while `f` runs, then moves the advanced
/// state back into `rng`. Whatever was installed before is restored afterwards.
pub fn scoped<T>(rng: &mut StdRng, f: impl FnOnce() -> T) -> T {
    let lent = std::mem::replace(rng, StdRng::seed_from_u64(0));
    let previous = PASS_RNG.with(|slot| slot.replace(Some(lent)));
    let out = f();
    if let Some(advanced) = PASS_RNG.with(|slot| slot.replace(previous)) {
        *rng = advanced;
    }
    out
}

/// Runs `f` with the scoped RNG, or with `rand::rng()` if none is installed on this thread.
pub fn with_pass_rng<T>(f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
    PASS_RNG.with(|rng| {
        let mut rng_ref = rng.borrow_mut();
        match rng_ref.as_mut() {
            Some(rng) => f(rng),
            None => f(&mut rand::rng()),
        }
    })
}

pub fn gen_bool(p: f64) -> bool {
    with_pass_rng(|rng| rng.random_bool(p))
}

/// Uniform draw from `[low, high]`.
pub fn gen_range_inclusive(low: f32, high: f32) -> f32 {
    with_pass_rng(|rng| rng.random_range(low..=high))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws(n: usize) -> Vec<bool> {
        (0..n).map(|_| gen_bool(0.5)).collect()
    }

    #[test]
    fn same_seed_replays_draws() {
        let first = scoped(&mut pass_rng(3, 42), || draws(32));
        let second = scoped(&mut pass_rng(3, 42), || draws(32));
        assert_eq!(first, second);
    }

    #[test]
    fn interleaved_streams_stay_independent() {
        let mut alone = pass_rng(1, 9);
        let expected: Vec<bool> = (0..4).flat_map(|_| scoped(&mut alone, || draws(8))).collect();

        let mut a = pass_rng(1, 9);
        let mut b = pass_rng(2, 9);
        let mut got = Vec::new();
        for _ in 0..4 {
            got.extend(scoped(&mut a, || draws(8)));
            scoped(&mut b, || draws(8));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn nested_scopes_restore_the_outer_rng() {
        let mut outer = pass_rng(0, 5);
        let mut inner = pass_rng(7, 5);
        let got = scoped(&mut outer, || {
            let before = draws(4);
            scoped(&mut inner, || draws(4));
            [before, draws(4)].concat()
        });
        assert_eq!(got, scoped(&mut pass_rng(0, 5), || draws(8)));
    }

    #[test]
    fn range_stays_in_bounds() {
        scoped(&mut pass_rng(0, 7), || {
            for _ in 0..100 {
                let v = gen_range_inclusive(-15.0, 15.0);
                assert!((-15.0..=15.0).contains(&v));
            }
        });
    }
}
