//! Drawing order
//!
//! Priority-pass holders always draw ahead of everyone else. Each group is
//! shuffled on its own, so order within a group is a uniform permutation.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::models::Entrant;

/// Build the RNG used for drawings
///
/// A fixed seed gives a reproducible sequence of drawings.
pub fn drawing_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Order entrants priority-first, each group randomly permuted
pub fn draw_order<R: Rng + ?Sized>(entrants: Vec<Entrant>, rng: &mut R) -> Vec<Entrant> {
    let (mut order, mut ordinary): (Vec<Entrant>, Vec<Entrant>) =
        entrants.into_iter().partition(|e| e.priority);

    order.shuffle(rng);
    ordinary.shuffle(rng);
    order.append(&mut ordinary);
    order
}
