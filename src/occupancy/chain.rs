//! Chain integrity over the adjacency graph
//!
//! A member holding more than one stand must hold a connected chain of
//! them. The check is a breadth-first traversal restricted to the target
//! set, bounded to `len - 1` rounds so it always terminates.

use std::collections::{BTreeSet, VecDeque};

use crate::models::LocationId;

/// Check that every location in `members` is reachable from `start`
/// using only edges whose endpoints are both in `members`
///
/// `neighbors` is asked for the adjacency of each visited location.
/// A set of zero or one locations is trivially connected.
pub fn is_connected<E, F>(start: &LocationId, members: &[LocationId], mut neighbors: F) -> Result<bool, E>
where
    F: FnMut(&LocationId) -> Result<Vec<LocationId>, E>,
{
    let target: BTreeSet<&LocationId> = members.iter().collect();
    if target.len() <= 1 {
        return Ok(true);
    }
    if !target.contains(start) {
        return Ok(false);
    }

    let max_rounds = target.len() - 1;
    let mut visited: BTreeSet<LocationId> = BTreeSet::new();
    visited.insert(start.clone());

    let mut frontier: VecDeque<LocationId> = VecDeque::from([start.clone()]);

    for _ in 0..max_rounds {
        if frontier.is_empty() || visited.len() == target.len() {
            break;
        }

        let mut next = VecDeque::new();
        while let Some(current) = frontier.pop_front() {
            for neighbor in neighbors(&current)? {
                if target.contains(&neighbor) && visited.insert(neighbor.clone()) {
                    next.push_back(neighbor);
                }
            }
        }
        frontier = next;
    }

    Ok(visited.len() == target.len())
}
