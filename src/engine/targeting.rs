//! Leaderless ghost-target assignment. Every peer runs this every tick
//! against the same replicated facts; any peer that detects a stale target
//! or an unbalanced distribution performs the same full repair, and the
//! replicated map's last-writer-wins merge settles concurrent repairs. The
//! next tick's check self-heals whatever that merge produced.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::doc::ReplicatedDoc;
use crate::rng::Rng;
use crate::state::GameState;

/// Checks target staleness and balance, recomputing every ghost's target
/// when needed. Returns true when a recomputation was pushed. A tick with
/// no eligible players is a no-op.
pub fn assign_ghost_targets<D: ReplicatedDoc>(state: &mut GameState<D>, rng: &mut Rng) -> bool {
    let mut eligible: Vec<String> = state
        .pacmans()
        .filter(|p| p.is_online && p.is_playing)
        .map(|p| p.id.clone())
        .collect();
    eligible.sort();
    if eligible.is_empty() || state.ghost_count() == 0 {
        return false;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut recompute = false;
    for ghost in state.ghosts() {
        match ghost.pacman_target.as_deref() {
            Some(target) if eligible.iter().any(|id| id == target) => {
                *counts.entry(target).or_insert(0) += 1;
            }
            // Stale target (player left, went offline or stopped playing)
            // or no target at all.
            _ => recompute = true,
        }
    }

    let fair_share = state.ghost_count().div_ceil(eligible.len());
    if counts.values().any(|&count| count > fair_share) {
        recompute = true;
    }
    if !recompute {
        return false;
    }

    let ghost_ids: Vec<String> = state.ghosts().map(|g| g.id.clone()).collect();
    let mut pool: Vec<String> = Vec::new();
    for ghost_id in ghost_ids {
        if pool.is_empty() {
            pool = eligible.clone();
        }
        let target = pool.swap_remove(rng.pick_index(pool.len()));
        debug!(ghost = %ghost_id, target = %target, "ghost target assigned");
        if let Some(ghost) = state.ghost_mut(&ghost_id) {
            ghost.pacman_target = Some(target);
        }
    }
    info!(
        ghosts = state.ghost_count(),
        players = eligible.len(),
        "recomputed ghost targets"
    );

    state.push_ghosts();
    true
}
