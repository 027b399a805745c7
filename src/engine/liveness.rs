//! Clock-polling peer liveness. The mesh transport does not reliably
//! surface disconnects, so presence is inferred from each player's
//! replicated tick counter: a clock that fails to advance between two polls
//! means the peer is gone, or backgrounded, which counts as gone since a
//! paused peer cannot legitimately be chased or eat dots. A falsely marked
//! peer reasserts `is_online = true` itself on its next tick, which
//! overwrites the mark.

use std::collections::HashMap;

use tracing::info;

use crate::doc::ReplicatedDoc;
use crate::state::GameState;

#[derive(Debug, Default)]
pub struct LivenessMonitor {
    last_seen: HashMap<String, u64>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// One polling pass over every remote player currently believed online.
    /// The first observation of a peer only records its clock (grace
    /// period). Returns the ids newly marked offline.
    pub fn poll<D: ReplicatedDoc>(
        &mut self,
        state: &mut GameState<D>,
        round_active: bool,
    ) -> Vec<String> {
        let current = state.current_id().map(str::to_string);
        let observed: Vec<(String, u64)> = state
            .pacmans()
            .filter(|p| Some(p.id.as_str()) != current.as_deref() && p.is_online)
            .map(|p| (p.id.clone(), p.clock))
            .collect();

        let mut marked = Vec::new();
        for (id, clock) in observed {
            if let Some(&previous) = self.last_seen.get(&id) {
                if previous == clock && round_active {
                    if let Some(pacman) = state.pacman(&id) {
                        let mut pacman = pacman.clone();
                        pacman.is_online = false;
                        info!(id = %pacman.id, name = %pacman.name, "peer stalled, marking offline");
                        state.push_pacman(pacman);
                    }
                    marked.push(id.clone());
                }
            }
            // Always refresh, so a resumed heartbeat reads as a change.
            self.last_seen.insert(id, clock);
        }
        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::MemoryDoc;
    use crate::pacman::Pacman;
    use crate::state::PACMANS_MAP;

    fn state_with_remote(clock: u64) -> GameState<MemoryDoc> {
        let mut state = GameState::new(MemoryDoc::new(1));
        state.set_current_pacman(Pacman::new("me", "Me"));
        let mut remote = Pacman::new("p2", "Bob");
        remote.clock = clock;
        state.push_pacman(remote);
        state
    }

    #[test]
    fn stalled_clock_marks_offline_on_second_poll() {
        let mut state = state_with_remote(10);
        let mut monitor = LivenessMonitor::new();

        // First sighting: grace period, nothing marked.
        assert!(monitor.poll(&mut state, true).is_empty());
        assert!(state.pacman("p2").unwrap().is_online);

        // Clock unchanged: offline.
        let marked = monitor.poll(&mut state, true);
        assert_eq!(marked, vec!["p2".to_string()]);
        assert!(!state.pacman("p2").unwrap().is_online);

        // The mark was pushed to the replicated map too.
        let record = state.doc().map_get(PACMANS_MAP, "p2").unwrap();
        assert_eq!(record.get("is_online").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn advancing_clock_is_never_marked() {
        let mut state = state_with_remote(0);
        let mut monitor = LivenessMonitor::new();

        for tick in 1..=10u64 {
            assert!(monitor.poll(&mut state, true).is_empty());
            let mut remote = state.pacman("p2").unwrap().clone();
            remote.clock = tick;
            state.push_pacman(remote);
        }
        assert!(state.pacman("p2").unwrap().is_online);
    }

    #[test]
    fn inactive_round_suppresses_marking() {
        let mut state = state_with_remote(5);
        let mut monitor = LivenessMonitor::new();

        assert!(monitor.poll(&mut state, false).is_empty());
        assert!(monitor.poll(&mut state, false).is_empty());
        assert!(state.pacman("p2").unwrap().is_online);
    }

    #[test]
    fn own_pacman_is_never_polled() {
        let mut state = GameState::new(MemoryDoc::new(1));
        state.set_current_pacman(Pacman::new("me", "Me"));
        let mut monitor = LivenessMonitor::new();

        assert!(monitor.poll(&mut state, true).is_empty());
        assert!(monitor.poll(&mut state, true).is_empty());
        assert!(state.current().unwrap().is_online);
    }

    #[test]
    fn self_reassertion_overwrites_a_false_mark() {
        let mut state = state_with_remote(10);
        let mut monitor = LivenessMonitor::new();
        monitor.poll(&mut state, true);
        monitor.poll(&mut state, true);
        assert!(!state.pacman("p2").unwrap().is_online);

        // The marked peer pushes its own state again (clock advanced).
        let mut remote = state.pacman("p2").unwrap().clone();
        remote.clock += 1;
        remote.is_online = true;
        state.push_pacman(remote);
        assert!(state.pacman("p2").unwrap().is_online);

        // And the advancing clock keeps it online afterwards.
        assert!(monitor.poll(&mut state, true).is_empty());
    }

    #[test]
    fn resumed_heartbeat_is_seen_as_fresh_change() {
        let mut state = state_with_remote(10);
        let mut monitor = LivenessMonitor::new();
        monitor.poll(&mut state, true);
        let marked = monitor.poll(&mut state, true);
        assert_eq!(marked.len(), 1);

        // Peer comes back: reasserts itself with a new clock.
        let mut remote = state.pacman("p2").unwrap().clone();
        remote.is_online = true;
        remote.clock = 11;
        state.push_pacman(remote);

        // Clock changed since last poll: no re-mark.
        assert!(monitor.poll(&mut state, true).is_empty());
        assert!(state.pacman("p2").unwrap().is_online);
    }
}
