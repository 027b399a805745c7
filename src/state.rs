//! Sole mediator between local entity objects and the replicated document.
//! Every read or write of shared state goes through here; the engine and the
//! targeting/liveness logic never touch the document directly.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::warn;

use crate::constants::{DOT_SCORE, GHOST_SCORE, POWER_DOT_SCORE, SCATTER_SECS};
use crate::doc::ReplicatedDoc;
use crate::dot::Dot;
use crate::ghost::Ghost;
use crate::pacman::Pacman;
use crate::types::{DotRecord, GhostEatRecord, GhostRecord, PacmanRecord, ScatterRecord, Vec3};

pub const PACMANS_MAP: &str = "pacmans";
pub const GHOSTS_MAP: &str = "ghosts";
pub const DOTS_MAP: &str = "dots";
pub const GAME_MAP: &str = "game";
pub const ROSTER_LIST: &str = "roster";
pub const GHOST_EATS_LIST: &str = "ghost_eats";

const ENDED_KEY: &str = "ended";
const SCATTER_KEY: &str = "scatter";

pub struct GameState<D: ReplicatedDoc> {
    doc: D,

    pacmans: HashMap<String, Pacman>,
    // BTreeMap so every peer iterates ghosts in the same fixed order.
    ghosts: BTreeMap<String, Ghost>,
    dots: HashMap<String, Dot>,
    dot_index: HashMap<(i32, i32), String>,

    current_id: Option<String>,

    pub dots_eaten: usize,
    pub power_dots_eaten: usize,
    pub all_players_defeated: bool,
    pub current_score: i32,

    scatter_epoch_seen: u64,
    scatter_until: f64,
}

impl<D: ReplicatedDoc> GameState<D> {
    pub fn new(doc: D) -> Self {
        Self {
            doc,
            pacmans: HashMap::new(),
            ghosts: BTreeMap::new(),
            dots: HashMap::new(),
            dot_index: HashMap::new(),
            current_id: None,
            dots_eaten: 0,
            power_dots_eaten: 0,
            all_players_defeated: false,
            current_score: 0,
            scatter_epoch_seen: 0,
            scatter_until: f64::NEG_INFINITY,
        }
    }

    pub fn doc(&self) -> &D {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    // Players
    // =======

    /// Marks one pacman as this peer's authoritative player, publishes it
    /// and joins the shared roster (join order drives spawn assignment).
    pub fn set_current_pacman(&mut self, pacman: Pacman) {
        let id = pacman.id.clone();
        if self.join_index(&id).is_none() {
            self.doc.list_push(ROSTER_LIST, Value::String(id.clone()));
        }
        self.current_id = Some(id);
        self.push_pacman(pacman);
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn current(&self) -> Option<&Pacman> {
        self.current_id
            .as_deref()
            .and_then(|id| self.pacmans.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Pacman> {
        match self.current_id.as_deref() {
            Some(id) => self.pacmans.get_mut(id),
            None => None,
        }
    }

    pub fn pacmans(&self) -> impl Iterator<Item = &Pacman> {
        self.pacmans.values()
    }

    pub fn pacman(&self, id: &str) -> Option<&Pacman> {
        self.pacmans.get(id)
    }

    /// Position of this pacman in the shared join-order roster.
    pub fn join_index(&self, id: &str) -> Option<usize> {
        let mut index = None;
        let mut at = 0usize;
        self.doc.list_for_each(ROSTER_LIST, |value| {
            if index.is_none() && value.as_str() == Some(id) {
                index = Some(at);
            }
            at += 1;
        });
        index
    }

    pub fn roster_len(&self) -> usize {
        self.doc.list_len(ROSTER_LIST)
    }

    /// Merges every replicated pacman record into the local mirrors. The
    /// current (authoritative) pacman is never overwritten: a peer's own
    /// state echoed back through the mesh may be stale. Returns ids that
    /// were materialized for the first time so the presentation layer can
    /// pick them up.
    pub fn pull_pacmans(&mut self) -> Vec<String> {
        let mut records: Vec<PacmanRecord> = Vec::new();
        self.doc.map_for_each(PACMANS_MAP, |key, value| {
            match serde_json::from_value::<PacmanRecord>(value.clone()) {
                Ok(record) => records.push(record),
                Err(err) => warn!(key, %err, "skipping undecodable pacman record"),
            }
        });

        let mut added = Vec::new();
        for record in records {
            if Some(record.id.as_str()) == self.current_id.as_deref() {
                continue;
            }
            match self.pacmans.get_mut(&record.id) {
                Some(local) => {
                    local.copy_record(&record);
                }
                None => {
                    added.push(record.id.clone());
                    self.pacmans
                        .insert(record.id.clone(), Pacman::from_record(&record));
                }
            }
        }

        self.all_players_defeated = !self.pacmans.is_empty()
            && self
                .pacmans
                .values()
                .all(|p| p.is_defeated() || !p.is_online);
        added
    }

    /// Publishes one pacman snapshot and refreshes the local mirror.
    pub fn push_pacman(&mut self, pacman: Pacman) {
        let record = pacman.to_record();
        match serde_json::to_value(&record) {
            Ok(value) => self.doc.map_set(PACMANS_MAP, &record.id, value),
            Err(err) => warn!(id = %record.id, %err, "failed to encode pacman record"),
        }
        self.pacmans.insert(record.id, pacman);
    }

    // Ghosts
    // ======

    pub fn ghosts(&self) -> impl Iterator<Item = &Ghost> {
        self.ghosts.values()
    }

    pub fn ghosts_mut(&mut self) -> impl Iterator<Item = &mut Ghost> {
        self.ghosts.values_mut()
    }

    pub fn ghost(&self, id: &str) -> Option<&Ghost> {
        self.ghosts.get(id)
    }

    pub fn ghost_mut(&mut self, id: &str) -> Option<&mut Ghost> {
        self.ghosts.get_mut(id)
    }

    /// Publishes a single ghost snapshot (used for out-of-band mutations
    /// such as marking a ghost eaten).
    pub fn push_ghost(&mut self, id: &str) {
        if let Some(ghost) = self.ghosts.get(id) {
            match serde_json::to_value(ghost.to_record()) {
                Ok(value) => self.doc.map_set(GHOSTS_MAP, id, value),
                Err(err) => warn!(id, %err, "failed to encode ghost record"),
            }
        }
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    /// Level-load materialization: the first peer seeds the shared record,
    /// later peers adopt whatever is already replicated.
    pub fn init_ghost(&mut self, ghost: Ghost) {
        let ghost = match self.doc.map_get(GHOSTS_MAP, &ghost.id) {
            Some(value) => match serde_json::from_value::<GhostRecord>(value) {
                Ok(record) => Ghost::from_record(&record),
                Err(err) => {
                    warn!(id = %ghost.id, %err, "ignoring undecodable ghost record");
                    ghost
                }
            },
            None => {
                self.write_ghost_record(&ghost);
                ghost
            }
        };
        self.ghosts.insert(ghost.id.clone(), ghost);
    }

    /// Merges replicated ghost records, skipping ghosts this peer currently
    /// drives (those hunting the current pacman) so local simulation is not
    /// clobbered mid-tick.
    pub fn pull_ghosts(&mut self) -> Vec<String> {
        let mut records: Vec<GhostRecord> = Vec::new();
        self.doc.map_for_each(GHOSTS_MAP, |key, value| {
            match serde_json::from_value::<GhostRecord>(value.clone()) {
                Ok(record) => records.push(record),
                Err(err) => warn!(key, %err, "skipping undecodable ghost record"),
            }
        });

        let current = self.current_id.clone();
        let mut added = Vec::new();
        for record in records {
            match self.ghosts.get_mut(&record.id) {
                Some(local) => {
                    let driven_here =
                        local.pacman_target.is_some() && local.pacman_target == current;
                    if !driven_here {
                        local.copy_record(&record);
                    }
                }
                None => {
                    added.push(record.id.clone());
                    self.ghosts
                        .insert(record.id.clone(), Ghost::from_record(&record));
                }
            }
        }
        added
    }

    /// Publishes every local ghost in one batched transaction so other
    /// peers never observe a half-updated ghost set.
    pub fn push_ghosts(&mut self) {
        let mut writes = Vec::new();
        for ghost in self.ghosts.values() {
            match serde_json::to_value(ghost.to_record()) {
                Ok(value) => writes.push((ghost.id.clone(), value)),
                Err(err) => warn!(id = %ghost.id, %err, "failed to encode ghost record"),
            }
        }
        self.doc.transact(|doc| {
            for (id, value) in writes {
                doc.map_set(GHOSTS_MAP, &id, value);
            }
        });
    }

    /// Publishes only the ghosts this peer drove this tick.
    pub fn push_driven_ghosts(&mut self) {
        let current = self.current_id.clone();
        let mut writes = Vec::new();
        for ghost in self.ghosts.values() {
            if ghost.pacman_target.is_some() && ghost.pacman_target == current {
                match serde_json::to_value(ghost.to_record()) {
                    Ok(value) => writes.push((ghost.id.clone(), value)),
                    Err(err) => warn!(id = %ghost.id, %err, "failed to encode ghost record"),
                }
            }
        }
        self.doc.transact(|doc| {
            for (id, value) in writes {
                doc.map_set(GHOSTS_MAP, &id, value);
            }
        });
    }

    fn write_ghost_record(&mut self, ghost: &Ghost) {
        match serde_json::to_value(ghost.to_record()) {
            Ok(value) => self.doc.map_set(GHOSTS_MAP, &ghost.id, value),
            Err(err) => warn!(id = %ghost.id, %err, "failed to encode ghost record"),
        }
    }

    // Dots
    // ====

    pub fn init_dot(&mut self, dot: Dot) {
        let dot = match self.doc.map_get(DOTS_MAP, &dot.id) {
            Some(value) => match serde_json::from_value::<DotRecord>(value) {
                Ok(record) => Dot::from_record(&record),
                Err(err) => {
                    warn!(id = %dot.id, %err, "ignoring undecodable dot record");
                    dot
                }
            },
            None => {
                self.write_dot_record(&dot);
                dot
            }
        };
        self.dot_index
            .insert(dot.position.round_xy(), dot.id.clone());
        self.dots.insert(dot.id.clone(), dot);
    }

    pub fn total_dots(&self) -> usize {
        self.dots.len()
    }

    pub fn dot(&self, id: &str) -> Option<&Dot> {
        self.dots.get(id)
    }

    pub fn dot_at(&self, position: Vec3) -> Option<&Dot> {
        self.dot_index
            .get(&position.round_xy())
            .and_then(|id| self.dots.get(id))
    }

    /// Pulls every replicated consumption claim and recomputes the derived
    /// counters plus the current player's score. Idempotent between
    /// replicated changes.
    pub fn pull_dots(&mut self) {
        let mut records: Vec<DotRecord> = Vec::new();
        self.doc.map_for_each(DOTS_MAP, |key, value| {
            match serde_json::from_value::<DotRecord>(value.clone()) {
                Ok(record) => records.push(record),
                Err(err) => warn!(key, %err, "skipping undecodable dot record"),
            }
        });

        for record in records {
            match self.dots.get_mut(&record.id) {
                Some(local) => {
                    local.copy_record(&record);
                }
                None => {
                    let dot = Dot::from_record(&record);
                    self.dot_index
                        .insert(dot.position.round_xy(), dot.id.clone());
                    self.dots.insert(dot.id.clone(), dot);
                }
            }
        }

        self.dots_eaten = self.dots.values().filter(|dot| dot.is_eaten()).count();
        self.power_dots_eaten = self
            .dots
            .values()
            .filter(|dot| dot.is_eaten() && dot.is_power_dot)
            .count();
        self.current_score = match self.current_id.as_deref() {
            Some(id) => self.score_of(id),
            None => 0,
        };
    }

    /// One-shot claim of the dot at a cell. Returns whether a dot was eaten
    /// and whether it was a power dot; a power dot arms scatter mode.
    pub fn eat_dot_at(&mut self, eater_id: &str, position: Vec3, now: f64) -> Option<bool> {
        let dot_id = self.dot_index.get(&position.round_xy())?.clone();
        let dot = self.dots.get_mut(&dot_id)?;
        if dot.is_eaten() {
            return None;
        }
        dot.pacman_id = Some(eater_id.to_string());
        let is_power = dot.is_power_dot;
        let record = dot.to_record();
        match serde_json::to_value(&record) {
            Ok(value) => self.doc.map_set(DOTS_MAP, &record.id, value),
            Err(err) => warn!(id = %record.id, %err, "failed to encode dot record"),
        }
        if is_power {
            self.arm_scatter(now);
        }
        Some(is_power)
    }

    fn write_dot_record(&mut self, dot: &Dot) {
        match serde_json::to_value(dot.to_record()) {
            Ok(value) => self.doc.map_set(DOTS_MAP, &dot.id, value),
            Err(err) => warn!(id = %dot.id, %err, "failed to encode dot record"),
        }
    }

    // Ghost-eat log and scoring
    // =========================

    pub fn record_ghost_eat(&mut self, pacman_id: &str, ghost_id: &str) {
        let record = GhostEatRecord {
            ghost_id: ghost_id.to_string(),
            pacman_id: pacman_id.to_string(),
        };
        match serde_json::to_value(&record) {
            Ok(value) => self.doc.list_push(GHOST_EATS_LIST, value),
            Err(err) => warn!(%err, "failed to encode ghost-eat record"),
        }
    }

    pub fn count_ghost_eats(&self, pacman_id: &str) -> usize {
        let mut count = 0usize;
        self.doc.list_for_each(GHOST_EATS_LIST, |value| {
            if value.get("pacman_id").and_then(Value::as_str) == Some(pacman_id) {
                count += 1;
            }
        });
        count
    }

    /// Derived, never stored: plain dots, power dots and ghost catches
    /// valued from the shared records alone.
    pub fn score_of(&self, pacman_id: &str) -> i32 {
        let mut score = 0;
        for dot in self.dots.values() {
            if dot.pacman_id.as_deref() == Some(pacman_id) {
                score += if dot.is_power_dot {
                    POWER_DOT_SCORE
                } else {
                    DOT_SCORE
                };
            }
        }
        score + self.count_ghost_eats(pacman_id) as i32 * GHOST_SCORE
    }

    // Shared game flags
    // =================

    /// Observes shared flags; an advanced scatter epoch arms a local
    /// scatter deadline (epochs replace wall-clock timestamps so peers
    /// never compare clocks).
    pub fn pull_game(&mut self, now: f64) {
        let epoch = self.shared_scatter_epoch();
        if epoch > self.scatter_epoch_seen {
            self.scatter_epoch_seen = epoch;
            self.scatter_until = now + SCATTER_SECS;
        }
    }

    fn shared_scatter_epoch(&self) -> u64 {
        self.doc
            .map_get(GAME_MAP, SCATTER_KEY)
            .and_then(|value| serde_json::from_value::<ScatterRecord>(value).ok())
            .map(|record| record.epoch)
            .unwrap_or(0)
    }

    fn arm_scatter(&mut self, now: f64) {
        let epoch = self.shared_scatter_epoch().max(self.scatter_epoch_seen) + 1;
        match serde_json::to_value(ScatterRecord { epoch }) {
            Ok(value) => self.doc.map_set(GAME_MAP, SCATTER_KEY, value),
            Err(err) => warn!(%err, "failed to encode scatter record"),
        }
        self.scatter_epoch_seen = epoch;
        self.scatter_until = now + SCATTER_SECS;
    }

    pub fn is_scatter(&self, now: f64) -> bool {
        now < self.scatter_until
    }

    /// Any peer may end the round explicitly (host-initiated restart).
    pub fn set_round_ended(&mut self) {
        self.doc.map_set(GAME_MAP, ENDED_KEY, Value::Bool(true));
    }

    pub fn round_ended_flag(&self) -> bool {
        self.doc
            .map_get(GAME_MAP, ENDED_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    pub fn is_round_over(&self) -> bool {
        self.round_ended_flag()
            || self.all_players_defeated
            || (!self.dots.is_empty() && self.dots_eaten == self.dots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::MemoryDoc;

    fn state() -> GameState<MemoryDoc> {
        GameState::new(MemoryDoc::new(1))
    }

    fn seed_dots(state: &mut GameState<MemoryDoc>) {
        // Four dots, dot 1 is a power dot.
        for (id, x, power) in [(0, 0.0, false), (1, 1.0, true), (2, 2.0, false), (3, 3.0, false)]
        {
            state.init_dot(Dot::new(id.to_string(), Vec3::new(x, 0.0, 0.0), power));
        }
    }

    #[test]
    fn set_current_joins_roster_once() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));
        state.set_current_pacman(Pacman::new("p1", "Alice"));
        assert_eq!(state.roster_len(), 1);
        assert_eq!(state.join_index("p1"), Some(0));
    }

    #[test]
    fn pull_materializes_remote_pacmans() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));

        let remote = Pacman::new("p2", "Bob").to_record();
        let value = serde_json::to_value(&remote).unwrap();
        state.doc_mut().map_set(PACMANS_MAP, "p2", value);

        let added = state.pull_pacmans();
        assert_eq!(added, vec!["p2".to_string()]);
        assert_eq!(state.pacman("p2").unwrap().name, "Bob");

        // Second pull adds nothing new.
        assert!(state.pull_pacmans().is_empty());
    }

    #[test]
    fn pull_never_overwrites_current_pacman() {
        let mut state = state();
        let mut me = Pacman::new("p1", "Alice");
        me.position = Vec3::new(5.0, -5.0, 0.0);
        state.set_current_pacman(me);

        // A stale echo of our own record with an old position.
        let mut stale = Pacman::new("p1", "Alice").to_record();
        stale.position = Vec3::ZERO;
        stale.clock = 0;
        let value = serde_json::to_value(&stale).unwrap();
        state.doc_mut().map_set(PACMANS_MAP, "p1", value);

        state.pull_pacmans();
        assert_eq!(state.current().unwrap().position, Vec3::new(5.0, -5.0, 0.0));
    }

    #[test]
    fn all_players_defeated_tracks_lives_and_presence() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));

        let mut remote = Pacman::new("p2", "Bob");
        remote.n_lives = 0;
        let value = serde_json::to_value(remote.to_record()).unwrap();
        state.doc_mut().map_set(PACMANS_MAP, "p2", value);

        state.pull_pacmans();
        assert!(!state.all_players_defeated);

        let mut me = state.current().unwrap().clone();
        me.n_lives = 0;
        state.push_pacman(me);
        state.pull_pacmans();
        assert!(state.all_players_defeated);
    }

    #[test]
    fn offline_players_count_as_defeated() {
        let mut state = state();
        let mut remote = Pacman::new("p2", "Bob");
        remote.is_online = false;
        let value = serde_json::to_value(remote.to_record()).unwrap();
        state.doc_mut().map_set(PACMANS_MAP, "p2", value);

        state.pull_pacmans();
        assert!(state.all_players_defeated);
    }

    #[test]
    fn dot_eating_updates_derived_counts_and_score() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));
        seed_dots(&mut state);

        assert_eq!(state.eat_dot_at("p1", Vec3::new(0.0, 0.0, 0.0), 0.0), Some(false));
        assert_eq!(state.eat_dot_at("p1", Vec3::new(1.0, 0.0, 0.0), 0.0), Some(true));
        // Already eaten: no second claim.
        assert_eq!(state.eat_dot_at("p1", Vec3::new(0.0, 0.0, 0.0), 0.0), None);

        state.pull_dots();
        assert_eq!(state.dots_eaten, 2);
        assert_eq!(state.power_dots_eaten, 1);
        assert_eq!(state.current_score, DOT_SCORE + POWER_DOT_SCORE);

        // Idempotent without intervening replicated changes.
        let before = (state.dots_eaten, state.power_dots_eaten, state.current_score);
        state.pull_dots();
        assert_eq!(
            before,
            (state.dots_eaten, state.power_dots_eaten, state.current_score)
        );
    }

    #[test]
    fn power_dot_arms_scatter_mode() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));
        seed_dots(&mut state);

        assert!(!state.is_scatter(1.0));
        state.eat_dot_at("p1", Vec3::new(1.0, 0.0, 0.0), 1.0);
        assert!(state.is_scatter(1.0 + SCATTER_SECS - 0.1));
        assert!(!state.is_scatter(1.0 + SCATTER_SECS + 0.1));
    }

    #[test]
    fn remote_scatter_epoch_arms_local_deadline() {
        let mut state = state();
        let value = serde_json::to_value(ScatterRecord { epoch: 3 }).unwrap();
        state.doc_mut().map_set(GAME_MAP, SCATTER_KEY, value);

        state.pull_game(2.0);
        assert!(state.is_scatter(2.5));

        // Same epoch seen again does not re-arm.
        state.pull_game(2.0 + SCATTER_SECS + 5.0);
        assert!(!state.is_scatter(2.0 + SCATTER_SECS + 5.5));
    }

    #[test]
    fn ghost_eat_log_counts_per_player() {
        let mut state = state();
        state.record_ghost_eat("p1", "g0");
        state.record_ghost_eat("p1", "g1");
        state.record_ghost_eat("p2", "g0");

        assert_eq!(state.count_ghost_eats("p1"), 2);
        assert_eq!(state.count_ghost_eats("p2"), 1);
        assert_eq!(state.count_ghost_eats("p3"), 0);
    }

    #[test]
    fn scores_are_independent_per_player() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));
        seed_dots(&mut state);

        state.eat_dot_at("p1", Vec3::new(0.0, 0.0, 0.0), 0.0);
        state.eat_dot_at("p1", Vec3::new(2.0, 0.0, 0.0), 0.0);
        state.eat_dot_at("p1", Vec3::new(1.0, 0.0, 0.0), 0.0);
        state.eat_dot_at("p2", Vec3::new(3.0, 0.0, 0.0), 0.0);
        state.record_ghost_eat("p1", "g0");

        state.pull_dots();
        // 2 plain + 1 power + 1 ghost = 1000 for p1.
        assert_eq!(
            state.score_of("p1"),
            2 * DOT_SCORE + POWER_DOT_SCORE + GHOST_SCORE
        );
        assert_eq!(state.score_of("p2"), DOT_SCORE);
    }

    #[test]
    fn round_over_conditions() {
        let mut state = state();
        seed_dots(&mut state);
        assert!(!state.is_round_over());

        // All dots eaten ends the round even with a live player.
        state.set_current_pacman(Pacman::new("p1", "Alice"));
        for x in 0..4 {
            state.eat_dot_at("p1", Vec3::new(x as f32, 0.0, 0.0), 0.0);
        }
        state.pull_dots();
        assert!(state.is_round_over());

        // The explicit ended flag works on its own.
        let mut other = GameState::new(MemoryDoc::new(2));
        other.set_round_ended();
        assert!(other.is_round_over());
    }

    #[test]
    fn ghost_pull_skips_locally_driven_ghosts() {
        let mut state = state();
        state.set_current_pacman(Pacman::new("p1", "Alice"));

        let mut ghost = Ghost::new("g0", crate::types::GhostColor::Red, Vec3::ZERO);
        ghost.pacman_target = Some("p1".to_string());
        ghost.position = Vec3::new(4.0, 0.0, 0.0);
        state.init_ghost(ghost);

        // A remote peer published an older position for the same ghost.
        let mut remote = Ghost::new("g0", crate::types::GhostColor::Red, Vec3::ZERO);
        remote.pacman_target = Some("p1".to_string());
        let value = serde_json::to_value(remote.to_record()).unwrap();
        state.doc_mut().map_set(GHOSTS_MAP, "g0", value);

        state.pull_ghosts();
        assert_eq!(
            state.ghost("g0").unwrap().position,
            Vec3::new(4.0, 0.0, 0.0)
        );

        // A ghost hunting someone else is overwritten as usual.
        let mut foreign = Ghost::new("g1", crate::types::GhostColor::Pink, Vec3::ZERO);
        foreign.pacman_target = Some("p2".to_string());
        state.init_ghost(foreign);
        let mut updated = Ghost::new("g1", crate::types::GhostColor::Pink, Vec3::ZERO);
        updated.pacman_target = Some("p2".to_string());
        updated.position = Vec3::new(9.0, 0.0, 0.0);
        let value = serde_json::to_value(updated.to_record()).unwrap();
        state.doc_mut().map_set(GHOSTS_MAP, "g1", value);

        state.pull_ghosts();
        assert_eq!(
            state.ghost("g1").unwrap().position,
            Vec3::new(9.0, 0.0, 0.0)
        );
    }

    #[test]
    fn same_dot_race_settles_on_one_winner_everywhere() {
        let mut a = GameState::new(MemoryDoc::new(1));
        let mut b = GameState::new(MemoryDoc::new(2));
        a.set_current_pacman(Pacman::new("p1", "Alice"));
        b.set_current_pacman(Pacman::new("p2", "Bob"));
        seed_dots(&mut a);
        seed_dots(&mut b);

        // Both players eat dot 0 before either write has replicated.
        a.eat_dot_at("p1", Vec3::new(0.0, 0.0, 0.0), 0.0);
        b.eat_dot_at("p2", Vec3::new(0.0, 0.0, 0.0), 0.0);

        let a_doc = a.doc().clone();
        b.doc_mut().merge_from(&a_doc);
        let b_doc = b.doc().clone();
        a.doc_mut().merge_from(&b_doc);
        a.pull_dots();
        b.pull_dots();

        // Every replica credits the same winner, and exactly one of them.
        assert_eq!(
            a.dot("0").unwrap().pacman_id,
            b.dot("0").unwrap().pacman_id
        );
        assert_eq!(a.score_of("p1"), b.score_of("p1"));
        assert_eq!(a.score_of("p2"), b.score_of("p2"));
        assert_eq!(a.score_of("p1") + a.score_of("p2"), DOT_SCORE);
        assert_eq!(a.dots_eaten, 1);
        assert_eq!(b.dots_eaten, 1);
    }

    #[test]
    fn two_peers_converge_through_merges() {
        let mut a = GameState::new(MemoryDoc::new(1));
        let mut b = GameState::new(MemoryDoc::new(2));

        a.set_current_pacman(Pacman::new("p1", "Alice"));
        seed_dots(&mut a);
        a.eat_dot_at("p1", Vec3::new(0.0, 0.0, 0.0), 0.0);
        a.record_ghost_eat("p1", "g0");

        b.set_current_pacman(Pacman::new("p2", "Bob"));
        let a_doc = a.doc().clone();
        b.doc_mut().merge_from(&a_doc);
        let b_doc = b.doc().clone();
        a.doc_mut().merge_from(&b_doc);

        let added = b.pull_pacmans();
        assert_eq!(added, vec!["p1".to_string()]);
        b.pull_dots();
        assert_eq!(b.dots_eaten, 1);
        assert_eq!(b.score_of("p1"), DOT_SCORE + GHOST_SCORE);

        a.pull_pacmans();
        assert!(a.pacman("p2").is_some());
        assert_eq!(a.join_index("p1"), b.join_index("p1"));
        assert_eq!(a.join_index("p2"), b.join_index("p2"));
    }
}
