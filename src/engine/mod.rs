//! The per-peer reconciliation loop. Each frame pulls the replicated
//! document into local mirrors, simulates only what this peer owns (its own
//! pacman and the ghosts hunting it), and pushes the results back. Every
//! peer runs the same loop; the document merge resolves the overlap.

pub mod liveness;
pub mod targeting;

use tracing::{debug, info};

use crate::constants::{GHOST_RADIUS, LIVENESS_POLL_TICKS, MAX_FRAME_DELTA, PACMAN_RADIUS};
use crate::doc::ReplicatedDoc;
use crate::dot::Dot;
use crate::ghost::Ghost;
use crate::level::LevelLayout;
use crate::pacman::Pacman;
use crate::rng::Rng;
use crate::state::GameState;
use crate::types::{GhostColor, InputState};

use self::liveness::LivenessMonitor;
use self::targeting::assign_ghost_targets;

/// What the caller needs from one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepReport {
    pub round_over: bool,
    pub scatter: bool,
    pub score: i32,
}

pub struct GameEngine<D: ReplicatedDoc> {
    state: GameState<D>,
    level: LevelLayout,
    rng: Rng,
    monitor: LivenessMonitor,
    tick: u64,
    now: f64,
}

impl<D: ReplicatedDoc> GameEngine<D> {
    /// Builds the engine over a (possibly already populated) document.
    /// Dots and ghosts are seeded write-if-absent, so whichever peer loads
    /// the level first wins and later peers adopt its records.
    pub fn new(doc: D, level: LevelLayout, seed: u32) -> Self {
        let mut state = GameState::new(doc);
        for (index, spawn) in level.dot_spawns.iter().enumerate() {
            state.init_dot(Dot::new(
                index.to_string(),
                spawn.position,
                spawn.is_power_dot,
            ));
        }
        for (index, spawn) in level.ghost_spawns.iter().enumerate() {
            state.init_ghost(Ghost::new(
                format!("g{index}"),
                GhostColor::by_index(index),
                *spawn,
            ));
        }
        Self {
            state,
            level,
            rng: Rng::new(seed),
            monitor: LivenessMonitor::new(),
            tick: 0,
            now: 0.0,
        }
    }

    pub fn state(&self) -> &GameState<D> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState<D> {
        &mut self.state
    }

    pub fn level(&self) -> &LevelLayout {
        &self.level
    }

    /// Registers this peer's player and spawns it by join order.
    pub fn join(&mut self, id: impl Into<String>, name: impl Into<String>) {
        let pacman = Pacman::new(id, name);
        let id = pacman.id.clone();
        self.state.set_current_pacman(pacman);

        let index = self.state.join_index(&id).unwrap_or(0);
        if let Some(me) = self.state.current() {
            let mut me = me.clone();
            me.position = self.level.player_spawn(index);
            info!(id = %me.id, name = %me.name, join_index = index, "player joined");
            self.state.push_pacman(me);
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        if let Some(me) = self.state.current() {
            let mut me = me.clone();
            me.is_playing = playing;
            self.state.push_pacman(me);
        }
    }

    pub fn end_round(&mut self) {
        self.state.set_round_ended();
    }

    /// One frame: pull, simulate owned entities, push. `raw_delta` is the
    /// caller's frame time in seconds; it is clamped so a stalled caller
    /// cannot tunnel entities through walls on resume.
    pub fn step(&mut self, raw_delta: f64, input: InputState) -> StepReport {
        let delta = raw_delta.min(MAX_FRAME_DELTA);
        self.now += delta;
        let now = self.now;

        self.state.pull_pacmans();
        self.state.pull_ghosts();
        self.state.pull_dots();
        self.state.pull_game(now);

        let mut me = match self.state.current() {
            Some(me) => me.clone(),
            None => return StepReport::default(),
        };

        me.update_lifecycle(now);
        if me.is_playing && me.is_alive {
            me.step_movement(delta as f32, input, &self.level);
            self.state.eat_dot_at(&me.id, me.position, now);
        }
        me.advance_clock();
        // Reasserts presence: overwrites any offline mark a peer put on us.
        me.is_online = true;

        let scatter = self.state.is_scatter(now);
        if me.is_playing && me.is_alive {
            self.resolve_ghost_contacts(&mut me, scatter, now);
        }

        self.drive_ghosts(&me, delta as f32, scatter);
        self.state.push_pacman(me);
        assign_ghost_targets(&mut self.state, &mut self.rng);

        self.tick += 1;
        if self.tick % LIVENESS_POLL_TICKS == 0 {
            let round_active = !self.state.is_round_over();
            self.monitor.poll(&mut self.state, round_active);
        }

        self.state.push_driven_ghosts();

        // Derived fresh so anything claimed this frame already counts.
        let score = self
            .state
            .current_id()
            .map(|id| self.state.score_of(id))
            .unwrap_or(0);
        StepReport {
            round_over: self.state.is_round_over(),
            scatter,
            score,
        }
    }

    fn resolve_ghost_contacts(&mut self, me: &mut Pacman, scatter: bool, now: f64) {
        let contacts: Vec<(String, bool)> = self
            .state
            .ghosts()
            .filter(|g| g.position.distance(me.position) < GHOST_RADIUS + PACMAN_RADIUS)
            .map(|g| (g.id.clone(), g.is_eaten))
            .collect();

        for (ghost_id, already_eaten) in contacts {
            if already_eaten {
                continue;
            }
            if scatter {
                debug!(ghost = %ghost_id, pacman = %me.id, "ghost eaten");
                self.state.record_ghost_eat(&me.id, &ghost_id);
                if let Some(ghost) = self.state.ghost_mut(&ghost_id) {
                    ghost.set_eaten();
                }
                self.state.push_ghost(&ghost_id);
            } else {
                debug!(ghost = %ghost_id, pacman = %me.id, "pacman caught");
                me.lose_life(now);
            }
        }
    }

    fn drive_ghosts(&mut self, me: &Pacman, delta: f32, scatter: bool) {
        let target = if me.is_playing && me.is_alive {
            Some(me.position)
        } else {
            None
        };
        let driven: Vec<String> = self
            .state
            .ghosts()
            .filter(|g| g.pacman_target.as_deref() == Some(me.id.as_str()))
            .map(|g| g.id.clone())
            .collect();
        for ghost_id in driven {
            if let Some(ghost) = self.state.ghost_mut(&ghost_id) {
                ghost.step_ai(delta, target, scatter, &self.level, &mut self.rng);
            }
        }
    }
}
