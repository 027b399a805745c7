use crate::constants::{PACMAN_RADIUS, PACMAN_SPEED, RESPAWN_SECS, START_LIVES};
use crate::level::LevelLayout;
use crate::types::{InputState, PacmanRecord, Vec3};

/// One player. Exactly one instance per peer is authoritative (the peer's
/// own pacman); all others are mirrors of replicated records.
#[derive(Clone, Debug, PartialEq)]
pub struct Pacman {
    pub id: String,
    pub name: String,
    pub peer_id: Option<String>,

    pub position: Vec3,
    pub direction: Vec3,
    // Drives the chomp animation phase on the render side, not physics.
    pub distance_moved: f32,

    pub is_playing: bool,
    pub is_online: bool,
    pub is_alive: bool,
    pub n_lives: i32,
    // Heartbeat: incremented once per local simulation tick, watched by
    // every other peer for liveness.
    pub clock: u64,

    // Local respawn timer; never replicated.
    lost_at: Option<f64>,
}

impl Pacman {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            peer_id: None,
            position: Vec3::ZERO,
            direction: Vec3::BOTTOM,
            distance_moved: 0.0,
            is_playing: false,
            is_online: true,
            is_alive: true,
            n_lives: START_LIVES,
            clock: 0,
            lost_at: None,
        }
    }

    pub fn to_record(&self) -> PacmanRecord {
        PacmanRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            peer_id: self.peer_id.clone(),
            position: self.position,
            direction: self.direction,
            distance_moved: self.distance_moved,
            is_playing: self.is_playing,
            is_online: self.is_online,
            is_alive: self.is_alive,
            n_lives: self.n_lives,
            clock: self.clock,
        }
    }

    pub fn from_record(record: &PacmanRecord) -> Self {
        let mut pacman = Self::new(record.id.clone(), record.name.clone());
        pacman.copy_record(record);
        pacman
    }

    /// Applies every replicated field except identity. Refuses records that
    /// belong to a different pacman.
    pub fn copy_record(&mut self, record: &PacmanRecord) -> bool {
        if record.id != self.id {
            return false;
        }
        self.name = record.name.clone();
        self.peer_id = record.peer_id.clone();
        self.position = record.position;
        self.direction = record.direction;
        self.distance_moved = record.distance_moved;
        self.is_playing = record.is_playing;
        self.is_online = record.is_online;
        self.is_alive = record.is_alive;
        self.n_lives = record.n_lives;
        self.clock = record.clock;
        true
    }

    pub fn advance_clock(&mut self) {
        self.clock += 1;
    }

    pub fn is_defeated(&self) -> bool {
        self.n_lives == 0
    }

    /// Forward/backward translation along the facing vector, turning by
    /// rotating the facing, then axis-aligned pushback out of any wall the
    /// four side probes landed in, then edge wrapping.
    pub fn step_movement(&mut self, delta: f32, input: InputState, level: &LevelLayout) {
        if input.forward {
            self.position = self.position.add(self.direction.scale(PACMAN_SPEED * delta));
            self.distance_moved += PACMAN_SPEED * delta;
        }
        if input.backward {
            self.position = self.position.sub(self.direction.scale(PACMAN_SPEED * delta));
            self.distance_moved += PACMAN_SPEED * delta;
        }
        if input.turn_left {
            self.direction = self
                .direction
                .rotated_z(std::f32::consts::FRAC_PI_2 * delta);
        }
        if input.turn_right {
            self.direction = self
                .direction
                .rotated_z(-std::f32::consts::FRAC_PI_2 * delta);
        }

        let left = self.position.add(Vec3::LEFT.scale(PACMAN_RADIUS));
        let right = self.position.add(Vec3::RIGHT.scale(PACMAN_RADIUS));
        let top = self.position.add(Vec3::TOP.scale(PACMAN_RADIUS));
        let bottom = self.position.add(Vec3::BOTTOM.scale(PACMAN_RADIUS));

        if level.is_wall(left, false) {
            self.position.x = left.x.round() + 0.5 + PACMAN_RADIUS;
        }
        if level.is_wall(right, false) {
            self.position.x = right.x.round() - 0.5 - PACMAN_RADIUS;
        }
        if level.is_wall(top, false) {
            self.position.y = top.y.round() - 0.5 - PACMAN_RADIUS;
        }
        if level.is_wall(bottom, false) {
            self.position.y = bottom.y.round() + 0.5 + PACMAN_RADIUS;
        }

        self.position = level.wrap(self.position);
    }

    /// Ghost contact outside scatter mode. At zero lives the pacman stays
    /// down for good; otherwise the respawn timer takes over.
    pub fn lose_life(&mut self, now: f64) {
        if !self.is_alive {
            return;
        }
        self.n_lives = (self.n_lives - 1).max(0);
        self.is_alive = false;
        self.lost_at = Some(now);
    }

    /// Revives after the respawn delay while lives remain.
    pub fn update_lifecycle(&mut self, now: f64) {
        if self.is_alive || self.n_lives == 0 {
            self.lost_at = None;
            return;
        }
        match self.lost_at {
            None => self.lost_at = Some(now),
            Some(lost_at) => {
                if now - lost_at >= RESPAWN_SECS {
                    self.is_alive = true;
                    self.lost_at = None;
                }
            }
        }
    }
}
