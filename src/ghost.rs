use crate::constants::{
    GHOST_DIRECTION_ERROR_CHANCE, GHOST_EATEN_SPEED, GHOST_SPEED, PACMAN_RADIUS,
};
use crate::level::LevelLayout;
use crate::rng::Rng;
use crate::types::{GhostColor, GhostRecord, Vec3};

/// One shared ghost. Every peer holds a mirror; each tick the peer whose own
/// pacman is the ghost's target drives its movement and pushes the result.
#[derive(Clone, Debug, PartialEq)]
pub struct Ghost {
    pub id: String,
    pub color: GhostColor,
    pub position: Vec3,
    pub direction: Vec3,
    pub initial_position: Vec3,
    pub pacman_target: Option<String>,
    pub is_eaten: bool,
    pub exit_home: bool,

    // Cell the last direction decision was made in; local only.
    decided_cell: Option<(i32, i32)>,
}

impl Ghost {
    pub fn new(id: impl Into<String>, color: GhostColor, position: Vec3) -> Self {
        Self {
            id: id.into(),
            color,
            position,
            direction: Vec3::LEFT,
            initial_position: position,
            pacman_target: None,
            is_eaten: false,
            exit_home: true,
            decided_cell: None,
        }
    }

    pub fn to_record(&self) -> GhostRecord {
        GhostRecord {
            id: self.id.clone(),
            color: self.color,
            position: self.position,
            direction: self.direction,
            initial_position: self.initial_position,
            pacman_target: self.pacman_target.clone(),
            is_eaten: self.is_eaten,
            exit_home: self.exit_home,
        }
    }

    pub fn from_record(record: &GhostRecord) -> Self {
        let mut ghost = Self::new(record.id.clone(), record.color, record.position);
        ghost.copy_record(record);
        ghost
    }

    pub fn copy_record(&mut self, record: &GhostRecord) -> bool {
        if record.id != self.id {
            return false;
        }
        self.color = record.color;
        self.position = record.position;
        self.direction = record.direction;
        self.initial_position = record.initial_position;
        self.pacman_target = record.pacman_target.clone();
        self.is_eaten = record.is_eaten;
        self.exit_home = record.exit_home;
        true
    }

    /// Marks the ghost caught during scatter mode; it flies back to its
    /// spawn point and leaves the pen again.
    pub fn set_eaten(&mut self) {
        self.is_eaten = true;
    }

    /// One AI step. `target` is the hunted pacman's position; `scatter`
    /// reverses the chase into flight. Falls back to continuing in place
    /// when no direction is legal, never errors.
    pub fn step_ai(
        &mut self,
        delta: f32,
        target: Option<Vec3>,
        scatter: bool,
        level: &LevelLayout,
        rng: &mut Rng,
    ) {
        if self.is_eaten {
            self.return_home(delta);
            return;
        }

        if self.exit_home && level.outside_pen(self.position) {
            self.exit_home = false;
            self.decided_cell = None;
        }

        let steer = if self.exit_home {
            Some(level.home_exit())
        } else {
            target
        };
        // Fleeing only makes sense while actually hunting outside the pen.
        let flee = scatter && !self.exit_home;

        let cell = self.position.round_xy();
        let blocked = self.probe_blocked(self.direction, delta, level);
        if blocked || self.decided_cell != Some(cell) {
            self.decided_cell = Some(cell);
            if let Some(direction) = self.choose_direction(steer, flee, level, rng) {
                self.direction = direction;
            }
            // No legal direction: keep the current one and let the wall
            // clamp hold the ghost in place.
        }

        self.position = self
            .position
            .add(self.direction.scale(GHOST_SPEED * delta));
        self.clamp_to_walls(level);
        self.position = level.wrap(self.position);
    }

    fn return_home(&mut self, delta: f32) {
        let to_home = self.initial_position.sub(self.position);
        if to_home.length() < 0.3 {
            self.position = self.initial_position;
            self.direction = Vec3::LEFT;
            self.is_eaten = false;
            self.exit_home = true;
            self.decided_cell = None;
            return;
        }
        self.position = self
            .position
            .add(to_home.normalized().scale(GHOST_EATEN_SPEED * delta));
    }

    fn probe_blocked(&self, direction: Vec3, delta: f32, level: &LevelLayout) -> bool {
        let probe = self
            .position
            .add(direction.scale(PACMAN_RADIUS + GHOST_SPEED * delta));
        level.is_wall(probe, true)
    }

    fn choose_direction(
        &self,
        steer: Option<Vec3>,
        flee: bool,
        level: &LevelLayout,
        rng: &mut Rng,
    ) -> Option<Vec3> {
        let reverse = self.direction.scale(-1.0);
        let mut candidates: Vec<Vec3> = [Vec3::RIGHT, Vec3::LEFT, Vec3::TOP, Vec3::BOTTOM]
            .into_iter()
            .filter(|dir| !level.is_wall(self.position.add(dir.scale(0.6)), true))
            .collect();
        // Ghosts do not double back unless the reverse is all that is left,
        // except when fleeing: scatter mode may demand an about-face.
        if !flee && candidates.len() > 1 {
            candidates.retain(|dir| dir.sub(reverse).length() > 1e-3);
        }
        if candidates.is_empty() {
            return None;
        }

        let steer = match steer {
            Some(steer) => steer,
            None => return rng.pick(&candidates).copied(),
        };
        if rng.bool(GHOST_DIRECTION_ERROR_CHANCE) {
            return rng.pick(&candidates).copied();
        }

        let score = |dir: &Vec3| self.position.add(*dir).distance(steer);
        candidates
            .into_iter()
            .reduce(|best, dir| {
                let better = if flee {
                    score(&dir) > score(&best)
                } else {
                    score(&dir) < score(&best)
                };
                if better {
                    dir
                } else {
                    best
                }
            })
    }

    fn clamp_to_walls(&mut self, level: &LevelLayout) {
        let left = self.position.add(Vec3::LEFT.scale(PACMAN_RADIUS));
        let right = self.position.add(Vec3::RIGHT.scale(PACMAN_RADIUS));
        let top = self.position.add(Vec3::TOP.scale(PACMAN_RADIUS));
        let bottom = self.position.add(Vec3::BOTTOM.scale(PACMAN_RADIUS));

        if level.is_wall(left, true) {
            self.position.x = left.x.round() + 0.5 + PACMAN_RADIUS;
        }
        if level.is_wall(right, true) {
            self.position.x = right.x.round() - 0.5 - PACMAN_RADIUS;
        }
        if level.is_wall(top, true) {
            self.position.y = top.y.round() - 0.5 - PACMAN_RADIUS;
        }
        if level.is_wall(bottom, true) {
            self.position.y = bottom.y.round() + 0.5 + PACMAN_RADIUS;
        }
    }
}
