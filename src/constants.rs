pub const PACMAN_SPEED: f32 = 3.0;
pub const PACMAN_RADIUS: f32 = 0.4;
pub const START_LIVES: i32 = 3;
pub const RESPAWN_SECS: f64 = 8.0;

pub const GHOST_SPEED: f32 = 1.5;
pub const GHOST_EATEN_SPEED: f32 = 3.0;
pub const GHOST_RADIUS: f32 = PACMAN_RADIUS * 1.25;
pub const GHOST_DIRECTION_ERROR_CHANCE: f32 = 0.1;

pub const DOT_SCORE: i32 = 100;
pub const POWER_DOT_SCORE: i32 = 300;
pub const GHOST_SCORE: i32 = 600;

pub const SCATTER_SECS: f64 = 10.0;

// Frame deltas are clamped so a backgrounded tab cannot produce one huge
// catch-up step that moves entities through walls.
pub const MAX_FRAME_DELTA: f64 = 1.0 / 30.0;

// Simulation ticks between liveness polls. A remote clock that advances at
// all within this window counts as alive.
pub const LIVENESS_POLL_TICKS: u64 = 90;
