use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const LEFT: Vec3 = Vec3::new(-1.0, 0.0, 0.0);
    pub const RIGHT: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const TOP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const BOTTOM: Vec3 = Vec3::new(0.0, -1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f32) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        self.sub(other).length()
    }

    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            return Vec3::ZERO;
        }
        self.scale(1.0 / len)
    }

    // Rotation around the Z axis; the maze lives in the XY plane.
    pub fn rotated_z(self, angle: f32) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        Vec3::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
            self.z,
        )
    }

    pub fn round_xy(self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

// Key state sampled by the input layer once per frame. The sync core never
// reads the keyboard itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub turn_left: bool,
    pub turn_right: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostColor {
    Red,
    Pink,
    Cyan,
    Orange,
}

impl GhostColor {
    pub fn by_index(index: usize) -> Self {
        match index % 4 {
            0 => Self::Red,
            1 => Self::Pink,
            2 => Self::Cyan,
            _ => Self::Orange,
        }
    }
}

// Replicated snapshot records. These are the only shapes that ever cross the
// replicated document; transient fields (respawn timers, animation state)
// stay local.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacmanRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub peer_id: Option<String>,
    pub position: Vec3,
    pub direction: Vec3,
    pub distance_moved: f32,
    pub is_playing: bool,
    pub is_online: bool,
    pub is_alive: bool,
    pub n_lives: i32,
    pub clock: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GhostRecord {
    pub id: String,
    pub color: GhostColor,
    pub position: Vec3,
    pub direction: Vec3,
    pub initial_position: Vec3,
    #[serde(default)]
    pub pacman_target: Option<String>,
    pub is_eaten: bool,
    pub exit_home: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DotRecord {
    pub id: String,
    pub position: Vec3,
    pub is_power_dot: bool,
    #[serde(default)]
    pub pacman_id: Option<String>,
}

// Append-only log entry: one ghost caught by one player. A log is used
// instead of a per-player counter so concurrent merges cannot lose or
// double-count events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GhostEatRecord {
    pub ghost_id: String,
    pub pacman_id: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScatterRecord {
    pub epoch: u64,
}
