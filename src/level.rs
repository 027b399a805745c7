use std::collections::HashMap;

use thiserror::Error;

use crate::types::Vec3;

// Cells sit on even columns; odd columns are readability spacing.
pub const LEVEL: [&str; 31] = [
    "# # # # # # # # # # # # # # # # # # # # # # # # # # # #",
    "# . . . . . . . . . . . . # # . . . . . . . . . . . . #",
    "# . # # # # . # # # # # . # # . # # # # # . # # # # . #",
    "# o # # # # . # # # # # . # # . # # # # # . # # # # o #",
    "# . # # # # . # # # # # . # # . # # # # # . # # # # . #",
    "# . . . . . . . . . . . . . . . . . . . . . . . . . . #",
    "# . # # # # . # # . # # # # # # # # . # # . # # # # . #",
    "# . # # # # . # # . # # # # # # # # . # # . # # # # . #",
    "# . . . . . . # # . . . . # # . . . . # # . . . . . . #",
    "# # # # # # . # # # # #   # #   # # # # # . # # # # # #",
    "          # . # # # # #   # #   # # # # # . #          ",
    "          # . # #                     # # . #          ",
    "          # . # #   # # # X X # # #   # # . #          ",
    "# # # # # # . # #   #     G   G   #   # # . # # # # # #",
    "            .       #   G   G     #       .            ",
    "# # # # # # . # #   #             #   # # . # # # # # #",
    "          # . # #   # # # # # # # #   # # . #          ",
    "          # . # #                     # # . #          ",
    "          # . # #   # # # # # # # #   # # . #          ",
    "# # # # # # . # #   # # # # # # # #   # # . # # # # # #",
    "# . . . . . . . . . . . . # # . . . . . . . . . . . . #",
    "# . # # # # . # # # # # . # # . # # # # # . # # # # . #",
    "# . # # # # . # # # # # . # # . # # # # # . # # # # . #",
    "# o . . # # . . . . . . . P   . . . . . . . # # . . o #",
    "# # # . # # . # # . # # # # # # # # . # # . # # . # # #",
    "# # # . # # . # # . # # # # # # # # . # # . # # . # # #",
    "# . . . . . . # # . . . . # # . . . . # # . . . . . . #",
    "# . # # # # # # # # # # . # # . # # # # # # # # # # . #",
    "# . # # # # # # # # # # . # # . # # # # # # # # # # . #",
    "# . . . . . . . . . . . . . . . . . . . . . . . . . . #",
    "# # # # # # # # # # # # # # # # # # # # # # # # # # # #",
];

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level has no pacman spawn cell")]
    MissingPacmanSpawn,
    #[error("unknown level cell {cell:?} at row {row}, column {column}")]
    UnknownCell { cell: char, row: usize, column: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellKind {
    Wall,
    // Pen gate: solid for pacmans, passable for ghosts.
    Gate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DotSpawn {
    pub position: Vec3,
    pub is_power_dot: bool,
}

#[derive(Clone, Debug)]
pub struct LevelLayout {
    cells: HashMap<(i32, i32), CellKind>,
    pub dot_spawns: Vec<DotSpawn>,
    pub ghost_spawns: Vec<Vec3>,
    pub pacman_spawn: Vec3,
    home_exit: Vec3,
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

impl LevelLayout {
    pub fn parse(rows: &[&str]) -> Result<Self, LevelError> {
        let mut cells = HashMap::new();
        let mut dot_spawns = Vec::new();
        let mut ghost_spawns = Vec::new();
        let mut pacman_spawn = None;
        let mut gate_cells: Vec<(i32, i32)> = Vec::new();
        let mut right = 0i32;

        for (row, line) in rows.iter().enumerate() {
            let y = -(row as i32);
            for (column, cell) in line.chars().enumerate() {
                if column % 2 == 1 {
                    continue;
                }
                let x = (column / 2) as i32;
                right = right.max(x);
                let position = Vec3::new(x as f32, y as f32, 0.0);
                match cell {
                    '#' => {
                        cells.insert((x, y), CellKind::Wall);
                    }
                    'X' => {
                        cells.insert((x, y), CellKind::Gate);
                        gate_cells.push((x, y));
                    }
                    '.' => dot_spawns.push(DotSpawn {
                        position,
                        is_power_dot: false,
                    }),
                    'o' => dot_spawns.push(DotSpawn {
                        position,
                        is_power_dot: true,
                    }),
                    'P' => pacman_spawn = Some(position),
                    'G' => ghost_spawns.push(position),
                    ' ' => {}
                    other => {
                        return Err(LevelError::UnknownCell {
                            cell: other,
                            row,
                            column,
                        })
                    }
                }
            }
        }

        let pacman_spawn = pacman_spawn.ok_or(LevelError::MissingPacmanSpawn)?;
        let home_exit = if gate_cells.is_empty() {
            pacman_spawn
        } else {
            let n = gate_cells.len() as f32;
            let sum_x: f32 = gate_cells.iter().map(|(x, _)| *x as f32).sum();
            let gate_y = gate_cells[0].1 as f32;
            // One cell above the gate, just outside the pen.
            Vec3::new(sum_x / n, gate_y + 1.0, 0.0)
        };

        Ok(Self {
            cells,
            dot_spawns,
            ghost_spawns,
            pacman_spawn,
            home_exit,
            left: 0.0,
            right: right as f32,
            top: 0.0,
            bottom: -((rows.len() as i32 - 1) as f32),
        })
    }

    pub fn default_level() -> Self {
        // The built-in grid is known-good; parsing it cannot fail.
        Self::parse(&LEVEL).unwrap_or_else(|err| panic!("built-in level invalid: {err}"))
    }

    pub fn is_wall_cell(&self, x: i32, y: i32, is_ghost: bool) -> bool {
        match self.cells.get(&(x, y)) {
            Some(CellKind::Wall) => true,
            Some(CellKind::Gate) => !is_ghost,
            None => false,
        }
    }

    pub fn is_wall(&self, position: Vec3, is_ghost: bool) -> bool {
        let (x, y) = position.round_xy();
        self.is_wall_cell(x, y, is_ghost)
    }

    /// Point just outside the ghost pen that exiting ghosts steer for.
    pub fn home_exit(&self) -> Vec3 {
        self.home_exit
    }

    pub fn outside_pen(&self, position: Vec3) -> bool {
        position.y > self.home_exit.y - 0.6
    }

    // The map is toroidal at its open edges, like the original tunnels.
    pub fn wrap(&self, mut position: Vec3) -> Vec3 {
        if position.x < self.left {
            position.x = self.right;
        } else if position.x > self.right {
            position.x = self.left;
        }
        if position.y > self.top {
            position.y = self.bottom;
        } else if position.y < self.bottom {
            position.y = self.top;
        }
        position
    }

    /// Spawn cell for the nth joining player: free cells along the spawn row
    /// are used round-robin so simultaneous joiners do not stack exactly.
    pub fn player_spawn(&self, join_index: usize) -> Vec3 {
        let (sx, sy) = self.pacman_spawn.round_xy();
        let mut candidates = vec![self.pacman_spawn];
        for dx in 1..=3 {
            for x in [sx + dx, sx - dx] {
                if !self.is_wall_cell(x, sy, false) {
                    candidates.push(Vec3::new(x as f32, sy as f32, 0.0));
                }
            }
        }
        candidates[join_index % candidates.len()]
    }
}
