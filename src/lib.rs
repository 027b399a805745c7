pub mod constants;
pub mod doc;
pub mod dot;
pub mod engine;
pub mod ghost;
pub mod level;
pub mod pacman;
pub mod rng;
pub mod state;
pub mod types;
