mod action;
mod constants;
mod grid;
mod pathfind;
mod state;
mod track;

pub use action::*;
pub use constants::*;
pub use grid::*;
pub use pathfind::*;
pub use state::*;
pub use track::*;
