use serde::{Deserialize, Serialize};

use crate::constants::MIN_CIRCUIT_PIECES;
use crate::grid::GridPos;

/// Cardinal travel heading across the grid. North is toward decreasing `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    pub fn left(self) -> Heading {
        match self {
            Heading::North => Heading::West,
            Heading::West => Heading::South,
            Heading::South => Heading::East,
            Heading::East => Heading::North,
        }
    }

    pub fn right(self) -> Heading {
        match self {
            Heading::North => Heading::East,
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
        }
    }

    pub fn step(self, pos: GridPos) -> GridPos {
        match self {
            Heading::North => GridPos::new(pos.x, pos.y - 1),
            Heading::East => GridPos::new(pos.x + 1, pos.y),
            Heading::South => GridPos::new(pos.x, pos.y + 1),
            Heading::West => GridPos::new(pos.x - 1, pos.y),
        }
    }
}

/// Closed set of buildable track pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackPieceKind {
    Station,
    Straight,
    TurnLeft,
    TurnRight,
    SlopeUp,
    SlopeDown,
    Loop,
}

impl TrackPieceKind {
    pub const ALL: [TrackPieceKind; 7] = [
        TrackPieceKind::Station,
        TrackPieceKind::Straight,
        TrackPieceKind::TurnLeft,
        TrackPieceKind::TurnRight,
        TrackPieceKind::SlopeUp,
        TrackPieceKind::SlopeDown,
        TrackPieceKind::Loop,
    ];
}

/// One placed piece. Orientation is implicit: it is derived from the exit
/// heading of the predecessor when the chain is walked from the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPiece {
    pub kind: TrackPieceKind,
    pub pos: GridPos,
}

/// Where the chain hands off to the next piece: the cell the next piece will
/// occupy, the heading it will be entered with, and the running elevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitState {
    pub pos: GridPos,
    pub heading: Heading,
    pub elevation: i32,
}

fn step_piece(kind: TrackPieceKind, entry: ExitState) -> ExitState {
    let ExitState { pos, heading, elevation } = entry;
    match kind {
        TrackPieceKind::Station | TrackPieceKind::Straight => ExitState {
            pos: heading.step(pos),
            heading,
            elevation,
        },
        TrackPieceKind::TurnLeft => {
            let heading = heading.left();
            ExitState { pos: heading.step(pos), heading, elevation }
        }
        TrackPieceKind::TurnRight => {
            let heading = heading.right();
            ExitState { pos: heading.step(pos), heading, elevation }
        }
        TrackPieceKind::SlopeUp => ExitState {
            pos: heading.step(pos),
            heading,
            elevation: elevation + 1,
        },
        TrackPieceKind::SlopeDown => ExitState {
            pos: heading.step(pos),
            heading,
            elevation: elevation - 1,
        },
        TrackPieceKind::Loop => ExitState {
            pos: heading.step(pos),
            heading,
            elevation,
        },
    }
}

/// An ordered player-built sequence of pieces forming a ride circuit.
///
/// A track is created empty when the player enters build mode on a tile, is
/// mutated only by append/undo, and is finalized once its sequence closes
/// back on its origin. All statistics are derived from the piece sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub ride_id: u32,
    pub origin: GridPos,
    pub pieces: Vec<TrackPiece>,
    pub completed: bool,
}

/// Derived ride statistics. Scores are normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub length: usize,
    pub drops: usize,
    pub inversions: usize,
    pub excitement: f32,
    pub intensity: f32,
    pub nausea: f32,
}

impl Track {
    pub fn new(ride_id: u32, origin: GridPos) -> Self {
        Track {
            ride_id,
            origin,
            pieces: Vec::new(),
            completed: false,
        }
    }

    /// Entry state of the whole chain: build mode always opens facing east
    /// at ground level.
    pub fn entry_state(&self) -> ExitState {
        ExitState {
            pos: self.origin,
            heading: Heading::East,
            elevation: 0,
        }
    }

    /// Hand-off state after the last placed piece. For an empty track this is
    /// the entry state, so the first piece lands on the origin tile.
    pub fn exit_state(&self) -> ExitState {
        let mut state = self.entry_state();
        for piece in &self.pieces {
            state = step_piece(piece.kind, state);
        }
        state
    }

    /// Piece kinds that may legally extend the sequence.
    ///
    /// A kind qualifies when its entry geometry accepts the trailing exit
    /// (slopes-down and loops need elevation to spend, stations open a track
    /// and nothing else), its cell and resulting exit stay in bounds, and it
    /// does not overlap the track except to arrive back at the origin.
    pub fn valid_next_pieces(&self, grid_size: i32) -> Vec<TrackPieceKind> {
        if self.completed {
            return Vec::new();
        }
        if self.pieces.is_empty() {
            return if self.origin.in_bounds(grid_size) {
                vec![TrackPieceKind::Station]
            } else {
                Vec::new()
            };
        }

        let exit = self.exit_state();
        let cell = exit.pos;
        if !cell.in_bounds(grid_size) || self.occupies(cell) {
            return Vec::new();
        }

        TrackPieceKind::ALL
            .into_iter()
            .filter(|&kind| {
                if kind == TrackPieceKind::Station {
                    return false;
                }
                if matches!(kind, TrackPieceKind::SlopeDown | TrackPieceKind::Loop)
                    && exit.elevation < 1
                {
                    return false;
                }
                let after = step_piece(kind, exit);
                if !after.pos.in_bounds(grid_size) {
                    return false;
                }
                // The hand-off cell may only revisit the track at the origin,
                // which is how a circuit closes.
                !(self.occupies(after.pos) && after.pos != self.origin)
            })
            .collect()
    }

    fn occupies(&self, pos: GridPos) -> bool {
        self.pieces.iter().any(|p| p.pos == pos)
    }

    /// Append the next piece if the validator allows it. Returns the cell the
    /// piece was placed on.
    pub fn place_next(&mut self, kind: TrackPieceKind, grid_size: i32) -> Option<GridPos> {
        if !self.valid_next_pieces(grid_size).contains(&kind) {
            return None;
        }
        let cell = self.exit_state().pos;
        self.pieces.push(TrackPiece { kind, pos: cell });
        Some(cell)
    }

    /// True iff the trailing exit has returned to the leading entry (same
    /// cell, same heading, same elevation) and the loop is viably long.
    pub fn is_circuit_complete(&self) -> bool {
        self.pieces.len() >= MIN_CIRCUIT_PIECES && self.exit_state() == self.entry_state()
    }

    /// Remove the most recent piece. A no-op on an empty sequence: undo is a
    /// UI affordance, not an error condition.
    pub fn undo(&mut self) -> Option<TrackPiece> {
        let removed = self.pieces.pop();
        if removed.is_some() {
            self.completed = false;
        }
        removed
    }

    pub fn stats(&self) -> TrackStats {
        let length = self.pieces.len();
        let drops = self.count(TrackPieceKind::SlopeDown);
        let inversions = self.count(TrackPieceKind::Loop);
        let turns =
            self.count(TrackPieceKind::TurnLeft) + self.count(TrackPieceKind::TurnRight);

        let excitement = (2 * drops + 3 * inversions + turns) as f32 / 20.0;
        let intensity = (3 * drops + 5 * inversions) as f32 / 20.0;
        let nausea = (4 * inversions + turns) as f32 / 25.0;

        TrackStats {
            length,
            drops,
            inversions,
            excitement: excitement.min(1.0),
            intensity: intensity.min(1.0),
            nausea: nausea.min(1.0),
        }
    }

    fn count(&self, kind: TrackPieceKind) -> usize {
        self.pieces.iter().filter(|p| p.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_loop() -> Track {
        // A 4x2 ring: station and straight along the top edge, right turns at
        // the corners, straights back along the bottom edge, closing east
        // into the origin.
        use TrackPieceKind::*;
        let mut track = Track::new(1, GridPos::new(1, 1));
        for kind in [Station, Straight, TurnRight, TurnRight, Straight, Straight, TurnRight, TurnRight] {
            assert!(track.place_next(kind, 10).is_some(), "{kind:?} rejected");
        }
        track
    }

    #[test]
    fn empty_track_offers_only_a_station() {
        let track = Track::new(1, GridPos::new(3, 3));
        assert_eq!(track.valid_next_pieces(10), vec![TrackPieceKind::Station]);
    }

    #[test]
    fn straight_exit_excludes_mismatched_entries() {
        let mut track = Track::new(1, GridPos::new(2, 2));
        track.place_next(TrackPieceKind::Station, 10).unwrap();
        track.place_next(TrackPieceKind::Straight, 10).unwrap();

        let next = track.valid_next_pieces(10);
        // At ground level off a flat exit there is no elevation to spend and
        // no second station to open.
        assert!(!next.contains(&TrackPieceKind::SlopeDown));
        assert!(!next.contains(&TrackPieceKind::Loop));
        assert!(!next.contains(&TrackPieceKind::Station));
        assert!(next.contains(&TrackPieceKind::Straight));
        assert!(next.contains(&TrackPieceKind::TurnLeft));
        assert!(next.contains(&TrackPieceKind::SlopeUp));
    }

    #[test]
    fn slope_down_requires_earned_elevation() {
        let mut track = Track::new(1, GridPos::new(0, 0));
        track.place_next(TrackPieceKind::Station, 10).unwrap();
        track.place_next(TrackPieceKind::SlopeUp, 10).unwrap();

        let next = track.valid_next_pieces(10);
        assert!(next.contains(&TrackPieceKind::SlopeDown));
        assert!(next.contains(&TrackPieceKind::Loop));
    }

    #[test]
    fn bounds_exclude_pieces_that_leave_the_grid() {
        let mut track = Track::new(1, GridPos::new(0, 0));
        track.place_next(TrackPieceKind::Station, 3).unwrap();
        track.place_next(TrackPieceKind::Straight, 3).unwrap();
        // Exit cell is (2,0); anything continuing east would exit the grid,
        // and a left turn would step to y = -1.
        let next = track.valid_next_pieces(3);
        assert!(!next.contains(&TrackPieceKind::Straight));
        assert!(!next.contains(&TrackPieceKind::TurnLeft));
        assert!(next.contains(&TrackPieceKind::TurnRight));
    }

    #[test]
    fn minimal_closed_loop_completes() {
        let track = minimal_loop();
        assert_eq!(track.pieces.len(), 8);
        assert!(track.is_circuit_complete());
    }

    #[test]
    fn too_short_sequences_never_complete() {
        let mut track = Track::new(1, GridPos::new(1, 1));
        track.place_next(TrackPieceKind::Station, 10).unwrap();
        assert!(!track.is_circuit_complete());
        track.place_next(TrackPieceKind::Straight, 10).unwrap();
        assert!(!track.is_circuit_complete());
    }

    #[test]
    fn undo_reopens_a_closing_circuit() {
        let mut track = minimal_loop();
        assert!(track.is_circuit_complete());
        track.undo();
        assert!(!track.is_circuit_complete());
        // Undo on an empty sequence stays silent.
        let mut empty = Track::new(2, GridPos::new(0, 0));
        assert!(empty.undo().is_none());
    }

    #[test]
    fn stats_are_recomputed_from_the_sequence() {
        let mut track = Track::new(1, GridPos::new(0, 5));
        track.place_next(TrackPieceKind::Station, 20).unwrap();
        track.place_next(TrackPieceKind::SlopeUp, 20).unwrap();
        track.place_next(TrackPieceKind::Loop, 20).unwrap();
        track.place_next(TrackPieceKind::SlopeDown, 20).unwrap();

        let stats = track.stats();
        assert_eq!(stats.length, 4);
        assert_eq!(stats.drops, 1);
        assert_eq!(stats.inversions, 1);
        assert!(stats.excitement > 0.0 && stats.excitement <= 1.0);

        track.undo();
        assert_eq!(track.stats().drops, 0);
    }
}
