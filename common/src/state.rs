use serde::{Deserialize, Serialize};

use crate::action::{Action, PlaceItem};
use crate::constants::{
    BUILDING_GUEST_CAPACITY, DAYS_PER_YEAR, HOURS_PER_DAY, MAX_SPEED, RIDE_GUEST_CAPACITY,
};
use crate::grid::{BuildingKind, Grid, GridPos};
use crate::track::{Track, TrackPiece};

/// Per-session park settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkSettings {
    pub park_name: String,
    pub entry_fee: i64,
    pub guests_enabled: bool,
}

impl Default for ParkSettings {
    fn default() -> Self {
        ParkSettings {
            park_name: "Unnamed Park".to_string(),
            entry_fee: 10,
            guests_enabled: true,
        }
    }
}

/// Partial settings patch carried by the `setParkSettings` action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub park_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_fee: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests_enabled: Option<bool>,
}

impl ParkSettings {
    pub fn apply_patch(&mut self, patch: &ParkSettingsPatch) {
        if let Some(name) = &patch.park_name {
            self.park_name = name.clone();
        }
        if let Some(fee) = patch.entry_fee {
            self.entry_fee = fee;
        }
        if let Some(enabled) = patch.guests_enabled {
            self.guests_enabled = enabled;
        }
    }
}

/// Named numeric counters. `guests <= guest_capacity` is a soft target:
/// capacity can be exceeded transiently, never enforced as a hard bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub cash: i64,
    pub guests: u32,
    pub guest_capacity: u32,
    pub stock: i64,
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            cash: 10_000,
            guests: 0,
            guest_capacity: 0,
            stock: 500,
        }
    }
}

/// Simulated calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkClock {
    pub year: u32,
    pub day: u16,
    pub hour: u8,
}

impl Default for ParkClock {
    fn default() -> Self {
        ParkClock { year: 1, day: 0, hour: 8 }
    }
}

impl ParkClock {
    /// Advance one simulated hour. Returns true on day rollover.
    fn tick_hour(&mut self) -> bool {
        self.hour += 1;
        if self.hour < HOURS_PER_DAY {
            return false;
        }
        self.hour = 0;
        self.day += 1;
        if self.day >= DAYS_PER_YEAR {
            self.day = 0;
            self.year += 1;
        }
        true
    }
}

/// The complete co-edited world: the unit that is actioned and snapshotted.
///
/// Plain serializable data throughout, with no reference cycles, so any
/// rendering strategy can consume it and the persistence codec can round-trip
/// it losslessly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub grid: Grid,
    pub tracks: Vec<Track>,
    pub next_ride_id: u32,
    pub resources: Resources,
    pub clock: ParkClock,
    pub speed: u8,
    pub settings: ParkSettings,
}

impl GameState {
    pub fn new(grid_size: i32) -> Self {
        GameState {
            grid: Grid::new(grid_size),
            tracks: Vec::new(),
            next_ride_id: 1,
            resources: Resources::default(),
            clock: ParkClock::default(),
            speed: 1,
            settings: ParkSettings::default(),
        }
    }

    pub fn track(&self, ride_id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.ride_id == ride_id)
    }

    /// Apply one action. Application is total: invalid requests degrade to
    /// no-ops (logged), matching the last-write-wins protocol where a peer
    /// may legitimately send an action the local state already invalidated.
    pub fn apply(&mut self, action: &Action) {
        match action {
            Action::Place { pos, item } => {
                if !self.place(*pos, item) {
                    log::debug!("place rejected at ({}, {})", pos.x, pos.y);
                }
            }
            Action::PlaceBatch { tiles } => {
                // Best-effort: invalid entries are skipped, valid ones apply.
                for placement in tiles {
                    if !self.place(placement.pos, &placement.item) {
                        log::debug!(
                            "batch place skipped at ({}, {})",
                            placement.pos.x,
                            placement.pos.y
                        );
                    }
                }
            }
            Action::Bulldoze { pos } => self.bulldoze(*pos),
            Action::SetSpeed { speed } => {
                self.speed = (*speed).min(MAX_SPEED);
            }
            Action::SetParkSettings { patch } => self.settings.apply_patch(patch),
            Action::PlaceTrackLine { pieces } => {
                if !self.place_track_line(pieces) {
                    log::debug!("track line rejected ({} pieces)", pieces.len());
                }
            }
            Action::FullState { state } => {
                *self = (**state).clone();
            }
        }
    }

    fn place(&mut self, pos: GridPos, item: &PlaceItem) -> bool {
        let Some(tile) = self.grid.tile_mut(pos) else {
            return false;
        };
        if tile.ride_id.is_some() {
            return false;
        }
        match item {
            PlaceItem::Path => {
                if tile.building.is_some() {
                    return false;
                }
                tile.path = true;
                true
            }
            PlaceItem::Building(kind) => {
                if !tile.is_empty() {
                    return false;
                }
                tile.building = Some(*kind);
                self.resources.guest_capacity += BUILDING_GUEST_CAPACITY;
                true
            }
        }
    }

    fn bulldoze(&mut self, pos: GridPos) {
        let ride = match self.grid.tile(pos) {
            Some(tile) => tile.ride_id,
            None => return,
        };
        if let Some(ride_id) = ride {
            // Demolishing any tile of a ride removes the whole track.
            self.demolish_track(ride_id);
            return;
        }
        let mut removed_building = false;
        if let Some(tile) = self.grid.tile_mut(pos) {
            tile.path = false;
            removed_building = tile.building.take().is_some();
        }
        if removed_building {
            self.resources.guest_capacity =
                self.resources.guest_capacity.saturating_sub(BUILDING_GUEST_CAPACITY);
        }
    }

    fn demolish_track(&mut self, ride_id: u32) {
        let Some(index) = self.tracks.iter().position(|t| t.ride_id == ride_id) else {
            return;
        };
        let track = self.tracks.remove(index);
        self.grid.release_ride(ride_id);
        if track.completed {
            self.resources.guest_capacity =
                self.resources.guest_capacity.saturating_sub(RIDE_GUEST_CAPACITY);
        }
    }

    /// Rebuild and commit a whole track line. The validator is consulted for
    /// every transition; a single invalid transition, occupied tile, or
    /// position mismatch rejects the entire line and leaves state untouched.
    fn place_track_line(&mut self, pieces: &[TrackPiece]) -> bool {
        let Some(first) = pieces.first() else {
            return false;
        };
        let mut track = Track::new(self.next_ride_id, first.pos);
        for piece in pieces {
            if self.grid.tile(piece.pos).is_none_or(|t| !t.is_empty()) {
                return false;
            }
            match track.place_next(piece.kind, self.grid.size) {
                Some(cell) if cell == piece.pos => {}
                _ => return false,
            }
        }
        track.completed = track.is_circuit_complete();

        let ride_id = track.ride_id;
        for piece in &track.pieces {
            if let Some(tile) = self.grid.tile_mut(piece.pos) {
                tile.ride_id = Some(ride_id);
            }
        }
        if track.completed {
            self.resources.guest_capacity += RIDE_GUEST_CAPACITY;
        }
        self.tracks.push(track);
        self.next_ride_id += 1;
        true
    }

    /// Advance the simulated clock by whole hours, running the per-hour
    /// economy. Speed is applied by the caller (the tick driver); this method
    /// is unconditional.
    pub fn advance_hours(&mut self, hours: u32) {
        for _ in 0..hours {
            let day_rolled = self.clock.tick_hour();
            self.run_economy_hour();
            if day_rolled {
                // Overnight departures.
                self.resources.guests -= self.resources.guests / 10;
            }
        }
    }

    fn run_economy_hour(&mut self) {
        if !self.settings.guests_enabled {
            return;
        }
        if self.resources.guests < self.resources.guest_capacity {
            let headroom = self.resources.guest_capacity - self.resources.guests;
            let arrivals = headroom.min(2);
            self.resources.guests += arrivals;
            self.resources.cash += arrivals as i64 * self.settings.entry_fee;
        }
        if self.has_stall() {
            let sold = (self.resources.guests as i64 / 4).min(self.resources.stock);
            self.resources.stock -= sold;
            self.resources.cash += sold;
        }
    }

    fn has_stall(&self) -> bool {
        self.grid.iter().any(|(_, tile)| {
            matches!(
                tile.building,
                Some(BuildingKind::FoodStall) | Some(BuildingKind::DrinkStall)
            )
        })
    }
}
