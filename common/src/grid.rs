use serde::{Deserialize, Serialize};

/// A tile coordinate. Valid positions lie in `[0, grid_size)` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        GridPos { x, y }
    }

    pub fn in_bounds(&self, grid_size: i32) -> bool {
        self.x >= 0 && self.x < grid_size && self.y >= 0 && self.y < grid_size
    }

    /// The four orthogonal neighbors, unfiltered for bounds.
    pub fn neighbors(&self) -> [GridPos; 4] {
        [
            GridPos::new(self.x, self.y - 1),
            GridPos::new(self.x + 1, self.y),
            GridPos::new(self.x, self.y + 1),
            GridPos::new(self.x - 1, self.y),
        ]
    }
}

/// Placeable building kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildingKind {
    FoodStall,
    DrinkStall,
    Restroom,
    InfoKiosk,
}

/// One grid cell's occupancy. A tile belongs to at most one ride at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    #[serde(default)]
    pub path: bool,
    #[serde(default)]
    pub ride_id: Option<u32>,
    #[serde(default)]
    pub building: Option<BuildingKind>,
}

impl Tile {
    pub fn is_empty(&self) -> bool {
        !self.path && self.ride_id.is_none() && self.building.is_none()
    }

    /// Walkable for guests: a path segment, or a ride/building entrance.
    pub fn is_walkable(&self) -> bool {
        self.path || self.ride_id.is_some() || self.building.is_some()
    }
}

/// The park surface: a square grid of tiles stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub size: i32,
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn new(size: i32) -> Self {
        let size = size.max(1);
        Grid {
            size,
            tiles: vec![Tile::default(); (size * size) as usize],
        }
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if pos.in_bounds(self.size) {
            Some((pos.y * self.size + pos.x) as usize)
        } else {
            None
        }
    }

    pub fn tile(&self, pos: GridPos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, pos: GridPos) -> Option<&mut Tile> {
        self.index(pos).map(move |i| &mut self.tiles[i])
    }

    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.tile(pos).is_some_and(Tile::is_walkable)
    }

    pub fn is_path(&self, pos: GridPos) -> bool {
        self.tile(pos).is_some_and(|t| t.path)
    }

    /// Clear every tile claimed by the given ride.
    pub fn release_ride(&mut self, ride_id: u32) {
        for tile in &mut self.tiles {
            if tile.ride_id == Some(ride_id) {
                tile.ride_id = None;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridPos, &Tile)> {
        let size = self.size;
        self.tiles.iter().enumerate().map(move |(i, tile)| {
            let i = i as i32;
            (GridPos::new(i % size, i / size), tile)
        })
    }
}
