use std::collections::{HashMap, VecDeque};

use crate::grid::{Grid, GridPos};

/// Shortest walking route from `start` to `end`, inclusive of both endpoints.
///
/// Returns `None` when no route exists: callers treat that as "cannot walk
/// there", never as an error. `start` must be a path tile; `end` may instead
/// be a ride or building entrance: the search may step onto `end` even
/// though it is not a path tile, which is how guests reach a door without the
/// door itself being walkable mid-route.
///
/// Breadth-first over 4-neighbors, so the result is minimal in step count.
pub fn find_path(start: GridPos, end: GridPos, grid: &Grid) -> Option<Vec<GridPos>> {
    if !start.in_bounds(grid.size) || !grid.is_path(start) {
        return None;
    }
    if !end.in_bounds(grid.size) || !grid.is_walkable(end) {
        return None;
    }
    if start == end {
        return Some(vec![start]);
    }

    // One keying scheme for both the visited check and the predecessor map.
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut queue: VecDeque<GridPos> = VecDeque::new();
    came_from.insert(start, start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for next in current.neighbors() {
            if !next.in_bounds(grid.size) || came_from.contains_key(&next) {
                continue;
            }
            // Expand onto path tiles, or onto the destination itself.
            if next != end && !grid.is_path(next) {
                continue;
            }
            came_from.insert(next, current);
            if next == end {
                return Some(reconstruct(&came_from, start, end));
            }
            queue.push_back(next);
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<GridPos, GridPos>, start: GridPos, end: GridPos) -> Vec<GridPos> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BuildingKind;

    fn carve(grid: &mut Grid, tiles: &[(i32, i32)]) {
        for &(x, y) in tiles {
            grid.tile_mut(GridPos::new(x, y)).unwrap().path = true;
        }
    }

    #[test]
    fn straight_corridor_is_minimal() {
        let mut grid = Grid::new(5);
        carve(&mut grid, &[(0, 2), (1, 2), (2, 2), (3, 2), (4, 2)]);

        let path = find_path(GridPos::new(0, 2), GridPos::new(4, 2), &grid).unwrap();
        assert_eq!(path.len(), 5);
        for (i, pos) in path.iter().enumerate() {
            assert_eq!(*pos, GridPos::new(i as i32, 2));
        }
    }

    #[test]
    fn bfs_takes_shorter_of_two_routes() {
        let mut grid = Grid::new(5);
        // Direct route along row 0, plus a longer detour through row 2.
        carve(&mut grid, &[(0, 0), (1, 0), (2, 0)]);
        carve(&mut grid, &[(0, 1), (0, 2), (1, 2), (2, 2), (2, 1)]);

        let path = find_path(GridPos::new(0, 0), GridPos::new(2, 0), &grid).unwrap();
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn destination_may_be_a_building_entrance() {
        let mut grid = Grid::new(4);
        carve(&mut grid, &[(0, 0), (1, 0)]);
        grid.tile_mut(GridPos::new(2, 0)).unwrap().building = Some(BuildingKind::FoodStall);

        let path = find_path(GridPos::new(0, 0), GridPos::new(2, 0), &grid).unwrap();
        assert_eq!(path.last(), Some(&GridPos::new(2, 0)));
        // Every step before the final one is a real path tile.
        for pos in &path[..path.len() - 1] {
            assert!(grid.is_path(*pos));
        }
    }

    #[test]
    fn building_is_not_a_throughway() {
        let mut grid = Grid::new(4);
        // Path, building gap, path. The building must not bridge the gap.
        carve(&mut grid, &[(0, 0), (3, 0)]);
        grid.tile_mut(GridPos::new(1, 0)).unwrap().building = Some(BuildingKind::Restroom);
        assert!(find_path(GridPos::new(0, 0), GridPos::new(3, 0), &grid).is_none());
    }

    #[test]
    fn unreachable_and_invalid_endpoints() {
        let mut grid = Grid::new(4);
        carve(&mut grid, &[(0, 0), (3, 3)]);

        assert!(find_path(GridPos::new(0, 0), GridPos::new(3, 3), &grid).is_none());
        // Start not a path tile.
        assert!(find_path(GridPos::new(1, 1), GridPos::new(0, 0), &grid).is_none());
        // Out of bounds on either end.
        assert!(find_path(GridPos::new(-1, 0), GridPos::new(0, 0), &grid).is_none());
        assert!(find_path(GridPos::new(0, 0), GridPos::new(4, 0), &grid).is_none());
        // End neither path nor entrance.
        assert!(find_path(GridPos::new(0, 0), GridPos::new(2, 2), &grid).is_none());
    }

    #[test]
    fn trivial_start_equals_end() {
        let mut grid = Grid::new(2);
        carve(&mut grid, &[(0, 0)]);
        let path = find_path(GridPos::new(0, 0), GridPos::new(0, 0), &grid).unwrap();
        assert_eq!(path, vec![GridPos::new(0, 0)]);
    }
}
