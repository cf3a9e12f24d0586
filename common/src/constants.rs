/// Default side length of a park grid in tiles
pub const DEFAULT_GRID_SIZE: i32 = 50;

/// Wall-clock milliseconds per simulated hour at speed 1
pub const BASE_TICK_INTERVAL_MS: i64 = 1000;

/// Highest speed multiplier a client may request (0 pauses simulated time)
pub const MAX_SPEED: u8 = 3;

/// Hard cap on a compressed snapshot, in encoded UTF-8 bytes
pub const MAX_COMPRESSED_BYTES: usize = 20 * 1024 * 1024;

/// Smallest piece count that can form a closed circuit
pub const MIN_CIRCUIT_PIECES: usize = 4;

/// Length of a generated room code
pub const ROOM_CODE_LEN: usize = 6;

/// Interval between host checkpoint writes in milliseconds
pub const CHECKPOINT_INTERVAL_MS: i64 = 30_000;

/// Simulated hours per day
pub const HOURS_PER_DAY: u8 = 24;

/// Simulated days per year
pub const DAYS_PER_YEAR: u16 = 365;

/// Guest capacity contributed by one completed ride
pub const RIDE_GUEST_CAPACITY: u32 = 20;

/// Guest capacity contributed by one placed building
pub const BUILDING_GUEST_CAPACITY: u32 = 4;
