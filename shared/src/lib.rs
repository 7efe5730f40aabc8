use serde::{Deserialize, Serialize};

pub const CLIENT_VERSION: u32 = 1;

pub const TILE_SIZE: f32 = 32.0;
pub const PLAYER_WIDTH: f32 = 32.0;
pub const PLAYER_HEIGHT: f32 = 48.0;

// Horizontal and vertical speeds are in pixels per tick; the stun timer and
// jump cooldown are in seconds and consume dt.
pub const PLAYER_WALK_SPEED: f32 = 5.0;
pub const GRAVITY: f32 = 1.0;
pub const MAX_FALL_SPEED: f32 = 80.0;

pub const JUMP_CHARGE_RATE: f32 = 1.0;
pub const JUMP_MIN_POWER: f32 = 7.0;
pub const JUMP_MAX_POWER: f32 = 25.0;
pub const JUMP_COOLDOWN: f32 = 0.3;
pub const JUMP_MIN_ANGLE_DEG: f32 = 45.0;
pub const JUMP_MAX_ANGLE_DEG: f32 = 72.0;

pub const ICE_ACCELERATION: f32 = 0.3;
pub const ICE_FRICTION: f32 = 0.98;
pub const MAX_ICE_SPEED: f32 = 6.0;
pub const ICE_STOP_EPSILON: f32 = 0.1;
pub const SLOPE_SLIDE_SPEED: f32 = 12.0;

pub const WALL_BOUNCE_THRESHOLD: f32 = 5.0;
pub const WALL_BOUNCE_FACTOR: f32 = 0.5;

/// Fall distance in tiles above which a landing stuns the player.
pub const STUN_FALL_THRESHOLD: f32 = 8.0;
pub const STUN_DURATION: f32 = 2.0;

pub const LANDING_FRICTION_SOLID: f32 = 0.4;
pub const LANDING_FRICTION_ICE: f32 = 0.9;
pub const LANDING_STOP_EPSILON: f32 = 0.3;

pub const GROUND_SNAP_TOLERANCE: f32 = 4.0;
pub const SLOPE_GRACE_TICKS: u8 = 5;
pub const JUMP_GRACE_TICKS: u8 = 3;

pub const VISIBILITY_RANGE_X: f32 = 640.0;
pub const VISIBILITY_RANGE_Y: f32 = 800.0;
pub const VISIBILITY_REFRESH_TICKS: u32 = 2;

pub const LEADERBOARD_SIZE: usize = 10;
pub const DEFAULT_TICK_RATE: u32 = 30;
pub const DEFAULT_MAX_PLAYERS: usize = 10;

/// Client-side delay applied to the displayed world time so that snapshot
/// jitter can be absorbed by interpolation.
pub const RENDER_DELAY_MS: u64 = 100;

/// One cell of the level grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TileType {
    #[default]
    Empty,
    Solid,
    Ice,
    Snow,
    SlopeLeft,
    SlopeRight,
    Finish,
}

impl TileType {
    /// Special surfaces take priority over plain Solid when classifying the
    /// ground under a player's feet.
    pub fn is_special(self) -> bool {
        matches!(
            self,
            TileType::Ice
                | TileType::Snow
                | TileType::SlopeLeft
                | TileType::SlopeRight
                | TileType::Finish
        )
    }
}

/// Static level grid, row-major. Coordinates outside the grid read as Solid,
/// so the world is bounded without explicit border checks at every call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMap {
    width: usize,
    height: usize,
    tiles: Vec<TileType>,
}

impl TileMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![TileType::Empty; width * height],
        }
    }

    pub fn from_rows(rows: Vec<Vec<TileType>>) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let mut tiles = Vec::with_capacity(width * height);
        for row in &rows {
            tiles.extend_from_slice(row);
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * TILE_SIZE
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * TILE_SIZE
    }

    pub fn get(&self, x: i32, y: i32) -> TileType {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return TileType::Solid;
        }
        self.tiles[y as usize * self.width + x as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, tile: TileType) {
        if x < self.width && y < self.height {
            self.tiles[y * self.width + x] = tile;
        }
    }

    /// Fills `[x0, x1]` of one row, clipped to the grid.
    pub fn fill_row(&mut self, y: usize, x0: usize, x1: usize, tile: TileType) {
        for x in x0..=x1.min(self.width.saturating_sub(1)) {
            self.set(x, y, tile);
        }
    }
}

/// Latest raw input for one player. Fields missing from a decoded message
/// default to released, never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub space: bool,
}

/// One player as seen in a snapshot. Positions and charge are rounded to
/// integers; the difference is invisible and cuts the payload size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub username: String,
    pub charging: bool,
    pub jump_charge: i32,
    pub jump_direction: i8,
    pub jump_count: u32,
    pub finish_time: Option<u64>,
    pub recorded_jumps: u32,
    pub on_ground: bool,
    pub walking: bool,
    pub stunned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub jumps: u32,
}

/// Per-viewer world state for one tick. The tile map rides only in the first
/// snapshot sent to a viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server wall-clock time in milliseconds.
    pub t: u64,
    pub me: EntityView,
    pub others: Vec<EntityView>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub map: Option<TileMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    Connect {
        client_version: u32,
        username: String,
    },
    Input {
        #[serde(default)]
        left: bool,
        #[serde(default)]
        right: bool,
        #[serde(default)]
        space: bool,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    Update(Snapshot),
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view(id: u32) -> EntityView {
        EntityView {
            id,
            x: 160,
            y: 3056,
            username: format!("player{}", id),
            charging: true,
            jump_charge: 12,
            jump_direction: -1,
            jump_count: 7,
            finish_time: None,
            recorded_jumps: 0,
            on_ground: true,
            walking: false,
            stunned: false,
        }
    }

    #[test]
    fn out_of_bounds_reads_are_solid() {
        let map = TileMap::new(4, 4);
        assert_eq!(map.get(-1, 0), TileType::Solid);
        assert_eq!(map.get(0, -1), TileType::Solid);
        assert_eq!(map.get(4, 0), TileType::Solid);
        assert_eq!(map.get(0, 4), TileType::Solid);
        assert_eq!(map.get(2, 2), TileType::Empty);
    }

    #[test]
    fn fill_row_clips_to_grid() {
        let mut map = TileMap::new(4, 4);
        map.fill_row(1, 2, 10, TileType::Solid);
        assert_eq!(map.get(2, 1), TileType::Solid);
        assert_eq!(map.get(3, 1), TileType::Solid);
        assert_eq!(map.get(1, 1), TileType::Empty);
    }

    #[test]
    fn special_tiles() {
        assert!(TileType::Ice.is_special());
        assert!(TileType::Finish.is_special());
        assert!(!TileType::Solid.is_special());
        assert!(!TileType::Empty.is_special());
    }

    #[test]
    fn input_defaults_to_released() {
        let input = Input::default();
        assert!(!input.left && !input.right && !input.space);
    }

    #[test]
    fn packet_roundtrip_connect() {
        let packet = Packet::Connect {
            client_version: CLIENT_VERSION,
            username: "climber".to_string(),
        };
        let bytes = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<Packet>(&bytes).unwrap() {
            Packet::Connect {
                client_version,
                username,
            } => {
                assert_eq!(client_version, CLIENT_VERSION);
                assert_eq!(username, "climber");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn packet_roundtrip_update_with_map() {
        let mut map = TileMap::new(8, 8);
        map.fill_row(7, 0, 7, TileType::Solid);
        map.set(3, 7, TileType::Ice);

        let packet = Packet::Update(Snapshot {
            t: 123_456_789,
            me: sample_view(1),
            others: vec![sample_view(2), sample_view(3)],
            leaderboard: vec![LeaderboardEntry {
                username: "winner".to_string(),
                jumps: 42,
            }],
            map: Some(map),
        });

        let bytes = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<Packet>(&bytes).unwrap() {
            Packet::Update(snapshot) => {
                assert_eq!(snapshot.t, 123_456_789);
                assert_eq!(snapshot.me.id, 1);
                assert_eq!(snapshot.others.len(), 2);
                assert_eq!(snapshot.leaderboard[0].jumps, 42);
                let map = snapshot.map.expect("map present");
                assert_eq!(map.get(3, 7), TileType::Ice);
                assert_eq!(map.get(0, 0), TileType::Empty);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn snapshot_without_map_is_small() {
        let snapshot = Snapshot {
            t: 0,
            me: sample_view(1),
            others: (2..12).map(sample_view).collect(),
            leaderboard: Vec::new(),
            map: None,
        };
        let bytes = bincode::serialize(&Packet::Update(snapshot)).unwrap();
        assert!(bytes.len() < 2048, "snapshot unexpectedly large: {}", bytes.len());
    }
}
