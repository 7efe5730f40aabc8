//! Per-lobby authoritative simulation state.
//!
//! One `GameState` owns every player in a lobby and is stepped strictly
//! sequentially by the tick loop; nothing here locks or blocks. Disconnects
//! remove a player between ticks, so a tick never sees a half-removed entity.

use crate::entity::Player;
use log::info;
use shared::{
    EntityView, Input, LeaderboardEntry, Snapshot, TileMap, LEADERBOARD_SIZE, VISIBILITY_RANGE_X,
    VISIBILITY_RANGE_Y, VISIBILITY_REFRESH_TICKS,
};
use std::collections::HashMap;

pub struct GameState {
    pub players: HashMap<u32, Player>,
    /// Most recently received input per player; all-false until the first
    /// message arrives.
    inputs: HashMap<u32, Input>,
    /// Pre-serialized "other players" per viewer, refreshed at a lower rate
    /// than the tick. A slightly stale view of others is imperceptible.
    nearby_cache: HashMap<u32, Vec<EntityView>>,
    cache_counter: u32,
    map: TileMap,
    max_players: usize,
}

impl GameState {
    pub fn new(map: TileMap, max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            inputs: HashMap::new(),
            nearby_cache: HashMap::new(),
            cache_counter: 0,
            map,
            max_players,
        }
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Adds a player at the spawn tile. Returns None when the lobby is full.
    pub fn add_player(&mut self, id: u32, username: &str) -> Option<&Player> {
        if self.players.len() >= self.max_players {
            return None;
        }

        let player = Player::spawn(id, username, &self.map);
        info!(
            "player {} ({}) joined at ({:.0}, {:.0})",
            id, username, player.x, player.y
        );
        self.inputs.insert(id, Input::default());
        self.players.insert(id, player);
        self.players.get(&id)
    }

    /// Removes every record of a player. Safe to call twice.
    pub fn remove_player(&mut self, id: u32) {
        if self.players.remove(&id).is_some() {
            info!("player {} left", id);
        }
        self.inputs.remove(&id);
        self.nearby_cache.remove(&id);
    }

    /// Stores the latest input for a player; unknown ids are ignored.
    pub fn set_input(&mut self, id: u32, input: Input) {
        if self.players.contains_key(&id) {
            self.inputs.insert(id, input);
        }
    }

    /// Advances every player by one tick and refreshes the visibility cache
    /// on its slower cadence.
    pub fn tick(&mut self, dt: f32, now_ms: u64) {
        for (id, player) in self.players.iter_mut() {
            let input = self.inputs.get(id).copied().unwrap_or_default();
            player.update(dt, Some(input), &self.map, now_ms);
        }

        self.cache_counter += 1;
        if self.cache_counter >= VISIBILITY_REFRESH_TICKS {
            self.refresh_visibility();
            self.cache_counter = 0;
        }
    }

    /// Recomputes, for every player, the serialized views of all others
    /// within roughly one screen plus margin. O(n²) over the lobby, which is
    /// fine at lobby-sized populations.
    fn refresh_visibility(&mut self) {
        let views: Vec<(u32, f32, f32, EntityView)> = self
            .players
            .values()
            .map(|p| (p.id, p.x, p.y, p.view()))
            .collect();

        self.nearby_cache.clear();
        for (id, x, y, _) in &views {
            let nearby: Vec<EntityView> = views
                .iter()
                .filter(|(other_id, ox, oy, _)| {
                    other_id != id
                        && (oy - y).abs() < VISIBILITY_RANGE_Y
                        && (ox - x).abs() < VISIBILITY_RANGE_X
                })
                .map(|(_, _, _, view)| view.clone())
                .collect();
            self.nearby_cache.insert(*id, nearby);
        }
    }

    /// Assembles the per-viewer snapshot: own fresh view, the cached nearby
    /// list reused verbatim, the leaderboard, and the tile map exactly once.
    pub fn build_snapshot(&mut self, viewer_id: u32, now_ms: u64) -> Option<Snapshot> {
        let leaderboard = self.leaderboard();
        let others = self
            .nearby_cache
            .get(&viewer_id)
            .cloned()
            .unwrap_or_default();

        let player = self.players.get_mut(&viewer_id)?;
        let me = player.view();
        let map = if player.map_sent {
            None
        } else {
            player.map_sent = true;
            Some(self.map.clone())
        };

        Some(Snapshot {
            t: now_ms,
            me,
            others,
            leaderboard,
            map,
        })
    }

    /// Top finished players, ascending by the jump count recorded at the
    /// finish line.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut finished: Vec<&Player> = self
            .players
            .values()
            .filter(|p| p.finish_time.is_some())
            .collect();
        finished.sort_by_key(|p| p.recorded_jumps);
        finished
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .map(|p| LeaderboardEntry {
                username: p.username.clone(),
                jumps: p.recorded_jumps,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{TileType, PLAYER_HEIGHT, PLAYER_WALK_SPEED, TILE_SIZE};

    const DT: f32 = 1.0 / 30.0;

    fn test_map() -> TileMap {
        let mut map = TileMap::new(20, 12);
        map.fill_row(9, 0, 19, TileType::Solid);
        map
    }

    #[test]
    fn capacity_is_enforced() {
        let mut game = GameState::new(test_map(), 2);
        assert!(game.add_player(1, "one").is_some());
        assert!(game.add_player(2, "two").is_some());
        assert!(game.add_player(3, "three").is_none());
        assert_eq!(game.len(), 2);

        // Freed slot becomes available again.
        game.remove_player(1);
        assert!(game.add_player(3, "three").is_some());
    }

    #[test]
    fn players_spawn_at_the_fixed_tile() {
        let mut game = GameState::new(test_map(), 4);
        let player = game.add_player(1, "one").unwrap();
        assert_eq!(player.x, 5.0 * TILE_SIZE);
        assert_eq!(player.y, 9.0 * TILE_SIZE - PLAYER_HEIGHT);
    }

    #[test]
    fn remove_player_is_idempotent() {
        let mut game = GameState::new(test_map(), 4);
        game.add_player(1, "one");
        game.remove_player(1);
        game.remove_player(1);
        assert!(game.is_empty());
        // A tick after removal must not touch the dead entity.
        game.tick(DT, 0);
    }

    #[test]
    fn input_defaults_to_all_false() {
        let mut game = GameState::new(test_map(), 4);
        game.add_player(1, "one");
        let x0 = game.players[&1].x;

        for _ in 0..5 {
            game.tick(DT, 0);
        }
        assert_eq!(game.players[&1].x, x0);
    }

    #[test]
    fn latest_input_wins() {
        let mut game = GameState::new(test_map(), 4);
        game.add_player(1, "one");
        game.tick(DT, 0); // settle onto the floor

        game.set_input(
            1,
            Input {
                left: false,
                right: true,
                space: false,
            },
        );
        game.set_input(
            1,
            Input {
                left: true,
                right: false,
                space: false,
            },
        );
        let x0 = game.players[&1].x;
        game.tick(DT, 0);
        assert_eq!(game.players[&1].x, x0 - PLAYER_WALK_SPEED);
    }

    #[test]
    fn input_for_unknown_player_is_ignored() {
        let mut game = GameState::new(test_map(), 4);
        game.set_input(
            99,
            Input {
                left: true,
                right: false,
                space: false,
            },
        );
        assert!(game.inputs.is_empty());
    }

    #[test]
    fn visibility_is_bounded_and_symmetric() {
        let mut game = GameState::new(test_map(), 4);
        game.add_player(1, "one");
        game.add_player(2, "two");

        // 900 px apart vertically: mutually invisible.
        game.players.get_mut(&1).unwrap().y = 0.0;
        game.players.get_mut(&2).unwrap().y = 900.0;
        game.refresh_visibility();
        assert!(game.nearby_cache[&1].is_empty());
        assert!(game.nearby_cache[&2].is_empty());

        // 700 px apart: mutually visible.
        game.players.get_mut(&2).unwrap().y = 700.0;
        game.refresh_visibility();
        assert_eq!(game.nearby_cache[&1].len(), 1);
        assert_eq!(game.nearby_cache[&1][0].id, 2);
        assert_eq!(game.nearby_cache[&2].len(), 1);
        assert_eq!(game.nearby_cache[&2][0].id, 1);

        // Horizontal bound applies independently.
        game.players.get_mut(&2).unwrap().x = game.players[&1].x + 650.0;
        game.refresh_visibility();
        assert!(game.nearby_cache[&1].is_empty());
    }

    #[test]
    fn visibility_cache_refreshes_every_second_tick() {
        let mut game = GameState::new(test_map(), 4);
        game.add_player(1, "one");
        game.add_player(2, "two");

        game.tick(DT, 0);
        let first = game.nearby_cache.get(&1).cloned();
        game.tick(DT, 0);
        let second = game.nearby_cache.get(&1).cloned();
        // After two ticks the cache must exist.
        assert!(second.is_some());
        // The first tick must not have populated it yet.
        assert!(first.is_none());
    }

    #[test]
    fn snapshot_carries_the_map_exactly_once() {
        let mut game = GameState::new(test_map(), 4);
        game.add_player(1, "one");

        let first = game.build_snapshot(1, 100).unwrap();
        assert!(first.map.is_some());
        assert_eq!(first.t, 100);
        assert_eq!(first.me.id, 1);

        let second = game.build_snapshot(1, 133).unwrap();
        assert!(second.map.is_none());
        assert_eq!(second.t, 133);
    }

    #[test]
    fn snapshot_for_unknown_viewer_is_none() {
        let mut game = GameState::new(test_map(), 4);
        assert!(game.build_snapshot(42, 0).is_none());
    }

    #[test]
    fn leaderboard_sorts_ascending_and_caps_at_ten() {
        let mut game = GameState::new(test_map(), 16);
        for id in 1..=13 {
            game.add_player(id, &format!("p{}", id));
        }
        // Twelve finishers with distinct jump counts, one still climbing.
        for id in 1..=12u32 {
            let player = game.players.get_mut(&id).unwrap();
            player.finish_time = Some(1_000 + id as u64);
            player.recorded_jumps = 100 - id;
        }

        let board = game.leaderboard();
        assert_eq!(board.len(), LEADERBOARD_SIZE);
        assert_eq!(board[0].jumps, 88); // id 12, fewest jumps
        assert!(board.windows(2).all(|w| w[0].jumps <= w[1].jumps));
        assert!(board.iter().all(|e| e.username != "p13"));
    }
}
