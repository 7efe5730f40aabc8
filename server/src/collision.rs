//! Stepped-sweep collision of a player box against the tile grid.
//!
//! Motion along each axis is split into unit-magnitude substeps; after every
//! substep the leading edge is tested against the tile row/column it newly
//! overlaps, and on first contact the player is snapped exactly to the tile
//! boundary. Out-of-grid coordinates read as Solid, so the map border doubles
//! as a wall.

use crate::entity::Player;
use log::debug;
use shared::{
    TileMap, TileType, GROUND_SNAP_TOLERANCE, LANDING_FRICTION_ICE, LANDING_FRICTION_SOLID,
    LANDING_STOP_EPSILON, PLAYER_HEIGHT, PLAYER_WIDTH, STUN_DURATION, STUN_FALL_THRESHOLD,
    TILE_SIZE, WALL_BOUNCE_FACTOR, WALL_BOUNCE_THRESHOLD,
};

/// Sweeps the player horizontally. A wall hit above the bounce threshold
/// rebounds at the damped factor, otherwise the player just stops.
pub fn resolve_horizontal(player: &mut Player, map: &TileMap) {
    if player.velocity_x.abs() < 0.01 {
        return;
    }

    // The box is shrunk 2 px vertically so the row the player stands on does
    // not register as a wall.
    let top_ty = ((player.y + 2.0) / TILE_SIZE).floor() as i32;
    let bottom_ty = ((player.y + PLAYER_HEIGHT - 2.0) / TILE_SIZE).floor() as i32;

    let steps = player.velocity_x.abs().ceil() as i32;
    let step = player.velocity_x / steps as f32;
    let moving_right = player.velocity_x > 0.0;

    for _ in 0..steps {
        player.x += step;

        let tx = if moving_right {
            ((player.x + PLAYER_WIDTH) / TILE_SIZE).floor() as i32
        } else {
            (player.x / TILE_SIZE).floor() as i32
        };

        for ty in top_ty..=bottom_ty {
            if map.get(tx, ty) == TileType::Empty {
                continue;
            }

            if moving_right {
                player.x = tx as f32 * TILE_SIZE - PLAYER_WIDTH;
            } else {
                player.x = (tx + 1) as f32 * TILE_SIZE;
            }

            let impact = player.velocity_x.abs();
            if impact > WALL_BOUNCE_THRESHOLD {
                let away = if moving_right { -1.0 } else { 1.0 };
                player.velocity_x = away * impact * WALL_BOUNCE_FACTOR;
            } else {
                player.velocity_x = 0.0;
            }
            return;
        }
    }
}

/// Sweeps the player vertically: a resting support re-check first, then the
/// downward fall sweep with landing handling, or the upward ceiling sweep.
pub fn resolve_vertical(player: &mut Player, map: &TileMap) {
    let left_tx = ((player.x + 1.0) / TILE_SIZE).floor() as i32;
    let right_tx = ((player.x + PLAYER_WIDTH - 1.0) / TILE_SIZE).floor() as i32;
    let was_on_ground = player.on_ground;

    if player.velocity_y >= 0.0 {
        // A grounded player keeps resting on its tile within a small snap
        // window instead of re-triggering a landing every tick. The grace
        // counter suppresses this right after a jump or slope slide.
        if player.on_ground && player.ground_check_grace == 0 {
            recheck_support(player, map, left_tx, right_tx);
        }

        if !player.on_ground && player.velocity_y > 0.0 {
            sweep_down(player, map, left_tx, right_tx, was_on_ground);
        }
    } else {
        player.on_ground = false;
        sweep_up(player, map, left_tx, right_tx);
    }
}

fn recheck_support(player: &mut Player, map: &TileMap, left_tx: i32, right_tx: i32) {
    let bottom = player.y + PLAYER_HEIGHT;
    let row = (bottom / TILE_SIZE).floor() as i32;

    for ty in [row, row + 1] {
        for tx in left_tx..=right_tx {
            if map.get(tx, ty) == TileType::Empty {
                continue;
            }
            let tile_top = ty as f32 * TILE_SIZE;
            if (bottom - tile_top).abs() < GROUND_SNAP_TOLERANCE {
                player.y = tile_top - PLAYER_HEIGHT;
                player.velocity_y = 0.0;
                return;
            }
        }
    }

    player.on_ground = false;
}

fn sweep_down(player: &mut Player, map: &TileMap, left_tx: i32, right_tx: i32, was_on_ground: bool) {
    let steps = player.velocity_y.abs().ceil() as i32;
    let step = player.velocity_y / steps as f32;

    for _ in 0..steps {
        player.y += step;

        let bottom = player.y + PLAYER_HEIGHT;
        let row = (bottom / TILE_SIZE).floor() as i32;
        let center_x = player.x + PLAYER_WIDTH / 2.0;

        for tx in left_tx..=right_tx {
            let tile = map.get(tx, row);
            if tile == TileType::Empty {
                continue;
            }
            if !slope_landable(tile, center_x, tx) {
                // Approaching the slope from its blocked side: fall past it.
                continue;
            }

            player.y = row as f32 * TILE_SIZE - PLAYER_HEIGHT;
            player.velocity_y = 0.0;
            player.on_ground = true;
            player.ground_check_grace = 0;

            if !was_on_ground {
                land(player, tile);
            }
            return;
        }
    }
}

fn sweep_up(player: &mut Player, map: &TileMap, left_tx: i32, right_tx: i32) {
    let steps = player.velocity_y.abs().ceil() as i32;
    let step = player.velocity_y / steps as f32;

    for _ in 0..steps {
        player.y += step;

        let row = (player.y / TILE_SIZE).floor() as i32;
        for tx in left_tx..=right_tx {
            if map.get(tx, row) == TileType::Empty {
                continue;
            }
            // Ceiling bonk: stop dead, no bounce.
            player.y = (row + 1) as f32 * TILE_SIZE;
            player.velocity_y = 0.0;
            return;
        }
    }
}

/// Applies the landing consequences: fall-stun when the drop from the highest
/// airborne point exceeds the threshold, then surface-dependent decay of the
/// carried horizontal speed.
fn land(player: &mut Player, tile: TileType) {
    let fall_tiles = (player.y - player.highest_point_y) / TILE_SIZE;
    if fall_tiles > STUN_FALL_THRESHOLD {
        player.stunned = true;
        player.stun_remaining = STUN_DURATION;
        debug!(
            "player {} stunned after a {:.1}-tile fall",
            player.username, fall_tiles
        );
    }
    player.highest_point_y = player.y;

    match tile {
        TileType::Ice => player.velocity_x *= LANDING_FRICTION_ICE,
        TileType::Snow => player.velocity_x = 0.0,
        TileType::SlopeLeft | TileType::SlopeRight => {}
        _ => {
            player.velocity_x *= LANDING_FRICTION_SOLID;
            if player.velocity_x.abs() < LANDING_STOP_EPSILON {
                player.velocity_x = 0.0;
            }
        }
    }
}

/// A slope only counts as ground when approached from its walkable side:
/// SlopeLeft from the left or above, SlopeRight from the right or above,
/// judged by the player's center against the tile center.
fn slope_landable(tile: TileType, from_x: f32, tx: i32) -> bool {
    match tile {
        TileType::SlopeLeft => from_x <= (tx as f32 + 1.0) * TILE_SIZE - TILE_SIZE * 0.5,
        TileType::SlopeRight => from_x >= tx as f32 * TILE_SIZE + TILE_SIZE * 0.5,
        _ => true,
    }
}
