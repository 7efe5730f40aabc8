//! World and overlay rendering on top of macroquad.

use crate::game::{RenderPlayer, RenderState};
use macroquad::prelude::*;
use shared::{
    LeaderboardEntry, TileMap, TileType, JUMP_MAX_POWER, PLAYER_HEIGHT, PLAYER_WIDTH, TILE_SIZE,
};

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&self, state: &RenderState, map: Option<&TileMap>, client_id: Option<u32>) {
        clear_background(Color::from_rgba(18, 22, 34, 255));

        let camera = self.camera_offset(&state.me, map);

        if let Some(map) = map {
            self.draw_map(map, camera);
        }
        for other in &state.others {
            self.draw_player(other, camera, false);
        }
        let is_me = client_id.is_none() || client_id == Some(state.me.id);
        self.draw_player(&state.me, camera, is_me);

        self.draw_leaderboard(&state.leaderboard);
        self.draw_hud(&state.me);
    }

    pub fn render_connecting(&self, reason: Option<&str>) {
        clear_background(Color::from_rgba(18, 22, 34, 255));
        let text = match reason {
            Some(reason) => format!("Disconnected: {}", reason),
            None => "Connecting...".to_string(),
        };
        let size = measure_text(&text, None, 30, 1.0);
        draw_text(
            &text,
            (screen_width() - size.width) / 2.0,
            screen_height() / 2.0,
            30.0,
            WHITE,
        );
    }

    /// Camera follows the local player, clamped to the map edges.
    fn camera_offset(&self, me: &RenderPlayer, map: Option<&TileMap>) -> (f32, f32) {
        let mut cx = me.x + PLAYER_WIDTH / 2.0 - screen_width() / 2.0;
        let mut cy = me.y + PLAYER_HEIGHT / 2.0 - screen_height() / 2.0;

        if let Some(map) = map {
            cx = cx.clamp(0.0, (map.pixel_width() - screen_width()).max(0.0));
            cy = cy.clamp(0.0, (map.pixel_height() - screen_height()).max(0.0));
        }
        (cx, cy)
    }

    fn draw_map(&self, map: &TileMap, (cx, cy): (f32, f32)) {
        let first_tx = (cx / TILE_SIZE).floor().max(0.0) as i32;
        let first_ty = (cy / TILE_SIZE).floor().max(0.0) as i32;
        let last_tx = ((cx + screen_width()) / TILE_SIZE).ceil() as i32;
        let last_ty = ((cy + screen_height()) / TILE_SIZE).ceil() as i32;

        for ty in first_ty..=last_ty {
            for tx in first_tx..=last_tx {
                if tx >= map.width() as i32 || ty >= map.height() as i32 {
                    continue;
                }
                let tile = map.get(tx, ty);
                if tile == TileType::Empty {
                    continue;
                }

                let x = tx as f32 * TILE_SIZE - cx;
                let y = ty as f32 * TILE_SIZE - cy;
                match tile {
                    TileType::SlopeLeft => {
                        draw_triangle(
                            vec2(x, y),
                            vec2(x, y + TILE_SIZE),
                            vec2(x + TILE_SIZE, y + TILE_SIZE),
                            tile_color(tile),
                        );
                    }
                    TileType::SlopeRight => {
                        draw_triangle(
                            vec2(x + TILE_SIZE, y),
                            vec2(x, y + TILE_SIZE),
                            vec2(x + TILE_SIZE, y + TILE_SIZE),
                            tile_color(tile),
                        );
                    }
                    _ => draw_rectangle(x, y, TILE_SIZE, TILE_SIZE, tile_color(tile)),
                }
            }
        }
    }

    fn draw_player(&self, player: &RenderPlayer, (cx, cy): (f32, f32), is_me: bool) {
        let x = player.x - cx;
        let y = player.y - cy;

        let body = if is_me {
            Color::from_rgba(80, 200, 120, 255)
        } else {
            Color::from_rgba(230, 90, 90, 255)
        };
        draw_rectangle(x, y, PLAYER_WIDTH, PLAYER_HEIGHT, body);
        draw_rectangle_lines(x, y, PLAYER_WIDTH, PLAYER_HEIGHT, 2.0, WHITE);

        let name_size = measure_text(&player.username, None, 16, 1.0);
        draw_text(
            &player.username,
            x + PLAYER_WIDTH / 2.0 - name_size.width / 2.0,
            y - 18.0,
            16.0,
            WHITE,
        );

        if player.charging {
            let fill = (player.jump_charge / JUMP_MAX_POWER).clamp(0.0, 1.0);
            draw_rectangle(x, y - 10.0, PLAYER_WIDTH, 5.0, Color::from_rgba(60, 60, 60, 255));
            draw_rectangle(x, y - 10.0, PLAYER_WIDTH * fill, 5.0, YELLOW);
        }

        if player.stunned {
            draw_circle(x + PLAYER_WIDTH / 2.0, y - 8.0, 4.0, ORANGE);
        }
    }

    fn draw_leaderboard(&self, entries: &[LeaderboardEntry]) {
        if entries.is_empty() {
            return;
        }

        let panel_x = screen_width() - 190.0;
        draw_rectangle(
            panel_x,
            10.0,
            180.0,
            22.0 + entries.len() as f32 * 18.0,
            Color::from_rgba(0, 0, 0, 160),
        );
        draw_text("Leaderboard", panel_x + 8.0, 26.0, 18.0, GOLD);

        for (i, entry) in entries.iter().enumerate() {
            let line = format!("{}. {} - {}", i + 1, entry.username, entry.jumps);
            draw_text(
                &line,
                panel_x + 8.0,
                44.0 + i as f32 * 18.0,
                16.0,
                WHITE,
            );
        }
    }

    fn draw_hud(&self, me: &RenderPlayer) {
        let line = match me.finish_time {
            Some(_) => format!("Finished in {} jumps!", me.recorded_jumps),
            None => format!("Jumps: {}", me.jump_count),
        };
        draw_text(&line, 10.0, screen_height() - 14.0, 20.0, WHITE);

        if me.stunned {
            let text = "Stunned!";
            let size = measure_text(text, None, 28, 1.0);
            draw_text(
                text,
                (screen_width() - size.width) / 2.0,
                60.0,
                28.0,
                ORANGE,
            );
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn tile_color(tile: TileType) -> Color {
    match tile {
        TileType::Solid => Color::from_rgba(90, 95, 110, 255),
        TileType::Ice => Color::from_rgba(130, 200, 240, 255),
        TileType::Snow => Color::from_rgba(235, 240, 245, 255),
        TileType::SlopeLeft | TileType::SlopeRight => Color::from_rgba(120, 110, 90, 255),
        TileType::Finish => GOLD,
        TileType::Empty => BLANK,
    }
}
