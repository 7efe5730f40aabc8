//! Player entity and its per-tick state machine.

use crate::collision;
use log::debug;
use shared::{
    EntityView, Input, TileMap, TileType, JUMP_CHARGE_RATE, JUMP_COOLDOWN, JUMP_GRACE_TICKS,
    JUMP_MAX_ANGLE_DEG, JUMP_MAX_POWER, JUMP_MIN_ANGLE_DEG, JUMP_MIN_POWER, GRAVITY,
    ICE_ACCELERATION, ICE_FRICTION, ICE_STOP_EPSILON, MAX_FALL_SPEED, MAX_ICE_SPEED,
    PLAYER_HEIGHT, PLAYER_WALK_SPEED, PLAYER_WIDTH, SLOPE_GRACE_TICKS, SLOPE_SLIDE_SPEED,
    TILE_SIZE,
};

/// Authoritative state of one player. Mutated exactly once per tick by
/// `update`, owned exclusively by the lobby's simulation.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub username: String,

    /// Top-left corner of the player's bounding box, in pixels.
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,

    pub on_ground: bool,
    pub charging: bool,
    pub jump_charge: f32,
    /// -1 left, 0 straight up, 1 right.
    pub jump_direction: i8,
    pub jump_count: u32,

    /// Surface under the feet this tick; Empty while airborne.
    pub current_tile: TileType,
    pub finish_time: Option<u64>,
    pub recorded_jumps: u32,

    pub last_input: Option<Input>,
    pub walking: bool,

    /// Ticks to skip the resting-ground re-check after leaving a surface, so
    /// the tile just departed is not re-detected as ground.
    pub ground_check_grace: u8,
    pub jump_cooldown: f32,
    pub can_jump: bool,
    /// Latch requiring a space release between jumps.
    pub space_released: bool,

    /// Highest (smallest) y reached since the last landing, for fall-stun.
    pub highest_point_y: f32,
    pub stunned: bool,
    pub stun_remaining: f32,

    /// The full tile grid goes out in the first snapshot only.
    pub map_sent: bool,
}

impl Player {
    pub fn new(id: u32, username: &str, x: f32, y: f32) -> Self {
        Self {
            id,
            username: username.to_string(),
            x,
            y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            on_ground: false,
            charging: false,
            jump_charge: 0.0,
            jump_direction: 0,
            jump_count: 0,
            current_tile: TileType::Empty,
            finish_time: None,
            recorded_jumps: 0,
            last_input: None,
            walking: false,
            ground_check_grace: 0,
            jump_cooldown: 0.0,
            can_jump: true,
            space_released: true,
            highest_point_y: y,
            stunned: false,
            stun_remaining: 0.0,
            map_sent: false,
        }
    }

    /// Creates a player at the fixed spawn tile of the given map.
    pub fn spawn(id: u32, username: &str, map: &TileMap) -> Self {
        let x = 5.0 * TILE_SIZE;
        let y = (map.height() as f32 - 3.0) * TILE_SIZE - PLAYER_HEIGHT;
        Self::new(id, username, x, y)
    }

    /// Advances the player by one tick. `dt` is in seconds and only feeds the
    /// stun and jump-cooldown timers; velocities integrate per tick.
    pub fn update(&mut self, dt: f32, input: Option<Input>, map: &TileMap, now_ms: u64) {
        let prev_input = self.last_input;
        self.last_input = input;

        let mut input = input;
        if self.stunned {
            self.stun_remaining -= dt;
            if self.stun_remaining <= 0.0 {
                self.stun_remaining = 0.0;
                self.stunned = false;
                debug!("player {} recovered from stun", self.username);
            }
            // All control is ignored while stunned.
            input = None;
        }

        if let Some(input) = input {
            self.handle_input(&input, prev_input.as_ref());
        }

        if self.ground_check_grace > 0 {
            self.ground_check_grace -= 1;
        }

        if self.jump_cooldown > 0.0 {
            self.jump_cooldown -= dt;
            if self.jump_cooldown <= 0.0 {
                self.jump_cooldown = 0.0;
                self.can_jump = true;
            }
        }

        if !self.on_ground && self.y < self.highest_point_y {
            self.highest_point_y = self.y;
        }

        self.current_tile = self.ground_tile(map);

        // Direction may be steered for the whole duration of the charge.
        if self.charging && self.on_ground {
            if let Some(input) = input {
                self.jump_direction = if input.left && !input.right {
                    -1
                } else if input.right && !input.left {
                    1
                } else {
                    0
                };
            }
        }

        if self.charging && self.on_ground && self.can_jump {
            self.jump_charge += JUMP_CHARGE_RATE;
            if self.jump_charge >= JUMP_MAX_POWER {
                // Fully charged: release automatically.
                self.jump_charge = JUMP_MAX_POWER;
                self.jump();
                self.space_released = false;
            } else {
                // Planted while charging.
                self.velocity_x = 0.0;
            }
        }

        if self.on_ground && !self.charging {
            self.walking = false;
            match self.current_tile {
                TileType::Snow => {
                    // No traction at all.
                    self.velocity_x = 0.0;
                }
                TileType::Ice => {
                    if let Some(input) = input {
                        if input.left && !input.right {
                            self.velocity_x -= ICE_ACCELERATION;
                            self.walking = true;
                        } else if input.right && !input.left {
                            self.velocity_x += ICE_ACCELERATION;
                            self.walking = true;
                        }
                    }
                    self.velocity_x *= ICE_FRICTION;
                    self.velocity_x = self.velocity_x.clamp(-MAX_ICE_SPEED, MAX_ICE_SPEED);
                    if self.velocity_x.abs() < ICE_STOP_EPSILON {
                        self.velocity_x = 0.0;
                    }
                }
                _ => {
                    // Plain ground: direct speed, no momentum.
                    match input {
                        Some(input) if input.left && !input.right => {
                            self.velocity_x = -PLAYER_WALK_SPEED;
                            self.walking = true;
                        }
                        Some(input) if input.right && !input.left => {
                            self.velocity_x = PLAYER_WALK_SPEED;
                            self.walking = true;
                        }
                        _ => self.velocity_x = 0.0,
                    }
                }
            }
        }

        // Slopes cannot be stood on: force a slide and briefly suppress the
        // ground re-check so the same tile is not picked up again.
        if self.on_ground
            && matches!(
                self.current_tile,
                TileType::SlopeLeft | TileType::SlopeRight
            )
        {
            let direction = if self.current_tile == TileType::SlopeLeft {
                -1.0
            } else {
                1.0
            };
            self.velocity_x = SLOPE_SLIDE_SPEED * direction;
            self.velocity_y = SLOPE_SLIDE_SPEED;
            self.on_ground = false;
            self.charging = false;
            self.jump_charge = 0.0;
            self.ground_check_grace = SLOPE_GRACE_TICKS;
        }

        if !self.on_ground || self.velocity_y > 0.0 {
            self.velocity_y = (self.velocity_y + GRAVITY).min(MAX_FALL_SPEED);
        } else {
            self.velocity_y = 0.0;
        }

        collision::resolve_horizontal(self, map);
        collision::resolve_vertical(self, map);

        self.x = self.x.clamp(0.0, map.pixel_width() - PLAYER_WIDTH);

        if self.current_tile == TileType::Finish && self.finish_time.is_none() {
            self.finish_time = Some(now_ms);
            self.recorded_jumps = self.jump_count;
            debug!(
                "player {} finished after {} jumps",
                self.username, self.recorded_jumps
            );
        }
    }

    /// Press/release edge detection for the jump key.
    fn handle_input(&mut self, input: &Input, prev: Option<&Input>) {
        let prev_space = prev.is_some_and(|p| p.space);

        if !input.space && prev_space {
            self.space_released = true;
            if self.charging {
                self.jump();
            }
        }

        if input.space && !prev_space
            && self.space_released
            && self.on_ground
            && !self.charging
            && self.can_jump
        {
            self.charging = true;
            self.jump_charge = JUMP_MIN_POWER;
            self.jump_direction = if input.left && !input.right {
                -1
            } else if input.right && !input.left {
                1
            } else {
                0
            };
            self.velocity_x = 0.0;
        }
    }

    /// Launches the jump from the accumulated charge. A weak charge gives a
    /// shallow, far arc; a full charge a steep, high one. Straight-up jumps
    /// always launch at 90 degrees. Triggered while airborne this only clears
    /// the charging state.
    fn jump(&mut self) {
        if !self.on_ground {
            self.charging = false;
            self.jump_charge = 0.0;
            return;
        }

        let power = self.jump_charge;
        let charge_ratio = (power - JUMP_MIN_POWER) / (JUMP_MAX_POWER - JUMP_MIN_POWER);

        let angle = if self.jump_direction == 0 {
            std::f32::consts::FRAC_PI_2
        } else {
            let degrees =
                JUMP_MIN_ANGLE_DEG + (JUMP_MAX_ANGLE_DEG - JUMP_MIN_ANGLE_DEG) * charge_ratio;
            degrees.to_radians()
        };

        self.velocity_y = -power * angle.sin();
        self.velocity_x = power * angle.cos() * self.jump_direction as f32;

        self.on_ground = false;
        self.charging = false;
        self.jump_charge = 0.0;
        self.jump_count += 1;
        self.ground_check_grace = JUMP_GRACE_TICKS;
        self.jump_cooldown = JUMP_COOLDOWN;
        self.can_jump = false;
        self.space_released = false;
    }

    /// Classifies the surface under the feet. Any special tile in the
    /// footprint wins over plain Solid.
    fn ground_tile(&self, map: &TileMap) -> TileType {
        if !self.on_ground {
            return TileType::Empty;
        }

        let left_tx = ((self.x + 1.0) / TILE_SIZE).floor() as i32;
        let right_tx = ((self.x + PLAYER_WIDTH - 1.0) / TILE_SIZE).floor() as i32;
        let bottom_ty = ((self.y + PLAYER_HEIGHT) / TILE_SIZE).floor() as i32;

        for tx in left_tx..=right_tx {
            let tile = map.get(tx, bottom_ty);
            if tile.is_special() {
                return tile;
            }
        }
        for tx in left_tx..=right_tx {
            let tile = map.get(tx, bottom_ty);
            if tile != TileType::Empty {
                return tile;
            }
        }
        TileType::Empty
    }

    /// Rounded wire representation; charge reads 0 whenever not charging.
    pub fn view(&self) -> EntityView {
        EntityView {
            id: self.id,
            x: self.x.round() as i32,
            y: self.y.round() as i32,
            username: self.username.clone(),
            charging: self.charging,
            jump_charge: if self.charging {
                self.jump_charge.round() as i32
            } else {
                0
            },
            jump_direction: self.jump_direction,
            jump_count: self.jump_count,
            finish_time: self.finish_time,
            recorded_jumps: self.recorded_jumps,
            on_ground: self.on_ground,
            walking: self.walking,
            stunned: self.stunned,
        }
    }
}
