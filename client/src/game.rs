//! Client-side snapshot buffering and time reconstruction.
//!
//! Snapshots arrive on a jittery network schedule. Instead of rendering them
//! as they land, the client renders the world at a virtual time a fixed delay
//! behind the server and interpolates between the two snapshots that bracket
//! that time, which hides jitter without visible jumps.

use shared::{EntityView, LeaderboardEntry, Snapshot, TileMap, RENDER_DELAY_MS};
use std::collections::VecDeque;

/// A player ready for drawing: continuous-valued position and charge,
/// discrete fields taken from the temporally closest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlayer {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub username: String,
    pub charging: bool,
    pub jump_charge: f32,
    pub jump_direction: i8,
    pub jump_count: u32,
    pub finish_time: Option<u64>,
    pub recorded_jumps: u32,
    pub on_ground: bool,
    pub walking: bool,
    pub stunned: bool,
}

impl From<&EntityView> for RenderPlayer {
    fn from(view: &EntityView) -> Self {
        Self {
            id: view.id,
            x: view.x as f32,
            y: view.y as f32,
            username: view.username.clone(),
            charging: view.charging,
            jump_charge: view.jump_charge as f32,
            jump_direction: view.jump_direction,
            jump_count: view.jump_count,
            finish_time: view.finish_time,
            recorded_jumps: view.recorded_jumps,
            on_ground: view.on_ground,
            walking: view.walking,
            stunned: view.stunned,
        }
    }
}

/// The reconstructed world at one render instant.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub me: RenderPlayer,
    pub others: Vec<RenderPlayer>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Arrival-ordered buffer of server snapshots with a delayed virtual clock.
///
/// Appends happen on snapshot receipt, reads on each render request; trimming
/// pops from the front so neither operation shifts the remaining entries.
pub struct SnapshotBuffer {
    snapshots: VecDeque<Snapshot>,
    first_server_t: Option<u64>,
    local_start_ms: u64,
    map: Option<TileMap>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::new(),
            first_server_t: None,
            local_start_ms: 0,
            map: None,
        }
    }

    /// Forgets everything, for a reconnect.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.first_server_t = None;
        self.local_start_ms = 0;
        self.map = None;
    }

    /// Appends a snapshot and trims entries older than the current base.
    /// The first snapshot anchors the virtual clock; the tile map is kept
    /// aside so trimming can never lose it.
    pub fn push(&mut self, mut snapshot: Snapshot, now_ms: u64) {
        if self.first_server_t.is_none() {
            self.first_server_t = Some(snapshot.t);
            self.local_start_ms = now_ms;
        }

        if let Some(map) = snapshot.map.take() {
            self.map = Some(map);
        }

        self.snapshots.push_back(snapshot);

        if let Some(base) = self.base_index(self.render_time(now_ms)) {
            self.snapshots.drain(..base);
        }
    }

    pub fn map(&self) -> Option<&TileMap> {
        self.map.as_ref()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The delayed virtual server time corresponding to the local clock.
    /// Signed because the delay makes it lag the first snapshot briefly.
    fn render_time(&self, now_ms: u64) -> i64 {
        let first = self.first_server_t.unwrap_or(0) as i64;
        first + (now_ms as i64 - self.local_start_ms as i64) - RENDER_DELAY_MS as i64
    }

    /// Index of the latest snapshot at or before the render time.
    fn base_index(&self, render_time: i64) -> Option<usize> {
        self.snapshots.iter().rposition(|s| s.t as i64 <= render_time)
    }

    /// Reconstructs the world at the current virtual time. Falls back to the
    /// newest snapshot when the buffer has not bracketed the render time yet;
    /// a slightly stale frame beats extrapolation.
    pub fn sample(&self, now_ms: u64) -> Option<RenderState> {
        self.first_server_t?;
        let newest = self.snapshots.back()?;
        let render_time = self.render_time(now_ms);

        match self.base_index(render_time) {
            Some(base) if base + 1 < self.snapshots.len() => {
                let base_snap = &self.snapshots[base];
                let next_snap = &self.snapshots[base + 1];

                let span = next_snap.t as i64 - base_snap.t as i64;
                let ratio = if span > 0 {
                    (render_time - base_snap.t as i64) as f32 / span as f32
                } else {
                    0.0
                }
                .clamp(0.0, 1.0);

                Some(RenderState {
                    me: interpolate_player(&base_snap.me, &next_snap.me, ratio),
                    others: interpolate_others(&base_snap.others, &next_snap.others, ratio),
                    leaderboard: base_snap.leaderboard.clone(),
                })
            }
            _ => Some(RenderState {
                me: (&newest.me).into(),
                others: newest.others.iter().map(Into::into).collect(),
                leaderboard: newest.leaderboard.clone(),
            }),
        }
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn lerp(a: f32, b: f32, ratio: f32) -> f32 {
    a + (b - a) * ratio
}

fn interpolate_player(base: &EntityView, next: &EntityView, ratio: f32) -> RenderPlayer {
    // Booleans snap to whichever snapshot is temporally closer.
    let closer = if ratio < 0.5 { base } else { next };

    RenderPlayer {
        id: base.id,
        x: lerp(base.x as f32, next.x as f32, ratio),
        y: lerp(base.y as f32, next.y as f32, ratio),
        username: base.username.clone(),
        charging: closer.charging,
        jump_charge: lerp(base.jump_charge as f32, next.jump_charge as f32, ratio),
        jump_direction: base.jump_direction,
        jump_count: base.jump_count,
        finish_time: base.finish_time,
        recorded_jumps: base.recorded_jumps,
        on_ground: closer.on_ground,
        walking: base.walking,
        stunned: closer.stunned,
    }
}

/// Matches entities by id between the bracketing snapshots; an entity present
/// only in the base passes through uninterpolated.
fn interpolate_others(base: &[EntityView], next: &[EntityView], ratio: f32) -> Vec<RenderPlayer> {
    base.iter()
        .map(|b| match next.iter().find(|n| n.id == b.id) {
            Some(n) => interpolate_player(b, n, ratio),
            None => b.into(),
        })
        .collect()
}
