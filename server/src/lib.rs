//! # Authoritative simulation server
//!
//! This library implements the server side of the multiplayer platformer: a
//! fixed-rate, per-lobby simulation that owns every player entity, resolves
//! their physics against a static tile grid, and streams per-viewer snapshots
//! over UDP.
//!
//! ## Architecture
//!
//! One lobby's simulation is strictly single-threaded: the tick loop steps
//! entities, refreshes the visibility cache and assembles snapshots in
//! sequence, so entity state needs no locking. Networking runs on separate
//! tokio tasks (receiver, sender, timeout checker) that communicate with the
//! tick loop over channels. Snapshot emission is best-effort: a congested
//! send queue drops the snapshot rather than delaying the tick, because the
//! next tick's snapshot supersedes it anyway.
//!
//! ## Module organization
//!
//! - [`entity`] — the player record and its per-tick state machine (charging,
//!   jumping, surface friction, stun).
//! - [`collision`] — stepped-sweep collision of the player box against the
//!   tile grid, including wall rebound and slope passability.
//! - [`game`] — the per-lobby [`game::GameState`]: player roster, latest
//!   inputs, visibility cache, leaderboard and snapshot assembly.
//! - [`client_manager`] — transport-level connection registry with timeout
//!   cleanup.
//! - [`network`] — the UDP server and the tick loop that drives everything.

pub mod client_manager;
pub mod collision;
pub mod entity;
pub mod game;
pub mod network;
