//! # Game client library
//!
//! Client runtime for the multiplayer platformer. The server is fully
//! authoritative; this client does no prediction. Instead it buffers the
//! timestamped snapshot stream and renders the world at a virtual time a
//! fixed delay behind the server, interpolating between the snapshots that
//! bracket it. That delay absorbs network jitter without visible jumps,
//! at the cost of a small, constant display latency.
//!
//! ## Module organization
//!
//! - [`game`] — the snapshot buffer, virtual render clock and interpolator.
//! - [`input`] — keyboard capture with change-or-keepalive sending.
//! - [`network`] — the socket thread delivering server events to the render
//!   loop.
//! - [`rendering`] — macroquad drawing of the tile grid, players and
//!   overlays.

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
