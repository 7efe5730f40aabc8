//! Server-side connection tracking for the multiplayer lobby
//!
//! This module owns everything the transport needs to know about a
//! connection, and nothing the simulation needs: id allocation, the
//! address <-> id mapping used to route datagrams, usernames, and
//! last-activity timestamps for timeout cleanup. Inputs are not queued
//! here — the protocol is last-input-wins, and the latest value lives in
//! the simulation next to the player it drives.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// One connected client.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server; doubles as the
    /// player entity id inside the simulation.
    pub id: u32,
    /// Network address for routing snapshots back.
    pub addr: SocketAddr,
    /// Display name requested at connect time.
    pub username: String,
    /// Last time any packet arrived from this address.
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, username: &str) -> Self {
        Self {
            id,
            addr,
            username: username.to_string(),
            last_seen: Instant::now(),
        }
    }

    /// True when no packet has arrived within the timeout window,
    /// indicating a likely silent disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Registry of live connections.
///
/// Lobby capacity is *not* enforced here — that is the simulation's call
/// (`GameState::add_player` returns None when full) so that a transport
/// cannot admit more entities than the lobby accepts.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Registers a connection and returns its new id.
    pub fn add_client(&mut self, addr: SocketAddr, username: &str) -> u32 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr, username);
        info!("client {} ({}) connected from {}", client_id, username, addr);
        self.clients.insert(client_id, client);

        client_id
    }

    /// Removes a connection. Returns true if it was present; calling again
    /// for the same id is a no-op.
    pub fn remove_client(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!("client {} ({}) disconnected", client.id, client.username);
            true
        } else {
            false
        }
    }

    /// Resolves an incoming datagram's source address to a client id.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks a connection as alive right now.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Removes every connection that has gone silent and returns their ids
    /// so the simulation can drop the matching entities.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(*client_id);
        }

        timed_out
    }

    /// (id, address) pairs for snapshot routing, one per connection.
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
