//! Server network layer handling UDP communications and the tick loop.

use crate::client_manager::ClientManager;
use crate::game::GameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Input, Packet, TileMap, CLIENT_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Ticks between periodic rate reports in the log.
const STATS_REPORT_TICKS: u64 = 90;

/// Outgoing queue depth. When the send task falls behind, `try_send` fails
/// and the snapshot is dropped — the next tick supersedes it anyway.
const SEND_QUEUE_CAPACITY: usize = 1024;

/// Upper bound on the measured tick delta, so a scheduler stall cannot burn
/// whole seconds of stun/cooldown time in one step.
const MAX_TICK_DELTA: f32 = 0.2;

/// Messages sent from network tasks to the main server loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the network send task.
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking and the lobby simulation.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::Sender<GameMessage>,
    game_rx: Option<mpsc::Receiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_players: usize,
        map: TileMap,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new())),
            game_state: GameState::new(map, max_players),
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    /// Spawns the task that continuously listens for incoming datagrams.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            warn!("failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing packet queue.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(GameMessage::SendPacket { packet, addr }) = game_rx.recv().await {
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            debug!("failed to send to {}: {}", addr, e);
                        }
                    }
                    Err(e) => error!("failed to serialize packet: {}", e),
                }
            }
        });
    }

    /// Spawns the task that watches for silent clients.
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    /// Queues one packet for the send task, dropping it when the queue is
    /// full. Snapshot staleness is preferred over delay.
    fn queue_packet(&self, packet: Packet, addr: SocketAddr) {
        match self.game_tx.try_send(GameMessage::SendPacket { packet, addr }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("send queue full, dropping packet to {}", addr);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("send task gone, dropping packet to {}", addr);
            }
        }
    }

    /// Processes one incoming packet.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                username,
            } => {
                if client_version != CLIENT_VERSION {
                    self.queue_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // A reconnect from the same address replaces the old entity.
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing {
                    info!("replacing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(existing_id);
                    self.game_state.remove_player(existing_id);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, &username)
                };

                if self.game_state.add_player(client_id, &username).is_some() {
                    self.queue_packet(Packet::Connected { client_id }, addr);
                } else {
                    self.clients.write().await.remove_client(client_id);
                    self.queue_packet(
                        Packet::Disconnected {
                            reason: "Lobby full".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Input { left, right, space } => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.clients.write().await.touch(client_id);
                    self.game_state
                        .set_input(client_id, Input { left, right, space });
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(client_id);
                    self.game_state.remove_player(client_id);
                }
            }

            _ => {
                warn!("unexpected packet type from {}", addr);
            }
        }
    }

    /// One simulation tick: step the lobby, then emit a snapshot per viewer.
    async fn run_tick(&mut self, dt: f32, now_ms: u64) {
        self.game_state.tick(dt, now_ms);

        let client_addrs = {
            let clients = self.clients.read().await;
            clients.get_client_addrs()
        };

        for (client_id, addr) in client_addrs {
            if let Some(snapshot) = self.game_state.build_snapshot(client_id, now_ms) {
                self.queue_packet(Packet::Update(snapshot), addr);
            }
        }
    }

    /// Main server loop coordinating all operations.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut tick_count: u64 = 0;

        info!("server started");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.remove_player(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > MAX_TICK_DELTA {
                        warn!("large tick delta {:.3}s, capping to {:.3}s", dt, MAX_TICK_DELTA);
                        dt = MAX_TICK_DELTA;
                    }

                    self.run_tick(dt, timestamp_ms()).await;
                    tick_count += 1;

                    if tick_count % STATS_REPORT_TICKS == 0 && !self.game_state.is_empty() {
                        debug!(
                            "tick {}: {} players, {:.1}Hz",
                            tick_count,
                            self.game_state.len(),
                            1.0 / dt.max(f32::EPSILON)
                        );
                    }
                },
            }
        }

        Ok(())
    }
}

/// Current wall-clock time in milliseconds, the timestamp stamped onto
/// snapshots and finish results.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{TileType, PLAYER_WALK_SPEED, TILE_SIZE};

    fn test_map() -> TileMap {
        let mut map = TileMap::new(20, 12);
        map.fill_row(9, 0, 19, TileType::Solid);
        map
    }

    async fn test_server(max_players: usize) -> Server {
        Server::new(
            "127.0.0.1:0",
            Duration::from_millis(33),
            max_players,
            test_map(),
        )
        .await
        .expect("bind test server")
    }

    fn client_addr(port: u16) -> SocketAddr {
        SocketAddr::new([127, 0, 0, 1].into(), port)
    }

    fn connect_packet(username: &str) -> Packet {
        Packet::Connect {
            client_version: CLIENT_VERSION,
            username: username.to_string(),
        }
    }

    fn expect_sent(server: &mut Server) -> (Packet, SocketAddr) {
        match server.game_rx.as_mut().unwrap().try_recv() {
            Ok(GameMessage::SendPacket { packet, addr }) => (packet, addr),
            Err(e) => panic!("expected a queued packet: {}", e),
        }
    }

    #[tokio::test]
    async fn connect_adds_player_and_replies() {
        let mut server = test_server(4).await;
        let addr = client_addr(9001);

        server.handle_packet(connect_packet("climber"), addr).await;

        assert_eq!(server.game_state.len(), 1);
        let (packet, to) = expect_sent(&mut server);
        assert_eq!(to, addr);
        match packet {
            Packet::Connected { client_id } => assert_eq!(client_id, 1),
            other => panic!("expected Connected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn full_lobby_is_refused() {
        let mut server = test_server(1).await;
        server
            .handle_packet(connect_packet("first"), client_addr(9001))
            .await;
        expect_sent(&mut server);

        server
            .handle_packet(connect_packet("second"), client_addr(9002))
            .await;

        assert_eq!(server.game_state.len(), 1);
        assert_eq!(server.clients.read().await.len(), 1);
        let (packet, to) = expect_sent(&mut server);
        assert_eq!(to, client_addr(9002));
        match packet {
            Packet::Disconnected { reason } => assert_eq!(reason, "Lobby full"),
            other => panic!("expected Disconnected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn version_mismatch_is_refused() {
        let mut server = test_server(4).await;
        server
            .handle_packet(
                Packet::Connect {
                    client_version: CLIENT_VERSION + 1,
                    username: "old".to_string(),
                },
                client_addr(9001),
            )
            .await;

        assert_eq!(server.game_state.len(), 0);
        let (packet, _) = expect_sent(&mut server);
        assert!(matches!(packet, Packet::Disconnected { .. }));
    }

    #[tokio::test]
    async fn reconnect_replaces_the_old_entity() {
        let mut server = test_server(4).await;
        let addr = client_addr(9001);

        server.handle_packet(connect_packet("climber"), addr).await;
        expect_sent(&mut server);
        server.handle_packet(connect_packet("climber"), addr).await;

        assert_eq!(server.game_state.len(), 1);
        let (packet, _) = expect_sent(&mut server);
        match packet {
            Packet::Connected { client_id } => assert_eq!(client_id, 2),
            other => panic!("expected Connected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn input_steers_the_player() {
        let mut server = test_server(4).await;
        let addr = client_addr(9001);
        server.handle_packet(connect_packet("climber"), addr).await;

        server
            .handle_packet(
                Packet::Input {
                    left: false,
                    right: true,
                    space: false,
                },
                addr,
            )
            .await;

        let x0 = server.game_state.players[&1].x;
        for _ in 0..3 {
            server.run_tick(1.0 / 30.0, 0).await;
        }
        // One settle tick, two walking ticks.
        assert_eq!(
            server.game_state.players[&1].x,
            x0 + 2.0 * PLAYER_WALK_SPEED
        );
        assert!(server.game_state.players[&1].x < 20.0 * TILE_SIZE);
    }

    #[tokio::test]
    async fn disconnect_removes_player_and_connection() {
        let mut server = test_server(4).await;
        let addr = client_addr(9001);
        server.handle_packet(connect_packet("climber"), addr).await;

        server.handle_packet(Packet::Disconnect, addr).await;

        assert!(server.game_state.is_empty());
        assert!(server.clients.read().await.is_empty());
    }

    #[tokio::test]
    async fn ticks_emit_one_snapshot_per_viewer() {
        let mut server = test_server(4).await;
        server
            .handle_packet(connect_packet("a"), client_addr(9001))
            .await;
        server
            .handle_packet(connect_packet("b"), client_addr(9002))
            .await;
        expect_sent(&mut server);
        expect_sent(&mut server);

        server.run_tick(1.0 / 30.0, 1000).await;

        let mut updates = 0;
        while let Ok(GameMessage::SendPacket { packet, .. }) =
            server.game_rx.as_mut().unwrap().try_recv()
        {
            match packet {
                Packet::Update(snapshot) => {
                    assert_eq!(snapshot.t, 1000);
                    updates += 1;
                }
                other => panic!("expected Update, got {:?}", other),
            }
        }
        assert_eq!(updates, 2);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let a = timestamp_ms();
        std::thread::sleep(Duration::from_millis(2));
        let b = timestamp_ms();
        assert!(b > a);
    }
}
