//! Client socket thread.
//!
//! macroquad owns the main loop, so the UDP socket lives on its own thread
//! with a small single-threaded tokio runtime. Incoming packets become
//! [`ClientEvent`]s drained by the render loop once per frame; outgoing
//! packets are queued through a channel. This keeps snapshot receipt and the
//! render-time buffer read strictly interleaved, never concurrent.

use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Input, Packet, Snapshot, CLIENT_VERSION};
use std::sync::mpsc as std_mpsc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// First snapshot carries the whole tile map; size the receive buffer for it.
const RECV_BUFFER_SIZE: usize = 65536;

#[derive(Debug)]
pub enum ClientEvent {
    Connected { client_id: u32 },
    Snapshot(Box<Snapshot>),
    Disconnected { reason: String },
}

pub struct NetworkClient {
    events: std_mpsc::Receiver<ClientEvent>,
    outgoing: mpsc::UnboundedSender<Packet>,
}

impl NetworkClient {
    /// Spawns the socket thread and fires the connect handshake.
    pub fn connect(server_addr: &str, username: &str) -> Self {
        let (event_tx, event_rx) = std_mpsc::channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let server_addr = server_addr.to_string();
        let username = username.to_string();
        std::thread::spawn(move || {
            if let Err(e) = socket_thread(&server_addr, &username, event_tx, out_rx) {
                error!("network thread terminated: {}", e);
            }
        });

        Self {
            events: event_rx,
            outgoing: out_tx,
        }
    }

    /// Drains every event received since the last call.
    pub fn poll(&self) -> Vec<ClientEvent> {
        self.events.try_iter().collect()
    }

    pub fn send_input(&self, input: Input) {
        let _ = self.outgoing.send(Packet::Input {
            left: input.left,
            right: input.right,
            space: input.space,
        });
    }

    pub fn disconnect(&self) {
        let _ = self.outgoing.send(Packet::Disconnect);
    }
}

fn socket_thread(
    server_addr: &str,
    username: &str,
    event_tx: std_mpsc::Sender<ClientEvent>,
    mut out_rx: mpsc::UnboundedReceiver<Packet>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server_addr).await?;
        info!("connecting to {}", server_addr);

        let connect = Packet::Connect {
            client_version: CLIENT_VERSION,
            username: username.to_string(),
        };
        socket.send(&serialize(&connect)?).await?;

        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            tokio::select! {
                result = socket.recv(&mut buffer) => {
                    match result {
                        Ok(len) => {
                            let event = match deserialize::<Packet>(&buffer[..len]) {
                                Ok(Packet::Connected { client_id }) => {
                                    info!("connected with id {}", client_id);
                                    Some(ClientEvent::Connected { client_id })
                                }
                                Ok(Packet::Update(snapshot)) => {
                                    Some(ClientEvent::Snapshot(Box::new(snapshot)))
                                }
                                Ok(Packet::Disconnected { reason }) => {
                                    warn!("server dropped us: {}", reason);
                                    Some(ClientEvent::Disconnected { reason })
                                }
                                Ok(_) => {
                                    warn!("unexpected packet from server");
                                    None
                                }
                                Err(e) => {
                                    warn!("failed to deserialize server packet: {}", e);
                                    None
                                }
                            };
                            if let Some(event) = event {
                                if event_tx.send(event).is_err() {
                                    // Render loop is gone; say goodbye and stop.
                                    let _ = socket.send(&serialize(&Packet::Disconnect)?).await;
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            error!("socket error: {}", e);
                            break;
                        }
                    }
                }
                message = out_rx.recv() => {
                    match message {
                        Some(packet) => {
                            socket.send(&serialize(&packet)?).await?;
                        }
                        None => {
                            let _ = socket.send(&serialize(&Packet::Disconnect)?).await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    })
}
