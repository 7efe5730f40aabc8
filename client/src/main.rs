use clap::Parser;
use client::game::SnapshotBuffer;
use client::input::InputManager;
use client::network::{ClientEvent, NetworkClient};
use client::rendering::Renderer;
use log::info;
use macroquad::prelude::{next_frame, Conf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name
    #[arg(short, long, default_value = "climber")]
    username: String,

    /// Window width in pixels
    #[arg(long, default_value_t = 800)]
    width: i32,

    /// Window height in pixels
    #[arg(long, default_value_t = 600)]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Skyclimb".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("connecting to {} as {}", args.server, args.username);
    info!("controls: A/D or arrows to steer, hold Space to charge a jump");

    let network = NetworkClient::connect(&args.server, &args.username);
    let mut buffer = SnapshotBuffer::new();
    let mut input_manager = InputManager::new();
    let renderer = Renderer::new();

    let mut client_id = None;
    let mut disconnect_reason: Option<String> = None;

    loop {
        let now = timestamp_ms();

        // Drain the socket thread first, then read the buffer: receipt and
        // render never touch it at the same time.
        for event in network.poll() {
            match event {
                ClientEvent::Connected { client_id: id } => client_id = Some(id),
                ClientEvent::Snapshot(snapshot) => buffer.push(*snapshot, now),
                ClientEvent::Disconnected { reason } => disconnect_reason = Some(reason),
            }
        }

        if client_id.is_some() && disconnect_reason.is_none() {
            if let Some(input) = input_manager.poll(now) {
                network.send_input(input);
            }
        }

        match buffer.sample(now) {
            Some(state) if disconnect_reason.is_none() => {
                renderer.render(&state, buffer.map(), client_id);
            }
            _ => renderer.render_connecting(disconnect_reason.as_deref()),
        }

        next_frame().await;
    }
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
