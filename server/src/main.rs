use clap::Parser;
use log::info;
use server::network::Server;
use shared::{TileMap, TileType, DEFAULT_MAX_PLAYERS, DEFAULT_TICK_RATE};
use std::path::{Path, PathBuf};
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (simulation updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum players in the lobby
    #[arg(short, long, default_value_t = DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    /// JSON tile map file; the built-in level is used when omitted
    #[arg(long)]
    map: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let map = match &args.map {
        Some(path) => load_map(path)?,
        None => builtin_map(),
    };
    info!("level loaded: {}x{} tiles", map.width(), map.height());

    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate as f32);
    let mut server = Server::new(&address, tick_duration, args.max_players, map).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}

fn load_map(path: &Path) -> Result<TileMap, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)?;
    let map: TileMap = serde_json::from_str(&data)?;
    Ok(map)
}

/// Built-in 20x100 tower. A fixed stand-in for the external map supplier:
/// bordered walls, a wide start platform, a ladder of platforms mixing ice,
/// snow and slopes, and a walled finish pocket near the top.
fn builtin_map() -> TileMap {
    let mut map = TileMap::new(20, 100);

    for y in 0..100 {
        map.set(0, y, TileType::Solid);
        map.set(19, y, TileType::Solid);
    }
    map.fill_row(99, 0, 19, TileType::Solid);

    // Start platform under the spawn tile.
    map.fill_row(97, 1, 18, TileType::Solid);

    let platforms: &[(usize, usize, usize, TileType)] = &[
        (93, 3, 7, TileType::Solid),
        (89, 10, 14, TileType::Solid),
        (85, 5, 8, TileType::Ice),
        (81, 12, 16, TileType::Solid),
        (77, 2, 6, TileType::Snow),
        (73, 8, 12, TileType::Solid),
        (69, 14, 17, TileType::Ice),
        (65, 4, 8, TileType::Solid),
        (61, 9, 13, TileType::Snow),
        (57, 1, 5, TileType::Solid),
        (53, 7, 11, TileType::Ice),
        (49, 13, 17, TileType::Solid),
        (45, 3, 7, TileType::Solid),
        (41, 9, 12, TileType::Snow),
        (37, 14, 17, TileType::Solid),
        (33, 5, 9, TileType::Ice),
        (29, 11, 15, TileType::Solid),
        (25, 2, 6, TileType::Solid),
        (21, 8, 12, TileType::Ice),
        (17, 13, 16, TileType::Solid),
        (13, 4, 8, TileType::Solid),
        (9, 9, 13, TileType::Solid),
    ];
    for &(y, x0, x1, tile) in platforms {
        map.fill_row(y, x0, x1, tile);
    }

    // Slopes shedding players off two platform edges.
    map.set(2, 93, TileType::SlopeLeft);
    map.set(8, 93, TileType::SlopeRight);
    map.set(13, 73, TileType::SlopeRight);

    // Finish pocket with side walls, as the reference layout builds it.
    map.fill_row(5, 7, 13, TileType::Finish);
    for y in 3..=6 {
        map.set(6, y, TileType::Solid);
        map.set(14, y, TileType::Solid);
    }

    map
}
