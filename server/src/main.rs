use clap::Parser;
use log::info;
use server::console::spawn_stdin_console;
use server::network::{Server, ServerConfig};
use server::world::{ResourceFields, SceneConfig, WorldState, MAX_OBJECTS_PER_KIND};
use shared::Tuning;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "30")]
    tick_rate: u32,
    /// Maximum number of actors in the session
    #[clap(short, long, default_value = "32")]
    max_clients: usize,
    /// Seconds without a packet before an actor counts as departed
    #[clap(long, default_value = "5")]
    timeout_secs: u64,
    /// Seconds between full-state rebroadcasts to every actor
    #[clap(long, default_value = "1")]
    resync_secs: u64,
    /// Number of tools placed in the world
    #[clap(long, default_value = "1", value_parser = clap::value_parser!(u32).range(0..=MAX_OBJECTS_PER_KIND as i64))]
    tools: u32,
    /// Number of resources placed in the world
    #[clap(long, default_value = "1", value_parser = clap::value_parser!(u32).range(0..=MAX_OBJECTS_PER_KIND as i64))]
    resources: u32,
    /// Seconds before a fallen resource respawns
    #[clap(long)]
    respawn_timer: Option<f64>,
    /// Minimum world time between two swings of a held tool
    #[clap(long, default_value_t = shared::USE_COOLDOWN)]
    use_cooldown: f64,
    /// Events older than this are not replayed as sounds to observers
    #[clap(long, default_value_t = shared::FRESHNESS_WINDOW)]
    freshness_window: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let scene = SceneConfig {
        tools: args.tools,
        resources: args.resources,
        resource_fields: ResourceFields {
            respawn_timer_seconds: args.respawn_timer,
        },
    };
    let config = ServerConfig {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64),
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.timeout_secs),
        resync_interval: Duration::from_secs(args.resync_secs),
        tuning: Tuning {
            use_cooldown: args.use_cooldown,
            freshness_window: args.freshness_window,
            ..Tuning::default()
        },
    };

    info!("Starting world server with {:?}", scene);

    let world = WorldState::from_scene(&scene);
    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, world, config).await?;
    spawn_stdin_console(server.operator());

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
