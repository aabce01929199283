use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::time::Duration;
use tandem::RoomId;
use tandem::client::{
    CallSession, ConnectionState, MediaConstraints, SessionConfig, SessionSnapshot,
    headless_services,
};
use tandem::server::{AppState, Config, RegistrationStrategy, serve};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Two-party room calls: rendezvous server and headless client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rendezvous server and transport broker.
    Serve {
        /// Overrides BIND_ADDRESS.
        #[arg(long)]
        bind: Option<String>,

        /// `last-write-wins` or `compare-and-swap`. Overrides REGISTRATION_STRATEGY.
        #[arg(long)]
        strategy: Option<RegistrationStrategy>,
    },
    /// Generate a fresh room id.
    NewRoom {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Join a room with synthetic media.
    Join {
        room: String,

        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,

        #[arg(long)]
        no_audio: bool,

        #[arg(long)]
        no_video: bool,

        /// Give up waiting for the other participant after this many seconds.
        #[arg(long)]
        await_peer_timeout: Option<u64>,

        /// Give up on negotiation after this many seconds.
        #[arg(long)]
        connect_timeout: Option<u64>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, strategy } => run_server(bind, strategy).await,
        Commands::NewRoom { server } => {
            let room_id = RoomId::new();
            println!("{} {}", "Room:".green().bold(), room_id);
            println!(
                "   join with: {}",
                format!("tandem join {} --server {}", room_id, server).cyan()
            );
            Ok(())
        }
        Commands::Join {
            room,
            server,
            no_audio,
            no_video,
            await_peer_timeout,
            connect_timeout,
        } => {
            let room_id = RoomId::try_from(room).context("Room id must not be empty")?;
            let config = SessionConfig {
                constraints: MediaConstraints {
                    audio: !no_audio,
                    video: !no_video,
                },
                await_peer_timeout: await_peer_timeout.map(Duration::from_secs),
                connect_timeout: connect_timeout.map(Duration::from_secs),
            };
            run_session(room_id, &server, config).await
        }
    }
}

async fn run_server(bind: Option<String>, strategy: Option<RegistrationStrategy>) -> Result<()> {
    let mut config = Config::from_env().context("Invalid server configuration")?;
    if let Some(bind) = bind {
        config = config
            .with_bind_address(&bind)
            .context("Invalid --bind address")?;
    }
    if let Some(strategy) = strategy {
        config.registration_strategy = strategy;
    }
    info!("Starting with {:?}", config);

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    println!(
        "{} {}",
        "Tandem server on".green().bold(),
        listener.local_addr()?
    );

    let state = AppState::new(&config);
    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let state = snapshot.connection_state.to_string();
    let state = match snapshot.connection_state {
        ConnectionState::Connected => state.green().bold(),
        ConnectionState::Failed(_) => state.red().bold(),
        ConnectionState::Disconnected | ConnectionState::Left => state.yellow(),
        _ => state.cyan(),
    };
    let mic = if snapshot.audio_enabled { "on" } else { "off" };
    let cam = if snapshot.video_enabled { "on" } else { "off" };
    println!("[{}] {}  (mic {}, camera {})", snapshot.room_id, state, mic, cam);
    if let Some(err) = &snapshot.last_error {
        println!("   {}", err.to_string().red());
    }
}

fn prompt_retry() {
    println!("{}", "Retry? [Y/n]".bold());
}

/// Answer to the retry prompt: `Some(true)` to retry, `Some(false)` to leave.
fn parse_retry_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(true),
        "n" | "no" | "q" => Some(false),
        _ => None,
    }
}

async fn run_session(room_id: RoomId, server: &str, config: SessionConfig) -> Result<()> {
    let services = headless_services(server)?;
    let mut session = CallSession::start(room_id, services, config);
    let mut updates = session.subscribe();
    // Sole reader of stdin; the retry prompt is answered through it too.
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut retry_pending = false;

    println!(
        "{}",
        "Commands: a = toggle microphone, v = toggle camera, q = leave".dimmed()
    );
    print_snapshot(&updates.borrow_and_update());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.leave().await;
                break;
            }
            line = commands.next_line() => match line? {
                Some(line) if retry_pending => match parse_retry_answer(&line) {
                    Some(true) => {
                        retry_pending = false;
                        session.retry().await?;
                    }
                    Some(false) => {
                        session.leave().await;
                        break;
                    }
                    None => prompt_retry(),
                },
                Some(line) => match line.trim() {
                    "a" => { session.toggle_audio().await; }
                    "v" => { session.toggle_video().await; }
                    "q" => {
                        session.leave().await;
                        break;
                    }
                    "" => {}
                    other => println!("Unknown command: {}", other),
                },
                None => {
                    session.leave().await;
                    break;
                }
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_snapshot(&snapshot);
                match snapshot.connection_state {
                    ConnectionState::Failed(_) => {
                        retry_pending = true;
                        prompt_retry();
                    }
                    ConnectionState::Disconnected | ConnectionState::Left => break,
                    _ => {}
                }
            }
        }
    }

    print_snapshot(&session.snapshot());
    Ok(())
}
