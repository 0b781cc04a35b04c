mod driver;
mod local;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use console::{Key, Term};
use driver::BurrowDriver;
use ui::{print_event, print_players};
use zenoh::key_expr::KeyExpr;
use zenoh_duel::{DuelConfig, DuelEvent, DuelSession, SessionExt, SessionId, Winner};

/// z_burrow - Rabbit vs Mole duel lobby over Zenoh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Display name shown in the lobby
    #[arg(short, long)]
    name: Option<String>,

    /// Key expression prefix
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Path to Zenoh config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Join this session instead of hosting one
    #[arg(short, long)]
    join: Option<String>,

    /// Play both peers in this process, without networking
    #[arg(short, long)]
    local: bool,

    /// Session tick period in milliseconds
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Simulated scene loading time in milliseconds
    #[arg(long, default_value_t = 500)]
    load_ms: u64,

    /// Give up on an opponent that never loads after this many seconds
    #[arg(long)]
    barrier_timeout: Option<u64>,

    /// Print player lists as JSON
    #[arg(long)]
    json: bool,
}

/// Lobby commands read from the keyboard
#[derive(Debug, Clone, Copy)]
enum Command {
    ToggleReady,
    SwapRoles,
    Start,
    End(Winner),
    Lobby,
    Players,
    Quit,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut config = DuelConfig::new()
        .with_load_barrier_timeout(args.barrier_timeout.map(Duration::from_secs));
    if let Some(name) = args.name.clone() {
        config = config.with_display_name(name);
    }
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let load_time = Duration::from_millis(args.load_ms);

    if args.local {
        println!("=== z_burrow - local duel ===");
        return local::run(config, tick, load_time, args.json).await;
    }

    // Create zenoh config
    let zenoh_config = if let Some(config_path) = args.config.as_ref() {
        zenoh::Config::from_file(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?
    } else {
        zenoh::Config::default()
    };

    // Create zenoh session
    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open zenoh session: {}", e))?;

    let mut store_builder = session.declare_duel_store();
    if let Some(prefix) = args.prefix.clone() {
        store_builder = store_builder.prefix(prefix);
    }
    let store = store_builder.await?;

    let mut duel = DuelSession::new(store, BurrowDriver::new("you", load_time), config);

    println!("=== z_burrow - Rabbit vs Mole ===");
    println!("Name: {}", duel.display_name());
    if let Some(ref prefix) = args.prefix {
        println!("Prefix: {}", prefix);
    }
    match args.join.as_deref() {
        Some(join) => {
            let session_id = SessionId::parse(join)?;
            duel.join(&session_id)
                .with_context(|| format!("Failed to join session {}", session_id))?;
            println!("Joined session {}", session_id);
        }
        None => {
            let session_id = duel.create().context("Failed to create a session")?;
            println!("Hosting session {}", session_id);
            println!("Opponent joins with: z_burrow --join {}", session_id);
        }
    }
    println!("Status: {}", duel.status());
    println!("Commands:");
    println!("  r - Toggle ready");
    println!("  s - Swap roles (host)");
    println!("  g - Start game (host)");
    println!("  1/2/3/0 - End game: Rabbit/Mole/Both/nobody wins (host)");
    println!("  l - Back to lobby");
    println!("  p - Show players");
    println!("  q - Quit");
    println!();

    let (command_tx, command_rx) = flume::unbounded();

    // Spawn keyboard input task
    let keyboard_task = tokio::task::spawn_blocking(move || {
        let input_term = Term::stdout();
        loop {
            let Ok(key) = input_term.read_key() else {
                break;
            };
            let command = match key {
                Key::Char('r') | Key::Char('R') => Command::ToggleReady,
                Key::Char('s') | Key::Char('S') => Command::SwapRoles,
                Key::Char('g') | Key::Char('G') => Command::Start,
                Key::Char('1') => Command::End(Winner::Rabbit),
                Key::Char('2') => Command::End(Winner::Mole),
                Key::Char('3') => Command::End(Winner::Both),
                Key::Char('0') => Command::End(Winner::None),
                Key::Char('l') | Key::Char('L') => Command::Lobby,
                Key::Char('p') | Key::Char('P') => Command::Players,
                Key::Char('q') | Key::Char('Q') => Command::Quit,
                _ => continue,
            };
            if command_tx.send(command).is_err() {
                break;
            }
            if matches!(command, Command::Quit) {
                break;
            }
        }
    });

    let mut interval = tokio::time::interval(tick);
    let mut ready = false;

    // Main tick loop - applies commands, then drives the session
    'main: loop {
        interval.tick().await;

        for command in command_rx.try_iter() {
            match command {
                Command::ToggleReady => {
                    ready = !ready;
                    if duel.set_ready(ready) {
                        println!("→ {}", if ready { "Ready" } else { "Not ready" });
                    }
                }
                Command::SwapRoles => {
                    let roles_nonce = duel.swap_roles();
                    if roles_nonce == 0 {
                        println!("→ Only the host can swap roles");
                    } else {
                        ready = false;
                        println!("→ Roles swapped, everyone has to ready up again");
                    }
                }
                Command::Start => {
                    if !duel.can_host_start() {
                        println!("→ Waiting for the opponent to be ready");
                        continue;
                    }
                    let map_id = rand::random_range(1..=5);
                    let day = rand::random_range(1..=7);
                    if duel.request_start(map_id, day) == 0 {
                        println!("→ Only the host can start, with two players in the session");
                    }
                }
                Command::End(winner) => {
                    if duel.publish_end(winner) == 0 {
                        println!("→ Only the host can end a game in progress, once");
                    }
                }
                Command::Lobby => {
                    duel.return_to_lobby();
                    ready = false;
                    print_players(&duel.players(), args.json)?;
                }
                Command::Players => {
                    println!("Status: {}", duel.status());
                    print_players(&duel.players(), args.json)?;
                }
                Command::Quit => {
                    println!("→ Quit requested");
                    break 'main;
                }
            }
        }

        let now = Instant::now();
        let mut events = Vec::new();
        if duel.driver_mut().poll_scene_shown(now) {
            events.extend(duel.on_gameplay_scene_shown(now));
        }
        events.extend(duel.tick(now));
        for event in &events {
            print_event("you", event, duel.state().local_role());
        }
        // Only refresh the lobby view while nobody is loading or playing
        let in_lobby = !duel.driver().in_game() && !duel.driver().is_busy();
        if in_lobby && events.contains(&DuelEvent::LobbyChanged) {
            print_players(&duel.players(), args.json)?;
        }
    }

    duel.leave();

    // Wait for keyboard task to finish
    keyboard_task.abort();
    let _ = keyboard_task.await;

    println!("Goodbye!");
    Ok(())
}
