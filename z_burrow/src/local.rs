//! Both peers in one process over the memory store

use std::time::{Duration, Instant};

use zenoh_duel::store::{MemoryHub, MemoryStore};
use zenoh_duel::{DuelConfig, DuelEvent, DuelSession, MemberId, Winner};

use crate::driver::BurrowDriver;
use crate::ui::{print_event, print_players};

type LocalPeer = DuelSession<MemoryStore, BurrowDriver>;

/// Upper bound on ticks spent waiting for one phase of the script
const MAX_TICKS: usize = 500;

fn peer(hub: &MemoryHub, label: &str, config: &DuelConfig, load_time: Duration) -> anyhow::Result<LocalPeer> {
    let id = MemberId::from_name(format!("{}_{}", label, rand::random_range(0..1000)))?;
    Ok(DuelSession::new(
        hub.connect(id),
        BurrowDriver::new(label, load_time),
        config.clone(),
    ))
}

fn step(label: &str, peer: &mut LocalPeer, now: Instant) -> Vec<DuelEvent> {
    let mut events = Vec::new();
    if peer.driver_mut().poll_scene_shown(now) {
        events.extend(peer.on_gameplay_scene_shown(now));
    }
    events.extend(peer.tick(now));
    for event in &events {
        print_event(label, event, peer.state().local_role());
    }
    events
}

/// Tick both peers until `done` holds or the tick budget runs out
async fn run_until(
    host: &mut LocalPeer,
    guest: &mut LocalPeer,
    interval: &mut tokio::time::Interval,
    mut done: impl FnMut(&LocalPeer, &LocalPeer) -> bool,
) -> anyhow::Result<()> {
    for _ in 0..MAX_TICKS {
        if done(host, guest) {
            return Ok(());
        }
        interval.tick().await;
        let now = Instant::now();
        step("host", host, now);
        step("guest", guest, now);
    }
    anyhow::bail!("scenario stalled after {} ticks", MAX_TICKS)
}

pub async fn run(config: DuelConfig, tick: Duration, load_time: Duration, json: bool) -> anyhow::Result<()> {
    let hub = MemoryHub::new();
    let mut host = peer(&hub, "host", &config, load_time)?;
    // The guest takes a bit longer to load so the barrier is visible
    let mut guest = peer(&hub, "guest", &config, load_time * 2)?;
    let mut interval = tokio::time::interval(tick);

    let session_id = host.create()?;
    guest.join(&session_id)?;
    println!("Session {} with two local peers", session_id);

    guest.set_ready(true);
    println!("Guest is ready:");
    print_players(&host.players(), json)?;

    host.swap_roles();
    println!("Host swapped roles, the guest's vote no longer counts:");
    print_players(&host.players(), json)?;

    guest.set_ready(true);
    println!("Guest readied again, host can start: {}", host.can_host_start());

    let map_id = rand::random_range(1..=5);
    let round = host.request_start(map_id, 2);
    anyhow::ensure!(round != 0, "host could not open a round");

    run_until(&mut host, &mut guest, &mut interval, |h, g| {
        h.driver().in_game() && g.driver().in_game()
    })
    .await?;

    let winner = match rand::random_range(0..3) {
        0 => Winner::Rabbit,
        1 => Winner::Mole,
        _ => Winner::Both,
    };
    host.publish_end(winner);
    run_until(&mut host, &mut guest, &mut interval, |_, g| g.outcome().is_some()).await?;

    host.return_to_lobby();
    guest.return_to_lobby();
    println!("Back in the lobby:");
    print_players(&host.players(), json)?;

    guest.leave();
    host.leave();
    Ok(())
}
