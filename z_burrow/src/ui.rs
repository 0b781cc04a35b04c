use console::style;
use zenoh_duel::{DuelEvent, PlayerInfo, Role, Winner};

pub fn print_event(label: &str, event: &DuelEvent, role: Option<Role>) {
    match event {
        // Lobby refreshes are printed on demand
        DuelEvent::LobbyChanged => {}
        DuelEvent::RoundOpened(request) => println!(
            "[{}] host opened round {} (map {}, day {})",
            label, request.start_nonce, request.map_id, request.day
        ),
        DuelEvent::Started { start_nonce } => {
            println!("[{}] round {} started on both sides", label, start_nonce)
        }
        DuelEvent::Ended(outcome) => {
            let verdict = match role {
                _ if outcome.winner == Winner::None => style("nobody wins").dim(),
                Some(role) if outcome.winner.includes(role) => style("you win").green().bold(),
                Some(_) => style("you lose").red().bold(),
                None => style("result unknown").dim(),
            };
            println!("[{}] round over: {} ({:?})", label, verdict, outcome.reason)
        }
    }
}

pub fn print_players(players: &[PlayerInfo], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(players)?);
        return Ok(());
    }
    if players.is_empty() {
        println!("  (nobody here)");
    }
    for player in players {
        let ready = if player.ready {
            style("ready").green()
        } else {
            style("not ready").red()
        };
        let host = if player.is_host { " [host]" } else { "" };
        let name = if player.name.is_empty() {
            player.id.as_str()
        } else {
            player.name.as_str()
        };
        println!("  {:<14} {:<7} {}{}", name, player.role.to_string(), ready, host);
    }
    Ok(())
}
