//! protoshard: a single-process demo shard.
//!
//! Boots the demo classes, loads a zone file, spawns one player character,
//! and feeds stdin lines through the command registry. No networking: the
//! broker/gateway layer of a real deployment is out of scope here.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn, Level};

use mudcore::{ActionError, World};

mod commands;
mod loader;

const DEFAULT_WORLD: &str = include_str!("../world/keep.yaml");

fn usage_and_exit() -> ! {
    eprintln!(
        "protoshard\n\n\
USAGE:\n  protoshard [--player NAME] [--world FILE]\n\n\
ENV:\n  PLAYER_NAME                 default wanderer\n  WORLD_FILE                  default: embedded proto_keep zone\n"
    );
    std::process::exit(2);
}

#[derive(Clone, Debug)]
struct Config {
    player: String,
    world_file: Option<PathBuf>,
}

fn parse_args() -> Config {
    let mut player = std::env::var("PLAYER_NAME").unwrap_or_else(|_| "wanderer".to_string());
    let mut world_file: Option<PathBuf> = std::env::var("WORLD_FILE").ok().map(PathBuf::from);

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--player" => {
                player = it.next().unwrap_or_else(|| usage_and_exit());
            }
            "--world" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                world_file = Some(PathBuf::from(v));
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config { player, world_file }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,protoshard=warn".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();

    let world_src = match &cfg.world_file {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("read world file: {}", p.display()))?,
        None => DEFAULT_WORLD.to_string(),
    };

    let mut world = World::new(commands::define_classes()?);
    let zone = loader::load_world(&mut world, &world_src)?;
    info!(zone = %zone.zone_id, rooms = zone.room_count, "zone loaded");

    let hero = world
        .classes
        .by_name("hero")
        .context("hero class missing")?;
    let player = world
        .spawn_actor(&cfg.player, hero, &zone.start_room)
        .context("spawn player")?;

    println!("{} — {}", zone.zone_name, zone.zone_id);
    println!("you are {}. type `help` for commands, `quit` to leave.\n", cfg.player);
    print!("{}", world.render_room(&zone.start_room));

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let mut toks = line.split_whitespace().map(|s| s.to_string());
        let Some(verb) = toks.next() else { continue };
        let tokens: Vec<String> = toks.collect();

        match world.dispatch(player, &verb, &tokens) {
            Ok(msg) => {
                print!("{}", with_newline(msg));
            }
            Err(ActionError::Reply(msg)) => {
                print!("{}", with_newline(msg));
            }
            Err(ActionError::Logic(msg)) => {
                warn!(err = %msg, verb = %verb, "dispatch failed");
                println!("something grinds in the machinery of the world.");
            }
        }
    }

    println!("goodbye.");
    Ok(())
}

fn with_newline(mut s: String) -> String {
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_newline_appends_exactly_once() {
        assert_eq!(with_newline("hi".to_string()), "hi\n");
        assert_eq!(with_newline("hi\n".to_string()), "hi\n");
        assert_eq!(with_newline(String::new()), "\n");
    }
}
