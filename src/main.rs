//! Strictly Sync - terminal client
//!
//! Plays one side of a match against the hosted store, or runs a local
//! two-session demo against an in-memory store.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use std::time::Duration;
use strictly_sync::{
    Board, GameStatus, HttpStore, MatchSession, MemoryStore, MoveError, Position, Role,
    RunningSession, SessionEvent, SyncConfig, spawn_session,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    initialize_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Play {
            match_id,
            role,
            player_id,
            opponent_id,
            store_url,
            poll_interval_ms,
            config,
        } => {
            let session = MatchSession::new(match_id, role, player_id, opponent_id)?;
            let config = load_config(config.as_deref(), store_url, poll_interval_ms)?;
            run_play(session, config).await
        }
        Command::Demo { poll_interval_ms } => run_demo(poll_interval_ms).await,
    }
}

#[instrument]
fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strictly_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Tracing initialized");
}

#[instrument(skip(store_url))]
fn load_config(
    path: Option<&std::path::Path>,
    store_url: Option<String>,
    poll_interval_ms: Option<u64>,
) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => SyncConfig::from_file(path)?,
        None => {
            info!("No config file given, using defaults");
            SyncConfig::new()
        }
    };

    if let Some(url) = store_url {
        info!(url = %url, "Overriding store URL");
        config = config.with_store_url(url);
    }
    if let Some(ms) = poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    config.validate()?;
    Ok(config)
}

/// Plays against the hosted store, reading moves from stdin.
#[instrument(skip_all, fields(match_id = %session.match_id(), role = %session.local_role()))]
async fn run_play(session: MatchSession, config: SyncConfig) -> Result<()> {
    let role = *session.local_role();
    let store = Arc::new(HttpStore::from_config(&config)?);
    let RunningSession {
        handle,
        mut events,
        task,
    } = spawn_session(session, config, store).await?;

    println!("You are {}. Enter a cell 0-8, 'r' to reset, 'q' to quit.", role);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    handle.leave();
                    break;
                };
                match line.trim() {
                    "q" => {
                        handle.leave();
                        break;
                    }
                    "r" => {
                        if let Err(e) = handle.request_reset().await {
                            println!("Cannot reset: {}", e);
                        }
                    }
                    "" => {}
                    input => match input.parse::<usize>() {
                        Ok(index) => {
                            if let Err(e) = handle.request_move(index).await {
                                println!("{}", e);
                            }
                        }
                        Err(_) => println!("Unknown command {:?}", input),
                    },
                }
            }
        }
    }

    task.await?;
    info!("Session ended");
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::BoardChanged(board) => println!("\n{}\n", board.display()),
        SessionEvent::TurnChanged(role) => println!("{} to move", role),
        SessionEvent::Terminal(GameStatus::Won(role)) => println!("{} wins! 'r' for a rematch.", role),
        SessionEvent::Terminal(status) => println!("Game over: {}. 'r' for a rematch.", status),
        SessionEvent::PhaseChanged(phase) => debug!(%phase, "Phase changed"),
        SessionEvent::OpponentPresence(presence) => println!("Opponent is {}", presence),
        SessionEvent::SyncFailed(e) => debug!(error = %e, "Sync failed"),
    }
}

/// Runs both sides of a match in-process until the game ends.
#[instrument]
async fn run_demo(poll_interval_ms: u64) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = SyncConfig::new().with_poll_interval(Duration::from_millis(poll_interval_ms));

    let x = MatchSession::new(
        "demo_match".to_string(),
        Role::X,
        "alice".to_string(),
        "bob".to_string(),
    )?;
    let o = MatchSession::new(
        "demo_match".to_string(),
        Role::O,
        "bob".to_string(),
        "alice".to_string(),
    )?;

    let x = spawn_session(x, config.clone(), Arc::clone(&store)).await?;
    let o = spawn_session(o, config, Arc::clone(&store)).await?;

    let (x_result, o_result) = tokio::join!(autoplay(Role::X, x), autoplay(Role::O, o));
    let (x_status, o_status) = (x_result?, o_result?);
    if x_status != o_status {
        warn!(%x_status, %o_status, "Sessions disagree on the outcome");
    }

    if let Some(state) = store.state("demo_match") {
        println!("{}\n", state.board().display());
    }
    println!("Result: {}", x_status);
    Ok(())
}

/// Takes the first free cell whenever it is `role`'s turn.
#[instrument(skip(running))]
async fn autoplay(role: Role, running: RunningSession) -> Result<GameStatus> {
    let RunningSession {
        handle,
        mut events,
        task,
    } = running;
    let mut board = Board::new();
    let mut turn = Role::X;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::BoardChanged(next) => board = next,
            SessionEvent::TurnChanged(next) => turn = next,
            SessionEvent::Terminal(status) => {
                info!(%status, "Game finished");
                handle.leave();
                task.await?;
                return Ok(status);
            }
            other => debug!(?other, "Session event"),
        }

        if turn != role {
            continue;
        }
        let Some(position) = Position::valid_moves(&board).first().copied() else {
            continue;
        };
        match handle.request_move(position.to_index()).await {
            Ok(()) => info!(%position, "Played"),
            Err(MoveError::MoveAlreadyPending | MoveError::NotMyTurn) => {
                debug!("Move not accepted yet")
            }
            Err(e) => warn!(error = %e, "Move rejected"),
        }
    }

    anyhow::bail!("Session for {} ended before the game finished", role)
}
