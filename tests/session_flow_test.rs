//! End-to-end sessions against the in-memory store with paused time.

use std::sync::Arc;
use std::time::Duration;
use strictly_sync::{
    Board, GameState, GameStatus, MatchSession, MatchStateData, MemoryStore, MoveError, Presence,
    Role, RunningSession, SessionEvent, SessionPhase, SyncConfig, TurnCount, spawn_session,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const MATCH: &str = "alice_bob";

fn session(role: Role) -> MatchSession {
    let (local, remote) = match role {
        Role::X => ("alice", "bob"),
        Role::O => ("bob", "alice"),
    };
    MatchSession::new(MATCH.to_string(), role, local.to_string(), remote.to_string()).unwrap()
}

async fn start(role: Role, store: &Arc<MemoryStore>) -> RunningSession {
    spawn_session(session(role), SyncConfig::new(), Arc::clone(store))
        .await
        .unwrap()
}

/// Receives events until one matches, failing after a minute of game time.
async fn wait_for(
    events: &mut UnboundedReceiver<SessionEvent>,
    mut matches: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(Duration::from_secs(60), async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_for_board(events: &mut UnboundedReceiver<SessionEvent>, expected: &str) {
    wait_for(events, |e| matches!(e, SessionEvent::BoardChanged(b) if b.encode() == expected))
        .await;
}

async fn wait_for_turn(events: &mut UnboundedReceiver<SessionEvent>, role: Role) {
    wait_for(events, |e| matches!(e, SessionEvent::TurnChanged(r) if *r == role)).await;
}

/// Plays `moves` alternately, starting with X, waiting for each move to
/// reach the other session before the next one.
async fn play_out(x: &mut RunningSession, o: &mut RunningSession, moves: &[(usize, &str)]) {
    for (i, (index, board)) in moves.iter().enumerate() {
        let (mover, watcher) = if i % 2 == 0 {
            (&mut *x, &mut *o)
        } else {
            (&mut *o, &mut *x)
        };
        mover.handle.request_move(*index).await.unwrap();
        wait_for_board(&mut watcher.events, board).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_game_reaches_both_sessions() {
    let store = Arc::new(MemoryStore::new());
    let mut x = start(Role::X, &store).await;
    let mut o = start(Role::O, &store).await;

    play_out(
        &mut x,
        &mut o,
        &[
            (0, "X--------"),
            (3, "X--O-----"),
            (1, "XX-O-----"),
            (4, "XX-OO----"),
        ],
    )
    .await;

    wait_for_turn(&mut x.events, Role::X).await;
    x.handle.request_move(2).await.unwrap();
    let outcome = wait_for(&mut o.events, |e| matches!(e, SessionEvent::Terminal(_))).await;
    assert!(matches!(outcome, SessionEvent::Terminal(GameStatus::Won(Role::X))));

    assert_eq!(
        o.handle.request_move(8).await,
        Err(MoveError::SessionTerminal)
    );
    let stored = store.state(MATCH).unwrap();
    assert_eq!(stored.board().encode(), "XXXOO----");
    assert_eq!(stored.move_count(), 5);
    let roles = store.roles(MATCH).unwrap();
    assert_eq!(roles.player_x(), "alice");
    assert_eq!(roles.player_o(), "bob");
}

#[tokio::test(start_paused = true)]
async fn test_rematch_after_loss() {
    let store = Arc::new(MemoryStore::new());
    store.insert_state(MATCH, GameState::from_parts("XX-OO----".parse().unwrap(), Role::X, 4));
    let mut x = start(Role::X, &store).await;
    let mut o = start(Role::O, &store).await;

    x.handle.request_move(2).await.unwrap();
    wait_for(&mut o.events, |e| matches!(e, SessionEvent::Terminal(_))).await;

    o.handle.request_reset().await.unwrap();
    wait_for(&mut x.events, |e| {
        matches!(e, SessionEvent::PhaseChanged(SessionPhase::Fresh))
    })
    .await;
    wait_for_board(&mut x.events, "---------").await;

    x.handle.request_move(4).await.unwrap();
    wait_for_board(&mut o.events, "----X----").await;
    assert_eq!(store.resets(MATCH).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_stored_game() {
    let store = Arc::new(MemoryStore::new());
    let stored = GameState::from_parts("X---O----".parse().unwrap(), Role::X, 2);
    store.insert_state(MATCH, stored);

    let mut x = start(Role::X, &store).await;
    let mut phases = Vec::new();
    let mut board = Board::new();
    loop {
        match x.events.recv().await.unwrap() {
            SessionEvent::PhaseChanged(phase) => {
                phases.push(phase);
                if phase == SessionPhase::Active {
                    break;
                }
            }
            SessionEvent::BoardChanged(b) => board = b,
            _ => {}
        }
    }
    assert_eq!(
        phases,
        vec![
            SessionPhase::Loading,
            SessionPhase::Resuming,
            SessionPhase::Active
        ]
    );
    assert_eq!(board, *stored.board());

    x.handle.request_move(8).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.state(MATCH).unwrap().move_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_finished_game_is_reset_on_load() {
    let store = Arc::new(MemoryStore::new());
    store.insert_state(MATCH, GameState::from_parts("XXXOO----".parse().unwrap(), Role::X, 5));

    let mut o = start(Role::O, &store).await;
    wait_for(&mut o.events, |e| {
        matches!(e, SessionEvent::PhaseChanged(SessionPhase::Fresh))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(store.state(MATCH), Some(GameState::new()));
    let resets = store.resets(MATCH);
    assert_eq!(resets.len(), 1);
    assert_eq!(resets[0].player_x, "alice");
    assert_eq!(resets[0].player_o, "bob");
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_store_starts_fresh() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);

    let mut x = start(Role::X, &store).await;
    wait_for(&mut x.events, |e| matches!(e, SessionEvent::SyncFailed(_))).await;
    wait_for(&mut x.events, |e| {
        matches!(e, SessionEvent::PhaseChanged(SessionPhase::Active))
    })
    .await;
    assert_eq!(x.handle.request_move(4).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_opponent_goes_offline() {
    let store = Arc::new(MemoryStore::new());
    let mut x = start(Role::X, &store).await;
    let o = start(Role::O, &store).await;

    // Both sessions heartbeat once, then O disappears.
    tokio::time::sleep(Duration::from_secs(6)).await;
    o.handle.leave();

    let event = wait_for(&mut x.events, |e| matches!(e, SessionEvent::OpponentPresence(_))).await;
    assert!(matches!(
        event,
        SessionEvent::OpponentPresence(Presence::PossiblyOffline)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_push_is_resent() {
    let store = Arc::new(MemoryStore::new());
    store.fail_next_updates(1);
    let mut x = start(Role::X, &store).await;
    let mut o = start(Role::O, &store).await;

    x.handle.request_move(4).await.unwrap();
    wait_for(&mut x.events, |e| matches!(e, SessionEvent::SyncFailed(_))).await;

    // Lock released: the rejection is about the turn, not a pending write.
    assert_eq!(x.handle.request_move(0).await, Err(MoveError::NotMyTurn));

    wait_for_board(&mut o.events, "----X----").await;
    o.handle.request_move(0).await.unwrap();
    wait_for_board(&mut x.events, "O---X----").await;

    let updates = store.updates(MATCH);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].board_state, "----X----");
    assert_eq!(updates[0].player_x.as_deref(), Some("alice"));
    assert_eq!(x.handle.request_move(8).await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_midgame_reset_reaches_opponent() {
    let store = Arc::new(MemoryStore::new());
    let mut x = start(Role::X, &store).await;
    let mut o = start(Role::O, &store).await;

    play_out(&mut x, &mut o, &[(0, "X--------"), (4, "X---O----")]).await;

    x.handle.request_reset().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    x.handle.request_move(8).await.unwrap();

    wait_for_board(&mut o.events, "--------X").await;
    assert_eq!(o.handle.request_move(0).await, Ok(()));
    wait_for_board(&mut x.events, "O-------X").await;
    assert_eq!(x.handle.request_move(1).await, Ok(()));
    wait_for_board(&mut o.events, "OX------X").await;
    assert_eq!(store.resets(MATCH).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_then_recovery() {
    let store = Arc::new(MemoryStore::new());
    let mut x = start(Role::X, &store).await;
    let mut o = start(Role::O, &store).await;

    play_out(&mut x, &mut o, &[(0, "X--------")]).await;

    store.set_available(false);
    for _ in 0..3 {
        wait_for(&mut x.events, |e| matches!(e, SessionEvent::SyncFailed(_))).await;
    }
    assert_eq!(x.handle.request_move(1).await, Err(MoveError::NotMyTurn));

    store.set_available(true);
    o.handle.request_move(4).await.unwrap();
    wait_for_board(&mut x.events, "X---O----").await;
    assert_eq!(x.handle.request_move(8).await, Ok(()));
    wait_for_board(&mut o.events, "X---O---X").await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_store_record_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let mut x = start(Role::X, &store).await;
    let mut o = start(Role::O, &store).await;

    play_out(&mut x, &mut o, &[(0, "X--------")]).await;

    store.put_raw(
        MATCH,
        MatchStateData {
            board_state: "XXXXX----".to_string(),
            turn: "O".to_string(),
            turn_count: TurnCount::Text("5".to_string()),
            ..MatchStateData::default()
        },
    );
    let event = wait_for(&mut x.events, |e| matches!(e, SessionEvent::SyncFailed(_))).await;
    assert!(matches!(event, SessionEvent::SyncFailed(e) if e.is_malformed()));
    assert_eq!(x.handle.request_move(1).await, Err(MoveError::NotMyTurn));

    // The next accepted write replaces the bad record.
    o.handle.request_move(4).await.unwrap();
    wait_for_board(&mut x.events, "X---O----").await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_moves_rejected() {
    let store = Arc::new(MemoryStore::new());
    let x = start(Role::X, &store).await;
    let o = start(Role::O, &store).await;

    assert_eq!(x.handle.request_move(9).await, Err(MoveError::OutOfBounds(9)));
    assert_eq!(o.handle.request_move(0).await, Err(MoveError::NotMyTurn));
    x.handle.request_move(0).await.unwrap();
    // Rejected whether or not the first push has been acknowledged yet.
    assert!(matches!(
        x.handle.request_move(1).await,
        Err(MoveError::MoveAlreadyPending | MoveError::NotMyTurn)
    ));
    x.handle.request_move(0).await.unwrap_err();
}

#[tokio::test(start_paused = true)]
async fn test_leave_closes_session() {
    let store = Arc::new(MemoryStore::new());
    let mut x = start(Role::X, &store).await;
    x.handle.leave();
    wait_for(&mut x.events, |e| {
        matches!(e, SessionEvent::PhaseChanged(SessionPhase::Closed))
    })
    .await;
    x.task.await.unwrap();

    assert_eq!(x.handle.request_move(0).await, Err(MoveError::SessionClosed));
    assert_eq!(x.handle.request_reset().await, Err(MoveError::SessionClosed));
}

#[tokio::test]
async fn test_missing_match_id_is_rejected() {
    let err = MatchSession::new(
        String::new(),
        Role::X,
        "alice".to_string(),
        "bob".to_string(),
    )
    .unwrap_err();
    assert!(err.message.contains("Match ID"));

    let store = Arc::new(MemoryStore::new());
    let config = SyncConfig::new().with_poll_interval(Duration::ZERO);
    assert!(spawn_session(session(Role::X), config, store).await.is_err());
}
