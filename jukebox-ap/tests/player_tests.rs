//! Player state machine tests against the scripted backend

mod helpers;

use helpers::{drain_events, next_event, next_state, MockBackend, MockScript, LIMIT};
use jukebox_ap::playback::{Event, Player, PlayerState};
use std::time::{Duration, Instant};
use tokio::time::timeout;

const QUIET: Duration = Duration::from_millis(100);

fn spawn(script: MockScript) -> (Player, tokio::sync::mpsc::Receiver<Event>, std::sync::Arc<std::sync::Mutex<MockScript>>) {
    let (backend, script) = MockBackend::new(script);
    let (player, events) = Player::spawn(Box::new(backend), 1000).unwrap();
    (player, events, script)
}

fn state_changes(events: &[Event]) -> Vec<PlayerState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StateChange(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_commands_in_empty_state_are_noops() {
    let (player, mut events, _script) = spawn(MockScript::default());

    player.play().await.unwrap();
    player.pause().await.unwrap();
    player.stop().await.unwrap();
    player.seek(1000).await.unwrap();
    assert_eq!(player.info().await.unwrap(), None);

    let status = player.status().await.unwrap();
    assert_eq!(status.state, PlayerState::Empty);
    assert_eq!(status.path, "");
    assert_eq!(status.offset, 0);
    assert_eq!(status.size, 0);

    assert!(drain_events(&mut events, QUIET).await.is_empty());
}

#[tokio::test]
async fn test_load_play_pause_stop() {
    let (player, mut events, script) = spawn(MockScript::default());

    let size = player.load("a.mp3").await.unwrap();
    assert_eq!(size, 10_000 * 1152);
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);

    let status = player.status().await.unwrap();
    assert_eq!(status.state, PlayerState::Paused);
    assert_eq!(status.path, "a.mp3");
    assert_eq!(status.size, size);
    assert_eq!(status.volume, 50);

    player.play().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Playing);

    player.pause().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);

    player.stop().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Empty);

    assert!(state_changes(&drain_events(&mut events, QUIET).await).is_empty());
    assert_eq!(script.lock().unwrap().opened, vec!["a.mp3".to_string()]);
}

#[tokio::test]
async fn test_repeated_command_emits_one_state_change() {
    let (player, mut events, _script) = spawn(MockScript::default());

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    player.play().await.unwrap();
    player.pause().await.unwrap();
    player.pause().await.unwrap();

    let changes = state_changes(&drain_events(&mut events, QUIET).await);
    assert_eq!(
        changes,
        vec![PlayerState::Paused, PlayerState::Playing, PlayerState::Paused]
    );
}

#[tokio::test]
async fn test_load_supersedes_current_track() {
    let (player, mut events, _script) = spawn(MockScript::default());

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);
    assert_eq!(next_state(&mut events).await, PlayerState::Playing);

    player.load("b.mp3").await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Empty);
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);

    let status = player.status().await.unwrap();
    assert_eq!(status.path, "b.mp3");
    assert_eq!(status.state, PlayerState::Paused);
    assert_eq!(status.offset, 0);
}

#[tokio::test]
async fn test_load_failure_reports_error_and_stays_empty() {
    let (player, mut events, _script) = spawn(MockScript {
        fail_open: true,
        ..Default::default()
    });

    let err = player.load("missing.mp3").await.unwrap_err();
    assert!(err.to_string().starts_with("Creating reader failed"));

    match next_event(&mut events).await {
        Event::Error(msg) => assert!(msg.starts_with("Creating reader failed")),
        other => panic!("expected an error event, got {:?}", other),
    }
    assert_eq!(player.status().await.unwrap().state, PlayerState::Empty);
}

#[tokio::test]
async fn test_output_failure_on_load_leaves_player_empty() {
    let (player, mut events, _script) = spawn(MockScript {
        fail_output: true,
        ..Default::default()
    });

    let err = player.load("a.mp3").await.unwrap_err();
    assert!(err.to_string().starts_with("Creating writer failed"));

    let events = drain_events(&mut events, QUIET).await;
    assert!(state_changes(&events).is_empty());
    assert_eq!(player.status().await.unwrap().state, PlayerState::Empty);
}

#[tokio::test]
async fn test_play_fails_when_output_cannot_reopen() {
    let (player, mut events, script) = spawn(MockScript::default());

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    player.pause().await.unwrap();
    drain_events(&mut events, QUIET).await;

    script.lock().unwrap().fail_output = true;
    let err = player.play().await.unwrap_err();
    assert!(err.to_string().starts_with("Creating writer failed"));
    assert_eq!(player.status().await.unwrap().state, PlayerState::Paused);

    let events = drain_events(&mut events, QUIET).await;
    assert!(events.iter().any(|e| matches!(e, Event::Error(_))));
    assert!(state_changes(&events).is_empty());
}

#[tokio::test]
async fn test_natural_end_unloads_track() {
    let (player, mut events, _script) = spawn(MockScript {
        blocks: 5,
        ..Default::default()
    });

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);
    assert_eq!(next_state(&mut events).await, PlayerState::Playing);
    assert_eq!(next_state(&mut events).await, PlayerState::Empty);

    let status = player.status().await.unwrap();
    assert_eq!(status.state, PlayerState::Empty);
    assert_eq!(status.path, "");
}

#[tokio::test]
async fn test_repeat_restarts_track_at_natural_end() {
    let (player, mut events, script) = spawn(MockScript {
        blocks: 5,
        ..Default::default()
    });

    player.set_repeat(true).await.unwrap();
    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);
    assert_eq!(next_state(&mut events).await, PlayerState::Playing);

    // Let the track end at least once, then look for the rewind.
    tokio::time::sleep(Duration::from_millis(50)).await;
    loop {
        match next_event(&mut events).await {
            Event::OffsetChange(0) => break,
            Event::StateChange(s) => panic!("unexpected state change to {}", s),
            _ => {}
        }
    }

    assert_eq!(player.status().await.unwrap().state, PlayerState::Playing);
    assert_eq!(script.lock().unwrap().opened.len(), 1);
    player.stop().await.unwrap();
}

#[tokio::test]
async fn test_repeat_with_failing_seek_stops() {
    let (player, mut events, _script) = spawn(MockScript {
        blocks: 5,
        fail_seek: true,
        ..Default::default()
    });

    player.set_repeat(true).await.unwrap();
    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();

    let mut saw_error = false;
    loop {
        match next_event(&mut events).await {
            Event::Error(msg) => {
                assert!(msg.starts_with("Seeking failed"));
                saw_error = true;
            }
            Event::StateChange(PlayerState::Empty) => break,
            _ => {}
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn test_seek_publishes_offset() {
    let (player, mut events, _script) = spawn(MockScript::default());

    player.load("a.mp3").await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);

    player.seek(1000).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::OffsetChange(1000));
    assert_eq!(player.status().await.unwrap().offset, 1000);

    player.seek(-5).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::OffsetChange(0));
}

#[tokio::test]
async fn test_seek_failure_is_reported() {
    let (player, mut events, _script) = spawn(MockScript {
        fail_seek: true,
        ..Default::default()
    });

    player.load("a.mp3").await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);

    let err = player.seek(1000).await.unwrap_err();
    assert!(err.to_string().starts_with("Seeking failed"));
    assert!(matches!(next_event(&mut events).await, Event::Error(_)));
}

#[tokio::test]
async fn test_volume_change_is_published_after_success() {
    let (player, mut events, script) = spawn(MockScript::default());

    player.set_volume(30).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::VolumeChange(30));
    assert_eq!(player.volume().await.unwrap(), 30);

    player.set_volume_all(150).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::VolumeChange(100));

    script.lock().unwrap().fail_volume = true;
    let err = player.set_volume(10).await.unwrap_err();
    assert!(err.to_string().starts_with("Setting volume failed"));
    assert!(matches!(next_event(&mut events).await, Event::Error(_)));
    assert!(drain_events(&mut events, QUIET)
        .await
        .iter()
        .all(|e| !matches!(e, Event::VolumeChange(_))));
}

#[tokio::test]
async fn test_write_failure_keeps_playing() {
    let (player, mut events, _script) = spawn(MockScript {
        fail_write: true,
        ..Default::default()
    });

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();

    loop {
        if let Event::Error(msg) = next_event(&mut events).await {
            assert!(msg.starts_with("Writing to output failed"));
            break;
        }
    }
    assert_eq!(player.status().await.unwrap().state, PlayerState::Playing);
    player.stop().await.unwrap();
}

#[tokio::test]
async fn test_read_failure_reports_error_and_unloads() {
    let (player, mut events, script) = spawn(MockScript::default());

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);
    assert_eq!(next_state(&mut events).await, PlayerState::Playing);

    script.lock().unwrap().fail_read = true;

    loop {
        match next_event(&mut events).await {
            Event::Error(msg) => {
                assert!(msg.starts_with("Reading from input failed"));
                break;
            }
            Event::StateChange(state) => panic!("state changed to {} before the error", state),
            _ => {}
        }
    }
    assert_eq!(next_state(&mut events).await, PlayerState::Empty);
    assert_eq!(player.status().await.unwrap().path, "");
}

#[tokio::test]
async fn test_commands_served_between_slow_writes() {
    let (player, mut events, _script) = spawn(MockScript {
        write_delay: Duration::from_millis(50),
        ..Default::default()
    });

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();
    assert_eq!(next_state(&mut events).await, PlayerState::Paused);
    assert_eq!(next_state(&mut events).await, PlayerState::Playing);

    let start = Instant::now();
    player.pause().await.unwrap();
    let status = player.status().await.unwrap();
    assert_eq!(status.state, PlayerState::Paused);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_full_event_channel_does_not_block_commands() {
    let (backend, _script) = MockBackend::new(MockScript::default());
    let (player, _events) = Player::spawn(Box::new(backend), 1).unwrap();

    let commands = async {
        player.load("a.mp3").await.unwrap();
        for i in 0..20 {
            player.seek(i * 100).await.unwrap();
        }
        player.play().await.unwrap();
        player.stop().await.unwrap();
    };
    timeout(LIMIT, commands).await.expect("commands blocked on events");

    assert!(player.event_sender().dropped() > 0);
}

#[tokio::test]
async fn test_offset_changes_while_playing() {
    let (player, mut events, _script) = spawn(MockScript::default());

    player.load("a.mp3").await.unwrap();
    player.play().await.unwrap();

    let mut offsets = Vec::new();
    while offsets.len() < 2 {
        if let Event::OffsetChange(offset) = next_event(&mut events).await {
            offsets.push(offset);
        }
    }
    assert!(offsets[1] > offsets[0]);
    player.stop().await.unwrap();
}
