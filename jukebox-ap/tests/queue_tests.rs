//! Queue worker tests: ids, auto-advance and change notifications

mod helpers;

use helpers::{eventually, MockBackend, MockScript, LIMIT};
use jukebox_ap::playback::{Event, Player, PlayerState, Queue};
use jukebox_common::{Subscriber, Tee};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

struct Fixture {
    player: Player,
    queue: Queue,
    tee: Tee<Event>,
    script: Arc<Mutex<MockScript>>,
}

async fn setup(script: MockScript) -> Fixture {
    let (backend, script) = MockBackend::new(script);
    let (player, events) = Player::spawn(Box::new(backend), 1000).unwrap();
    let tee = Tee::from_receiver(events);
    let queue_events = tee.subscribe(16).await;
    let queue = Queue::spawn(player.clone(), queue_events);
    Fixture {
        player,
        queue,
        tee,
        script,
    }
}

fn filenames(queue: &[jukebox_ap::playback::QueueElem]) -> Vec<&str> {
    queue.iter().map(|e| e.filename.as_str()).collect()
}

async fn wait_playing(f: &Fixture, path: &str) {
    eventually(|| async {
        let status = f.player.status().await.unwrap();
        status.state == PlayerState::Playing && status.path == path
    })
    .await;
}

/// Wait for the next `QueueChange`, skipping other events
async fn next_queue_change(sub: &mut Subscriber<Event>) {
    timeout(LIMIT, async {
        loop {
            match sub.recv().await {
                Some(Event::QueueChange) => return,
                Some(_) => {}
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("no QueueChange event");
}

#[tokio::test]
async fn test_enqueue_into_empty_player_starts_playback() {
    let f = setup(MockScript::default()).await;

    f.queue.enqueue("a.mp3").await.unwrap();
    wait_playing(&f, "a.mp3").await;

    assert!(f.queue.list().await.unwrap().is_empty());
    f.player.stop().await.unwrap();
}

#[tokio::test]
async fn test_ids_survive_reordering() {
    let f = setup(MockScript::default()).await;

    f.queue.enqueue("x.mp3").await.unwrap();
    wait_playing(&f, "x.mp3").await;

    for name in ["a.mp3", "b.mp3", "c.mp3"] {
        f.queue.enqueue(name).await.unwrap();
    }
    let before = f.queue.list().await.unwrap();
    assert_eq!(filenames(&before), vec!["a.mp3", "b.mp3", "c.mp3"]);
    assert_eq!(
        before.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    f.queue.move_entries(vec![2], -1).await.unwrap();
    let moved = f.queue.list().await.unwrap();
    assert_eq!(filenames(&moved), vec!["a.mp3", "c.mp3", "b.mp3"]);
    assert_eq!(moved.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3, 2]);

    f.queue.remove(vec![0]).await.unwrap();
    let removed = f.queue.list().await.unwrap();
    assert_eq!(removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 2]);

    f.player.stop().await.unwrap();
}

#[tokio::test]
async fn test_move_to_top_through_worker() {
    let f = setup(MockScript::default()).await;

    f.queue.enqueue("x.mp3").await.unwrap();
    wait_playing(&f, "x.mp3").await;

    for name in ["a", "b", "c", "d"] {
        f.queue.enqueue(name).await.unwrap();
    }
    f.queue.move_to_top(vec![2, 3]).await.unwrap();
    assert_eq!(
        filenames(&f.queue.list().await.unwrap()),
        vec!["b", "d", "a", "c"]
    );

    f.player.stop().await.unwrap();
}

#[tokio::test]
async fn test_queue_advances_when_track_ends() {
    let f = setup(MockScript {
        blocks: 3,
        ..Default::default()
    })
    .await;

    f.queue.enqueue("a.mp3").await.unwrap();
    f.queue.enqueue("b.mp3").await.unwrap();

    let script = f.script.clone();
    eventually(|| {
        let script = script.clone();
        async move { script.lock().unwrap().opened.len() == 2 }
    })
    .await;

    eventually(|| async { f.player.status().await.unwrap().state == PlayerState::Empty }).await;
    assert_eq!(
        f.script.lock().unwrap().opened,
        vec!["a.mp3".to_string(), "b.mp3".to_string()]
    );
    assert!(f.queue.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_does_not_stop_playback() {
    let f = setup(MockScript::default()).await;

    f.queue.enqueue("x.mp3").await.unwrap();
    wait_playing(&f, "x.mp3").await;
    f.queue.enqueue("a.mp3").await.unwrap();

    f.queue.clear().await.unwrap();
    assert!(f.queue.list().await.unwrap().is_empty());
    assert_eq!(f.player.status().await.unwrap().state, PlayerState::Playing);

    f.player.stop().await.unwrap();
}

#[tokio::test]
async fn test_every_mutation_publishes_queue_change() {
    let f = setup(MockScript::default()).await;

    // A paused track keeps the queue from feeding the player.
    f.player.load("x.mp3").await.unwrap();
    let mut sub = f.tee.subscribe(1000).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    while sub.try_recv().is_ok() {}

    f.queue.enqueue("a.mp3").await.unwrap();
    next_queue_change(&mut sub).await;

    // Out of range: nothing moves, subscribers still hear about it.
    f.queue.move_entries(vec![7], 1).await.unwrap();
    next_queue_change(&mut sub).await;

    f.queue.remove(vec![0]).await.unwrap();
    next_queue_change(&mut sub).await;

    f.queue.clear().await.unwrap();
    next_queue_change(&mut sub).await;

    assert!(f.queue.list().await.unwrap().is_empty());
    assert_eq!(f.player.status().await.unwrap().state, PlayerState::Paused);
}
