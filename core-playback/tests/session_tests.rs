mod common;

use bridge_traits::{Notification, VoiceSignal};
use common::*;
use core_async::time::{sleep, Duration};
use core_playback::{PlayAccepted, PlaybackError, PlaybackState, StateViolation};

fn titles(snapshot: &core_playback::QueueSnapshot) -> (Option<String>, Vec<String>) {
    (
        snapshot.now_playing.as_ref().map(|t| t.title().to_string()),
        snapshot
            .upcoming
            .iter()
            .map(|t| t.title().to_string())
            .collect(),
    )
}

// ============================================================================
// play
// ============================================================================

#[core_async::test]
async fn test_play_on_empty_session_connects_then_plays() {
    let h = Harness::new();
    let mut events = h.events.subscribe();
    let session = h.session("x");

    let accepted = session.play(channel("y"), track("Song1")).await.unwrap();
    assert_eq!(
        accepted,
        PlayAccepted {
            position: 1,
            started: true
        }
    );

    wait_for_state(&session, PlaybackState::Playing).await;
    let snapshot = session.snapshot();
    assert_eq!(titles(&snapshot), (Some("Song1".to_string()), vec![]));

    let seen = transitions(&drain_events(&mut events));
    assert_eq!(
        seen,
        vec![
            ("Idle".to_string(), "Connecting".to_string()),
            ("Connecting".to_string(), "Playing".to_string()),
        ]
    );

    eventually("now playing notification", || {
        h.notifier.sent_to("x") == vec![Notification::NowPlaying { track: track("Song1") }]
    })
    .await;
}

#[core_async::test]
async fn test_play_while_playing_only_enqueues() {
    let h = Harness::new();
    let session = h.session("g");

    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;

    let second = session.play(channel("v"), track("B")).await.unwrap();
    assert_eq!(
        second,
        PlayAccepted {
            position: 2,
            started: false
        }
    );
    assert_eq!(h.transport.connect_count(), 1);
    assert_eq!(
        titles(&session.snapshot()),
        (Some("A".to_string()), vec!["B".to_string()])
    );
}

#[core_async::test]
async fn test_queue_keeps_append_order_while_connecting() {
    let h = Harness::new();
    h.transport.hold("g");
    let session = h.session("g");

    let first = {
        let session = session.clone();
        core_async::spawn(async move { session.play(channel("v"), track("T1")).await })
    };
    wait_for_state(&session, PlaybackState::Connecting).await;

    for (n, title) in ["T2", "T3", "T4"].iter().enumerate() {
        let accepted = session.play(channel("v"), track(title)).await.unwrap();
        assert_eq!(accepted.position, n + 2);
        assert!(!accepted.started);
    }
    assert_eq!(
        titles(&session.snapshot()),
        (
            Some("T1".to_string()),
            vec!["T2".to_string(), "T3".to_string(), "T4".to_string()]
        )
    );

    h.transport.release("g");
    assert!(first.await.unwrap().unwrap().started);
    wait_for_state(&session, PlaybackState::Playing).await;
}

#[core_async::test]
async fn test_connect_failure_keeps_track_for_retry() {
    let h = Harness::new();
    h.transport.fail_with("missing permissions");
    let session = h.session("x");

    let err = session.play(channel("y"), track("Song")).await.unwrap_err();
    assert_eq!(err, PlaybackError::ConnectFailed("missing permissions".into()));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert_eq!(titles(&snapshot), (None, vec!["Song".to_string()]));
    assert!(h.resolver.opened().is_empty());

    h.transport.succeed();
    session.resume().await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    assert_eq!(
        titles(&session.snapshot()),
        (Some("Song".to_string()), vec![])
    );
}

#[core_async::test]
async fn test_next_play_retries_failed_connect() {
    let h = Harness::new();
    h.transport.fail_with("gateway down");
    let session = h.session("x");
    assert!(session.play(channel("y"), track("First")).await.is_err());

    h.transport.succeed();
    let accepted = session.play(channel("y"), track("Second")).await.unwrap();
    assert_eq!(
        accepted,
        PlayAccepted {
            position: 2,
            started: true
        }
    );
    wait_for_state(&session, PlaybackState::Playing).await;
    assert_eq!(
        titles(&session.snapshot()),
        (Some("First".to_string()), vec!["Second".to_string()])
    );
}

#[core_async::test]
async fn test_connect_timeout_is_a_connect_failure() {
    let config = core_playback::PlaybackConfig {
        connect_timeout: Duration::from_millis(30),
        ..test_config()
    };
    let h = Harness::with_config(config);
    h.transport.hold("slow");
    let session = h.session("slow");

    let err = session.play(channel("v"), track("Song")).await.unwrap_err();
    assert!(matches!(err, PlaybackError::ConnectFailed(ref reason) if reason.contains("timed out")));
    assert_eq!(session.snapshot().state, PlaybackState::Idle);
}

// ============================================================================
// Stream failures
// ============================================================================

#[core_async::test]
async fn test_broken_tracks_are_skipped_until_one_plays() {
    let h = Harness::new();
    h.resolver.break_track("bad1");
    h.resolver.break_track("bad2");
    h.transport.hold("g");
    let session = h.session("g");

    let first = {
        let session = session.clone();
        core_async::spawn(async move { session.play(channel("v"), track("bad1")).await })
    };
    wait_for_state(&session, PlaybackState::Connecting).await;
    session.play(channel("v"), track("bad2")).await.unwrap();
    session.play(channel("v"), track("good")).await.unwrap();
    h.transport.release("g");

    assert!(first.await.unwrap().is_ok());
    wait_for_state(&session, PlaybackState::Playing).await;
    assert_eq!(titles(&session.snapshot()), (Some("good".to_string()), vec![]));

    eventually("three notifications", || h.notifier.sent().len() == 3).await;
    let sent = h.notifier.sent();
    assert!(matches!(&sent[0], Notification::TrackFailed { track, .. } if track.title() == "bad1"));
    assert!(matches!(&sent[1], Notification::TrackFailed { track, .. } if track.title() == "bad2"));
    assert_eq!(sent[2], Notification::NowPlaying { track: track("good") });
}

#[core_async::test]
async fn test_all_broken_tracks_end_the_queue() {
    let h = Harness::new();
    h.resolver.break_track("bad");
    let session = h.session("g");

    session.play(channel("v"), track("bad")).await.unwrap();
    wait_for_state(&session, PlaybackState::Idle).await;

    eventually("queue ended notification", || {
        h.notifier.sent().contains(&Notification::QueueEnded)
    })
    .await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.is_empty());
    assert!(h.transport.binding("g").unwrap().is_disconnected());
}

#[core_async::test]
async fn test_failed_track_is_not_requeued_in_loop_mode() {
    let h = Harness::new();
    h.resolver.break_track("bad");
    let session = h.session("g");
    assert!(session.toggle_loop().await.unwrap());

    session.play(channel("v"), track("good")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("bad")).await.unwrap();

    let binding = h.transport.binding("g").unwrap();
    binding.finish();

    eventually("good replayed", || binding.play_count() == 2).await;
    let snapshot = session.snapshot();
    assert_eq!(titles(&snapshot), (Some("good".to_string()), vec![]));
    assert_eq!(snapshot.state, PlaybackState::Playing);
}

#[core_async::test]
async fn test_mid_playback_error_moves_on() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();

    let binding = h.transport.binding("g").unwrap();
    binding.fail("decoder crashed");

    eventually("B playing", || binding.play_count() == 2).await;
    assert_eq!(titles(&session.snapshot()), (Some("B".to_string()), vec![]));
    eventually("failure notice", || {
        h.notifier.sent().iter().any(|n| {
            matches!(n, Notification::TrackFailed { reason, .. } if reason == "decoder crashed")
        })
    })
    .await;
}

// ============================================================================
// Track finished and loop
// ============================================================================

#[core_async::test]
async fn test_finished_track_advances_to_next() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();

    let binding = h.transport.binding("g").unwrap();
    binding.finish();
    eventually("B playing", || binding.play_count() == 2).await;
    assert_eq!(titles(&session.snapshot()), (Some("B".to_string()), vec![]));

    binding.finish();
    wait_for_state(&session, PlaybackState::Idle).await;
    assert!(session.snapshot().is_empty());
    eventually("queue ended", || {
        h.notifier.sent().last() == Some(&Notification::QueueEnded)
    })
    .await;
    assert!(binding.is_disconnected());
}

#[core_async::test]
async fn test_loop_keeps_single_track_playing() {
    let h = Harness::new();
    let session = h.session("g");
    assert!(session.toggle_loop().await.unwrap());
    session.play(channel("v"), track("Only")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;

    let binding = h.transport.binding("g").unwrap();
    for round in 2..=3 {
        binding.finish();
        eventually("replay", || binding.play_count() == round).await;
    }

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(titles(&snapshot), (Some("Only".to_string()), vec![]));
    assert!(snapshot.loop_enabled);
}

#[core_async::test]
async fn test_loop_rotates_finished_track_to_tail() {
    let h = Harness::new();
    let session = h.session("g");
    session.toggle_loop().await.unwrap();
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();

    let binding = h.transport.binding("g").unwrap();
    binding.finish();
    eventually("B playing", || binding.play_count() == 2).await;
    assert_eq!(
        titles(&session.snapshot()),
        (Some("B".to_string()), vec!["A".to_string()])
    );
}

#[core_async::test]
async fn test_stale_finish_is_ignored() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();

    let binding = h.transport.binding("g").unwrap();
    let first = binding.last_token().unwrap();
    binding.finish();
    eventually("B playing", || binding.play_count() == 2).await;

    binding.signal(VoiceSignal::Finished { token: first });
    sleep(Duration::from_millis(30)).await;
    assert_eq!(titles(&session.snapshot()), (Some("B".to_string()), vec![]));
    assert_eq!(session.snapshot().state, PlaybackState::Playing);
}

// ============================================================================
// skip
// ============================================================================

#[core_async::test]
async fn test_skip_twice_lands_on_third_track() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("Song1")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("Song2")).await.unwrap();
    session.play(channel("v"), track("Song3")).await.unwrap();

    session.skip().await.unwrap();
    session.skip().await.unwrap();

    assert_eq!(
        titles(&session.snapshot()),
        (Some("Song3".to_string()), vec![])
    );
    let binding = h.transport.binding("g").unwrap();
    eventually("Song3 streaming", || {
        h.resolver.opened().iter().any(|source| source == "fake://Song3")
            && binding.play_count() == 2
    })
    .await;
}

#[core_async::test]
async fn test_skip_racing_finish_advances_once() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();
    session.play(channel("v"), track("C")).await.unwrap();

    // The fake binding reports the stopped stream as finished.
    session.skip().await.unwrap();

    let binding = h.transport.binding("g").unwrap();
    eventually("B playing", || binding.play_count() == 2).await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(
        titles(&session.snapshot()),
        (Some("B".to_string()), vec!["C".to_string()])
    );
}

#[core_async::test]
async fn test_skip_needs_a_next_track() {
    let h = Harness::new();
    let session = h.session("g");

    assert_eq!(
        session.skip().await.unwrap_err(),
        PlaybackError::InvalidState(StateViolation::NotPlaying)
    );

    session.play(channel("v"), track("Only")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    assert_eq!(
        session.skip().await.unwrap_err(),
        PlaybackError::InvalidState(StateViolation::NothingToSkipTo)
    );
    assert_eq!(session.snapshot().state, PlaybackState::Playing);
}

#[core_async::test]
async fn test_skip_while_paused_plays_next() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();
    session.pause().await.unwrap();

    session.skip().await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    assert_eq!(titles(&session.snapshot()), (Some("B".to_string()), vec![]));
}

// ============================================================================
// pause / resume
// ============================================================================

#[core_async::test]
async fn test_pause_and_resume_toggle_state() {
    let h = Harness::new();
    let session = h.session("g");

    assert_eq!(
        session.pause().await.unwrap_err(),
        PlaybackError::InvalidState(StateViolation::NotPlaying)
    );

    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;

    session.pause().await.unwrap();
    assert_eq!(session.snapshot().state, PlaybackState::Paused);
    assert!(session.pause().await.unwrap_err().is_no_op());

    session.resume().await.unwrap();
    assert_eq!(session.snapshot().state, PlaybackState::Playing);
    assert_eq!(
        session.resume().await.unwrap_err(),
        PlaybackError::InvalidState(StateViolation::NotPaused)
    );

    let calls = h.transport.binding("g").unwrap().calls();
    assert!(calls.contains(&BindingCall::Pause));
    assert!(calls.contains(&BindingCall::Resume));
}

// ============================================================================
// stop
// ============================================================================

#[core_async::test]
async fn test_stop_is_idempotent_on_idle_session() {
    let h = Harness::new();
    let mut events = h.events.subscribe();
    let session = h.session("g");

    session.stop().await.unwrap();
    session.stop().await.unwrap();

    assert_eq!(session.snapshot().state, PlaybackState::Idle);
    assert!(transitions(&drain_events(&mut events)).is_empty());
}

#[core_async::test]
async fn test_stop_releases_binding_and_clears_queue() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();

    let mut events = h.events.subscribe();
    session.stop().await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.is_empty());
    assert!(h.transport.binding("g").unwrap().is_disconnected());
    assert_eq!(
        transitions(&drain_events(&mut events)),
        vec![
            ("Playing".to_string(), "Stopped".to_string()),
            ("Stopped".to_string(), "Idle".to_string()),
        ]
    );

    // The session survives and can play again.
    session.play(channel("v"), track("C")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    assert_eq!(h.transport.connect_count(), 2);
}

#[core_async::test]
async fn test_stop_cancels_pending_connect() {
    let h = Harness::new();
    h.transport.hold("g");
    let session = h.session("g");

    let pending = {
        let session = session.clone();
        core_async::spawn(async move { session.play(channel("v"), track("A")).await })
    };
    wait_for_state(&session, PlaybackState::Connecting).await;

    session.stop().await.unwrap();
    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        PlaybackError::ConnectFailed("connection attempt cancelled".into())
    );

    h.transport.release("g");
    sleep(Duration::from_millis(30)).await;
    assert!(h.transport.bindings().is_empty());
    assert_eq!(session.snapshot().state, PlaybackState::Idle);
    assert!(session.snapshot().is_empty());
}

#[core_async::test]
async fn test_stop_cancels_stream_being_opened() {
    let h = Harness::new();
    h.resolver.delay_streams(Duration::from_millis(200));
    let session = h.session("g");

    session.play(channel("v"), track("A")).await.unwrap();
    eventually("stream requested", || !h.resolver.opened().is_empty()).await;
    let binding = h.transport.binding("g").unwrap();

    session.stop().await.unwrap();
    assert_eq!(session.snapshot().state, PlaybackState::Idle);
    assert!(session.snapshot().is_empty());
    eventually("binding released", || binding.is_disconnected()).await;

    // The cancelled open never reaches the binding.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(binding.play_count(), 0);
    assert_eq!(session.snapshot().state, PlaybackState::Idle);
    assert!(h.notifier.sent_to("g").is_empty());
}

#[core_async::test]
async fn test_stream_timeout_drops_each_track_and_ends_queue() {
    let h = Harness::with_config(core_playback::PlaybackConfig {
        stream_timeout: Duration::from_millis(100),
        ..test_config()
    });
    h.resolver.delay_streams(Duration::from_secs(5));
    let session = h.session("g");

    session.play(channel("v"), track("A")).await.unwrap();
    session.play(channel("v"), track("B")).await.unwrap();
    wait_for_state(&session, PlaybackState::Idle).await;

    assert!(session.snapshot().is_empty());
    assert_eq!(
        h.resolver.opened(),
        vec!["fake://A".to_string(), "fake://B".to_string()]
    );
    let binding = h.transport.binding("g").unwrap();
    assert_eq!(binding.play_count(), 0);
    eventually("binding released", || binding.is_disconnected()).await;

    eventually("notifications delivered", || h.notifier.sent_to("g").len() == 3).await;
    let sent = h.notifier.sent_to("g");
    for (notification, title) in sent.iter().zip(["A", "B"]) {
        match notification {
            Notification::TrackFailed { track, reason } => {
                assert_eq!(track.title(), title);
                assert!(reason.contains("did not open"), "{reason}");
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }
    assert_eq!(sent[2], Notification::QueueEnded);
}

// ============================================================================
// Settings
// ============================================================================

#[core_async::test]
async fn test_volume_is_clamped_and_applied_on_connect() {
    let h = Harness::new();
    let session = h.session("g");

    assert_eq!(session.set_volume(150).await.unwrap(), 100);
    assert_eq!(session.set_volume(-5).await.unwrap(), 0);
    assert_eq!(session.set_volume(40).await.unwrap(), 40);
    assert_eq!(session.snapshot().volume, 40);

    session.play(channel("v"), track("A")).await.unwrap();
    let binding = h.transport.binding("g").unwrap();
    assert!(binding.calls().contains(&BindingCall::SetVolume(40)));

    session.set_volume(75).await.unwrap();
    assert!(binding.calls().contains(&BindingCall::SetVolume(75)));
}

#[core_async::test]
async fn test_toggle_loop_flips_flag() {
    let h = Harness::new();
    let session = h.session("g");
    assert!(session.toggle_loop().await.unwrap());
    assert!(session.snapshot().loop_enabled);
    assert!(!session.toggle_loop().await.unwrap());
    assert!(!session.snapshot().loop_enabled);
}

// ============================================================================
// Connection loss
// ============================================================================

#[core_async::test]
async fn test_disconnect_without_reconnect_stops_session() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;
    session.play(channel("v"), track("B")).await.unwrap();

    h.transport
        .binding("g")
        .unwrap()
        .signal(VoiceSignal::Disconnected);

    wait_for_state(&session, PlaybackState::Idle).await;
    assert!(session.snapshot().is_empty());
    eventually("connection lost notice", || {
        h.notifier.sent().contains(&Notification::ConnectionLost)
    })
    .await;
}

#[core_async::test]
async fn test_reconnect_within_grace_keeps_playing() {
    let h = Harness::new();
    let session = h.session("g");
    session.play(channel("v"), track("A")).await.unwrap();
    wait_for_state(&session, PlaybackState::Playing).await;

    let binding = h.transport.binding("g").unwrap();
    binding.signal(VoiceSignal::Disconnected);
    binding.signal(VoiceSignal::Reconnected);

    sleep(Duration::from_millis(150)).await;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(titles(&snapshot), (Some("A".to_string()), vec![]));
    assert!(!h.notifier.sent().contains(&Notification::ConnectionLost));
}

// ============================================================================
// Isolation
// ============================================================================

#[core_async::test]
async fn test_guilds_do_not_block_each_other() {
    let h = Harness::new();
    h.transport.hold("slow");
    let slow = h.session("slow");
    let fast = h.session("fast");

    let pending = {
        let slow = slow.clone();
        core_async::spawn(async move { slow.play(channel("v1"), track("S")).await })
    };
    wait_for_state(&slow, PlaybackState::Connecting).await;

    fast.play(channel("v2"), track("F")).await.unwrap();
    wait_for_state(&fast, PlaybackState::Playing).await;
    assert_eq!(slow.snapshot().state, PlaybackState::Connecting);

    h.transport.release("slow");
    pending.await.unwrap().unwrap();
    wait_for_state(&slow, PlaybackState::Playing).await;
    assert_eq!(h.notifier.sent_to("fast").len(), 1);
}
