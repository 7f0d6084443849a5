mod common;

use common::{Harness, article, audio, video};
use meenews_player::controller::PlayAction;
use meenews_player::model::{ContentRecord, ContentType, PlaybackSettings, PlaybackState, RepeatMode};
use meenews_player::platform::{BackendEvent, MediaEvent};
use meenews_player::PlayerError;

fn settings() -> PlaybackSettings {
    PlaybackSettings::default()
}

#[tokio::test]
async fn test_audio_plays_after_engine_confirms() {
    let h = Harness::new(settings());

    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    let snapshot = h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    assert_eq!(snapshot.content_type, Some(ContentType::Audio));
    assert_eq!(snapshot.duration, 100.0);
    assert_eq!(snapshot.queue_len, 1);
    assert_eq!(
        h.log.entries(),
        vec!["audio-open:https://cdn.test/a.mp3", "audio-play"]
    );

    let records = h.wait_for_records(1).await;
    assert_eq!(records[0].action, PlayAction::Start);
    assert_eq!(records[0].content_id.as_str(), "a");
}

#[tokio::test]
async fn test_switching_type_releases_old_backend_first() {
    let h = Harness::new(settings());

    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.controller.play_content(video("v"), None, 0).await.unwrap();

    let release = h.log.position("audio-release").expect("audio released");
    let init = h.log.position("video-initialize").expect("video initialized");
    assert!(release < init, "log: {:?}", h.log.entries());

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.content_type, Some(ContentType::Video));
    assert_eq!(snapshot.content_id.map(|id| id.to_string()).as_deref(), Some("v"));
}

#[tokio::test]
async fn test_replaying_loaded_content_reuses_backend() {
    let h = Harness::new(settings());

    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;
    h.controller.pause().await.unwrap();
    h.wait_for("paused", |s| s.state == PlaybackState::Paused).await;

    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.wait_for("playing again", |s| s.state == PlaybackState::Playing).await;

    assert_eq!(h.log.count("audio-open:https://cdn.test/a.mp3"), 1);
    assert_eq!(h.log.count("audio-release"), 0);
    assert_eq!(h.log.count("audio-play"), 2);
}

#[tokio::test]
async fn test_queue_wraps_across_content_types() {
    let h = Harness::new(PlaybackSettings {
        repeat: RepeatMode::All,
        ..settings()
    });
    let queue = vec![audio("a"), video("b"), article("c", 250)];

    h.controller.play_content(audio("a"), Some(queue), 0).await.unwrap();

    assert!(h.controller.play_previous().await.unwrap());
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.current_index, 2);
    assert_eq!(snapshot.content_type, Some(ContentType::Article));
    assert_eq!(snapshot.content_id.map(|id| id.to_string()).as_deref(), Some("c"));
    assert_eq!(snapshot.stats.skip_count, 1);

    assert!(h.controller.play_next().await.unwrap());
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.content_type, Some(ContentType::Audio));
    assert_eq!(snapshot.stats.skip_count, 2);

    assert!(h.controller.play_next().await.unwrap());
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.current_index, 1);
    assert_eq!(snapshot.content_type, Some(ContentType::Video));

    assert!(h.controller.play_previous().await.unwrap());
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.content_type, Some(ContentType::Audio));
    assert_eq!(snapshot.stats.skip_count, 4);

    // Each backend is released before the next one is initialized.
    assert_eq!(
        h.log.entries(),
        vec![
            "audio-open:https://cdn.test/a.mp3",
            "audio-play",
            "audio-release",
            "audio-open:https://cdn.test/a.mp3",
            "audio-play",
            "audio-release",
            "video-initialize",
            "video-play",
            "video-destroy",
            "audio-open:https://cdn.test/a.mp3",
            "audio-play",
        ]
    );
}

#[tokio::test]
async fn test_queue_end_without_repeat() {
    let h = Harness::new(settings());
    let queue = vec![audio("a"), audio("b")];

    h.controller.play_content(audio("b"), Some(queue), 1).await.unwrap();

    assert!(!h.controller.play_next().await.unwrap());
    assert!(h.controller.play_previous().await.unwrap());
    assert_eq!(h.controller.snapshot().await.current_index, 0);
    assert!(!h.controller.play_previous().await.unwrap());
}

#[tokio::test]
async fn test_out_of_range_queue_index_is_rejected() {
    let h = Harness::new(settings());
    let queue = vec![audio("a"), audio("b")];

    let result = h.controller.play_content(audio("a"), Some(queue), 5).await;

    assert_eq!(result, Err(PlayerError::InvalidQueueIndex { index: 5, len: 2 }));
    assert_eq!(h.controller.state().await, PlaybackState::Idle);
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_shuffle_never_repeats_current() {
    let h = Harness::new(PlaybackSettings {
        shuffle: true,
        ..settings()
    });
    let queue = vec![audio("a"), audio("b"), audio("c"), audio("d")];

    h.controller.play_content(audio("a"), Some(queue), 0).await.unwrap();
    for _ in 0..10 {
        let before = h.controller.snapshot().await.current_index;
        assert!(h.controller.play_next().await.unwrap());
        let after = h.controller.snapshot().await.current_index;
        assert_ne!(before, after);
        assert!(after < 4);
    }
}

#[tokio::test]
async fn test_seek_clamps_to_duration() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();

    h.controller.seek(150.0).await.unwrap();

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.current_time, 100.0);
    assert_eq!(snapshot.progress_percent, 100.0);
    assert!(h.log.entries().contains(&"audio-seek:100".to_string()));
}

#[tokio::test]
async fn test_negative_seek_is_rejected() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.controller.seek(40.0).await.unwrap();

    let result = h.controller.seek(-5.0).await;

    assert_eq!(result, Err(PlayerError::InvalidSeek(-5.0)));
    assert_eq!(h.controller.snapshot().await.current_time, 40.0);
    assert_eq!(h.log.count("audio-seek:-5"), 0);
}

#[tokio::test]
async fn test_controls_without_content() {
    let h = Harness::new(settings());

    assert_eq!(h.controller.play().await, Err(PlayerError::NoActiveContent));
    assert_eq!(h.controller.pause().await, Err(PlayerError::NoActiveContent));
    assert_eq!(h.controller.seek(3.0).await, Err(PlayerError::NoActiveContent));
    assert!(!h.controller.play_next().await.unwrap());
}

#[tokio::test]
async fn test_stale_events_are_ignored() {
    let h = Harness::new(settings());

    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    let stale = h.audio.last_sink();
    h.controller.play_content(audio("b"), None, 0).await.unwrap();
    h.wait_for("b playing", |s| s.state == PlaybackState::Playing).await;

    stale.emit(MediaEvent::TimeUpdate {
        position: 90.0,
        duration: 100.0,
    });
    stale.emit(MediaEvent::Error("late failure".to_string()));
    stale.emit(MediaEvent::Ended);
    h.settle().await;

    h.controller
        .handle_event(BackendEvent {
            generation: stale.generation(),
            event: MediaEvent::Ended,
        })
        .await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.current_time, 0.0);
    assert!(snapshot.error.is_none());
    assert!(h.notifications().is_empty());
}

#[tokio::test]
async fn test_init_failure_leaves_player_idle() {
    let h = Harness::new(settings());
    let mut broken = ContentRecord::new("x", "Broken");
    broken.content_type = Some("audio".to_string());

    let result = h.controller.play_content(broken, None, 0).await;

    assert!(matches!(
        result,
        Err(PlayerError::BackendInitFailed {
            content_type: ContentType::Audio,
            ..
        })
    ));
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.error.is_some());
    assert!(snapshot.content_id.is_none());
    assert_eq!(h.notifications(), vec!["Could not load audio"]);
    assert!(h.controller.history().await.is_empty());
}

#[tokio::test]
async fn test_engine_open_failure_releases_previous() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.audio.fail_open.store(true, std::sync::atomic::Ordering::SeqCst);

    let result = h.controller.play_content(audio("b"), None, 0).await;

    assert!(result.is_err());
    assert_eq!(h.log.count("audio-release"), 1);
    assert_eq!(h.controller.state().await, PlaybackState::Idle);
    assert_eq!(h.controller.pause().await, Err(PlayerError::NoActiveContent));
}

#[tokio::test]
async fn test_history_moves_replayed_item_to_front() {
    let h = Harness::new(settings());

    for id in ["a", "b", "a"] {
        h.controller.play_content(audio(id), None, 0).await.unwrap();
    }

    let history = h.controller.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content.id.as_str(), "a");
    assert_eq!(history[1].content.id.as_str(), "b");
    assert_eq!(h.history.saved.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_restore_and_clear_history() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();

    let restored = Harness::new(settings());
    *restored.history.saved.lock().unwrap() = h.history.saved.lock().unwrap().clone();
    restored.controller.restore_history().await;
    assert_eq!(restored.controller.history().await.len(), 1);

    restored.controller.clear_history().await;
    assert!(restored.controller.history().await.is_empty());
    assert!(restored.history.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeat_one_restarts_from_beginning() {
    let h = Harness::new(PlaybackSettings {
        repeat: RepeatMode::One,
        ..settings()
    });
    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    h.audio.last_sink().emit(MediaEvent::Ended);
    h.wait_for_log("audio-play", 2).await;
    h.wait_for("playing again", |s| s.state == PlaybackState::Playing).await;

    assert!(h.log.entries().contains(&"audio-seek:0".to_string()));
    assert_eq!(h.controller.snapshot().await.current_time, 0.0);

    let records = h.wait_for_records(2).await;
    assert_eq!(records[1].action, PlayAction::Complete);
    assert_eq!(records[1].completion_rate, Some(100.0));
}

#[tokio::test]
async fn test_autoplay_advances_to_next() {
    let h = Harness::new(settings());
    let queue = vec![audio("a"), audio("b")];
    h.controller.play_content(audio("a"), Some(queue), 0).await.unwrap();
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    h.audio.last_sink().emit(MediaEvent::Ended);
    let snapshot = h
        .wait_for("b playing", |s| {
            s.current_index == 1 && s.state == PlaybackState::Playing
        })
        .await;

    assert_eq!(snapshot.content_id.map(|id| id.to_string()).as_deref(), Some("b"));
    assert_eq!(snapshot.stats.skip_count, 0);
}

#[tokio::test]
async fn test_completion_reports_time_of_each_item() {
    let h = Harness::new(settings());
    let queue = vec![audio("a"), audio("b")];
    h.controller.play_content(audio("a"), Some(queue), 0).await.unwrap();
    h.wait_for("a playing", |s| s.state == PlaybackState::Playing).await;

    let sink = h.audio.last_sink();
    for second in 1..=4 {
        sink.emit(MediaEvent::TimeUpdate {
            position: f64::from(second),
            duration: 100.0,
        });
    }
    sink.emit(MediaEvent::Ended);
    h.wait_for("b playing", |s| {
        s.current_index == 1 && s.state == PlaybackState::Playing
    })
    .await;

    let sink = h.audio.last_sink();
    for second in 1..=3 {
        sink.emit(MediaEvent::TimeUpdate {
            position: f64::from(second),
            duration: 100.0,
        });
    }
    sink.emit(MediaEvent::Ended);
    h.wait_for("b ended", |s| s.state == PlaybackState::Ended).await;

    let records = h.wait_for_records(4).await;
    let completed: Vec<(String, Option<f64>)> = records
        .iter()
        .filter(|r| r.action == PlayAction::Complete)
        .map(|r| (r.content_id.to_string(), r.play_duration))
        .collect();
    assert_eq!(
        completed,
        vec![("a".to_string(), Some(4.0)), ("b".to_string(), Some(3.0))]
    );
    assert_eq!(h.controller.snapshot().await.stats.total_play_time, 7.0);
}

#[tokio::test]
async fn test_ended_settles_without_autoplay() {
    let h = Harness::new(PlaybackSettings {
        autoplay_next: false,
        ..settings()
    });
    let queue = vec![audio("a"), audio("b")];
    h.controller.play_content(audio("a"), Some(queue), 0).await.unwrap();
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    h.audio.last_sink().emit(MediaEvent::Ended);
    let snapshot = h.wait_for("ended", |s| s.state == PlaybackState::Ended).await;
    h.settle().await;

    assert_eq!(snapshot.current_index, 0);
    assert_eq!(snapshot.current_time, 100.0);
    // The finished handle is parked.
    h.wait_for_log("audio-pause", 1).await;
    assert_eq!(h.controller.state().await, PlaybackState::Ended);

    // Playing again starts over.
    h.controller.play().await.unwrap();
    h.wait_for("restarted", |s| s.state == PlaybackState::Playing).await;
    assert!(h.log.entries().contains(&"audio-seek:0".to_string()));
}

#[tokio::test]
async fn test_runtime_error_surfaces() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    h.audio
        .last_sink()
        .emit(MediaEvent::Error("decoder crashed".to_string()));
    let snapshot = h.wait_for("error", |s| s.state == PlaybackState::Error).await;

    assert!(snapshot.error.unwrap().contains("decoder crashed"));
    assert_eq!(h.notifications(), vec!["Playback failed"]);

    // The player stays usable.
    h.controller.play().await.unwrap();
    h.wait_for("recovered", |s| s.state == PlaybackState::Playing).await;
}

#[tokio::test]
async fn test_buffering_flags_loading() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    h.audio.last_sink().emit(MediaEvent::Waiting);
    h.wait_for("buffering", |s| s.is_loading).await;
    h.audio.last_sink().emit(MediaEvent::CanPlay);
    let snapshot = h.wait_for("buffered", |s| !s.is_loading).await;
    assert_eq!(snapshot.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_destroy_keeps_preferences_and_history() {
    let h = Harness::new(settings());
    h.controller.set_shuffle(true).await;
    h.controller.set_volume(0.4).await;
    h.controller.play_content(audio("a"), None, 0).await.unwrap();

    h.controller.destroy().await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.content_id.is_none());
    assert_eq!(snapshot.queue_len, 0);
    assert!(snapshot.settings.shuffle);
    assert_eq!(snapshot.settings.volume, 0.4);
    assert_eq!(h.log.count("audio-release"), 1);
    assert_eq!(h.controller.history().await.len(), 1);
}

#[tokio::test]
async fn test_video_is_optimistic() {
    let h = Harness::new(settings());

    h.controller.play_content(video("v"), None, 0).await.unwrap();
    assert_eq!(h.controller.state().await, PlaybackState::Playing);

    h.controller.pause().await.unwrap();
    assert_eq!(h.controller.state().await, PlaybackState::Paused);

    h.controller.seek(500.0).await.unwrap();
    assert_eq!(h.controller.snapshot().await.current_time, 300.0);

    assert_eq!(
        h.log.entries(),
        vec!["video-initialize", "video-play", "video-pause", "video-seek:300"]
    );

    h.view.last_sink().emit(MediaEvent::TimeUpdate {
        position: 12.0,
        duration: 300.0,
    });
    h.wait_for("progress", |s| s.current_time == 12.0).await;
}

#[tokio::test]
async fn test_overlapping_play_content_last_wins() {
    let h = Harness::new(settings());

    let (first, second) = tokio::join!(
        h.controller.play_content(audio("a"), None, 0),
        h.controller.play_content(audio("b"), None, 0),
    );
    first.unwrap();
    second.unwrap();

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.content_id.map(|id| id.to_string()).as_deref(), Some("b"));
    assert_eq!(h.log.count("audio-release"), 1);
    let release = h.log.position("audio-release").unwrap();
    let open_b = h.log.position("audio-open:https://cdn.test/b.mp3").unwrap();
    assert!(release < open_b);
}

#[tokio::test]
async fn test_settings_are_clamped() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();

    h.controller.set_volume(1.7).await;
    h.controller.set_playback_rate(3.0).await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.settings.volume, 1.0);
    assert_eq!(snapshot.settings.playback_rate, 2.0);
    assert!(h.log.entries().contains(&"audio-volume:1".to_string()));
    assert!(h.log.entries().contains(&"audio-rate:2".to_string()));

    assert_eq!(h.controller.cycle_repeat().await, RepeatMode::All);
    assert_eq!(h.controller.cycle_repeat().await, RepeatMode::One);
    assert_eq!(h.controller.cycle_repeat().await, RepeatMode::None);
    assert!(h.controller.toggle_shuffle().await);
}

#[tokio::test]
async fn test_toggle_tts_ignored_for_audio() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();

    assert_eq!(h.controller.toggle_tts().await, Ok(false));
    assert!(!h.controller.snapshot().await.settings.tts_enabled);
}

#[tokio::test]
async fn test_stop_returns_to_idle() {
    let h = Harness::new(settings());
    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.controller.seek(30.0).await.unwrap();

    h.controller.stop().await.unwrap();

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert_eq!(snapshot.current_time, 0.0);
    assert_eq!(snapshot.content_id.map(|id| id.to_string()).as_deref(), Some("a"));
}

#[tokio::test]
async fn test_telemetry_failure_does_not_disturb_playback() {
    let h = Harness::new(settings());
    h.telemetry.fail.store(true, std::sync::atomic::Ordering::SeqCst);

    h.controller.play_content(audio("a"), None, 0).await.unwrap();
    h.wait_for_records(1).await;
    h.wait_for("playing", |s| s.state == PlaybackState::Playing).await;

    assert!(h.notifications().is_empty());
}
