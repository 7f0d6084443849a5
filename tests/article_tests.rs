mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{Harness, article, audio};
use meenews_player::controller::PlayAction;
use meenews_player::model::{ContentType, PlaybackSettings, PlaybackState};
use meenews_player::PlayerError;

fn with_tts() -> PlaybackSettings {
    PlaybackSettings {
        tts_enabled: true,
        ..PlaybackSettings::default()
    }
}

#[tokio::test]
async fn test_reading_duration_from_length() {
    let h = Harness::new(PlaybackSettings::default());

    h.controller.play_content(article("r", 2500), None, 0).await.unwrap();

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.content_type, Some(ContentType::Article));
    assert_eq!(snapshot.duration, 600.0);
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert!(h.log.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reading_timer_runs_to_end() {
    let h = Harness::new(PlaybackSettings::default());
    h.controller.play_content(article("r", 250), None, 0).await.unwrap();
    assert_eq!(h.controller.snapshot().await.duration, 60.0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    h.settle().await;
    let elapsed = h.controller.snapshot().await.current_time;
    assert!((29.0..=30.0).contains(&elapsed), "elapsed {}", elapsed);

    h.controller.pause().await.unwrap();
    assert_eq!(h.controller.state().await, PlaybackState::Paused);
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.settle().await;
    assert_eq!(h.controller.snapshot().await.current_time, elapsed);

    h.controller.play().await.unwrap();
    tokio::time::sleep(Duration::from_secs(40)).await;
    let snapshot = h.wait_for("ended", |s| s.state == PlaybackState::Ended).await;

    assert_eq!(snapshot.current_time, 60.0);
    assert_eq!(snapshot.progress_percent, 100.0);
    assert!(snapshot.stats.total_play_time >= 59.0);

    let records = h.wait_for_records(2).await;
    assert_eq!(records[0].action, PlayAction::Start);
    assert_eq!(records[1].action, PlayAction::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_finished_article_restarts_on_play() {
    let h = Harness::new(PlaybackSettings::default());
    h.controller.play_content(article("r", 25), None, 0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(8)).await;
    h.wait_for("ended", |s| s.state == PlaybackState::Ended).await;

    h.controller.play().await.unwrap();
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.current_time, 0.0);
    assert_eq!(snapshot.article_scroll_position, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_article_ends_and_advances() {
    let h = Harness::new(PlaybackSettings::default());
    let queue = vec![article("e", 0), audio("b")];

    h.controller.play_content(article("e", 0), Some(queue), 0).await.unwrap();
    assert_eq!(h.controller.snapshot().await.duration, 0.0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = h
        .wait_for("next item", |s| {
            s.current_index == 1 && s.state == PlaybackState::Playing
        })
        .await;
    assert_eq!(snapshot.content_type, Some(ContentType::Audio));

    let records = h.wait_for_records(3).await;
    assert_eq!(records[1].action, PlayAction::Complete);
    assert_eq!(records[1].content_id.as_str(), "e");
    assert_eq!(records[1].play_duration, Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn test_reading_never_passes_duration() {
    let h = Harness::new(PlaybackSettings {
        autoplay_next: false,
        ..PlaybackSettings::default()
    });
    h.controller.play_content(article("r", 25), None, 0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    let snapshot = h.wait_for("ended", |s| s.state == PlaybackState::Ended).await;
    assert_eq!(snapshot.current_time, 6.0);
    assert_eq!(snapshot.stats.total_play_time, 6.0);
}

#[tokio::test]
async fn test_article_seek_scrolls() {
    let h = Harness::new(PlaybackSettings::default());
    h.controller.play_content(article("r", 250), None, 0).await.unwrap();

    h.controller.seek(30.0).await.unwrap();
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.current_time, 30.0);
    assert_eq!(snapshot.article_scroll_position, 30.0);

    h.controller.seek(500.0).await.unwrap();
    assert_eq!(h.controller.snapshot().await.article_scroll_position, 60.0);
    assert_eq!(h.log.entries(), vec!["article-scroll:30", "article-scroll:60"]);
}

#[tokio::test]
async fn test_speech_plays_synthesized_audio() {
    let h = Harness::new(with_tts());

    h.controller.play_content(article("t", 250), None, 0).await.unwrap();
    h.wait_for("speaking", |s| s.state == PlaybackState::Playing).await;

    let log = h.log.entries();
    assert!(log[0].starts_with("speech-submit:"), "log: {:?}", log);
    assert_eq!(log[1], "audio-open:job-1-a.mp3,job-1-b.mp3");
    assert_eq!(log[2], "audio-play");
}

#[tokio::test]
async fn test_speech_failure_falls_back_to_reading_timer() {
    let h = Harness::new(with_tts());
    h.speech.fail.store(true, Ordering::SeqCst);

    h.controller.play_content(article("t", 250), None, 0).await.unwrap();

    assert_eq!(h.controller.state().await, PlaybackState::Playing);
    assert!(h.log.entries().iter().all(|e| !e.starts_with("audio-open")));
    assert!(h.notifications().is_empty());
}

#[tokio::test]
async fn test_toggle_speech_while_reading() {
    let h = Harness::new(PlaybackSettings::default());
    h.controller.play_content(article("t", 250), None, 0).await.unwrap();

    assert_eq!(h.controller.toggle_tts().await, Ok(true));
    assert!(h.controller.snapshot().await.settings.tts_enabled);
    assert_eq!(h.log.count("audio-play"), 1);
    h.wait_for("speaking", |s| s.state == PlaybackState::Playing).await;

    assert_eq!(h.controller.toggle_tts().await, Ok(false));
    assert!(!h.controller.snapshot().await.settings.tts_enabled);
    assert_eq!(h.log.count("audio-release"), 1);
}

#[tokio::test]
async fn test_toggle_speech_failure_notifies() {
    let h = Harness::new(PlaybackSettings::default());
    h.speech.fail.store(true, Ordering::SeqCst);
    h.controller.play_content(article("t", 250), None, 0).await.unwrap();

    let result = h.controller.toggle_tts().await;

    assert!(matches!(result, Err(PlayerError::PlaybackFailed(_))));
    assert_eq!(h.notifications(), vec!["Playback failed"]);
    let snapshot = h.controller.snapshot().await;
    assert!(!snapshot.settings.tts_enabled);
    assert_eq!(snapshot.state, PlaybackState::Playing);
}
