//! Editor session integration tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use frametrim::{
    EditorSession, EngineService, ErrorKind, FrametrimError, ProcessingState, SamplerOptions,
    Selection,
};

use common::{CopyOutcome, FakePlayer, ScriptedEngine, source};

fn session_for(engine: &ScriptedEngine) -> EditorSession {
    EditorSession::new(Arc::new(EngineService::new(Arc::new(engine.clone()))))
}

async fn ready_session(engine: &ScriptedEngine) -> EditorSession {
    let session = session_for(engine);
    session.load_engine().await.expect("Failed to load engine");
    session
        .load_source(source())
        .await
        .expect("Failed to load source");
    session
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

// ── Loading ────────────────────────────────────────────────────────

#[tokio::test]
async fn source_before_engine_is_rejected() {
    let engine = ScriptedEngine::new(10.0);
    let session = session_for(&engine);

    let result = session.load_source(source()).await;
    assert!(matches!(result, Err(FrametrimError::EngineNotReady)));
    assert_eq!(engine.open_calls(), 0);
}

#[tokio::test]
async fn loading_source_reports_metadata() {
    let engine = ScriptedEngine::new(12.5);
    let session = ready_session(&engine).await;

    let info = session.media_info().expect("No metadata");
    assert_eq!(info.duration_seconds, 12.5);
    let source = session.source().expect("No source");
    assert_eq!(source.name(), Some("clip.mp4"));
}

#[tokio::test]
async fn unreadable_source_is_not_kept() {
    let engine = ScriptedEngine::new(10.0).failing_open();
    let session = session_for(&engine);
    session.load_engine().await.expect("Failed to load engine");

    let error = session.load_source(source()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnreadableMedia);
    assert!(session.source().is_none());
    assert!(session.media_info().is_none());
}

#[tokio::test]
async fn extraction_without_source_fails() {
    let engine = ScriptedEngine::new(10.0);
    let session = session_for(&engine);
    session.load_engine().await.expect("Failed to load engine");

    assert!(matches!(
        session.extract_frames().await,
        Err(FrametrimError::NoSource)
    ));
    assert_eq!(session.processing_state(), ProcessingState::Idle);
}

// ── Extraction ─────────────────────────────────────────────────────

#[tokio::test]
async fn extraction_stores_frames_and_resets_selection() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;

    let frames = session.extract_frames().await.expect("Failed to extract");
    assert_eq!(frames.len(), 10);
    assert_eq!(session.frames(), frames);
    assert_eq!(session.selection(), Selection::Empty);

    session.pick(1).expect("Failed to pick");
    session.extract_frames().await.expect("Failed to re-extract");
    assert_eq!(session.selection(), Selection::Empty);
}

#[tokio::test]
async fn sample_count_follows_options() {
    let engine = ScriptedEngine::new(9.0);
    let session = session_for(&engine).with_sampler_options(SamplerOptions::new().with_count(4));
    session.load_engine().await.expect("Failed to load engine");
    session.load_source(source()).await.expect("Failed to load");

    assert_eq!(session.extract_frames().await.unwrap().len(), 4);
}

#[tokio::test]
async fn failed_extraction_stores_no_frames() {
    let engine = ScriptedEngine::new(9.0).failing_decode_call(3);
    let session = ready_session(&engine).await;

    let error = session.extract_frames().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FrameExtractionFailed);
    assert!(session.frames().is_empty());
    assert_eq!(session.processing_state(), ProcessingState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replacing_source_cancels_extraction() {
    let engine = ScriptedEngine::new(9.0).with_decode_delay(Duration::from_millis(20));
    let session = Arc::new(ready_session(&engine).await);

    let extraction = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.extract_frames().await }
    });
    wait_until(|| engine.decode_calls() >= 1).await;
    assert_eq!(session.processing_state(), ProcessingState::ExtractingFrames);

    session
        .load_source(source().with_name("other.mp4"))
        .await
        .expect("Failed to load replacement");

    let result = extraction.await.expect("Extraction task panicked");
    let error = result.unwrap_err();
    assert!(matches!(error, FrametrimError::SourceReplaced));
    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert!(session.frames().is_empty());
    assert!(engine.decode_calls() < 10);
    assert_eq!(session.processing_state(), ProcessingState::Idle);

    let frames = session.extract_frames().await.expect("Failed to extract");
    assert_eq!(frames.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_extraction_keeps_source_usable() {
    let engine = ScriptedEngine::new(9.0).with_decode_delay(Duration::from_millis(20));
    let session = ready_session(&engine).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), session.extract_frames()).await;
    assert!(abandoned.is_err(), "extraction should still be decoding");
    assert_eq!(session.processing_state(), ProcessingState::ExtractingFrames);
    assert!(matches!(
        session.extract_frames().await,
        Err(FrametrimError::Busy {
            active: ProcessingState::ExtractingFrames
        })
    ));

    wait_until(|| session.processing_state() == ProcessingState::Idle).await;
    assert!(session.source().is_some());

    let frames = session
        .extract_frames()
        .await
        .expect("Extraction after abandoned run failed");
    assert_eq!(frames.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trim_during_extraction_is_busy() {
    let engine = ScriptedEngine::new(9.0).with_decode_delay(Duration::from_millis(20));
    let session = Arc::new(ready_session(&engine).await);
    session.extract_frames().await.expect("Failed to extract");
    session.pick(2).unwrap();
    session.pick(5).unwrap();

    let extraction = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.extract_frames().await }
    });
    let before = engine.decode_calls();
    wait_until(|| engine.decode_calls() > before).await;

    assert!(!session.can_trim());
    let error = session.trim().await.unwrap_err();
    assert!(matches!(
        error,
        FrametrimError::Busy {
            active: ProcessingState::ExtractingFrames
        }
    ));
    assert_eq!(engine.copy_calls(), 0);

    extraction.await.unwrap().expect("Extraction failed");
    assert_eq!(session.processing_state(), ProcessingState::Idle);
}

// ── Selection ──────────────────────────────────────────────────────

#[tokio::test]
async fn pick_before_extraction_is_out_of_range() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;

    assert!(matches!(
        session.pick(0),
        Err(FrametrimError::FrameIndexOutOfRange {
            index: 0,
            frame_count: 0
        })
    ));
}

#[tokio::test]
async fn pick_past_last_frame_is_out_of_range() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;
    session.extract_frames().await.expect("Failed to extract");

    assert!(session.pick(10).is_err());
    assert_eq!(session.selection(), Selection::Empty);
}

// ── Trimming ───────────────────────────────────────────────────────

#[tokio::test]
async fn trim_uses_selected_timestamps() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;
    session.extract_frames().await.expect("Failed to extract");
    session.pick(2).unwrap();
    session.pick(5).unwrap();
    assert!(session.can_trim());

    let output = session.trim().await.expect("Failed to trim");
    assert_eq!(engine.copied_ranges(), vec![(2.0, 5.0)]);
    assert_eq!(output.requested_duration(), 3.0);
    assert_eq!(session.trimmed_output(), Some(output));
}

#[tokio::test]
async fn failed_trim_keeps_selection() {
    let engine = ScriptedEngine::new(9.0)
        .with_copy_outcome(CopyOutcome::Fail("codec copy not supported".to_string()));
    let session = ready_session(&engine).await;
    session.extract_frames().await.expect("Failed to extract");
    session.pick(2).unwrap();
    session.pick(5).unwrap();

    let error = session.trim().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::TrimFailed);
    assert_eq!(session.selection(), Selection::HasBoth { start: 2, end: 5 });
    assert!(session.is_trimmable());
    assert!(session.trimmed_output().is_none());
    assert_eq!(session.processing_state(), ProcessingState::Idle);
}

#[tokio::test]
async fn untrimmable_selection_never_reaches_engine() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;
    session.extract_frames().await.expect("Failed to extract");
    session.pick(5).unwrap();
    session.pick(2).unwrap();

    assert!(!session.can_trim());
    assert_eq!(session.trim().await.unwrap_err().kind(), ErrorKind::InvalidRange);
    assert_eq!(engine.copy_calls(), 0);
}

// ── Clearing ───────────────────────────────────────────────────────

#[tokio::test]
async fn clear_resets_everything() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;
    let player = FakePlayer::new();
    session.attach_player(player.clone());

    session.extract_frames().await.expect("Failed to extract");
    session.pick(2).unwrap();
    session.pick(5).unwrap();
    session.trim().await.expect("Failed to trim");
    assert!(session.is_previewing());
    assert_eq!(player.seeks(), vec![2.0]);

    session.clear();

    assert!(session.source().is_none());
    assert!(session.media_info().is_none());
    assert!(session.frames().is_empty());
    assert_eq!(session.selection(), Selection::Empty);
    assert!(session.trimmed_output().is_none());
    assert!(!session.is_previewing());
    assert_eq!(player.listener_count(), 0);
}

#[tokio::test]
async fn detaching_player_stops_preview() {
    let engine = ScriptedEngine::new(9.0);
    let session = ready_session(&engine).await;
    session.extract_frames().await.expect("Failed to extract");
    session.pick(1).unwrap();
    session.pick(4).unwrap();

    let player = FakePlayer::new();
    session.attach_player(player.clone());
    assert_eq!(player.seeks(), vec![1.0]);
    assert_eq!(player.listener_count(), 1);

    session.detach_player();
    assert_eq!(player.listener_count(), 0);
}
