use super::*;

use std::time::Duration;

use crate::detect::{CategoryResult, INDEX_BABY, INDEX_CRYING, INDEX_GLASS, INDEX_GUNSHOT};
use crate::engine::backend::{ReplayBackend, ReplayCycle, StubTimeSource};
use crate::notify::MemorySink;

fn cycle(indices: &[u32]) -> ReplayCycle {
    ReplayCycle::with_results(
        indices
            .iter()
            .map(|&index| CategoryResult { index, score: 0.9 })
            .collect(),
        5.0,
    )
}

fn replay_handle(
    script: Vec<ReplayCycle>,
) -> (SentryHandle, Arc<ReplayBackend>, Arc<MemorySink>) {
    let backend = Arc::new(ReplayBackend::new(script));
    let sink = Arc::new(MemorySink::new());
    let handle = SentryHandle::with_parts(
        SentryConfig::default(),
        Arc::clone(&backend) as Arc<dyn ClassifierBackend>,
        Arc::clone(&sink) as Arc<dyn NotificationSink>,
        Arc::new(StubTimeSource::new()),
    );
    (handle, backend, sink)
}

fn wait_for_posts(sink: &MemorySink, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.posted_count() < expected {
        if Instant::now() > deadline {
            panic!(
                "timed out waiting for {} posts, saw {}",
                expected,
                sink.posted_count()
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn wait_until(mut ready: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !ready() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_lifecycle_guards() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());

    assert_eq!(handle.stop(), Err(ClassifyError::NotRunning));
    assert!(handle.start().is_ok());
    assert!(handle.is_running());
    assert_eq!(handle.start(), Err(ClassifyError::AlreadyRunning));
    assert!(handle.stop().is_ok());
    assert!(!handle.is_running());
    assert_eq!(handle.stop(), Err(ClassifyError::NotRunning));
}

#[test]
fn test_resume_and_pause_are_idempotent() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());

    assert!(handle.resume().is_ok());
    assert!(handle.resume().is_ok());
    assert!(handle.is_running());

    assert!(handle.pause().is_ok());
    assert!(handle.pause().is_ok());
    assert!(!handle.is_running());
}

#[test]
fn test_enabled_kind_posts_through_sink() {
    let (handle, _backend, sink) = replay_handle(vec![
        cycle(&[INDEX_BABY]),
        cycle(&[INDEX_CRYING]),
    ]);
    handle.set_toggle(EventKind::BabyCrying, true);
    handle.start().unwrap();

    wait_for_posts(&sink, 2);
    let posted = sink.posted();
    assert_eq!(posted[0].id, 0);
    assert_eq!(posted[1].id, 1);
    assert!(posted
        .iter()
        .all(|request| request.channel.id == "baby" && request.kind == Some(EventKind::BabyCrying)));

    // Channel registration precedes every post
    assert_eq!(sink.registrations().len(), 2);

    handle.stop().unwrap();
}

#[test]
fn test_mixed_cycle_posts_in_kind_order() {
    let (handle, _backend, sink) =
        replay_handle(vec![cycle(&[INDEX_GLASS, INDEX_BABY, INDEX_GUNSHOT, INDEX_CRYING])]);
    handle.set_toggles(EventToggles {
        baby_crying: true,
        glass_break: true,
        gunshot: true,
    });
    handle.start().unwrap();

    wait_for_posts(&sink, 4);
    let posted = sink.posted();
    let kinds: Vec<_> = posted.iter().map(|request| request.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(EventKind::BabyCrying),
            Some(EventKind::BabyCrying),
            Some(EventKind::GlassBreak),
            Some(EventKind::Gunshot),
        ]
    );
    let ids: Vec<_> = posted.iter().map(|request| request.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(sink.registrations().len(), 4);

    handle.stop().unwrap();
}

#[test]
fn test_disabled_kinds_never_post() {
    // Watched categories stream by with only the gunshot toggle armed;
    // the final gunshot cycle is the sentinel proving dispatch caught up.
    let (handle, _backend, sink) = replay_handle(vec![
        cycle(&[INDEX_BABY]),
        cycle(&[INDEX_GLASS]),
        cycle(&[INDEX_GUNSHOT]),
    ]);
    handle.set_toggle(EventKind::Gunshot, true);
    handle.start().unwrap();

    wait_for_posts(&sink, 1);
    std::thread::sleep(Duration::from_millis(50));
    let posted = sink.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].kind, Some(EventKind::Gunshot));
    assert_eq!(posted[0].id, 0, "skipped kinds must not burn slot IDs");

    handle.stop().unwrap();
}

#[test]
fn test_counter_survives_stop_start() {
    let (handle, backend, sink) = replay_handle(vec![cycle(&[INDEX_GUNSHOT])]);
    handle.set_toggle(EventKind::Gunshot, true);

    handle.start().unwrap();
    wait_for_posts(&sink, 1);
    handle.stop().unwrap();

    backend.set_script(vec![cycle(&[INDEX_GUNSHOT]), cycle(&[INDEX_GUNSHOT])]);
    handle.start().unwrap();
    wait_for_posts(&sink, 3);
    handle.stop().unwrap();

    let ids: Vec<_> = sink.posted().iter().map(|request| request.id).collect();
    assert_eq!(ids, vec![0, 1, 2], "restart must not rewind the ID sequence");
}

#[test]
fn test_fault_clears_display_and_spares_counter() {
    let (handle, _backend, sink) = replay_handle(vec![
        cycle(&[INDEX_GUNSHOT]),
        ReplayCycle::with_fault("interpreter crashed"),
        cycle(&[INDEX_GUNSHOT]),
    ]);
    handle.set_toggle(EventKind::Gunshot, true);

    let mut updates = handle.broadcasts.subscribe_updates().unwrap();
    let mut faults = handle.broadcasts.subscribe_faults().unwrap();

    handle.start().unwrap();
    wait_for_posts(&sink, 2);
    handle.stop().unwrap();

    let ids: Vec<_> = sink.posted().iter().map(|request| request.id).collect();
    assert_eq!(ids, vec![0, 1], "faults must not consume slot IDs");

    let mut seen = Vec::new();
    while let Ok(update) = updates.try_recv() {
        seen.push(update);
    }
    assert_eq!(seen.len(), 3);
    assert!(!seen[0].results.is_empty());
    assert!(seen[1].results.is_empty(), "fault clears the displayed results");
    assert!(!seen[2].results.is_empty());

    let fault = faults.try_recv().unwrap();
    assert_eq!(fault.message, "interpreter crashed");
}

#[test]
fn test_apply_patch_restarts_running_engine() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());
    handle.start().unwrap();

    let changed = handle
        .apply_patch(&ClassifierPatch {
            score_threshold: Some(0.5),
            num_threads: Some(4),
            ..Default::default()
        })
        .unwrap();
    assert!(changed);
    assert!(handle.is_running(), "reconfiguration restarts the classifier");

    let params = handle.config_snapshot().classifier;
    assert!((params.score_threshold - 0.5).abs() < 1e-4);
    assert_eq!(params.num_threads, 4);

    handle.stop().unwrap();
}

#[test]
fn test_patch_on_stopped_engine_stays_stopped() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());

    let changed = handle
        .apply_patch(&ClassifierPatch {
            max_results: Some(5),
            ..Default::default()
        })
        .unwrap();
    assert!(changed);
    assert!(!handle.is_running());
    assert_eq!(handle.config_snapshot().classifier.max_results, 5);
}

#[test]
fn test_step_guards_surface_through_handle() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());

    // 0.3 -> 0.2 -> 0.1, then the lower guard refuses
    assert!(handle.step_threshold(false).unwrap());
    assert!(handle.step_threshold(false).unwrap());
    assert!(!handle.step_threshold(false).unwrap());
    let params = handle.config_snapshot().classifier;
    assert!((params.score_threshold - 0.1).abs() < 1e-4);

    // Results walk 2 -> 1, refuse, then back up to the 5 cap
    assert!(handle.step_results(false).unwrap());
    assert!(!handle.step_results(false).unwrap());
    while handle.step_results(true).unwrap() {}
    assert_eq!(handle.config_snapshot().classifier.max_results, 5);

    // Threads walk 2 -> 4, refuse at the cap
    assert!(handle.step_threads(true).unwrap());
    assert!(handle.step_threads(true).unwrap());
    assert!(!handle.step_threads(true).unwrap());
}

#[test]
fn test_select_overlap_position() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());

    assert!(handle.select_overlap_position(3).unwrap());
    assert!((handle.config_snapshot().classifier.overlap - 0.75).abs() < f32::EPSILON);

    // Re-selecting the current position is a no-op
    assert!(!handle.select_overlap_position(3).unwrap());

    // Out-of-range positions clamp to the last slot
    assert!(!handle.select_overlap_position(10).unwrap());
}

#[test]
fn test_toggle_snapshot_roundtrip() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());

    assert!(!handle.toggles_snapshot().any_enabled());
    handle.set_toggle(EventKind::GlassBreak, true);
    let snapshot = handle.toggles_snapshot();
    assert!(snapshot.glass_break);
    assert!(!snapshot.baby_crying);
    assert!(!snapshot.gunshot);
}

#[test]
fn test_command_pipeline_applies_patch() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());
    handle.start().unwrap();

    handle
        .command_sender()
        .blocking_send(ClassifierPatch {
            score_threshold: Some(0.7),
            ..Default::default()
        })
        .unwrap();

    wait_until(
        || (handle.config_snapshot().classifier.score_threshold - 0.7).abs() < 1e-4,
        "command worker to apply the patch",
    );

    handle.stop().unwrap();
}

#[test]
fn test_telemetry_events_cover_lifecycle() {
    let (handle, _backend, _sink) = replay_handle(Vec::new());
    let mut telemetry_rx = handle.telemetry_receiver();

    handle.start().unwrap();
    handle.set_toggle(EventKind::BabyCrying, true);
    handle.stop().unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = telemetry_rx.try_recv() {
        kinds.push(event.kind);
    }
    assert!(kinds
        .iter()
        .any(|kind| matches!(kind, TelemetryEventKind::EngineStarted { .. })));
    assert!(kinds
        .iter()
        .any(|kind| matches!(kind, TelemetryEventKind::TogglesChanged { toggles } if toggles.baby_crying)));
    assert!(kinds
        .iter()
        .any(|kind| matches!(kind, TelemetryEventKind::EngineStopped)));
}
