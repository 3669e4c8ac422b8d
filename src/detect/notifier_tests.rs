use super::*;
use crate::detect::{INDEX_BABY, INDEX_CRYING, INDEX_GLASS, INDEX_GUNSHOT};

fn result(index: u32, score: f32) -> CategoryResult {
    CategoryResult { index, score }
}

fn all_on() -> EventToggles {
    EventToggles {
        baby_crying: true,
        glass_break: true,
        gunshot: true,
    }
}

#[test]
fn test_single_match_emits_first_id() {
    let table = WatchTable::default();
    let toggles = EventToggles {
        baby_crying: true,
        ..Default::default()
    };

    let (pending, counter) = evaluate(
        &table,
        &[result(INDEX_BABY, 0.9)],
        &toggles,
        NotificationCounter::new(),
        100,
    );

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, Some(EventKind::BabyCrying));
    assert_eq!(pending[0].id, 0);
    assert_eq!(pending[0].posted_at_ms, 100);
    assert_eq!(counter.value(), 1);
}

#[test]
fn test_mixed_batch_reports_in_kind_order() {
    let table = WatchTable::default();
    // Batch order is deliberately scrambled; emission order must not follow it
    let batch = [
        result(INDEX_GLASS, 0.8),
        result(INDEX_BABY, 0.7),
        result(INDEX_GUNSHOT, 0.6),
        result(INDEX_CRYING, 0.5),
    ];

    let (pending, counter) = evaluate(&table, &batch, &all_on(), NotificationCounter::new(), 0);

    let kinds: Vec<_> = pending.iter().map(|request| request.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(EventKind::BabyCrying),
            Some(EventKind::BabyCrying),
            Some(EventKind::GlassBreak),
            Some(EventKind::Gunshot),
        ]
    );

    let ids: Vec<_> = pending.iter().map(|request| request.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(counter.value(), 4);
}

#[test]
fn test_all_toggles_off_emits_nothing() {
    let table = WatchTable::default();
    let batch = [result(INDEX_BABY, 0.9), result(INDEX_GLASS, 0.9)];

    let (pending, counter) = evaluate(
        &table,
        &batch,
        &EventToggles::default(),
        NotificationCounter::at(7),
        0,
    );

    assert!(pending.is_empty());
    assert_eq!(counter.value(), 7, "disabled kinds must not advance the counter");
}

#[test]
fn test_ids_wrap_at_window() {
    let table = WatchTable::default();
    let batch = [result(INDEX_GLASS, 0.9), result(INDEX_GUNSHOT, 0.9)];

    let (pending, counter) = evaluate(&table, &batch, &all_on(), NotificationCounter::at(9), 0);

    let ids: Vec<_> = pending.iter().map(|request| request.id).collect();
    assert_eq!(ids, vec![9, 0]);
    assert_eq!(counter.value(), 11, "counter keeps counting past the ID window");
}

#[test]
fn test_disabled_kind_skipped_without_id_gap() {
    let table = WatchTable::default();
    let toggles = EventToggles {
        gunshot: true,
        ..Default::default()
    };
    let batch = [result(INDEX_BABY, 0.9), result(INDEX_GUNSHOT, 0.9)];

    let (pending, counter) = evaluate(&table, &batch, &toggles, NotificationCounter::new(), 0);

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, Some(EventKind::Gunshot));
    assert_eq!(pending[0].id, 0);
    assert_eq!(counter.value(), 1);
}

#[test]
fn test_duplicate_indices_each_emit() {
    let table = WatchTable::default();
    let toggles = EventToggles {
        baby_crying: true,
        ..Default::default()
    };
    let batch = [result(INDEX_BABY, 0.9), result(INDEX_BABY, 0.4)];

    let (pending, counter) = evaluate(&table, &batch, &toggles, NotificationCounter::new(), 0);

    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, 0);
    assert_eq!(pending[1].id, 1);
    assert_eq!(counter.value(), 2);
}

#[test]
fn test_unwatched_indices_ignored() {
    let table = WatchTable::default();
    let batch = [result(0, 0.99), result(7, 0.95), result(500, 0.9)];

    let (pending, counter) = evaluate(&table, &batch, &all_on(), NotificationCounter::new(), 0);

    assert!(pending.is_empty());
    assert_eq!(counter.value(), 0);
}

#[test]
fn test_empty_batch_is_a_no_op() {
    let table = WatchTable::default();

    let (pending, counter) = evaluate(&table, &[], &all_on(), NotificationCounter::at(3), 0);

    assert!(pending.is_empty());
    assert_eq!(counter.value(), 3);
}

#[test]
fn test_counter_threads_across_batches() {
    let table = WatchTable::default();
    let toggles = all_on();
    let mut counter = NotificationCounter::new();

    for _ in 0..6 {
        let (_, advanced) = evaluate(
            &table,
            &[result(INDEX_GUNSHOT, 0.9)],
            &toggles,
            counter,
            0,
        );
        counter = advanced;
    }

    assert_eq!(counter.value(), 6);
    let (id, _) = counter.next();
    assert_eq!(id, 6);
}

#[test]
fn test_toggle_accessors() {
    let mut toggles = EventToggles::default();
    assert!(!toggles.any_enabled());

    toggles.set(EventKind::GlassBreak, true);
    assert!(toggles.enabled(EventKind::GlassBreak));
    assert!(!toggles.enabled(EventKind::BabyCrying));
    assert!(toggles.any_enabled());

    toggles.set(EventKind::GlassBreak, false);
    assert!(!toggles.any_enabled());
}
