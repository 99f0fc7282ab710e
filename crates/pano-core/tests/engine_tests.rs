// End-to-end engine behaviour against a recording backend: scene switching,
// mark limits, editing input, selection and teardown.

mod common;

use std::time::Duration;

use common::*;
use glam::Vec3;
use instant::Instant;
use pano_core::constants::{MAX_TRANSFER_SECS, SCENE_HIDDEN_POSITION, SCENE_SHOW_POSITION};
use pano_core::geometry::ZoneShape;
use pano_core::{
    Button, EngineError, EngineEvent, EventKind, GlobalConfig, InboundEvent, InputEvent, Key,
    MarkEdit, MarkKind, Modifiers, RawHit, ScaleRange, SceneConfig, TransferOutcome, ViewSize,
};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn count(log: &Recorded, kind: EventKind) -> usize {
    log.borrow().iter().filter(|e| e.kind() == kind).count()
}

fn secondary(hits: Vec<RawHit>, modifiers: Modifiers) -> InputEvent {
    InputEvent::PointerDown {
        hits,
        button: Button::Secondary,
        modifiers,
    }
}

fn alt_key(c: char) -> InputEvent {
    InputEvent::KeyDown {
        key: Key::Char(c),
        modifiers: Modifiers::ALT,
    }
}

fn release_alt() -> InputEvent {
    InputEvent::KeyUp {
        key: Key::Alt,
        modifiers: Modifiers::default(),
    }
}

fn with_marks(id: &str, marks: Vec<pano_core::MarkConfig>) -> SceneConfig {
    let mut s = scene(id);
    s.marks = marks;
    s
}

// ---------------- construction and lifecycle ----------------

#[test]
fn scenes_start_hidden() {
    let engine = two_scene_engine(GlobalConfig::default());
    let backend = engine.backend();
    for id in ["s1", "s2"] {
        let h = scene_handle(&engine, id);
        assert!(!backend.is_visible(h));
        assert_eq!(backend.position_of(h), Some(SCENE_HIDDEN_POSITION));
    }
    assert_eq!(engine.current_scene_id(), None);
    assert!(backend.calls.contains(&Call::Fps(false)));
}

#[test]
fn inited_fires_once_on_first_frame() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let log = record(&mut engine, &[EventKind::Inited]);
    let t0 = Instant::now();
    engine.frame(t0);
    engine.frame(t0 + ms(16));
    assert_eq!(count(&log, EventKind::Inited), 1);
    match &log.borrow()[0] {
        EngineEvent::Inited(all) => assert_eq!(all.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(engine.backend().count(|c| *c == Call::Render), 2);
}

#[test]
fn changed_is_only_built_for_listeners() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let log = record(&mut engine, &[EventKind::AddedScene, EventKind::Changed]);
    engine.add_scene(scene("s3"));
    assert_eq!(count(&log, EventKind::AddedScene), 1);
    assert_eq!(count(&log, EventKind::Changed), 1);
    match log.borrow().last() {
        Some(EngineEvent::Changed(all)) => assert_eq!(all.len(), 3),
        other => panic!("unexpected {other:?}"),
    }

    engine.unsubscribe_all(EventKind::Changed);
    engine.add_scene(scene("s4"));
    assert_eq!(count(&log, EventKind::AddedScene), 2);
    assert_eq!(count(&log, EventKind::Changed), 1);
}

#[test]
fn add_scenes_emits_one_changed() {
    let mut engine = engine_with(GlobalConfig::default(), Vec::new());
    let log = record(&mut engine, &[EventKind::AddedScene, EventKind::Changed]);
    let added = engine.add_scenes(vec![scene("a"), scene("b"), scene("c")]);
    assert_eq!(added.len(), 3);
    assert_eq!(count(&log, EventKind::AddedScene), 3);
    assert_eq!(count(&log, EventKind::Changed), 1);
}

#[test]
fn duplicate_scene_ids_are_replaced() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let added = engine.add_scene(scene("s1"));
    assert_ne!(added.id, "s1");
    assert!(!added.id.is_empty());
    assert_eq!(engine.get_all_configs().len(), 3);
}

#[test]
fn loaded_zones_with_too_few_points_are_dropped() {
    let mut bad = triangle_zone("bad", Vec3::ZERO);
    bad.points = Some(vec![Vec3::ZERO, Vec3::X]);
    let engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![bad, point("ok", Vec3::Z * 300.0)])],
    );
    let configs = engine.get_all_configs();
    assert_eq!(configs[0].marks.len(), 1);
    assert_eq!(configs[0].marks[0].id, "ok");
}

#[test]
fn destroy_releases_everything() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)]), scene("s2")],
    );
    let log = record(&mut engine, &[EventKind::SwitchedScene]);
    let shared = engine.backend().shared.clone();
    let handles = [
        scene_handle(&engine, "s1"),
        mark_handle(&engine, "a"),
        scene_handle(&engine, "s2"),
    ];
    engine.frame(Instant::now());
    let transfer = engine.view_scene("s1", None).unwrap();
    assert_eq!(transfer.peek(), None);

    engine.destroy();
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));
    let calls = shared.borrow();
    for h in handles {
        assert!(calls.contains(&Call::Dispose(h)), "{h:?} not disposed");
    }
    assert_eq!(calls.last(), Some(&Call::Release));
    assert!(calls.contains(&Call::Gizmo(None)));
    // listeners were dropped before the abandoned transition resolved
    assert_eq!(count(&log, EventKind::SwitchedScene), 0);
}

// ---------------- scene transitions ----------------

#[test]
fn view_scene_flies_in_and_resets_to_origin() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let log = record(&mut engine, &[EventKind::SwitchedScene]);
    let t0 = Instant::now();
    engine.frame(t0);
    let transfer = engine.view_scene("s1", None).unwrap();
    let s1 = scene_handle(&engine, "s1");

    // incoming scene waits at the show position, visible, with media
    assert!(engine.backend().is_visible(s1));
    assert_eq!(engine.backend().position_of(s1), Some(SCENE_SHOW_POSITION));
    assert!(engine
        .backend()
        .calls
        .iter()
        .any(|c| matches!(c, Call::Source(h, Some(_)) if *h == s1)));
    assert_eq!(engine.current_scene_id(), Some("s1"));
    assert!(engine.is_transferring());

    engine.frame(t0 + ms(500));
    let peak = engine
        .backend()
        .calls
        .iter()
        .rev()
        .find_map(|c| match c {
            Call::Mask(density, blur) => Some((*density, *blur)),
            _ => None,
        })
        .unwrap();
    assert!(peak.0 > 0.004 && peak.1 > 20.0, "peak = {peak:?}");

    settle(&mut engine, t0 + ms(500));
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));
    assert_eq!(engine.backend().position_of(s1), Some(Vec3::ZERO));
    assert_eq!(engine.backend().last_camera(), Some((Vec3::ZERO, Vec3::Z)));
    assert!(engine.backend().calls.contains(&Call::Mask(0.0, 0.0)));
    assert_eq!(count(&log, EventKind::SwitchedScene), 1);
}

#[test]
fn switching_scenes_hides_the_previous_one() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let log = record(&mut engine, &[EventKind::SwitchedScene]);
    let now = enter(&mut engine, "s1", Instant::now());
    enter(&mut engine, "s2", now);

    let s1 = scene_handle(&engine, "s1");
    let s2 = scene_handle(&engine, "s2");
    assert!(!engine.backend().is_visible(s1));
    assert_eq!(engine.backend().position_of(s1), Some(SCENE_HIDDEN_POSITION));
    assert!(engine.backend().calls.contains(&Call::Source(s1, None)));
    assert!(engine.backend().is_visible(s2));
    assert_eq!(engine.backend().position_of(s2), Some(Vec3::ZERO));
    assert_eq!(engine.current_scene_id(), Some("s2"));

    let switched: Vec<String> = log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::SwitchedScene(s) => Some(s.id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(switched, vec!["s1", "s2"]);
}

#[test]
fn view_scene_while_busy_is_a_noop() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let t0 = Instant::now();
    engine.frame(t0);
    let first = engine.view_scene("s1", None).unwrap();
    assert_eq!(engine.tweens().starts, 2);

    let second = engine.view_scene("s2", None).unwrap();
    assert_eq!(second.peek(), Some(TransferOutcome::Busy));
    assert_eq!(engine.tweens().starts, 2);
    assert_eq!(engine.current_scene_id(), Some("s1"));
    assert!(!engine.backend().is_visible(scene_handle(&engine, "s2")));

    settle(&mut engine, t0);
    assert_eq!(first.peek(), Some(TransferOutcome::Completed));
    assert!(!engine.is_transferring());
}

#[test]
fn view_scene_unknown_id_is_not_found() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let err = engine.view_scene("nope", None).err().unwrap();
    assert_eq!(err, EngineError::scene_not_found("nope"));
}

#[test]
fn custom_duration_scales_both_legs() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let t0 = Instant::now();
    engine.frame(t0);
    let transfer = engine.view_scene("s1", Some(ms(200))).unwrap();
    engine.frame(t0 + ms(150));
    assert!(engine.is_transferring());
    engine.frame(t0 + ms(200));
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));
}

#[test]
fn view_first_scene_with_no_scenes_completes() {
    let mut engine = engine_with(GlobalConfig::default(), Vec::new());
    let transfer = engine.view_first_scene();
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));
    assert_eq!(engine.tweens().starts, 0);
}

#[test]
fn removing_current_scene_falls_back_to_first() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let now = enter(&mut engine, "s2", Instant::now());
    let s2 = scene_handle(&engine, "s2");

    let transfer = engine.remove_scene("s2").unwrap().expect("fallback transfer");
    assert!(engine.backend().is_disposed(s2));
    assert_eq!(engine.current_scene_id(), Some("s1"));
    settle(&mut engine, now);
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));

    // last scene gone: nothing to fall back to
    let last = engine.remove_scene("s1").unwrap().expect("transfer");
    assert_eq!(last.peek(), Some(TransferOutcome::Completed));
    assert_eq!(engine.current_scene_id(), None);
    assert!(engine.get_all_configs().is_empty());
}

#[test]
fn removing_transition_target_queues_fallback() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let now = enter(&mut engine, "s1", Instant::now());
    let towards_s2 = engine.view_scene("s2", None).unwrap();
    assert_eq!(engine.current_scene_id(), Some("s2"));

    let fallback = engine.remove_scene("s2").unwrap().expect("fallback transfer");
    assert_eq!(fallback.peek(), None);
    assert_eq!(engine.current_scene_id(), None);

    settle(&mut engine, now);
    assert_eq!(towards_s2.peek(), Some(TransferOutcome::Completed));
    assert_eq!(fallback.peek(), Some(TransferOutcome::Completed));
    assert_eq!(engine.current_scene_id(), Some("s1"));
    assert!(!engine.is_transferring());
}

#[test]
fn destroy_settles_a_queued_fallback() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let now = enter(&mut engine, "s1", Instant::now());
    let _towards_s2 = engine.view_scene("s2", None).unwrap();
    let fallback = engine.remove_scene("s2").unwrap().expect("fallback transfer");
    engine.frame(now + ms(50));
    assert_eq!(fallback.peek(), None);
    engine.destroy();
    assert_eq!(fallback.peek(), Some(TransferOutcome::Completed));
}

#[test]
fn removing_previous_scene_mid_transition_still_switches() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let now = enter(&mut engine, "s1", Instant::now());
    let log = record(&mut engine, &[EventKind::SwitchedScene]);
    let transfer = engine.view_scene("s2", None).unwrap();
    assert!(engine.remove_scene("s1").unwrap().is_none());

    settle(&mut engine, now);
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));
    assert_eq!(engine.current_scene_id(), Some("s2"));
    assert_eq!(count(&log, EventKind::SwitchedScene), 1);
}

#[test]
fn huge_transfer_durations_are_capped() {
    let config = GlobalConfig {
        transfer_duration: Some(1e30),
        ..GlobalConfig::default()
    };
    let mut engine = two_scene_engine(config);
    let now = Instant::now();
    engine.frame(now);
    let configured = engine.view_scene("s2", None).unwrap();
    engine.frame(now + ms(1000));
    assert_eq!(configured.peek(), None);
    let past_cap = now + Duration::from_secs(MAX_TRANSFER_SECS + 1);
    engine.frame(past_cap);
    assert_eq!(configured.peek(), Some(TransferOutcome::Completed));

    let explicit = engine.view_scene("s1", Some(Duration::MAX)).unwrap();
    engine.frame(past_cap + ms(1000));
    assert_eq!(explicit.peek(), None);
    engine.frame(past_cap + Duration::from_secs(MAX_TRANSFER_SECS + 1));
    assert_eq!(explicit.peek(), Some(TransferOutcome::Completed));
}

#[test]
fn removing_other_scene_keeps_current() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let log = record(&mut engine, &[EventKind::Changed]);
    enter(&mut engine, "s1", Instant::now());
    assert!(engine.remove_scene("s2").unwrap().is_none());
    assert_eq!(engine.current_scene_id(), Some("s1"));
    assert_eq!(count(&log, EventKind::Changed), 1);
    assert!(matches!(
        engine.remove_scene("s2"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn change_scene_material_updates_snapshot() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    engine
        .change_scene_material("s2", Some(image("https://cdn.example/new.jpg")))
        .unwrap();
    let configs = engine.get_all_configs();
    let s2 = &configs[1];
    assert_eq!(s2.source.as_ref().unwrap().url, "https://cdn.example/new.jpg");
    assert!(engine.change_scene_material("zz", None).is_err());
}

// ---------------- mark focus ----------------

#[test]
fn view_mark_keeps_orbit_radius() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![point("side", Vec3::new(300.0, 0.0, 0.0))])],
    );
    let now = enter(&mut engine, "s1", Instant::now());
    let masks_before = engine.backend().count(|c| matches!(c, Call::Mask(..)));

    let transfer = engine.view_mark("side", None).unwrap();
    assert_eq!(engine.tweens().starts, 3);
    settle(&mut engine, now);
    assert_eq!(transfer.peek(), Some(TransferOutcome::Completed));

    let (eye, target) = engine.backend().last_camera().unwrap();
    assert_eq!(target, Vec3::Z);
    assert!((eye.distance(target) - 1.0).abs() < 1e-3);
    // the placement on the mark's side of the focus
    assert!(eye.x > 0.99, "eye = {eye:?}");
    // no fog on mark focus
    assert_eq!(
        engine.backend().count(|c| matches!(c, Call::Mask(..))),
        masks_before
    );
}

#[test]
fn view_mark_outside_current_scene_is_not_found() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![
            scene("s1"),
            with_marks("s2", vec![point("m", Vec3::Z * 300.0)]),
        ],
    );
    enter(&mut engine, "s1", Instant::now());
    assert_eq!(
        engine.view_mark("m", None).err(),
        Some(EngineError::mark_not_found("m"))
    );
}

#[test]
fn view_mark_on_the_focus_is_degenerate() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![point("c", Vec3::Z)])],
    );
    enter(&mut engine, "s1", Instant::now());
    let transfer = engine.view_mark("c", None).unwrap();
    assert_eq!(transfer.peek(), Some(TransferOutcome::Degenerate));
    assert!(!engine.is_transferring());
}

#[test]
fn view_mark_while_busy() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![point("m", Vec3::new(0.0, 200.0, 0.0))])],
    );
    enter(&mut engine, "s1", Instant::now());
    let first = engine.view_mark("m", Some(ms(400))).unwrap();
    let second = engine.view_mark("m", None).unwrap();
    assert_eq!(first.peek(), None);
    assert_eq!(second.peek(), Some(TransferOutcome::Busy));
}

// ---------------- marks and selection ----------------

#[test]
fn point_marks_respect_the_limit() {
    let config = GlobalConfig {
        max_mark_count: Some(2),
        ..editable()
    };
    let mut engine = two_scene_engine(config);
    let log = record(
        &mut engine,
        &[EventKind::AddedMark, EventKind::Alarmed, EventKind::SelectedMark],
    );
    let now = enter(&mut engine, "s1", Instant::now());

    for x in [0.0, 50.0, 100.0, 150.0] {
        let hit = surface_hit(&engine, "s1", Vec3::new(x, 0.0, 490.0));
        engine
            .handle_input(secondary(vec![hit], Modifiers::default()), now)
            .unwrap();
    }
    assert_eq!(engine.current_scene().unwrap().marks.len(), 2);
    assert_eq!(count(&log, EventKind::AddedMark), 2);
    assert_eq!(count(&log, EventKind::Alarmed), 2);
    assert_eq!(count(&log, EventKind::SelectedMark), 2);

    let alarm = log
        .borrow()
        .iter()
        .find_map(|e| match e {
            EngineEvent::Alarmed(msg) => Some(msg.clone()),
            _ => None,
        })
        .unwrap();
    assert!(alarm.contains('2'), "{alarm}");
}

#[test]
fn added_point_mark_is_scene_local_and_selected() {
    let mut engine = two_scene_engine(editable());
    let log = record(&mut engine, &[EventKind::AddedMark]);
    let now = enter(&mut engine, "s1", Instant::now());
    let at = Vec3::new(10.0, 20.0, 480.0);
    let hit = surface_hit(&engine, "s1", at);
    engine
        .handle_input(secondary(vec![hit], Modifiers::default()), now)
        .unwrap();

    let added = match &log.borrow()[0] {
        EngineEvent::AddedMark(added) => added.clone(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(added.parent_id, "s1");
    assert_eq!(added.payload.kind, MarkKind::Point);
    assert_eq!(added.payload.position, at);
    assert_eq!(engine.selected_mark_id(), Some(added.payload.id.as_str()));
    assert_eq!(
        engine.backend().gizmo(),
        Some(mark_handle(&engine, &added.payload.id))
    );
}

#[test]
fn read_only_viewer_never_adds_marks() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let now = enter(&mut engine, "s1", Instant::now());
    let hit = surface_hit(&engine, "s1", Vec3::Z * 490.0);
    engine
        .handle_input(secondary(vec![hit], Modifiers::default()), now)
        .unwrap();
    engine
        .handle_input(secondary(vec![hit], Modifiers::ALT), now)
        .unwrap();
    assert!(engine.current_scene().unwrap().marks.is_empty());
    assert!(!engine.draft().is_drawing());
}

#[test]
fn select_and_remove_mark() {
    let mut engine = engine_with(
        editable(),
        vec![
            with_marks(
                "s1",
                vec![point("a", Vec3::Z * 300.0), point("b", Vec3::X * 300.0)],
            ),
            with_marks("s2", vec![point("c", Vec3::Z * 300.0)]),
        ],
    );
    let log = record(&mut engine, &[EventKind::SelectedMark, EventKind::Changed]);
    enter(&mut engine, "s1", Instant::now());

    engine.select_mark("a").unwrap();
    engine.select_mark("a").unwrap();
    assert_eq!(count(&log, EventKind::SelectedMark), 1);
    assert_eq!(engine.backend().gizmo(), Some(mark_handle(&engine, "a")));

    assert_eq!(
        engine.select_mark("c").err(),
        Some(EngineError::mark_not_found("c"))
    );
    assert!(engine.select_mark("missing").is_err());

    let a = mark_handle(&engine, "a");
    engine.remove_scene_mark("a").unwrap();
    assert!(engine.backend().is_disposed(a));
    assert_eq!(engine.selected_mark_id(), None);
    assert_eq!(engine.backend().gizmo(), None);
    assert_eq!(count(&log, EventKind::SelectedMark), 2);
    assert_eq!(count(&log, EventKind::Changed), 1);
    assert!(matches!(
        log.borrow().iter().rev().find(|e| e.kind() == EventKind::SelectedMark),
        Some(EngineEvent::SelectedMark(None))
    ));
    assert!(engine.registry().find_mark("a").is_none());

    // marks of other scenes can still be removed by id
    engine.remove_scene_mark("c").unwrap();
    assert!(engine.remove_scene_mark("c").is_err());
}

#[test]
fn surface_click_drops_selection_when_editable() {
    let mut engine = engine_with(
        editable(),
        vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)])],
    );
    let now = enter(&mut engine, "s1", Instant::now());
    engine.select_mark("a").unwrap();
    let hit = surface_hit(&engine, "s1", Vec3::X * 490.0);
    engine
        .handle_input(InputEvent::Click { hits: vec![hit] }, now)
        .unwrap();
    assert_eq!(engine.selected_mark_id(), None);
}

#[test]
fn secondary_press_on_mark_selects_it() {
    let mut engine = engine_with(
        editable(),
        vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)])],
    );
    let now = enter(&mut engine, "s1", Instant::now());
    let hit = mark_hit(&engine, "a");
    engine
        .handle_input(secondary(vec![hit], Modifiers::default()), now)
        .unwrap();
    assert_eq!(engine.selected_mark_id(), Some("a"));
    assert_eq!(engine.current_scene().unwrap().marks.len(), 1);
}

#[test]
fn clicking_a_mark_reports_it_in_any_mode() {
    for config in [GlobalConfig::default(), editable()] {
        let mut engine = engine_with(
            config,
            vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)])],
        );
        let log = record(&mut engine, &[EventKind::ClickedMark]);
        let now = enter(&mut engine, "s1", Instant::now());
        let hit = mark_hit(&engine, "a");
        engine
            .handle_input(InputEvent::Click { hits: vec![hit] }, now)
            .unwrap();
        let events = log.borrow();
        match &events[..] {
            [EngineEvent::ClickedMark(m)] => assert_eq!(m.id, "a"),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn hit_on_a_mark_outside_the_current_scene_is_a_desync() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![
            scene("s1"),
            with_marks("s2", vec![point("c", Vec3::Z * 300.0)]),
        ],
    );
    let now = enter(&mut engine, "s1", Instant::now());
    let handle = mark_handle(&engine, "c");
    let err = engine
        .handle_input(
            InputEvent::Click {
                hits: vec![mark_hit(&engine, "c")],
            },
            now,
        )
        .unwrap_err();
    assert_eq!(err, EngineError::Desync { handle });
    // the frame loop carries on
    engine.frame(now + ms(16));
}

#[test]
fn wheel_scales_selected_mark_within_range() {
    let config = GlobalConfig {
        scale_range: Some(ScaleRange::new(0.5, 2.0)),
        ..editable()
    };
    let mut engine = engine_with(
        config,
        vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)])],
    );
    let log = record(&mut engine, &[EventKind::EditedMark]);
    let now = enter(&mut engine, "s1", Instant::now());

    // nothing selected, nothing happens
    engine
        .handle_input(InputEvent::Wheel { delta_y: -800.0 }, now)
        .unwrap();
    assert_eq!(count(&log, EventKind::EditedMark), 0);

    engine.select_mark("a").unwrap();
    engine
        .handle_input(InputEvent::Wheel { delta_y: -800.0 }, now)
        .unwrap();
    let scale = |e: &TestEngine| e.registry().find_mark("a").unwrap().1.config.scale;
    assert_eq!(scale(&engine), 0.5);
    assert_eq!(count(&log, EventKind::EditedMark), 1);

    // already at the floor: no edit
    engine
        .handle_input(InputEvent::Wheel { delta_y: -100.0 }, now)
        .unwrap();
    assert_eq!(count(&log, EventKind::EditedMark), 1);

    engine
        .handle_input(InputEvent::Wheel { delta_y: 300.0 }, now)
        .unwrap();
    assert!((scale(&engine) - 0.8).abs() < 1e-6);
    assert_eq!(
        engine.backend().count(|c| matches!(c, Call::Scale(h, s) if *h == mark_handle(&engine, "a") && (*s - 0.8).abs() < 1e-6)),
        1
    );

    engine
        .handle_input(InputEvent::Wheel { delta_y: 5000.0 }, now)
        .unwrap();
    assert_eq!(scale(&engine), 2.0);
}

#[test]
fn gizmo_move_is_throttled_and_swallows_next_click() {
    let mut engine = engine_with(
        editable(),
        vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)])],
    );
    let log = record(&mut engine, &[EventKind::EditedMark, EventKind::ClickedMark]);
    let now = enter(&mut engine, "s1", Instant::now());
    engine.select_mark("a").unwrap();

    engine
        .handle_input(InputEvent::GizmoDragging(true), now)
        .unwrap();
    assert_eq!(engine.backend().calls.last(), Some(&Call::Orbit(false)));
    for (i, x) in [5.0, 10.0, 15.0].into_iter().enumerate() {
        let position = Vec3::new(x, 0.0, 300.0);
        engine
            .handle_input(InputEvent::GizmoMoved { position }, now + ms(i as u64 * 20))
            .unwrap();
    }
    engine.frame(now + ms(50));
    assert_eq!(count(&log, EventKind::EditedMark), 0);
    engine.frame(now + ms(100));
    assert_eq!(count(&log, EventKind::EditedMark), 1);
    let moved = engine.registry().find_mark("a").unwrap().1.config.position;
    assert_eq!(moved, Vec3::new(15.0, 0.0, 300.0));
    engine
        .handle_input(InputEvent::GizmoDragging(false), now + ms(110))
        .unwrap();

    let click = InputEvent::Click {
        hits: vec![mark_hit(&engine, "a")],
    };
    engine.handle_input(click.clone(), now + ms(120)).unwrap();
    assert_eq!(count(&log, EventKind::ClickedMark), 0);
    engine.handle_input(click, now + ms(200)).unwrap();
    assert_eq!(count(&log, EventKind::ClickedMark), 1);
}

#[test]
fn hovering_a_zone_swaps_its_colors() {
    let config = GlobalConfig {
        mark_zoon_hover_bg_color: Some("#00ff00".into()),
        ..GlobalConfig::default()
    };
    let mut engine = engine_with(
        config,
        vec![with_marks("s1", vec![triangle_zone("z", Vec3::Z * 400.0)])],
    );
    let now = enter(&mut engine, "s1", Instant::now());
    let z = mark_handle(&engine, "z");
    let configured = engine.registry().find_mark("z").unwrap().1.config.zone_colors();

    engine
        .handle_input(
            InputEvent::PointerMove {
                hits: vec![mark_hit(&engine, "z")],
            },
            now,
        )
        .unwrap();
    let hovered = engine.backend().colors_of(z).unwrap();
    assert_eq!(hovered.fill.color, 0x00ff00);

    let surface = surface_hit(&engine, "s1", Vec3::X * 490.0);
    engine
        .handle_input(InputEvent::PointerMove { hits: vec![surface] }, now)
        .unwrap();
    assert_eq!(engine.backend().colors_of(z), Some(configured));
}

#[test]
fn resize_is_debounced() {
    let mut engine = two_scene_engine(GlobalConfig::default());
    let t0 = Instant::now();
    engine
        .handle_input(InputEvent::Resize(ViewSize::new(640, 480)), t0)
        .unwrap();
    engine
        .handle_input(InputEvent::Resize(ViewSize::new(1200, 600)), t0 + ms(200))
        .unwrap();
    engine.frame(t0 + ms(500));
    assert_eq!(engine.backend().count(|c| matches!(c, Call::ViewSize(_))), 0);
    engine.frame(t0 + ms(700));
    assert_eq!(
        engine.backend().count(|c| matches!(c, Call::ViewSize(_))),
        1
    );
    assert!(engine
        .backend()
        .calls
        .contains(&Call::ViewSize(ViewSize::new(1200, 600))));
    assert!((engine.camera().aspect - 2.0).abs() < 1e-6);
}

// ---------------- zone drafting ----------------

fn draw(engine: &mut TestEngine, now: Instant, points: &[Vec3]) {
    for p in points {
        let hit = surface_hit(engine, "s1", *p);
        engine
            .handle_input(secondary(vec![hit], Modifiers::ALT), now)
            .unwrap();
    }
}

#[test]
fn zone_drawing_end_to_end() {
    let mut engine = two_scene_engine(editable());
    let log = record(&mut engine, &[EventKind::AddedMark]);
    let now = enter(&mut engine, "s1", Instant::now());
    let pts = [
        Vec3::new(-30.0, 0.0, 490.0),
        Vec3::new(30.0, 0.0, 490.0),
        Vec3::new(0.0, 40.0, 480.0),
    ];
    draw(&mut engine, now, &pts);
    assert_eq!(engine.draft().points().len(), 3);
    let preview = engine.preview_handle().unwrap();
    assert!(matches!(
        engine.backend().zone_creations().last(),
        Some((h, ZoneShape::Polygon { .. })) if *h == preview
    ));
    assert!(engine
        .backend()
        .calls
        .contains(&Call::Attach(preview, scene_handle(&engine, "s1"))));

    engine.handle_input(alt_key('z'), now).unwrap();
    assert_eq!(engine.draft().points().len(), 2);
    assert!(engine.backend().is_disposed(preview));
    assert!(matches!(
        engine.backend().zone_creations().last(),
        Some((_, ZoneShape::Polyline(_)))
    ));
    engine.handle_input(alt_key('a'), now).unwrap();
    assert_eq!(engine.draft().points().len(), 3);

    let last_preview = engine.preview_handle().unwrap();
    engine.handle_input(release_alt(), now).unwrap();
    assert!(engine.backend().is_disposed(last_preview));
    assert_eq!(engine.preview_handle(), None);
    assert!(!engine.draft().is_drawing());

    let added = match &log.borrow()[..] {
        [EngineEvent::AddedMark(added)] => added.clone(),
        other => panic!("unexpected {other:?}"),
    };
    let zone = added.payload;
    assert_eq!(zone.kind, MarkKind::Zone);
    let center = (pts[0] + pts[1] + pts[2]) / 3.0;
    assert!((zone.position - center).length() < 1e-3);
    let sum: Vec3 = zone.points().iter().copied().sum();
    assert!(sum.length() < 1e-3);
    assert_eq!(engine.selected_mark_id(), Some(zone.id.as_str()));
}

#[test]
fn committing_two_points_creates_nothing() {
    let mut engine = two_scene_engine(editable());
    let log = record(&mut engine, &[EventKind::AddedMark]);
    let now = enter(&mut engine, "s1", Instant::now());
    draw(
        &mut engine,
        now,
        &[Vec3::new(0.0, 0.0, 490.0), Vec3::new(20.0, 0.0, 490.0)],
    );
    engine.handle_input(release_alt(), now).unwrap();
    assert_eq!(count(&log, EventKind::AddedMark), 0);
    assert!(engine.current_scene().unwrap().marks.is_empty());
    assert_eq!(engine.preview_handle(), None);
}

#[test]
fn zone_point_limit_raises_alarm() {
    let config = GlobalConfig {
        max_mark_zoon_point_count: Some(2),
        ..editable()
    };
    let mut engine = two_scene_engine(config);
    let log = record(&mut engine, &[EventKind::Alarmed]);
    let now = enter(&mut engine, "s1", Instant::now());
    draw(
        &mut engine,
        now,
        &[
            Vec3::new(0.0, 0.0, 490.0),
            Vec3::new(20.0, 0.0, 490.0),
            Vec3::new(0.0, 20.0, 490.0),
        ],
    );
    assert_eq!(engine.draft().points().len(), 2);
    assert_eq!(count(&log, EventKind::Alarmed), 1);
}

#[test]
fn zone_drafting_is_blocked_by_the_mark_limit() {
    let config = GlobalConfig {
        max_mark_count: Some(1),
        ..editable()
    };
    let mut engine = engine_with(
        config,
        vec![with_marks("s1", vec![point("a", Vec3::Z * 300.0)]), scene("s2")],
    );
    let log = record(&mut engine, &[EventKind::Alarmed]);
    let now = enter(&mut engine, "s1", Instant::now());
    draw(&mut engine, now, &[Vec3::new(0.0, 0.0, 490.0)]);
    assert!(!engine.draft().is_drawing());
    assert_eq!(count(&log, EventKind::Alarmed), 1);
}

#[test]
fn switching_scene_discards_the_draft() {
    let mut engine = two_scene_engine(editable());
    let now = enter(&mut engine, "s1", Instant::now());
    draw(&mut engine, now, &[Vec3::new(0.0, 0.0, 490.0)]);
    let preview = engine.preview_handle().unwrap();
    let _transfer = engine.view_scene("s2", None).unwrap();
    assert!(!engine.draft().is_drawing());
    assert!(engine.backend().is_disposed(preview));
}

// ---------------- host edits ----------------

#[test]
fn edit_mark_applies_only_differences() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks(
            "s1",
            vec![
                point("p", Vec3::Z * 300.0),
                triangle_zone("z", Vec3::Z * 400.0),
            ],
        )],
    );
    let log = record(&mut engine, &[EventKind::Changed, EventKind::EditedMark]);
    let p = mark_handle(&engine, "p");
    let z = mark_handle(&engine, "z");

    let same = engine.registry().find_mark("p").unwrap().1.config.clone();
    assert!(!engine.edit_mark(&same).unwrap());
    assert_eq!(count(&log, EventKind::Changed), 0);

    let mut sprite = same.clone();
    sprite.point_sprite_url = Some("https://cdn.example/pin.png".into());
    assert!(engine.edit_mark(&sprite).unwrap());
    assert!(engine.backend().calls.contains(&Call::Sprite(
        p,
        Some("https://cdn.example/pin.png".into())
    )));

    let mut recolor = engine.registry().find_mark("z").unwrap().1.config.clone();
    recolor.zone_fill_color = Some("#123456".into());
    recolor.zone_border_color = None;
    assert!(engine.edit_mark(&recolor).unwrap());
    assert_eq!(engine.backend().colors_of(z).unwrap().fill.color, 0x123456);
    let stored = engine.registry().find_mark("z").unwrap().1.config.clone();
    assert!(stored.zone_border_color.is_some());

    assert_eq!(count(&log, EventKind::Changed), 2);
    assert_eq!(count(&log, EventKind::EditedMark), 0);

    let mut ghost = same;
    ghost.id = "ghost".into();
    assert_eq!(
        engine.edit_mark(&ghost).err(),
        Some(EngineError::mark_not_found("ghost"))
    );
}

#[test]
fn partial_mark_edit_keeps_unset_fields() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![point("p", Vec3::Z * 300.0)])],
    );
    let p = mark_handle(&engine, "p");

    let grow = MarkEdit {
        scale: Some(2.0),
        ..MarkEdit::new("p")
    };
    assert!(engine.edit_mark(&grow).unwrap());
    assert!(!engine.edit_mark(MarkEdit::new("p")).unwrap());

    let pin = MarkEdit {
        point_sprite_url: Some("https://cdn.example/pin.png".into()),
        ..MarkEdit::new("p")
    };
    assert!(engine.edit_mark(pin).unwrap());
    let stored = engine.registry().find_mark("p").unwrap().1.config.clone();
    assert_eq!(stored.scale, 2.0);
    assert_eq!(stored.sprite(), Some("https://cdn.example/pin.png"));
    assert_eq!(
        engine
            .backend()
            .count(|c| matches!(c, Call::Scale(h, s) if *h == p && *s == 2.0)),
        1
    );

    // nonsense scales are ignored
    let nan = MarkEdit {
        scale: Some(f32::NAN),
        ..MarkEdit::new("p")
    };
    assert!(!engine.edit_mark(nan).unwrap());
}

#[test]
fn error_messages_name_entity_and_limit() {
    assert_eq!(
        EngineError::mark_not_found("ghost").to_string(),
        "mark `ghost` not found"
    );
    assert_eq!(
        EngineError::scene_not_found("s9").to_string(),
        "scene `s9` not found"
    );
    assert_eq!(
        EngineError::CapacityExceeded(pano_core::Capacity::Marks { limit: 3 }).to_string(),
        "marks per scene reached the limit of 3"
    );
}

#[test]
fn inbound_events_route_to_operations() {
    let mut engine = engine_with(
        GlobalConfig::default(),
        vec![with_marks("s1", vec![point("p", Vec3::Z * 300.0)])],
    );
    let log = record(&mut engine, &[EventKind::AddedScene]);

    engine.receive(InboundEvent::AddScene(None)).unwrap();
    assert_eq!(count(&log, EventKind::AddedScene), 1);
    let fresh = engine.get_all_configs()[1].id.clone();
    assert!(!fresh.is_empty());

    engine
        .receive(InboundEvent::EditScene {
            id: fresh.clone(),
            source: Some(image("https://cdn.example/x.jpg")),
        })
        .unwrap();
    assert!(engine.get_all_configs()[1].source.is_some());

    engine
        .receive(InboundEvent::RemoveMark("p".into()))
        .unwrap();
    assert!(engine.get_all_configs()[0].marks.is_empty());

    engine.receive(InboundEvent::RemoveScene(fresh)).unwrap();
    assert_eq!(engine.get_all_configs().len(), 1);

    assert!(engine
        .receive(InboundEvent::RemoveScene("nope".into()))
        .is_err());
}
