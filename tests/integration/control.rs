//! Control-thread integration tests
//!
//! Edits made while the engine is handed out, input ports, notifications
//! and the removal handshake.

use crate::helpers::*;
use sequoia::prelude::*;
use sequoia::{Error, MAX_INPORT_SEQUENCES};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[test]
fn test_engine_handoff() {
    let mut session = test_session();
    let mut other = test_session();
    assert!(!session.is_active());

    let engine = session.activate().unwrap();
    assert!(session.is_active());
    assert!(matches!(session.activate(), Err(Error::AlreadyActive)));

    let foreign = other.activate().unwrap();
    assert!(matches!(
        session.deactivate(foreign),
        Err(Error::ForeignEngine)
    ));

    session.deactivate(engine).unwrap();
    assert!(!session.is_active());
}

#[test]
fn test_queue_full_reports_error() {
    init_tracing();
    let config = SessionConfig {
        queue_depth: 2,
        ..SessionConfig::default()
    };
    let mut session = Session::new("tight", config).unwrap();
    let mut engine = session.activate().unwrap();

    session.set_bpm(100.0).unwrap();
    session.set_bpm(110.0).unwrap();
    assert!(matches!(
        session.set_bpm(130.0),
        Err(Error::QueueFull("session"))
    ));

    let mut buffers = MidiBufferSet::new(0, 0, 16);
    engine.process(TEST_BLOCK_SIZE, &mut buffers);
    assert_eq!(session.bpm(), 110.0);
    session.set_bpm(130.0).unwrap();
    session.deactivate(engine).unwrap();
    assert_eq!(session.bpm(), 130.0);
}

#[test]
fn test_sequence_edits_apply_at_block_start() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "lead", 4, 1, 60);
    session.start().unwrap();
    let mut engine = session.activate().unwrap();

    {
        let mut seq = session.sequence_mut(id).unwrap();
        seq.set_transpose(7).unwrap();
        seq.set_trig(1, Trigger::note(48)).unwrap();
        assert!(seq.set_clockdivide(0).is_err());
        assert!(seq.set_playhead(4).is_err());
    }
    let handle = session.sequence(id).unwrap();
    // triggers mirror immediately, engine state waits for the next block
    assert_eq!(handle.trigger(1), Some(Trigger::note(48)));
    assert_eq!(handle.state().transpose(), 0);

    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    let events = renderer.render(&mut engine, 2 * FPS_120);
    assert_eq!(session.sequence(id).unwrap().state().transpose(), 7);

    let notes: Vec<u8> = events
        .iter()
        .filter(|e| is_note_on(e))
        .map(|e| e.bytes[1])
        .collect();
    assert_eq!(notes, vec![67, 55]);
    session.deactivate(engine).unwrap();
}

#[test]
fn test_edits_apply_while_stopped() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "idle", 8, 1, 60);
    let mut engine = session.activate().unwrap();
    let mut buffers = MidiBufferSet::new(0, 1, 64);

    {
        let mut seq = session.sequence_mut(id).unwrap();
        seq.set_mute(true).unwrap();
        seq.set_last(5).unwrap();
        seq.set_playhead(3).unwrap();
    }
    engine.process(TEST_BLOCK_SIZE, &mut buffers);
    assert!(!engine.is_playing());
    let state = session.sequence(id).unwrap().state();
    assert!(state.mute());
    assert_eq!(state.last(), 5);
    assert_eq!(state.playhead(), 3);

    // a steady stream of edits never backs up the queue
    for i in 0..1000 {
        session.sequence_mut(id).unwrap().set_transpose(i % 24).unwrap();
        engine.process(64, &mut buffers);
    }
    assert_eq!(session.sequence(id).unwrap().state().transpose(), 999 % 24);
    session.deactivate(engine).unwrap();
}

#[test]
fn test_unknown_outport_rejected_on_handle() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "x", 4, 1, 60);
    let mut other = test_session();
    other.register_outport("b").unwrap();
    let foreign = other.outport_by_name("b").unwrap();

    let result = session.sequence_mut(id).unwrap().set_outport(Some(foreign));
    assert!(matches!(result, Err(Error::UnknownPort(_))));
}

#[test]
fn test_transpose_input_port() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "bass", 4, 1, 60);
    let keys = session.register_inport("keys").unwrap();
    session.set_inport_kind(keys, InPortKind::Transpose).unwrap();
    session.inport_add_sequence(keys, id).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    assert!(renderer.push_input(keys.index(), RawMidiEvent::note_on(0, 1, 65, 100)));
    // other channels are ignored
    assert!(renderer.push_input(keys.index(), RawMidiEvent::note_on(1, 2, 72, 100)));

    let events = renderer.render(&mut engine, FPS_120);
    let notes: Vec<u8> = events
        .iter()
        .filter(|e| is_note_on(e))
        .map(|e| e.bytes[1])
        .collect();
    assert_eq!(notes, vec![65]);
    assert_eq!(session.sequence(id).unwrap().state().transpose(), 5);
}

#[test]
fn test_mute_and_playhead_input_ports() {
    let mut session = test_session();
    let a = add_pattern(&mut session, "a", 8, 1, 60);
    let b = add_pattern(&mut session, "b", 8, 1, 72);

    let mutes = session.register_inport("mutes").unwrap();
    session.set_inport_kind(mutes, InPortKind::Mute).unwrap();
    session.inport_add_sequence(mutes, a).unwrap();

    let jumps = session.register_inport("jumps").unwrap();
    session.set_inport_kind(jumps, InPortKind::Playhead).unwrap();
    session.inport_add_sequence(jumps, b).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    assert!(renderer.push_input(mutes.index(), RawMidiEvent::note_on(0, 1, 62, 100)));
    assert!(renderer.push_input(jumps.index(), RawMidiEvent::note_on(0, 1, 65, 100)));
    let events = renderer.render(&mut engine, FPS_120);

    assert!(session.sequence(a).unwrap().state().mute());
    assert!(events.iter().all(|e| e.bytes[1] != 60));
    // step 5 has played and the playhead moved on
    assert_eq!(session.sequence(b).unwrap().state().playhead(), 6);

    assert!(renderer.push_input(mutes.index(), RawMidiEvent::note_on(0, 1, 61, 100)));
    renderer.render(&mut engine, FPS_120);
    assert!(!session.sequence(a).unwrap().state().mute());
}

#[test]
fn test_inport_target_limit() {
    let mut session = test_session();
    let port = session.register_inport("wide").unwrap();
    for n in 0..MAX_INPORT_SEQUENCES {
        let id = add_pattern(&mut session, &format!("s{n}"), 1, 1, 60);
        session.inport_add_sequence(port, id).unwrap();
    }
    let extra = add_pattern(&mut session, "extra", 1, 1, 60);
    assert!(session.inport_add_sequence(port, extra).is_err());
}

#[test]
fn test_notifications_from_audio_thread() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "watched", 4, 2, 60);
    session.sequence(id).unwrap().state().set_notifications(true);
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    let state = session.sequence(id).unwrap().state();

    let seen = std::thread::scope(|s| {
        let audio = s.spawn(|| renderer.render(&mut engine, 4 * FPS_120));
        let mut seen = Vec::new();
        while !audio.is_finished() {
            if let Some(playhead) = state.read_new_playhead() {
                seen.push(playhead);
            }
            std::thread::yield_now();
        }
        if let Some(playhead) = state.read_new_playhead() {
            seen.push(playhead);
        }
        let events = audio.join().unwrap();
        assert_eq!(note_on_frames(&events).len(), 2);
        seen
    });

    assert!(seen.iter().all(|p| (0..4).contains(p)));
    assert_eq!(seen.last(), Some(&0));
    assert_eq!(state.read_new_playhead(), None);
    session.deactivate(engine).unwrap();
}

#[test]
fn test_removal_handshake_across_threads() {
    let mut session = test_session();
    let keep = add_pattern(&mut session, "keep", 4, 1, 60);
    let gone = add_pattern(&mut session, "gone", 4, 2, 64);
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let mut buffers = MidiBufferSet::new(0, 1, 256);
    let running = AtomicBool::new(true);

    let reclaimed = std::thread::scope(|s| {
        let audio = s.spawn(|| {
            while running.load(Ordering::Acquire) {
                engine.process(TEST_BLOCK_SIZE, &mut buffers);
                std::thread::yield_now();
            }
        });

        session.remove_sequence(gone).unwrap();
        assert_eq!(session.pending_removals(), 1);
        assert!(session.sequence(gone).is_none());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reclaimed = Vec::new();
        while reclaimed.is_empty() && Instant::now() < deadline {
            reclaimed = session.reclaim();
            std::thread::sleep(Duration::from_millis(1));
        }
        running.store(false, Ordering::Release);
        audio.join().unwrap();
        reclaimed
    });

    assert_eq!(reclaimed.len(), 1);
    let seq = &reclaimed[0];
    assert_eq!(seq.id(), gone);
    assert_eq!(seq.name(), "gone");
    assert_eq!(seq.trigger(2), Some(Trigger::note(64)));
    assert_eq!(session.pending_removals(), 0);
    assert_eq!(engine.sequence_count(), 1);
    assert!(session.sequence(keep).is_some());

    session.deactivate(engine).unwrap();
    // a reclaimed sequence can be added again
    let seq = reclaimed.into_iter().next().unwrap();
    session.add_sequence(seq).unwrap();
    assert_eq!(session.sequence_count(), 2);
}

#[test]
fn test_capacity_counts_pending_removals() {
    init_tracing();
    let mut session = Session::builder().max_sequences(2).build().unwrap();
    session.register_outport("out").unwrap();
    let a = add_pattern(&mut session, "a", 1, 1, 60);
    add_pattern(&mut session, "b", 1, 1, 60);

    let engine = session.activate().unwrap();
    session.remove_sequence(a).unwrap();
    let seq = Sequence::new(1, session.tps()).unwrap();
    assert!(matches!(
        session.add_sequence(seq),
        Err(Error::CapacityExceeded { .. })
    ));

    session.deactivate(engine).unwrap();
    assert_eq!(session.reclaim().len(), 1);
    let seq = Sequence::new(1, session.tps()).unwrap();
    session.add_sequence(seq).unwrap();
}
