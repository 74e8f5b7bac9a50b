//! Scheduling integration tests
//!
//! Renders sessions offline and checks exact event frames.

use crate::helpers::*;
use sequoia::prelude::*;

/// A 16-step pattern with a note every fourth step, one loop at 120 BPM.
#[test]
fn test_backbeat_end_to_end() {
    let mut session = test_session();
    add_pattern(&mut session, "beat", 16, 4, 60);
    session.start().unwrap();
    assert_eq!(session.frames_per_step() as u64, FPS_120);

    let mut engine = session.activate().unwrap();
    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    let events = renderer.render(&mut engine, 16 * FPS_120);

    let ons = note_on_frames(&events);
    let offs = note_off_frames(&events);
    assert_eq!(ons.len(), 4);
    assert_eq!(offs.len(), 4);
    for (i, (on, off)) in ons.iter().zip(&offs).enumerate() {
        assert_eq!(*on, i as u64 * 4 * FPS_120 + FPS_120 / 2);
        assert_eq!(off - on, FPS_120 / 2);
    }
    assert!(events.iter().all(|e| e.port == 0));
    assert!(events
        .iter()
        .filter(|e| is_note_on(e))
        .all(|e| e.bytes == [0x90, 60, 100]));
}

/// Block size does not change when events land.
#[test]
fn test_block_size_independence() {
    let render_with = |block: u32| {
        let mut session = test_session();
        add_pattern(&mut session, "a", 8, 3, 48);
        add_pattern(&mut session, "b", 5, 2, 72);
        session.start().unwrap();
        let mut engine = session.activate().unwrap();
        let mut renderer = OfflineRenderer::new(&session, block);
        renderer.render(&mut engine, 20 * FPS_120 + 17)
    };
    let reference = render_with(TEST_BLOCK_SIZE);
    assert!(!reference.is_empty());
    for block in [1, 64, 1000, 4096] {
        assert_eq!(render_with(block), reference, "block size {block}");
    }
}

/// Microtime shifts the fire frame within the step.
#[test]
fn test_microtime_offsets() {
    let mut session = test_session();
    let out = session.outport_by_name("out").unwrap();
    let mut seq = Sequence::new(4, session.tps()).unwrap();
    seq.set_trig(0, Trigger::note(60).with_microtime(-0.5)).unwrap();
    seq.set_trig(1, Trigger::note(61).with_microtime(0.25)).unwrap();
    seq.set_trig(2, Trigger::note(62).with_microtime(0.5)).unwrap();
    seq.set_outport(Some(out)).unwrap();
    session.add_sequence(seq).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let events = OfflineRenderer::new(&session, TEST_BLOCK_SIZE).render(&mut engine, 3 * FPS_120);
    assert_eq!(
        note_on_frames(&events),
        vec![0, FPS_120 + 4500, 2 * FPS_120 + FPS_120 - 1]
    );
}

/// Probability 0 never fires; probability 1 always fires.
#[test]
fn test_probability_extremes() {
    const STEPS: u64 = 10_000;

    for (probability, expected) in [(0.0, 0), (1.0, STEPS as usize)] {
        let mut session = fast_session();
        let fps = session.frames_per_step() as u64;
        assert_eq!(fps, 40);
        let out = session.outport_by_name("out").unwrap();
        let mut seq = Sequence::new(1, session.tps()).unwrap();
        seq.set_trig(0, Trigger::note(60).with_probability(probability))
            .unwrap();
        seq.set_outport(Some(out)).unwrap();
        session.add_sequence(seq).unwrap();
        session.start().unwrap();

        let mut engine = session.activate().unwrap();
        let events =
            OfflineRenderer::new(&session, TEST_BLOCK_SIZE).render(&mut engine, STEPS * fps);
        assert_eq!(note_on_frames(&events).len(), expected, "p={probability}");
    }
}

/// A seeded sequence fires roughly in proportion to its probability.
#[test]
fn test_probability_is_one_draw_per_step() {
    const STEPS: u64 = 4000;
    let mut session = fast_session();
    let fps = session.frames_per_step() as u64;
    let out = session.outport_by_name("out").unwrap();
    let mut seq = Sequence::new(1, session.tps()).unwrap();
    seq.set_seed(7);
    seq.set_trig(0, Trigger::note(60).with_probability(0.5)).unwrap();
    seq.set_outport(Some(out)).unwrap();
    session.add_sequence(seq).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    // tiny blocks split each step into many windows
    let events = OfflineRenderer::new(&session, 7).render(&mut engine, STEPS * fps);
    let fired = note_on_frames(&events).len();
    assert!((1700..2300).contains(&fired), "fired {fired} of {STEPS}");
}

/// Clock divide d advances the playhead once every d steps.
#[test]
fn test_clock_divide_rates() {
    const STEPS: u64 = 48;
    for divide in 1..=16i32 {
        let mut session = fast_session();
        let fps = session.frames_per_step() as u64;
        let id = add_pattern(&mut session, "div", 16, 1, 60);
        session
            .sequence_mut(id)
            .unwrap()
            .set_clockdivide(divide)
            .unwrap();
        session.start().unwrap();

        let mut engine = session.activate().unwrap();
        let events =
            OfflineRenderer::new(&session, TEST_BLOCK_SIZE).render(&mut engine, STEPS * fps);

        let expected_fires = STEPS.div_ceil(divide as u64) as usize;
        assert_eq!(note_on_frames(&events).len(), expected_fires, "divide {divide}");
        let advanced = (STEPS / divide as u64) % 16;
        assert_eq!(
            session.sequence(id).unwrap().state().playhead() as u64,
            advanced,
            "divide {divide}"
        );
    }
}

/// Loop bounds restrict which steps play.
#[test]
fn test_loop_bounds() {
    let mut session = test_session();
    let out = session.outport_by_name("out").unwrap();
    let mut seq = Sequence::new(8, session.tps()).unwrap();
    for step in 0..8 {
        seq.set_trig(step, Trigger::note(60 + step as u8)).unwrap();
    }
    seq.set_last(4).unwrap();
    seq.set_first(2).unwrap();
    seq.set_outport(Some(out)).unwrap();
    session.add_sequence(seq).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let events = OfflineRenderer::new(&session, TEST_BLOCK_SIZE).render(&mut engine, 6 * FPS_120);
    let notes: Vec<u8> = events
        .iter()
        .filter(|e| is_note_on(e))
        .map(|e| e.bytes[1])
        .collect();
    assert_eq!(notes, vec![62, 63, 64, 62, 63, 64]);
}

/// Several SetBpm requests in one block: only the last one sticks.
#[test]
fn test_set_bpm_fifo() {
    let mut session = test_session();
    let mut engine = session.activate().unwrap();
    for bpm in [100.0, 110.0, 130.0] {
        session.set_bpm(bpm).unwrap();
    }
    assert_eq!(session.bpm(), 120.0);

    let mut buffers = MidiBufferSet::new(0, 1, 64);
    engine.process(TEST_BLOCK_SIZE, &mut buffers);
    assert_eq!(engine.bpm(), 130.0);
    assert_eq!(session.bpm(), 130.0);
    assert_eq!(engine.frames_per_step(), 5538);
}

/// A tempo change that shortens the step below the current frame restarts the step.
#[test]
fn test_bpm_change_resets_step_frame() {
    let mut session = test_session();
    session.start().unwrap();
    let mut engine = session.activate().unwrap();
    let mut buffers = MidiBufferSet::new(0, 1, 64);
    for _ in 0..10 {
        engine.process(500, &mut buffers);
    }
    assert_eq!(engine.frame(), 5000);

    session.set_bpm(100.0).unwrap();
    engine.process(100, &mut buffers);
    assert_eq!(engine.frames_per_step(), 7200);
    assert_eq!(engine.frame(), 5100);

    session.set_bpm(240.0).unwrap();
    engine.process(100, &mut buffers);
    assert_eq!(engine.frames_per_step(), 3000);
    assert_eq!(engine.frame(), 100);
}

/// Stopping rewinds sequences but pending note-offs still go out.
#[test]
fn test_stop_flushes_note_offs() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "held", 4, 1, 60);
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    let events = renderer.render(&mut engine, FPS_120 + 3500);
    assert_eq!(note_on_frames(&events).len(), 2);
    assert_eq!(note_off_frames(&events).len(), 1);
    assert_eq!(engine.pending_note_offs(), 1);

    session.stop().unwrap();
    let events = renderer.render(&mut engine, FPS_120);
    assert!(note_on_frames(&events).is_empty());
    assert_eq!(note_off_frames(&events), vec![2 * FPS_120]);
    assert_eq!(engine.pending_note_offs(), 0);
    assert!(!engine.is_playing());
    assert_eq!(session.sequence(id).unwrap().state().playhead(), 0);
}

/// Output buffers are cleared every block, even while stopped.
#[test]
fn test_outputs_cleared_when_stopped() {
    let mut session = test_session();
    let mut engine = session.activate().unwrap();
    let mut buffers = MidiBufferSet::new(0, 1, 64);
    assert!(buffers.write_output(0, 0, [0x90, 60, 100]));
    engine.process(TEST_BLOCK_SIZE, &mut buffers);
    assert!(buffers.output(0).unwrap().is_empty());
}

/// Note-offs due on a frame go out before new notes on that frame.
#[test]
fn test_note_off_precedes_note_on_at_same_frame() {
    let mut session = test_session();
    let out = session.outport_by_name("out").unwrap();

    let mut long = Sequence::new(2, session.tps()).unwrap();
    // note-off lands on frame 3000 + 6000, the next step's fire frame
    long.set_trig(0, {
        let mut trig = Trigger::note(40);
        trig.set_note(40, 100, 1.0);
        trig
    })
    .unwrap();
    long.set_outport(Some(out)).unwrap();
    session.add_sequence(long).unwrap();

    let mut other = Sequence::new(2, session.tps()).unwrap();
    other.set_trig(1, Trigger::note(50)).unwrap();
    other.set_outport(Some(out)).unwrap();
    session.add_sequence(other).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let events = OfflineRenderer::new(&session, TEST_BLOCK_SIZE).render(&mut engine, 2 * FPS_120);
    let at_9000: Vec<[u8; 3]> = events
        .iter()
        .filter(|e| e.frame == 9000)
        .map(|e| e.bytes)
        .collect();
    assert_eq!(at_9000, vec![[0x80, 40, 0], [0x90, 50, 100]]);
}

/// A note held for a whole step is released before it retriggers.
#[test]
fn test_retrigger_is_not_cut() {
    for block in [TEST_BLOCK_SIZE, 64, 8192] {
        let mut session = test_session();
        let out = session.outport_by_name("out").unwrap();
        let mut seq = Sequence::new(1, session.tps()).unwrap();
        let mut trig = Trigger::note(60);
        trig.set_note(60, 100, 1.0);
        seq.set_trig(0, trig).unwrap();
        seq.set_outport(Some(out)).unwrap();
        session.add_sequence(seq).unwrap();
        session.start().unwrap();

        let mut engine = session.activate().unwrap();
        let events = OfflineRenderer::new(&session, block).render(&mut engine, 3 * FPS_120);
        let bytes: Vec<(u64, [u8; 3])> = events.iter().map(|e| (e.frame, e.bytes)).collect();
        assert_eq!(
            bytes,
            vec![
                (3000, [0x90, 60, 100]),
                (9000, [0x80, 60, 0]),
                (9000, [0x90, 60, 100]),
                (15000, [0x80, 60, 0]),
                (15000, [0x90, 60, 100]),
            ],
            "block size {block}"
        );
    }
}

/// Slowing down after a step has fired does not fire it again.
#[test]
fn test_tempo_change_mid_step_fires_once() {
    let mut session = test_session();
    let id = add_pattern(&mut session, "once", 2, 2, 60);
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let mut renderer = OfflineRenderer::new(&session, TEST_BLOCK_SIZE);
    let mut events = renderer.render(&mut engine, 3500);

    session.set_bpm(60.0).unwrap();
    events.extend(renderer.render(&mut engine, 8000));
    assert_eq!(engine.frames_per_step(), 12000);
    assert_eq!(note_on_frames(&events), vec![3000]);
    assert_eq!(session.sequence(id).unwrap().state().playhead(), 0);

    // step 0 ends at 12000, step 1 is empty, step 0 fires again mid-step at 30000
    events.extend(renderer.render(&mut engine, 20000));
    assert_eq!(note_on_frames(&events), vec![3000, 30000]);
}

/// Control-change triggers go out on their channel with no note-off.
#[test]
fn test_control_change_trigger() {
    let mut session = test_session();
    let out = session.outport_by_name("out").unwrap();
    let mut seq = Sequence::new(1, session.tps()).unwrap();
    seq.set_trig(0, Trigger::cc(74, 33).with_channel(5)).unwrap();
    seq.set_outport(Some(out)).unwrap();
    session.add_sequence(seq).unwrap();
    session.start().unwrap();

    let mut engine = session.activate().unwrap();
    let events = OfflineRenderer::new(&session, TEST_BLOCK_SIZE).render(&mut engine, 2 * FPS_120);
    let bytes: Vec<[u8; 3]> = events.iter().map(|e| e.bytes).collect();
    assert_eq!(bytes, vec![[0xB4, 74, 33], [0xB4, 74, 33]]);
    assert_eq!(engine.pending_note_offs(), 0);
}
