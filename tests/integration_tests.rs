//! End-to-end tests of the control surface.
//!
//! These drive the public API only: buffered button events in, panel
//! frames through `tick`, snapshots, LED requests, and persisted
//! resources out.

use approx::assert_abs_diff_eq;
use strata::control::{ButtonEvent, ButtonId, Layer};
use strata::led::LedRequest;
use strata::persist::{decode_layer_frame, Config, DirStore, MemoryStore, ResourceStore};
use strata::{ControlSurface, PanelFrame, Tunables};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn frame_with_knobs(value: f32) -> PanelFrame {
    PanelFrame {
        knobs: [value; 10],
        ..PanelFrame::default()
    }
}

fn quick_save_tunables() -> Tunables {
    Tunables {
        save_limit: 3,
        reset_limit: 3,
        random_slew_ticks: 5,
        fade_increment: 0.25,
        ..Tunables::default()
    }
}

/// Hold the primary button long enough to arm a save and ride the fade
/// all the way back up.
fn perform_save<S: ResourceStore>(surface: &mut ControlSurface<S>, frame: &PanelFrame) {
    surface.push_button(ButtonEvent::press(ButtonId::ModCv));
    for _ in 0..20 {
        surface.tick(frame);
    }
    surface.push_button(ButtonEvent::release(ButtonId::ModCv));
    surface.tick(frame);
}

// ============================================================================
// Cold start
// ============================================================================

#[test]
fn test_cold_start_with_empty_store() {
    init_tracing();
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();
    s.tick(&PanelFrame::default());

    assert_eq!(s.layer(), Layer::Normal);
    assert_eq!(*s.config(), Config::default());
    assert_abs_diff_eq!(s.snapshot().out_level, 1.0);
    assert_eq!(s.snapshot().volumes, [0.0; 4]);
    // Echo filter center ships off 0.5.
    assert_abs_diff_eq!(s.params().get(Layer::Alt, 1), 0.55);
}

#[test]
fn test_malformed_resources_degrade_to_defaults() {
    let mut store = MemoryStore::new();
    store.save("patch.prm", &[0xAB; 3]).unwrap();
    store.save("patch.cfg", &[0xCD; 2]).unwrap();

    let mut s = ControlSurface::new("patch", Tunables::default(), store).unwrap();
    s.tick(&PanelFrame::default());
    assert_eq!(*s.config(), Config::default());
    assert_abs_diff_eq!(s.params().get(Layer::Normal, 0), 0.0);
}

#[test]
fn test_revision_config_record() {
    let mut store = MemoryStore::new();
    store
        .save("patch.cfg", &Config::for_revision(2).encode())
        .unwrap();
    let s = ControlSurface::new("patch", Tunables::default(), store).unwrap();
    assert!(s.config().mod_attenuverters);
    assert!(s.config().cv_attenuverters);
    assert_eq!(s.config().revision, 2);
}

// ============================================================================
// Layer arbitration through the event queue
// ============================================================================

#[test]
fn test_layer_selection_matrix() {
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();
    let combos = [
        (vec![ButtonId::Shift], Layer::Alt),
        (vec![ButtonId::ModCv], Layer::Mod),
        (vec![ButtonId::Shift, ButtonId::ModCv], Layer::Cv),
        (vec![ButtonId::RandomMap], Layer::Rnd),
        (vec![], Layer::Normal),
    ];
    for (held, expected) in combos {
        for id in [ButtonId::Shift, ButtonId::ModCv, ButtonId::RandomMap] {
            if held.contains(&id) {
                s.push_button(ButtonEvent::press(id));
            } else {
                s.push_button(ButtonEvent::release(id));
            }
        }
        s.tick(&PanelFrame::default());
        assert_eq!(s.layer(), expected, "held {held:?}");
    }
}

#[test]
fn test_analog_button_levels_respect_hysteresis() {
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();

    // Below the high threshold: no press.
    s.push_button(ButtonEvent {
        button: ButtonId::Shift,
        level: 0.4,
        sample_offset: 12,
    });
    s.tick(&PanelFrame::default());
    assert_eq!(s.layer(), Layer::Normal);

    // Above it: Alt.
    s.push_button(ButtonEvent {
        button: ButtonId::Shift,
        level: 0.6,
        sample_offset: 40,
    });
    s.tick(&PanelFrame::default());
    assert_eq!(s.layer(), Layer::Alt);

    // Sagging to 0.3 stays above the low threshold: still held.
    s.push_button(ButtonEvent {
        button: ButtonId::Shift,
        level: 0.3,
        sample_offset: 7,
    });
    s.tick(&PanelFrame::default());
    assert_eq!(s.layer(), Layer::Alt);

    // Clearing below the low threshold releases.
    s.push_button(ButtonEvent {
        button: ButtonId::Shift,
        level: 0.1,
        sample_offset: 90,
    });
    s.tick(&PanelFrame::default());
    assert_eq!(s.layer(), Layer::Normal);
}

// ============================================================================
// Save, persistence, and the framed command stream
// ============================================================================

#[test]
fn test_save_round_trip_through_directory() {
    let dir = TempDir::new().unwrap();
    let tunables = quick_save_tunables();

    let mut s = ControlSurface::new(
        "patch",
        tunables.clone(),
        DirStore::new(dir.path()),
    )
    .unwrap();
    let frame = frame_with_knobs(0.37);
    s.tick(&frame);
    perform_save(&mut s, &frame);

    for suffix in ["prm", "alt", "mod", "cv", "rnd"] {
        assert!(
            dir.path().join(format!("patch.{suffix}")).exists(),
            "missing patch.{suffix}"
        );
    }

    let mut restored =
        ControlSurface::new("patch", tunables, DirStore::new(dir.path())).unwrap();
    restored.tick(&PanelFrame::default());
    assert_abs_diff_eq!(
        restored.params().get(Layer::Normal, 3),
        0.37,
        epsilon = 1e-3
    );
    // Knobs sit at 0 now; the restored value must hold.
    restored.tick(&PanelFrame::default());
    assert_abs_diff_eq!(
        restored.params().get(Layer::Normal, 3),
        0.37,
        epsilon = 1e-3
    );
}

#[test]
fn test_save_emits_one_frame_per_layer_in_order() {
    let mut s = ControlSurface::new(
        "patch",
        quick_save_tunables(),
        MemoryStore::new(),
    )
    .unwrap();
    let frame = frame_with_knobs(0.25);
    s.tick(&frame);
    perform_save(&mut s, &frame);

    let frames = s.drain_outbound();
    assert_eq!(frames.len(), 5);
    for (wire, expected) in frames.iter().zip(Layer::ALL) {
        let (layer, values) = decode_layer_frame(wire).unwrap();
        assert_eq!(layer, expected);
        for (slot, v) in values.iter().enumerate() {
            assert!(
                (v - s.params().get(layer, slot)).abs() <= 1.0 / 8192.0,
                "{layer} slot {slot}"
            );
        }
    }
    // Drained: nothing left.
    assert!(s.drain_outbound().is_empty());
}

#[test]
fn test_save_fade_dips_to_silence_and_recovers() {
    let mut s = ControlSurface::new(
        "patch",
        quick_save_tunables(),
        MemoryStore::new(),
    )
    .unwrap();
    s.tick(&PanelFrame::default());

    s.push_button(ButtonEvent::press(ButtonId::ModCv));
    let mut min_level = 1.0f32;
    for _ in 0..30 {
        s.tick(&PanelFrame::default());
        min_level = min_level.min(s.snapshot().out_level);
    }
    assert_abs_diff_eq!(min_level, 0.0);
    assert_abs_diff_eq!(s.snapshot().out_level, 1.0);
}

// ============================================================================
// Soft takeover
// ============================================================================

#[test]
fn test_takeover_never_jumps() {
    // Persist a vector far from where the knobs will sit.
    let store = {
        let mut s = ControlSurface::new(
            "patch",
            quick_save_tunables(),
            MemoryStore::new(),
        )
        .unwrap();
        let frame = frame_with_knobs(0.8);
        s.tick(&frame);
        perform_save(&mut s, &frame);
        s.into_store()
    };

    let mut s = ControlSurface::new("patch", Tunables::default(), store).unwrap();
    let mut previous = None;
    for i in 0..=100 {
        let level = i as f32 / 100.0;
        s.tick(&frame_with_knobs(level));
        let value = s.params().get(Layer::Normal, 2);
        if let Some(prev) = previous {
            let delta: f32 = value - prev;
            assert!(
                delta.abs() <= 0.03,
                "value jumped by {delta} at knob {level}"
            );
        }
        previous = Some(value);
    }
    // The sweep ended above the stored value, so the control is live.
    assert_abs_diff_eq!(s.params().get(Layer::Normal, 2), 1.0, epsilon = 1e-6);
}

#[test]
fn test_layer_switch_holds_until_caught() {
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();
    s.tick(&frame_with_knobs(0.9));

    // Mod amounts default to 0 (slot 2); the knob at 0.9 must not write.
    s.push_button(ButtonEvent::press(ButtonId::ModCv));
    for _ in 0..10 {
        s.tick(&frame_with_knobs(0.9));
    }
    assert_eq!(s.layer(), Layer::Mod);
    assert_abs_diff_eq!(s.params().get(Layer::Mod, 2), 0.0);

    // Returning leaves Normal untouched as well.
    s.push_button(ButtonEvent::release(ButtonId::ModCv));
    s.tick(&frame_with_knobs(0.9));
    assert_abs_diff_eq!(s.params().get(Layer::Normal, 2), 0.9);
}

// ============================================================================
// Reset, randomize, undo
// ============================================================================

#[test]
fn test_reset_combo_restores_rnd_defaults() {
    let mut s = ControlSurface::new(
        "patch",
        quick_save_tunables(),
        MemoryStore::new(),
    )
    .unwrap();
    s.tick(&PanelFrame::default());

    // Edit the Rnd amounts: stored 0 matches the knob at 0, then track up.
    s.push_button(ButtonEvent::press(ButtonId::RandomMap));
    s.tick(&frame_with_knobs(0.0));
    s.tick(&frame_with_knobs(0.8));
    assert_abs_diff_eq!(s.params().get(Layer::Rnd, 0), 0.8);

    s.push_button(ButtonEvent::press(ButtonId::Random));
    for _ in 0..8 {
        s.tick(&frame_with_knobs(0.8));
    }
    assert_abs_diff_eq!(s.params().get(Layer::Rnd, 0), 0.0);
}

#[test]
fn test_undo_redo_round_trip_after_randomize() {
    // Zero catch-up window: a stationary knob can never go live by
    // proximity, so held values stay exactly put for the whole test.
    let tunables = Tunables {
        catch_up_epsilon: 0.0,
        ..Tunables::default()
    };
    let mut s =
        ControlSurface::with_seed("patch", tunables, MemoryStore::new(), 21).unwrap();
    s.tick(&frame_with_knobs(0.5));

    // Open every randomization amount from the Rnd layer.
    s.push_button(ButtonEvent::press(ButtonId::RandomMap));
    s.tick(&frame_with_knobs(0.0));
    s.tick(&frame_with_knobs(1.0));
    s.push_button(ButtonEvent::release(ButtonId::RandomMap));
    s.tick(&frame_with_knobs(1.0));
    assert_abs_diff_eq!(s.params().get(Layer::Rnd, 6), 1.0);

    let before: Vec<f32> = s.params().layer_values(Layer::Normal).to_vec();
    s.trigger_random_external();
    s.tick(&frame_with_knobs(1.0));
    let randomized: Vec<f32> = s.params().layer_values(Layer::Normal).to_vec();
    assert_ne!(before[..8], randomized[..8]);

    // Undo from Alt.
    s.push_button(ButtonEvent::press(ButtonId::Shift));
    s.tick(&frame_with_knobs(1.0));
    s.push_button(ButtonEvent::press(ButtonId::Random));
    s.tick(&frame_with_knobs(1.0));
    assert_eq!(s.params().layer_values(Layer::Normal), &before[..]);

    // Redo with a second press.
    s.push_button(ButtonEvent::release(ButtonId::Random));
    s.tick(&frame_with_knobs(1.0));
    s.push_button(ButtonEvent::press(ButtonId::Random));
    s.tick(&frame_with_knobs(1.0));
    assert_eq!(s.params().layer_values(Layer::Normal), &randomized[..]);
}

#[test]
fn test_slewed_randomize_blinks_on_completion() {
    let tunables = quick_save_tunables();
    let mut s =
        ControlSurface::with_seed("patch", tunables, MemoryStore::new(), 3).unwrap();
    s.tick(&PanelFrame::default());

    // Hold random well past the slew threshold.
    s.push_button(ButtonEvent::press(ButtonId::Random));
    for _ in 0..20 {
        s.tick(&PanelFrame::default());
    }
    s.push_button(ButtonEvent::release(ButtonId::Random));
    s.tick(&PanelFrame::default());
    assert_eq!(s.leds().random, LedRequest::On);

    let mut blinked = false;
    for _ in 0..25 {
        s.tick(&PanelFrame::default());
        if s.leds().random == LedRequest::Blink(2) {
            blinked = true;
        }
    }
    assert!(blinked, "completion blink never appeared");
}

// ============================================================================
// LEDs and snapshot
// ============================================================================

#[test]
fn test_led_feedback_tracks_layer_and_input() {
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();
    let mut frame = PanelFrame::default();
    frame.input_level = 0.9;
    frame.clock_tick = true;
    s.push_button(ButtonEvent::press(ButtonId::RandomMap));
    s.tick(&frame);

    assert_eq!(s.leds().input_peak, LedRequest::On);
    assert_eq!(s.leds().sync, LedRequest::Blink(1));
    assert_eq!(s.leds().random_map, LedRequest::On);
}

#[test]
fn test_snapshot_serializes_to_json() {
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();
    s.tick(&frame_with_knobs(0.5));

    let json = serde_json::to_value(s.snapshot()).unwrap();
    assert_eq!(json["layer"], "normal");
    assert_eq!(json["voice"].as_array().unwrap().len(), 8);
    assert_eq!(json["volumes"].as_array().unwrap().len(), 4);
}

#[test]
fn test_snapshot_is_coherent_after_every_tick() {
    let mut s =
        ControlSurface::new("patch", Tunables::default(), MemoryStore::new()).unwrap();
    let mut frame = frame_with_knobs(0.6);
    frame.faders = [0.9, 0.1, 0.99, 0.5];
    s.tick(&frame);

    let snap = s.snapshot();
    assert_eq!(snap.layer, Layer::Normal);
    assert_abs_diff_eq!(snap.mod_level, 0.6);
    assert_abs_diff_eq!(snap.mod_speed, 0.6);
    // Third fader snaps to the top.
    assert_eq!(snap.volumes, [0.9, 0.1, 1.0, 0.5]);
    for v in snap.voice {
        assert!((0.0..=1.0).contains(&v));
    }
}
