use std::time::Duration;

use shared::domain::Level;

use super::*;
use crate::test_support::{Panel, Recorder, CLK, DT};

fn open(panel: &Panel, initial: f64) -> (Rc<Potentiometer>, Rc<Recorder>) {
    let pot = Potentiometer::open(
        &panel.ctx,
        CLK,
        DT,
        PotentiometerSettings { initial, steps: 32 },
    )
    .expect("potentiometer");
    let recorder = Recorder::new(&panel.bus);
    recorder.watch(Action::ValueChanged, pot.id());
    (pot, recorder)
}

#[test]
fn clockwise_detent_lowers_volume_by_one_step() {
    let mut panel = Panel::new(Duration::ZERO);
    let (pot, recorder) = open(&panel, 0.5);

    panel.clockwise_detent_with_bounce();

    assert_eq!(pot.value(), 0.46875);
    assert_eq!(pot.percent(), 47);
    assert_eq!(recorder.signals(), vec![Signal::PercentChanged(47)]);
}

#[test]
fn counter_clockwise_detent_raises_volume() {
    let mut panel = Panel::new(Duration::ZERO);
    let (pot, recorder) = open(&panel, 0.5);

    panel.edge(DT, Level::Low);
    panel.edge(CLK, Level::Low);

    assert_eq!(pot.value(), 0.53125);
    assert_eq!(recorder.signals(), vec![Signal::PercentChanged(53)]);
}

#[test]
fn rotation_at_a_bound_still_publishes() {
    let panel = Panel::new(Duration::ZERO);
    let (pot, recorder) = open(&panel, 1.0);
    let encoder = pot.encoder().id();

    pot.on_event(&Event::new(encoder, Signal::RotateLeft));
    pot.on_event(&Event::new(encoder, Signal::RotateLeft));
    assert_eq!(pot.value(), 1.0);

    for _ in 0..40 {
        pot.on_event(&Event::new(encoder, Signal::RotateRight));
    }
    assert_eq!(pot.value(), 0.0);

    let signals = recorder.signals();
    assert_eq!(signals.len(), 42);
    assert_eq!(signals[0], Signal::PercentChanged(100));
    assert_eq!(signals[1], Signal::PercentChanged(100));
    assert_eq!(signals[41], Signal::PercentChanged(0));
}

#[test]
fn value_stays_in_range_over_long_sequences() {
    let panel = Panel::new(Duration::ZERO);
    let (pot, _recorder) = open(&panel, 0.25);
    let encoder = pot.encoder().id();

    let mut seed: u32 = 0x2545_f491;
    for _ in 0..2_000 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let signal = if seed & 0x8000 == 0 {
            Signal::RotateLeft
        } else {
            Signal::RotateRight
        };
        pot.on_event(&Event::new(encoder, signal));
        assert!((0.0..=1.0).contains(&pot.value()));
        assert!(pot.percent() <= 100);
    }
}

#[test]
fn initial_value_is_clamped() {
    let panel = Panel::new(Duration::ZERO);
    let (pot, recorder) = open(&panel, 3.0);
    assert_eq!(pot.value(), 1.0);
    assert!(recorder.signals().is_empty());
}

#[test]
fn invalid_settings_are_rejected_before_pins_are_claimed() {
    let panel = Panel::new(Duration::ZERO);
    let zero_steps = Potentiometer::open(
        &panel.ctx,
        CLK,
        DT,
        PotentiometerSettings {
            initial: 0.5,
            steps: 0,
        },
    );
    assert!(matches!(zero_steps, Err(IoError::InvalidSettings(_))));

    let nan = Potentiometer::open(
        &panel.ctx,
        CLK,
        DT,
        PotentiometerSettings {
            initial: f64::NAN,
            steps: 8,
        },
    );
    assert!(matches!(nan, Err(IoError::InvalidSettings(_))));
    assert!(!panel.gpio.is_configured(CLK));
}

#[test]
fn percent_rounds_half_up() {
    assert_eq!(to_percent(0.0), 0);
    assert_eq!(to_percent(0.46875), 47);
    assert_eq!(to_percent(0.125), 13);
    assert_eq!(to_percent(1.0), 100);
}

#[test]
fn close_stops_accumulating() {
    let mut panel = Panel::new(Duration::ZERO);
    let (pot, recorder) = open(&panel, 0.5);

    pot.close();
    assert!(!panel.gpio.is_configured(CLK));
    assert!(!panel.gpio.is_configured(DT));

    panel.edge(CLK, Level::Low);
    assert_eq!(pot.value(), 0.5);
    assert!(recorder.signals().is_empty());
}
