use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn counting_callback() -> (EdgeCallback, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let callback: EdgeCallback = {
        let hits = Arc::clone(&hits);
        Arc::new(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    };
    (callback, hits)
}

#[test]
fn pull_up_inputs_start_high() {
    let gpio = SimulatedGpio::new();
    gpio.setup(Pin(4), Direction::In, PinOptions::pull(Pull::Up))
        .expect("setup");
    assert_eq!(gpio.read(Pin(4)), Level::High);
}

#[test]
fn drive_fires_callback_for_matching_edges_only() {
    let gpio = SimulatedGpio::new();
    gpio.setup(Pin(4), Direction::In, PinOptions::pull(Pull::Up))
        .expect("setup");
    let (callback, hits) = counting_callback();
    gpio.on_edge(Pin(4), Edge::Falling, callback, Duration::ZERO)
        .expect("edge");

    assert!(gpio.drive(Pin(4), Level::Low));
    assert!(!gpio.drive(Pin(4), Level::Low));
    assert!(!gpio.drive(Pin(4), Level::High));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(gpio.read(Pin(4)), Level::High);
}

#[test]
fn debounce_window_suppresses_bounces() {
    let gpio = SimulatedGpio::new();
    gpio.setup(Pin(5), Direction::In, PinOptions::pull(Pull::Up))
        .expect("setup");
    let (callback, hits) = counting_callback();
    gpio.on_edge(Pin(5), Edge::Both, callback, Duration::from_secs(5))
        .expect("edge");

    gpio.drive(Pin(5), Level::Low);
    gpio.drive(Pin(5), Level::High);
    gpio.drive(Pin(5), Level::Low);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(gpio.read(Pin(5)), Level::Low);
}

#[test]
fn second_edge_registration_conflicts() {
    let gpio = SimulatedGpio::new();
    gpio.setup(Pin(6), Direction::In, PinOptions::default())
        .expect("setup");
    let (first, _) = counting_callback();
    let (second, _) = counting_callback();
    gpio.on_edge(Pin(6), Edge::Both, first, Duration::ZERO)
        .expect("edge");
    let err = gpio
        .on_edge(Pin(6), Edge::Both, second, Duration::ZERO)
        .expect_err("conflict");
    assert!(matches!(err, IoError::EdgeConflict { pin } if pin == Pin(6)));
}

#[test]
fn writes_require_an_output_pin() {
    let gpio = SimulatedGpio::new();
    assert!(matches!(
        gpio.write(Pin(7), Level::High),
        Err(IoError::PinNotConfigured { .. })
    ));

    gpio.setup(Pin(7), Direction::In, PinOptions::default())
        .expect("setup");
    assert!(matches!(
        gpio.write(Pin(7), Level::High),
        Err(IoError::WrongDirection { .. })
    ));

    gpio.setup(Pin(8), Direction::Out, PinOptions::initial(Level::High))
        .expect("setup");
    assert_eq!(gpio.read(Pin(8)), Level::High);
    gpio.write(Pin(8), Level::Low).expect("write");
    assert_eq!(gpio.read(Pin(8)), Level::Low);
}

#[test]
fn levels_driven_before_setup_are_kept() {
    let gpio = SimulatedGpio::new();
    gpio.drive(Pin(9), Level::Low);
    gpio.setup(Pin(9), Direction::In, PinOptions::pull(Pull::Up))
        .expect("setup");
    assert_eq!(gpio.read(Pin(9)), Level::Low);
}
