use std::{cell::RefCell, rc::Rc};

use shared::event::{Action, Event, Signal};

use super::*;
use crate::test_support::Recorder;

struct Hook {
    id: ComponentId,
    run: Box<dyn Fn(&Event)>,
}

impl Hook {
    fn new(run: impl Fn(&Event) + 'static) -> Rc<Self> {
        Rc::new(Self {
            id: ComponentId::random(),
            run: Box::new(run),
        })
    }

    fn attach(self: &Rc<Self>, bus: &EventBus, action: Action, target: ComponentId) {
        let handler: Weak<dyn Subscriber> = Rc::downgrade(self) as Weak<dyn Subscriber>;
        bus.subscribe(action, target, self.id, handler);
    }
}

impl Subscriber for Hook {
    fn on_event(&self, event: &Event) {
        (self.run)(event);
    }
}

#[test]
fn publish_without_subscribers_is_a_no_op() {
    let bus = EventBus::new();
    bus.publish(Event::new(ComponentId::random(), Signal::RotateLeft));
    assert_eq!(bus.subscription_count(), 0);
}

#[test]
fn delivers_only_matching_action_and_source() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let other = ComponentId::random();
    let recorder = Recorder::new(&bus);
    recorder.watch(Action::RotateLeft, source);

    bus.publish(Event::new(source, Signal::RotateLeft));
    bus.publish(Event::new(source, Signal::RotateRight));
    bus.publish(Event::new(other, Signal::RotateLeft));

    assert_eq!(recorder.signals(), vec![Signal::RotateLeft]);
    assert_eq!(recorder.events()[0].source, source);
}

#[test]
fn delivers_in_registration_order() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let log = Rc::new(RefCell::new(Vec::new()));

    let hooks: Vec<Rc<Hook>> = (0..3)
        .map(|n| {
            let log = Rc::clone(&log);
            Hook::new(move |_| log.borrow_mut().push(n))
        })
        .collect();
    for hook in &hooks {
        hook.attach(&bus, Action::RotateRight, source);
    }

    bus.publish(Event::new(source, Signal::RotateRight));
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
}

#[test]
fn double_subscribe_then_single_unsubscribe_leaves_nothing() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let recorder = Recorder::new(&bus);

    assert!(recorder.watch(Action::AuthDone, source));
    assert!(!recorder.watch(Action::AuthDone, source));
    assert_eq!(bus.subscription_count(), 1);

    assert!(recorder.forget(Action::AuthDone, source));
    assert_eq!(bus.subscription_count(), 0);
    assert!(!bus.is_subscribed(Action::AuthDone, source, recorder.id()));

    bus.publish(Event::new(source, Signal::AuthDone("hello".into())));
    assert!(recorder.signals().is_empty());
}

#[test]
fn unsubscribing_unknown_triple_is_a_no_op() {
    let bus = EventBus::new();
    let recorder = Recorder::new(&bus);
    assert!(!recorder.forget(Action::RotateLeft, ComponentId::random()));
    assert_eq!(bus.subscription_count(), 0);
}

#[test]
fn subscribe_during_dispatch_skips_event_in_flight() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let late = Recorder::new(&bus);

    let hook = {
        let late = Rc::clone(&late);
        Hook::new(move |_| {
            late.watch(Action::RotateLeft, source);
        })
    };
    hook.attach(&bus, Action::RotateLeft, source);

    bus.publish(Event::new(source, Signal::RotateLeft));
    assert!(late.signals().is_empty());

    bus.publish(Event::new(source, Signal::RotateLeft));
    assert_eq!(late.signals(), vec![Signal::RotateLeft]);
}

#[test]
fn unsubscribe_during_dispatch_still_delivers_event_in_flight() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let victim = Recorder::new(&bus);

    let hook = {
        let victim = Rc::clone(&victim);
        Hook::new(move |_| {
            victim.forget(Action::RotateRight, source);
        })
    };
    hook.attach(&bus, Action::RotateRight, source);
    victim.watch(Action::RotateRight, source);

    bus.publish(Event::new(source, Signal::RotateRight));
    bus.publish(Event::new(source, Signal::RotateRight));

    assert_eq!(victim.signals(), vec![Signal::RotateRight]);
}

#[test]
fn nested_publish_is_drained_depth_first() {
    let bus = EventBus::new();
    let outer = ComponentId::random();
    let inner = ComponentId::random();
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));

    let relay = {
        let bus = Rc::clone(&bus);
        let log = Rc::clone(&log);
        Hook::new(move |_| {
            log.borrow_mut().push("relay:before");
            bus.publish(Event::new(inner, Signal::PercentChanged(1)));
            log.borrow_mut().push("relay:after");
        })
    };
    let nested = {
        let log = Rc::clone(&log);
        Hook::new(move |_| log.borrow_mut().push("nested"))
    };
    let second = {
        let log = Rc::clone(&log);
        Hook::new(move |_| log.borrow_mut().push("second"))
    };
    relay.attach(&bus, Action::RotateLeft, outer);
    second.attach(&bus, Action::RotateLeft, outer);
    nested.attach(&bus, Action::ValueChanged, inner);

    bus.publish(Event::new(outer, Signal::RotateLeft));

    assert_eq!(
        *log.borrow(),
        vec!["relay:before", "nested", "relay:after", "second"]
    );
}

#[test]
fn dropped_subscribers_are_pruned() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let recorder = Recorder::new(&bus);
    recorder.watch(Action::RotateLeft, source);
    assert_eq!(bus.subscription_count(), 1);

    drop(recorder);
    assert_eq!(bus.subscription_count(), 0);
    bus.publish(Event::new(source, Signal::RotateLeft));
}

#[test]
fn subscriptions_are_keyed_by_the_subscriber_id_given_at_subscribe() {
    let bus = EventBus::new();
    let source = ComponentId::random();
    let hook = Hook::new(|_| {});
    let handler: Weak<dyn Subscriber> = Rc::downgrade(&hook) as Weak<dyn Subscriber>;
    let alias = ComponentId::random();

    assert!(bus.subscribe(Action::RotateLeft, source, hook.id, handler.clone()));
    assert!(bus.subscribe(Action::RotateLeft, source, alias, handler));
    assert_eq!(bus.subscription_count(), 2);

    assert!(bus.unsubscribe(Action::RotateLeft, source, alias));
    assert!(bus.is_subscribed(Action::RotateLeft, source, hook.id));
    assert!(!bus.is_subscribed(Action::RotateLeft, source, alias));
}
