use std::{cell::RefCell, rc::Rc, sync::Arc, time::Duration};

use shared::{
    domain::{ComponentId, Level, Pin},
    event::{Action, Event, Signal},
};

use crate::{
    bus::{EventBus, Subscriber},
    component::Component,
    gpio::{Gpio, SimulatedGpio},
    reactor::{IoContext, Reactor},
};

pub(crate) const CLK: Pin = Pin(17);
pub(crate) const DT: Pin = Pin(18);

pub(crate) struct Recorder {
    component: Component,
    events: RefCell<Vec<Event>>,
}

impl Recorder {
    pub(crate) fn new(bus: &Rc<EventBus>) -> Rc<Self> {
        Rc::new(Self {
            component: Component::new(Rc::clone(bus)),
            events: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn id(&self) -> ComponentId {
        self.component.id()
    }

    pub(crate) fn watch(self: &Rc<Self>, action: Action, target: ComponentId) -> bool {
        self.component.subscribe(action, target, self)
    }

    pub(crate) fn forget(&self, action: Action, target: ComponentId) -> bool {
        self.component.unsubscribe(action, target)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub(crate) fn signals(&self) -> Vec<Signal> {
        self.events
            .borrow()
            .iter()
            .map(|event| event.signal.clone())
            .collect()
    }
}

impl Subscriber for Recorder {
    fn on_event(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}

pub(crate) struct Panel {
    pub(crate) bus: Rc<EventBus>,
    pub(crate) reactor: Reactor,
    pub(crate) ctx: IoContext,
    pub(crate) gpio: Arc<SimulatedGpio>,
}

impl Panel {
    pub(crate) fn new(debounce: Duration) -> Self {
        let bus = EventBus::new();
        let reactor = Reactor::new(Rc::clone(&bus));
        let gpio = Arc::new(SimulatedGpio::new());
        let ctx = reactor.context(Arc::clone(&gpio) as Arc<dyn Gpio>, debounce);
        Self {
            bus,
            reactor,
            ctx,
            gpio,
        }
    }

    /// Drives one line and lets the loop handle the resulting edge.
    pub(crate) fn edge(&mut self, pin: Pin, level: Level) {
        self.gpio.drive(pin, level);
        self.reactor.run_pending();
    }

    /// One clockwise detent plus a DT bounce pair, starting from both lines high.
    pub(crate) fn clockwise_detent_with_bounce(&mut self) {
        self.edge(CLK, Level::Low);
        self.edge(DT, Level::Low);
        self.edge(DT, Level::High);
        self.edge(DT, Level::Low);
    }
}
