use std::rc::Rc;

use shared::{
    domain::ComponentId,
    event::{Action, Event, Signal},
};

use crate::{
    bus::{EventBus, Subscriber},
    component::Component,
};

/// Text sink for the on-device screen.
pub trait Display {
    fn render(&self, text: &str);
}

pub struct DisplayRenderer {
    component: Component,
    display: Box<dyn Display>,
}

impl DisplayRenderer {
    pub fn new(bus: Rc<EventBus>, display: Box<dyn Display>) -> Rc<Self> {
        Rc::new(Self {
            component: Component::new(bus),
            display,
        })
    }

    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    pub fn subscribe(self: &Rc<Self>, action: Action, target: ComponentId) -> bool {
        self.component.subscribe(action, target, self)
    }

    pub fn unsubscribe(&self, action: Action, target: ComponentId) -> bool {
        self.component.unsubscribe(action, target)
    }
}

impl Subscriber for DisplayRenderer {
    fn on_event(&self, event: &Event) {
        match &event.signal {
            Signal::PercentChanged(percent) => self.display.render(&format!("volume {percent}")),
            Signal::AuthStart(text) | Signal::AuthDone(text) => self.display.render(text),
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "tests/display_tests.rs"]
mod tests;
