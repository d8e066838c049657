use std::cell::RefCell;
use std::rc::Rc;

use keygrab::Action;

/// Collects the names of actions as they fire.
#[derive(Default, Debug, Clone)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<&'static str>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An action that records `name` each time it runs.
    pub fn action(&self, name: &'static str) -> Action {
        let calls = Rc::clone(&self.calls);
        Action::new(move || calls.borrow_mut().push(name))
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}
