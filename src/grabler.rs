use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::key::{HostKeyEvent, KeyDescriptor};

/// Lifecycle of a [`Grabler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Created but not capturing yet; events are ignored until [`Grabler::wake`].
    Unborn,
    /// Capturing and dispatching.
    Awake,
    /// Capturing is paused; events are dropped.
    Asleep,
    /// Permanently shut down.
    Dead,
}

/// Verdict of a layer on one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The event is handled; lower layers are not consulted.
    Stop,
    /// Hand the event to the next layer down.
    Continue,
}

impl Flow {
    /// `Continue` if `passthrough` is set, `Stop` otherwise.
    pub fn passthrough(passthrough: bool) -> Self {
        if passthrough { Flow::Continue } else { Flow::Stop }
    }
}

/// A key press on its way through the grabler stack.
pub struct KeyInput<'a> {
    key: KeyDescriptor,
    event: &'a mut dyn HostKeyEvent,
}

impl<'a> KeyInput<'a> {
    pub fn new(event: &'a mut dyn HostKeyEvent) -> Self {
        Self {
            key: KeyDescriptor::from_event(&*event),
            event,
        }
    }

    /// Canonical descriptor of the key press.
    pub fn key(&self) -> &KeyDescriptor {
        &self.key
    }

    /// Ask the host to suppress its default handling.
    pub fn prevent_default(&mut self) {
        self.event.prevent_default();
    }
}

impl fmt::Debug for KeyInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInput").field("key", &self.key).finish()
    }
}

/// A layer in the grabler stack.
///
/// Implementors decide whether they claim a key press and whether the
/// host's default should be suppressed.
pub trait Grable {
    fn grab(&self, input: &mut KeyInput<'_>) -> Flow;
}

/// The single capture point for keyboard input.
///
/// The host feeds every key press to [`Grabler::grable`]. The grabler
/// normalizes it and offers it to its layers, most recently added first,
/// until one returns [`Flow::Stop`].
///
/// Mappers built without an explicit grabler share the per-thread instance
/// returned by [`Grabler::shared`]; running more than one grabler over the
/// same event source is not recommended.
pub struct Grabler {
    status: Cell<Status>,
    stack: RefCell<Vec<Rc<dyn Grable>>>,
}

thread_local! {
    static SHARED: Rc<Grabler> = Grabler::new();
}

impl Grabler {
    /// A grabler that is capturing right away.
    pub fn new() -> Rc<Self> {
        let grabler = Self::unborn();
        grabler.status.set(Status::Awake);
        grabler
    }

    /// A grabler that ignores events until woken.
    pub fn unborn() -> Rc<Self> {
        Rc::new(Self {
            status: Cell::new(Status::Unborn),
            stack: RefCell::new(Vec::new()),
        })
    }

    /// The per-thread default grabler, created on first use.
    ///
    /// The same instance is returned for the life of the thread, including
    /// after it has been killed.
    pub fn shared() -> Rc<Self> {
        SHARED.with(Rc::clone)
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// Put `layer` on top of the stack, moving it there if already present.
    ///
    /// A dead grabler stays empty: the layer is dropped.
    pub fn add(&self, layer: Rc<dyn Grable>) {
        if self.status.get() == Status::Dead {
            debug!("grabler: add ignored, grabler is dead");
            return;
        }
        self.remove(&layer);
        let mut stack = self.stack.borrow_mut();
        stack.push(layer);
        debug!(depth = stack.len(), "grabler: layer added");
    }

    /// Take `layer` off the stack. No-op if it is not there.
    pub fn remove(&self, layer: &Rc<dyn Grable>) {
        let mut stack = self.stack.borrow_mut();
        if let Some(idx) = stack.iter().rposition(|l| Rc::ptr_eq(l, layer)) {
            stack.remove(idx);
            debug!(depth = stack.len(), "grabler: layer removed");
        }
    }

    pub fn contains(&self, layer: &Rc<dyn Grable>) -> bool {
        self.stack.borrow().iter().any(|l| Rc::ptr_eq(l, layer))
    }

    pub fn len(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.borrow().is_empty()
    }

    pub fn sleep(&self) {
        self.transition(Status::Asleep);
    }

    pub fn wake(&self) {
        self.transition(Status::Awake);
    }

    /// Stop capturing for good and release every layer.
    pub fn kill(&self) {
        self.status.set(Status::Dead);
        let released = std::mem::take(&mut *self.stack.borrow_mut());
        debug!(released = released.len(), "grabler: killed");
    }

    fn transition(&self, to: Status) {
        let from = self.status.get();
        if from == Status::Dead || from == to {
            return;
        }
        self.status.set(to);
        debug!(?from, ?to, "grabler: status changed");
    }

    /// Dispatch one key press.
    ///
    /// Returns `None` when the grabler is not awake and nothing was
    /// consulted. Otherwise returns `Some(Flow::Stop)` if a layer claimed the
    /// event and `Some(Flow::Continue)` if it fell through every layer.
    ///
    /// The stack is snapshotted before the walk, so layers added or removed
    /// by an action take effect from the next key press. Putting the grabler
    /// to sleep or killing it from an action ends the current walk.
    pub fn grable(&self, event: &mut dyn HostKeyEvent) -> Option<Flow> {
        if self.status.get() != Status::Awake {
            trace!(status = ?self.status.get(), "grabler: event dropped");
            return None;
        }

        let mut input = KeyInput::new(event);
        let layers: Vec<Rc<dyn Grable>> = self.stack.borrow().clone();
        trace!(key = %input.key(), depth = layers.len(), "grabler: dispatch");

        for layer in layers.iter().rev() {
            if layer.grab(&mut input) == Flow::Stop {
                trace!(key = %input.key(), "grabler: stopped");
                return Some(Flow::Stop);
            }
            if self.status.get() != Status::Awake {
                return Some(Flow::Stop);
            }
        }
        Some(Flow::Continue)
    }
}

impl fmt::Debug for Grabler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grabler")
            .field("status", &self.status.get())
            .field("depth", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPress;

    struct Fixed(Flow, Rc<Cell<usize>>);

    impl Grable for Fixed {
        fn grab(&self, _: &mut KeyInput<'_>) -> Flow {
            self.1.set(self.1.get() + 1);
            self.0
        }
    }

    fn layer(flow: Flow) -> (Rc<dyn Grable>, Rc<Cell<usize>>) {
        let hits = Rc::new(Cell::new(0));
        (Rc::new(Fixed(flow, Rc::clone(&hits))), hits)
    }

    #[test]
    fn unborn_grabler_waits_for_wake() {
        let grabler = Grabler::unborn();
        let (l, hits) = layer(Flow::Continue);
        grabler.add(l);

        assert_eq!(grabler.grable(&mut KeyPress::new("a")), None);
        assert_eq!(hits.get(), 0);

        grabler.wake();
        assert_eq!(grabler.status(), Status::Awake);
        assert_eq!(grabler.grable(&mut KeyPress::new("a")), Some(Flow::Continue));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn remove_of_absent_layer_is_noop() {
        let grabler = Grabler::new();
        let (a, _) = layer(Flow::Stop);
        let (b, _) = layer(Flow::Stop);
        grabler.add(Rc::clone(&a));
        grabler.remove(&b);
        assert_eq!(grabler.len(), 1);
        assert!(grabler.contains(&a));
        assert!(!grabler.contains(&b));
    }

    #[test]
    fn dead_is_terminal() {
        let grabler = Grabler::new();
        let (l, _) = layer(Flow::Stop);
        grabler.add(l);
        grabler.kill();
        grabler.wake();
        assert_eq!(grabler.status(), Status::Dead);
        assert!(grabler.is_empty());
    }

    #[test]
    fn add_after_kill_is_ignored() {
        let grabler = Grabler::new();
        grabler.kill();
        let (l, hits) = layer(Flow::Stop);
        grabler.add(Rc::clone(&l));
        assert!(grabler.is_empty());
        assert!(!grabler.contains(&l));
        assert_eq!(grabler.grable(&mut KeyPress::new("a")), None);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn passthrough_maps_to_flow() {
        assert_eq!(Flow::passthrough(true), Flow::Continue);
        assert_eq!(Flow::passthrough(false), Flow::Stop);
    }
}
