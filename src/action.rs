use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Descriptive metadata attached to an [`Action`].
///
/// Metadata belongs to the action, not to a particular key binding: every
/// mapper the action is bound in sees the same info, and attaching new info
/// replaces the old.
pub struct ActionInfo<C = ()> {
    /// Human-readable description for help screens.
    pub description: Option<String>,
    /// Arbitrary payload for remapping tools and documentation generators.
    pub data: serde_json::Value,
    /// Context the action is invoked with, ahead of the mapper's fallback.
    pub context: Option<Rc<C>>,
}

impl<C> ActionInfo<C> {
    pub fn new() -> Self {
        Self {
            description: None,
            data: serde_json::Value::Null,
            context: None,
        }
    }

    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new()
        }
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn context(mut self, context: Rc<C>) -> Self {
        self.context = Some(context);
        self
    }
}

impl<C> Default for ActionInfo<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for ActionInfo<C> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            data: self.data.clone(),
            context: self.context.clone(),
        }
    }
}

impl<C> fmt::Debug for ActionInfo<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInfo")
            .field("description", &self.description)
            .field("data", &self.data)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

struct ActionInner<C> {
    call: Box<dyn Fn(Option<&C>)>,
    info: RefCell<Option<ActionInfo<C>>>,
}

/// A bindable callback with stable identity.
///
/// Cloning an `Action` clones the handle; equality and hashing compare
/// handles, so the same action can be looked up from any of its keys.
/// The callback receives the resolved invocation context, if any
/// (see [`Action::resolve_context`]).
pub struct Action<C = ()> {
    inner: Rc<ActionInner<C>>,
}

impl<C> Action<C> {
    /// Wrap a zero-argument callback that ignores the invocation context.
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self::with_context(move |_| f())
    }

    /// Wrap a callback that receives the resolved invocation context.
    pub fn with_context(f: impl Fn(Option<&C>) + 'static) -> Self {
        Self {
            inner: Rc::new(ActionInner {
                call: Box::new(f),
                info: RefCell::new(None),
            }),
        }
    }

    pub fn info(&self) -> Option<ActionInfo<C>> {
        self.inner.info.borrow().clone()
    }

    pub fn description(&self) -> Option<String> {
        self.inner
            .info
            .borrow()
            .as_ref()
            .and_then(|info| info.description.clone())
    }

    pub fn set_info(&self, info: ActionInfo<C>) {
        *self.inner.info.borrow_mut() = Some(info);
    }

    /// Pick the context for an invocation: the action's own metadata context
    /// first, then `fallback`, otherwise none.
    pub fn resolve_context(&self, fallback: Option<&Rc<C>>) -> Option<Rc<C>> {
        let own = self
            .inner
            .info
            .borrow()
            .as_ref()
            .and_then(|info| info.context.clone());
        match own {
            Some(context) => Some(context),
            None => fallback.cloned(),
        }
    }

    /// Run the callback with the context resolved against `fallback`.
    pub fn invoke(&self, fallback: Option<&Rc<C>>) {
        let context = self.resolve_context(fallback);
        (self.inner.call)(context.as_deref());
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.inner) as *const ()
    }
}

impl<C> Clone for Action<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C> PartialEq for Action<C> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Eq for Action<C> {}

impl<C> Hash for Action<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<C> fmt::Debug for Action<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("addr", &self.addr())
            .field("description", &self.description())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn clones_share_identity_and_metadata() {
        let a: Action = Action::new(|| {});
        let b = a.clone();
        let c: Action = Action::new(|| {});
        assert_eq!(a, b);
        assert_ne!(a, c);

        b.set_info(ActionInfo::described("jump"));
        assert_eq!(a.description().as_deref(), Some("jump"));
        assert_eq!(c.description(), None);
    }

    #[test]
    fn context_resolution_prefers_own_metadata() {
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let action = Action::with_context(move |ctx: Option<&u32>| sink.set(ctx.copied().unwrap_or(0)));
        let fallback = Rc::new(7);

        action.invoke(None);
        assert_eq!(seen.get(), 0);

        action.invoke(Some(&fallback));
        assert_eq!(seen.get(), 7);

        action.set_info(ActionInfo::new().context(Rc::new(42)));
        action.invoke(Some(&fallback));
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn action_may_update_its_own_info_while_running() {
        let slot: Rc<RefCell<Option<Action>>> = Rc::new(RefCell::new(None));
        let shared = Rc::clone(&slot);
        let action: Action = Action::new(move || {
            if let Some(me) = shared.borrow().as_ref() {
                me.set_info(ActionInfo::described("ran"));
            }
        });
        *slot.borrow_mut() = Some(action.clone());

        action.invoke(None);
        assert_eq!(action.description().as_deref(), Some("ran"));
        slot.borrow_mut().take();
    }
}
