//! Key mappers: independently configured binding tables stacked in a
//! [`Grabler`].
//!
//! A mapper holds a two-way mapping between [`KeyDescriptor`]s and
//! [`Action`]s plus a [`Policy`] deciding what happens on a hit or a miss.
//! Engrabling puts the mapper on top of its grabler's stack; degrabling takes
//! it off again without touching its bindings.
//!
//! ```
//! # use keygrab::{Action, BindingSource, BindingSpec, Grabler, KeyMapper, KeyPress};
//! # fn main() -> keygrab::Result<()> {
//! let forward = Action::new(|| println!("forward"));
//! let backward = Action::new(|| println!("backward"));
//!
//! let grabler = Grabler::new();
//! let keymap: KeyMapper = KeyMapper::builder()
//!     .grabler(grabler.clone())
//!     .bindings(BindingSource::Tuples(vec![
//!         BindingSpec::new(&forward).key("f c").describe("Move forward one character"),
//!         BindingSpec::new(&backward).keys(["b c", "h"]),
//!         BindingSpec::new(&forward).key("l"),
//!     ]))
//!     .build()?;
//! keymap.engrable();
//!
//! assert_eq!(keymap.keys_for(&forward).len(), 2);
//! grabler.grable(&mut KeyPress::new("f").ctrl());
//! # Ok(())
//! # }
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::action::{Action, ActionInfo};
use crate::config::Policy;
use crate::error::Result;
use crate::grabler::{Flow, Grable, Grabler, KeyInput};
use crate::key::KeyDescriptor;

/// One entry of a [`BindingSource::Tuples`] list: an action, the keys that
/// reach it, and optional metadata.
pub struct BindingSpec<C = ()> {
    pub action: Action<C>,
    pub keys: Vec<String>,
    pub info: Option<ActionInfo<C>>,
}

impl<C> BindingSpec<C> {
    pub fn new(action: &Action<C>) -> Self {
        Self {
            action: action.clone(),
            keys: Vec::new(),
            info: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn info(mut self, info: ActionInfo<C>) -> Self {
        self.info = Some(info);
        self
    }

    pub fn describe(self, description: impl Into<String>) -> Self {
        self.info(ActionInfo::described(description))
    }
}

/// Bulk input for [`KeyMapper::multibind`].
pub enum BindingSource<C = ()> {
    /// Additive: each spec binds one action to its keys and attaches its
    /// metadata.
    Tuples(Vec<BindingSpec<C>>),
    /// Destructive: the mapper's bindings are rebuilt from these
    /// action → keys pairs. A key listed under two actions goes to the later
    /// one.
    Replace(Vec<(Action<C>, Vec<String>)>),
    /// Additive: one key → action binding per entry.
    Shorthand(Vec<(String, Action<C>)>),
}

impl<C> BindingSource<C> {
    fn kind(&self) -> &'static str {
        match self {
            BindingSource::Tuples(_) => "tuples",
            BindingSource::Replace(_) => "replace",
            BindingSource::Shorthand(_) => "shorthand",
        }
    }

    /// Validate every key up front so a bad source leaves the mapper
    /// untouched.
    fn parse(self) -> Result<ParsedSource<C>> {
        Ok(match self {
            BindingSource::Tuples(specs) => ParsedSource::Tuples(
                specs
                    .into_iter()
                    .map(|spec| -> Result<ParsedSpec<C>> {
                        let keys = parse_keys(&spec.keys)?;
                        Ok((spec.action, keys, spec.info))
                    })
                    .collect::<Result<_>>()?,
            ),
            BindingSource::Replace(pairs) => ParsedSource::Replace(
                pairs
                    .into_iter()
                    .map(|(action, keys)| -> Result<(Action<C>, Vec<KeyDescriptor>)> {
                        Ok((action, parse_keys(&keys)?))
                    })
                    .collect::<Result<_>>()?,
            ),
            BindingSource::Shorthand(entries) => ParsedSource::Shorthand(
                entries
                    .into_iter()
                    .map(|(key, action)| -> Result<(KeyDescriptor, Action<C>)> {
                        Ok((key.parse()?, action))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

type ParsedSpec<C> = (Action<C>, Vec<KeyDescriptor>, Option<ActionInfo<C>>);

enum ParsedSource<C> {
    Tuples(Vec<ParsedSpec<C>>),
    Replace(Vec<(Action<C>, Vec<KeyDescriptor>)>),
    Shorthand(Vec<(KeyDescriptor, Action<C>)>),
}

fn parse_keys(keys: &[String]) -> Result<Vec<KeyDescriptor>> {
    keys.iter().map(|key| key.parse::<KeyDescriptor>()).collect()
}

/// Forward and reverse lookup tables.
///
/// Invariant: `k ∈ functions[a]` iff `shortcuts[k] == a`. Actions may sit in
/// `functions` with no keys.
struct Bindings<C> {
    shortcuts: HashMap<KeyDescriptor, Action<C>>,
    functions: HashMap<Action<C>, HashSet<KeyDescriptor>>,
}

impl<C> Bindings<C> {
    fn insert(&mut self, action: &Action<C>, key: Option<KeyDescriptor>) {
        let Some(key) = key else {
            self.functions.entry(action.clone()).or_default();
            return;
        };
        if let Some(previous) = self.shortcuts.insert(key.clone(), action.clone())
            && previous != *action
            && let Some(keys) = self.functions.get_mut(&previous)
        {
            keys.remove(&key);
        }
        self.functions.entry(action.clone()).or_default().insert(key);
    }

    fn remove(&mut self, key: &str) -> Option<Action<C>> {
        let (key, action) = self.shortcuts.remove_entry(key)?;
        if let Some(keys) = self.functions.get_mut(&action) {
            keys.remove(&key);
        }
        Some(action)
    }

    fn apply(&mut self, source: ParsedSource<C>) {
        match source {
            ParsedSource::Tuples(specs) => {
                for (action, keys, info) in specs {
                    if let Some(info) = info {
                        action.set_info(info);
                    }
                    if keys.is_empty() {
                        self.insert(&action, None);
                    }
                    for key in keys {
                        self.insert(&action, Some(key));
                    }
                }
            }
            ParsedSource::Replace(pairs) => {
                *self = Self::default();
                for (action, keys) in pairs {
                    self.insert(&action, None);
                    for key in keys {
                        self.insert(&action, Some(key));
                    }
                }
            }
            ParsedSource::Shorthand(entries) => {
                for (key, action) in entries {
                    self.insert(&action, Some(key));
                }
            }
        }
    }
}

impl<C> Default for Bindings<C> {
    fn default() -> Self {
        Self {
            shortcuts: HashMap::new(),
            functions: HashMap::new(),
        }
    }
}

impl<C> Clone for Bindings<C> {
    fn clone(&self) -> Self {
        Self {
            shortcuts: self.shortcuts.clone(),
            functions: self.functions.clone(),
        }
    }
}

fn ingest<C>(bindings: &mut Bindings<C>, source: BindingSource<C>) -> Result<()> {
    let kind = source.kind();
    let parsed = source
        .parse()
        .inspect_err(|err| warn!(%err, kind, "mapper: rejected binding source"))?;
    bindings.apply(parsed);
    debug!(kind, keys = bindings.shortcuts.len(), "mapper: bindings applied");
    Ok(())
}

struct MapperInner<C> {
    grabler: Rc<Grabler>,
    this: Option<Rc<C>>,
    policy: Cell<Policy>,
    bindings: RefCell<Bindings<C>>,
    defaults: Option<Bindings<C>>,
}

impl<C> Grable for MapperInner<C> {
    fn grab(&self, input: &mut KeyInput<'_>) -> Flow {
        let policy = self.policy.get();
        if policy.skip {
            return Flow::Continue;
        }

        let hit = self.bindings.borrow().shortcuts.get(input.key()).cloned();
        let Some(action) = hit else {
            if policy.prevent_default_on_miss {
                input.prevent_default();
            }
            trace!(key = %input.key(), "mapper: miss");
            return Flow::passthrough(policy.grabler_passthrough_on_miss);
        };

        if policy.prevent_default_on_hit {
            input.prevent_default();
        }
        trace!(key = %input.key(), "mapper: hit");
        action.invoke(self.this.as_ref());
        // The action may have changed the policy.
        Flow::passthrough(self.policy.get().grabler_passthrough_on_hit)
    }
}

/// A binding table layered into a [`Grabler`].
///
/// `KeyMapper` is a cheap handle; clones refer to the same table. `C` is the
/// type of the invocation context handed to context-aware actions.
pub struct KeyMapper<C = ()> {
    inner: Rc<MapperInner<C>>,
}

impl<C: 'static> KeyMapper<C> {
    pub fn builder() -> MapperBuilder<C> {
        MapperBuilder::default()
    }

    /// The grabler this mapper engrables into.
    pub fn grabler(&self) -> Rc<Grabler> {
        Rc::clone(&self.inner.grabler)
    }

    fn layer(&self) -> Rc<dyn Grable> {
        self.inner.clone()
    }

    /// Put this mapper on top of its grabler's stack.
    pub fn engrable(&self) {
        self.inner.grabler.add(self.layer());
    }

    /// Take this mapper off its grabler's stack.
    pub fn degrable(&self) {
        self.inner.grabler.remove(&self.layer());
    }

    pub fn is_engrabled(&self) -> bool {
        self.inner.grabler.contains(&self.layer())
    }

    /// Offer a key press to this mapper alone, bypassing the grabler.
    pub fn grab(&self, input: &mut KeyInput<'_>) -> Flow {
        self.inner.grab(input)
    }

    /// Make `action` reachable through `key`, attaching `info` if given.
    ///
    /// With `key` set to `None` the action is registered without a key,
    /// which is useful for attaching metadata ahead of binding. Rebinding a
    /// key takes it away from whichever action held it.
    pub fn bind(
        &self,
        action: &Action<C>,
        key: Option<&str>,
        info: Option<ActionInfo<C>>,
    ) -> Result<()> {
        let key = key
            .map(str::parse::<KeyDescriptor>)
            .transpose()
            .inspect_err(|err| warn!(%err, "mapper: rejected binding"))?;
        if let Some(info) = info {
            action.set_info(info);
        }
        self.inner.bindings.borrow_mut().insert(action, key);
        Ok(())
    }

    /// Shorthand for `bind(action, Some(key), None)`.
    pub fn bind_key(&self, action: &Action<C>, key: &str) -> Result<()> {
        self.bind(action, Some(key), None)
    }

    /// Remove the binding for `key`. Unbound keys are ignored.
    pub fn unbind(&self, key: &str) {
        if self.inner.bindings.borrow_mut().remove(key).is_some() {
            debug!(key, "mapper: unbound");
        }
    }

    /// Ingest a batch of bindings. On error nothing is changed.
    pub fn multibind(&self, source: BindingSource<C>) -> Result<()> {
        ingest(&mut self.inner.bindings.borrow_mut(), source)
    }

    /// Roll the bindings back to those the mapper was built with.
    ///
    /// Does nothing if the mapper was built without bindings. Metadata is
    /// part of the actions and is not rolled back.
    pub fn restore_defaults(&self) {
        if let Some(defaults) = &self.inner.defaults {
            *self.inner.bindings.borrow_mut() = defaults.clone();
            debug!(keys = defaults.shortcuts.len(), "mapper: defaults restored");
        }
    }

    pub fn has_defaults(&self) -> bool {
        self.inner.defaults.is_some()
    }

    pub fn skip(&self) {
        self.update_policy(|policy| policy.skip = true);
    }

    pub fn unskip(&self) {
        self.update_policy(|policy| policy.skip = false);
    }

    pub fn is_skipped(&self) -> bool {
        self.inner.policy.get().skip
    }

    pub fn policy(&self) -> Policy {
        self.inner.policy.get()
    }

    pub fn set_policy(&self, policy: Policy) {
        self.inner.policy.set(policy);
    }

    fn update_policy(&self, f: impl FnOnce(&mut Policy)) {
        let mut policy = self.inner.policy.get();
        f(&mut policy);
        self.inner.policy.set(policy);
    }

    pub fn is_bound(&self, key: &str) -> bool {
        self.inner.bindings.borrow().shortcuts.contains_key(key)
    }

    pub fn action_for(&self, key: &str) -> Option<Action<C>> {
        self.inner.bindings.borrow().shortcuts.get(key).cloned()
    }

    /// Every key reaching `action`, sorted.
    pub fn keys_for(&self, action: &Action<C>) -> Vec<KeyDescriptor> {
        let mut keys: Vec<_> = self
            .inner
            .bindings
            .borrow()
            .functions
            .get(action)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// All key → action bindings, sorted by key. Suitable for help screens.
    pub fn bindings(&self) -> Vec<(KeyDescriptor, Action<C>)> {
        let mut all: Vec<_> = self
            .inner
            .bindings
            .borrow()
            .shortcuts
            .iter()
            .map(|(key, action)| (key.clone(), action.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl<C> Clone for KeyMapper<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for KeyMapper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMapper")
            .field("policy", &self.inner.policy.get())
            .field("keys", &self.inner.bindings.borrow().shortcuts.len())
            .field("has_defaults", &self.inner.defaults.is_some())
            .finish()
    }
}

/// Configuration for a [`KeyMapper`].
pub struct MapperBuilder<C = ()> {
    grabler: Option<Rc<Grabler>>,
    this: Option<Rc<C>>,
    policy: Policy,
    bindings: Option<BindingSource<C>>,
}

impl<C> Default for MapperBuilder<C> {
    fn default() -> Self {
        Self {
            grabler: None,
            this: None,
            policy: Policy::default(),
            bindings: None,
        }
    }
}

impl<C: 'static> MapperBuilder<C> {
    /// Engrable into `grabler` instead of [`Grabler::shared`].
    pub fn grabler(mut self, grabler: Rc<Grabler>) -> Self {
        self.grabler = Some(grabler);
        self
    }

    /// Fallback context for actions without one of their own.
    pub fn this(mut self, this: Rc<C>) -> Self {
        self.this = Some(this);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.policy.skip = skip;
        self
    }

    pub fn prevent_default_on_hit(mut self, prevent: bool) -> Self {
        self.policy.prevent_default_on_hit = prevent;
        self
    }

    pub fn prevent_default_on_miss(mut self, prevent: bool) -> Self {
        self.policy.prevent_default_on_miss = prevent;
        self
    }

    pub fn passthrough_on_hit(mut self, passthrough: bool) -> Self {
        self.policy.grabler_passthrough_on_hit = passthrough;
        self
    }

    pub fn passthrough_on_miss(mut self, passthrough: bool) -> Self {
        self.policy.grabler_passthrough_on_miss = passthrough;
        self
    }

    /// Initial bindings. They also become the defaults restored by
    /// [`KeyMapper::restore_defaults`].
    pub fn bindings(mut self, bindings: BindingSource<C>) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn build(self) -> Result<KeyMapper<C>> {
        let mut bindings = Bindings::default();
        let defaults = match self.bindings {
            Some(source) => {
                ingest(&mut bindings, source)?;
                Some(bindings.clone())
            }
            None => None,
        };
        debug!(
            keys = bindings.shortcuts.len(),
            defaults = defaults.is_some(),
            "mapper: built"
        );

        Ok(KeyMapper {
            inner: Rc::new(MapperInner {
                grabler: self.grabler.unwrap_or_else(Grabler::shared),
                this: self.this,
                policy: Cell::new(self.policy),
                bindings: RefCell::new(bindings),
                defaults,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Action {
        Action::new(|| {})
    }

    fn key(s: &str) -> KeyDescriptor {
        s.parse().unwrap()
    }

    fn assert_consistent<C>(b: &Bindings<C>) {
        for (k, a) in &b.shortcuts {
            assert!(b.functions[a].contains(k), "{k} missing from reverse set");
        }
        for (a, keys) in &b.functions {
            for k in keys {
                assert_eq!(&b.shortcuts[k], a, "{k} points elsewhere");
            }
        }
    }

    #[test]
    fn rebinding_moves_key_between_actions() {
        let (a, b) = (noop(), noop());
        let mut bindings = Bindings::default();
        bindings.insert(&a, Some(key("x")));
        bindings.insert(&b, Some(key("x")));

        assert_eq!(bindings.shortcuts[&key("x")], b);
        assert!(bindings.functions[&a].is_empty());
        assert_consistent(&bindings);
    }

    #[test]
    fn remove_keeps_reverse_entry() {
        let a = noop();
        let mut bindings = Bindings::default();
        bindings.insert(&a, Some(key("x")));
        assert_eq!(bindings.remove("x"), Some(a.clone()));
        assert_eq!(bindings.remove("x"), None);
        assert!(bindings.functions.contains_key(&a));
        assert_consistent(&bindings);
    }

    #[test]
    fn replace_gives_duplicate_key_to_later_action() {
        let (a, b) = (noop(), noop());
        let source: BindingSource = BindingSource::Replace(vec![
            (a.clone(), vec!["x".into(), "y".into()]),
            (b.clone(), vec!["x".into()]),
        ]);
        let mut bindings = Bindings::default();
        ingest(&mut bindings, source).unwrap();

        assert_eq!(bindings.shortcuts[&key("x")], b);
        assert_eq!(bindings.shortcuts[&key("y")], a);
        assert_consistent(&bindings);
    }

    #[test]
    fn tuple_without_keys_registers_action_only() {
        let a = noop();
        let mut bindings = Bindings::default();
        let source = BindingSource::Tuples(vec![BindingSpec::new(&a).describe("later")]);
        ingest(&mut bindings, source).unwrap();

        assert!(bindings.shortcuts.is_empty());
        assert!(bindings.functions[&a].is_empty());
        assert_eq!(a.description().as_deref(), Some("later"));
    }

    #[test]
    fn bad_key_anywhere_rejects_whole_source() {
        let (a, b) = (noop(), noop());
        let mut bindings = Bindings::default();
        bindings.insert(&a, Some(key("q")));

        let source = BindingSource::Tuples(vec![
            BindingSpec::new(&b).key("w").describe("never attached"),
            BindingSpec::new(&b).key("W c"),
        ]);
        assert!(ingest(&mut bindings, source).is_err());

        assert_eq!(bindings.shortcuts.len(), 1);
        assert!(!bindings.functions.contains_key(&b));
        assert_eq!(b.description(), None);
    }
}
