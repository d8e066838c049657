use std::borrow::{Borrow, Cow};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, KeyError};

bitflags::bitflags! {
    /// Keyboard modifier flags.
    ///
    /// These can be combined to represent multiple modifiers held simultaneously.
    /// `META` is accepted from hosts that report it but never shows up in a
    /// [`KeyDescriptor`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const META  = 0b1000;
    }
}

/// Keys whose shifted form gets its own descriptor.
///
/// For every other key the host already folds shift into the key name
/// (`"A"` rather than `"a"` + shift), so the shift flag is dropped.
pub const SHIFTABLE: [&str; 9] = [
    "enter",
    "space",
    "tab",
    "backspace",
    "escape",
    "arrowup",
    "arrowdown",
    "arrowleft",
    "arrowright",
];

/// Returns true if `base` (a lowercase key name) records shift.
pub fn is_shiftable(base: &str) -> bool {
    SHIFTABLE.contains(&base)
}

/// A raw key press as delivered by the host.
///
/// Key names follow the DOM `KeyboardEvent.key` convention (`"a"`, `"Enter"`,
/// `"ArrowLeft"`, `" "`). Hosts with their own key types implement this trait
/// and pass events to [`Grabler::grable`](crate::Grabler::grable).
pub trait HostKeyEvent {
    /// The key name, case as reported by the host.
    fn key(&self) -> Cow<'_, str>;

    /// Modifier keys held during the key press.
    fn modifiers(&self) -> Modifiers;

    /// Suppress the host's default handling of this event.
    ///
    /// Hosts without a default action can leave this as a no-op.
    fn prevent_default(&mut self) {}
}

/// An owned key press that remembers whether its default was prevented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    /// The key name, DOM style.
    pub key: String,
    /// Modifier keys held during the key press.
    pub mods: Modifiers,
    /// Set once any mapper suppresses the default action.
    pub default_prevented: bool,
}

impl KeyPress {
    /// A press of `key` with no modifiers held.
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_mods(key, Modifiers::empty())
    }

    /// A press of `key` with the given modifiers held.
    pub fn with_mods(key: impl Into<String>, mods: Modifiers) -> Self {
        Self {
            key: key.into(),
            mods,
            default_prevented: false,
        }
    }

    /// Add Alt to the held modifiers.
    pub fn alt(mut self) -> Self {
        self.mods |= Modifiers::ALT;
        self
    }

    /// Add Ctrl to the held modifiers.
    pub fn ctrl(mut self) -> Self {
        self.mods |= Modifiers::CTRL;
        self
    }

    /// Add Shift to the held modifiers.
    pub fn shift(mut self) -> Self {
        self.mods |= Modifiers::SHIFT;
        self
    }
}

impl HostKeyEvent for KeyPress {
    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.key)
    }

    fn modifiers(&self) -> Modifiers {
        self.mods
    }

    fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// Canonical key token used to look up bindings.
///
/// The format is `<lowercase-key>[ a][ c][ s]`: the lowercased key name
/// followed by alt, control and shift suffixes in that fixed order. Shift is
/// only recorded for the [`SHIFTABLE`] keys. Examples: `"f c"`,
/// `"arrowleft c s"`, `"space"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyDescriptor(String);

impl KeyDescriptor {
    /// Normalize a host event. Total: every event yields a descriptor.
    pub fn from_event<E: HostKeyEvent + ?Sized>(event: &E) -> Self {
        Self::from_parts(&event.key(), event.modifiers())
    }

    pub fn from_parts(key: &str, mods: Modifiers) -> Self {
        let base = base_name(key);
        let mut out = base.clone();
        if mods.contains(Modifiers::ALT) {
            out.push_str(" a");
        }
        if mods.contains(Modifiers::CTRL) {
            out.push_str(" c");
        }
        if mods.contains(Modifiers::SHIFT) && is_shiftable(&base) {
            out.push_str(" s");
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key name without modifier suffixes.
    pub fn base(&self) -> &str {
        self.0.split_once(' ').map_or(self.0.as_str(), |(base, _)| base)
    }

    /// Modifiers encoded in the suffixes.
    pub fn modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        for token in self.0.split(' ').skip(1) {
            match token {
                "a" => mods |= Modifiers::ALT,
                "c" => mods |= Modifiers::CTRL,
                "s" => mods |= Modifiers::SHIFT,
                _ => {}
            }
        }
        mods
    }
}

fn base_name(key: &str) -> String {
    if !key.is_empty() && key.chars().all(|c| c == ' ') {
        return "space".to_owned();
    }
    key.to_lowercase()
}

impl FromStr for KeyDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::InvalidKey {
            key: s.to_owned(),
            reason,
        };

        let mut tokens = s.split(' ');
        let base = tokens.next().unwrap_or_default();
        if base.is_empty() {
            return Err(invalid(KeyError::Empty));
        }
        if base.to_lowercase() != base {
            return Err(invalid(KeyError::NotLowercase(base.to_owned())));
        }

        // Rank of the last suffix seen; suffixes must strictly increase.
        let mut last = 0u8;
        for token in tokens {
            let rank = match token {
                "a" => 1,
                "c" => 2,
                "s" => 3,
                other => return Err(invalid(KeyError::UnknownModifier(other.to_owned()))),
            };
            if rank <= last {
                return Err(invalid(KeyError::ModifierOrder(token.to_owned())));
            }
            if rank == 3 && !is_shiftable(base) {
                return Err(invalid(KeyError::Unshiftable));
            }
            last = rank;
        }

        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for KeyDescriptor {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for KeyDescriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_key_gets_a_name() {
        assert_eq!(base_name(" "), "space");
        assert_eq!(base_name("Spacebar"), "spacebar");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn base_and_modifiers_split_back_out() {
        let key = KeyDescriptor::from_parts("ArrowLeft", Modifiers::CTRL | Modifiers::SHIFT);
        assert_eq!(key.as_str(), "arrowleft c s");
        assert_eq!(key.base(), "arrowleft");
        assert_eq!(key.modifiers(), Modifiers::CTRL | Modifiers::SHIFT);

        let plain = KeyDescriptor::from_parts("q", Modifiers::empty());
        assert_eq!(plain.base(), "q");
        assert!(plain.modifiers().is_empty());
    }

    #[test]
    fn meta_never_reaches_the_descriptor() {
        let key = KeyDescriptor::from_parts("k", Modifiers::META | Modifiers::ALT);
        assert_eq!(key.as_str(), "k a");
    }

    #[test]
    fn parse_rejects_each_malformed_shape() {
        let reason = |s: &str| match s.parse::<KeyDescriptor>() {
            Err(Error::InvalidKey { reason, .. }) => reason,
            other => panic!("expected InvalidKey for {s:?}, got {other:?}"),
        };

        assert_eq!(reason(""), KeyError::Empty);
        assert_eq!(reason(" c"), KeyError::Empty);
        assert_eq!(reason("F c"), KeyError::NotLowercase("F".into()));
        assert_eq!(reason("f x"), KeyError::UnknownModifier("x".into()));
        assert_eq!(reason("f  c"), KeyError::UnknownModifier(String::new()));
        assert_eq!(reason("f c a"), KeyError::ModifierOrder("a".into()));
        assert_eq!(reason("f c c"), KeyError::ModifierOrder("c".into()));
        assert_eq!(reason("x s"), KeyError::Unshiftable);
    }

    #[test]
    fn parse_accepts_canonical_strings() {
        for s in ["f c", "h", "enter a c s", "space s", "+", "f12 a"] {
            let key: KeyDescriptor = s.parse().unwrap();
            assert_eq!(key.as_str(), s);
        }
    }
}
