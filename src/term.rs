//! Host adapter for crossterm key events.

use std::borrow::Cow;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::key::{HostKeyEvent, Modifiers};

/// DOM-style key name for a crossterm key code.
pub fn key_name(code: KeyCode) -> Cow<'static, str> {
    match code {
        KeyCode::Char(c) => Cow::Owned(c.to_string()),
        KeyCode::Enter => "Enter".into(),
        KeyCode::Tab | KeyCode::BackTab => "Tab".into(),
        KeyCode::Backspace => "Backspace".into(),
        KeyCode::Esc => "Escape".into(),
        KeyCode::Up => "ArrowUp".into(),
        KeyCode::Down => "ArrowDown".into(),
        KeyCode::Left => "ArrowLeft".into(),
        KeyCode::Right => "ArrowRight".into(),
        KeyCode::Home => "Home".into(),
        KeyCode::End => "End".into(),
        KeyCode::PageUp => "PageUp".into(),
        KeyCode::PageDown => "PageDown".into(),
        KeyCode::Delete => "Delete".into(),
        KeyCode::Insert => "Insert".into(),
        KeyCode::F(n) => Cow::Owned(format!("F{n}")),
        _ => "Unidentified".into(),
    }
}

impl HostKeyEvent for KeyEvent {
    fn key(&self) -> Cow<'_, str> {
        key_name(self.code)
    }

    fn modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        if self.modifiers.contains(KeyModifiers::SHIFT) || self.code == KeyCode::BackTab {
            mods |= Modifiers::SHIFT;
        }
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            mods |= Modifiers::CTRL;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            mods |= Modifiers::ALT;
        }
        if self.modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META) {
            mods |= Modifiers::META;
        }
        mods
    }
}
