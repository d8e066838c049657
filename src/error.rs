use thiserror::Error;

/// Errors produced while configuring key mappers.
#[derive(Debug, Error)]
pub enum Error {
    /// A key string did not follow the `<key>[ a][ c][ s]` format.
    #[error("invalid key `{key}`: {reason}")]
    InvalidKey { key: String, reason: KeyError },

    /// A policy document could not be deserialized.
    #[error("invalid mapper policy: {0}")]
    Config(#[from] serde_json::Error),
}

/// Why a key string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key name is empty")]
    Empty,
    #[error("key name `{0}` is not lowercase")]
    NotLowercase(String),
    #[error("unknown modifier `{0}`, expected one of `a`, `c`, `s`")]
    UnknownModifier(String),
    #[error("modifier `{0}` is repeated or out of order (alt, control, shift)")]
    ModifierOrder(String),
    #[error("shift is only recorded for enter, space, tab, backspace, escape and the arrow keys")]
    Unshiftable,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
