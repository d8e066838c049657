pub mod action;
pub mod config;
pub mod error;
pub mod grabler;
pub mod key;
pub mod mapper;
#[cfg(feature = "crossterm")]
pub mod term;

pub use crate::action::{Action, ActionInfo};
pub use crate::config::Policy;
pub use crate::error::{Error, KeyError, Result};
pub use crate::grabler::{Flow, Grable, Grabler, KeyInput, Status};
pub use crate::key::{HostKeyEvent, KeyDescriptor, KeyPress, Modifiers};
pub use crate::mapper::{BindingSource, BindingSpec, KeyMapper, MapperBuilder};
