//! Terminal-facing layer: keybindings and the crossterm event pump.

mod event;
mod input;

pub use event::{Event, TerminalEvents};
pub use input::{InputMode, InputState, KeyAction, handle_key};
