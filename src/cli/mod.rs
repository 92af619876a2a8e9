//! Interactive admin shell: command parsing, dispatch and table rendering.

pub mod repl;
pub mod table;

pub use repl::{execute, Command, Flow, HELP};
