//! An embeddable interactive command shell.
//!
//! Applications register named commands with declared arguments and get a
//! read-eval-print session with line editing, history, tab completion and a
//! couple of built-in commands (`help` and `getcompletion`).
//!
//! Command lines are tokenized on spaces while respecting quotes and brackets
//! (see [`splitter`]), the first token picks the command and the rest are
//! mapped onto its declared arguments as positional or `name=value` pairs
//! (see [`args`]). Several commands can be chained with `;`.
//!
//! The main entry point is [`Shell`]. Commands implement [`Command`], and can
//! offer tab completion by returning a [`Completer`]. Process signal hooks live
//! in [`signals`].

pub mod args;
pub mod builtin;
pub mod command;
pub mod completion;
pub mod config;
pub mod error;
mod io_adapters;
pub mod line_source;
mod registry;
mod shell;
pub mod signals;
pub mod splitter;

pub use command::{ArgMap, ArgSpec, Command, Completer};
pub use config::ShellConfig;
pub use error::{ParseError, ShellError};
pub use io_adapters::MemWriter;
pub use registry::Registry;
/// The interactive shell and the result of running one line.
///
/// See [`Shell`] for the high-level API and examples.
pub use shell::{LineOutcome, Shell};
