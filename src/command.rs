use crate::completion::CompletionEngine;
use crate::shell::Shell;
use anyhow::Result;
use std::collections::HashMap;

/// Raw argument values of one invocation, keyed by argument name.
///
/// Values are never coerced: handlers parse numbers or flags themselves, and
/// apply [`ArgSpec::default`] when a key is absent.
pub type ArgMap = HashMap<String, String>;

/// Declaration of a single command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub description: String,
    /// Default value as shown by `help`. Not inserted into the [`ArgMap`].
    pub default: String,
}

impl ArgSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: default.into(),
        }
    }
}

/// A command that can be registered with a [`Shell`].
///
/// `T` is the application data carried by the shell and handed to every
/// handler through [`Shell::data_mut`].
pub trait Command<T> {
    /// Canonical name of the command, e.g. "help".
    fn name(&self) -> &str;

    /// One-line human description, listed by `help`.
    fn description(&self) -> &str;

    /// Declared arguments, in positional order.
    fn args(&self) -> &[ArgSpec] {
        &[]
    }

    /// Executes the command.
    ///
    /// Errors are surfaced to the caller of the executor unchanged.
    fn run(&self, shell: &mut Shell<T>, args: &ArgMap) -> Result<()>;

    /// Completion capability, if the command offers one.
    ///
    /// Commands returning `None` get no suggestions once their name is typed.
    fn completer(&self) -> Option<&dyn Completer<T>> {
        None
    }
}

/// Suggests completions for a partially typed invocation of one command.
pub trait Completer<T> {
    /// Returns candidate completions for `line`, the whole raw input line.
    ///
    /// `args` holds whatever arguments could already be parsed from the line.
    /// Candidates replace the whole line; the engine appends a trailing space.
    fn complete(
        &self,
        engine: &CompletionEngine<T>,
        line: &str,
        args: &ArgMap,
    ) -> Result<Vec<String>>;
}
