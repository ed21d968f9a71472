use crate::args::build_args;
use crate::builtin::{GetCompletion, Help};
use crate::command::Command;
use crate::completion::CompletionEngine;
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::line_source::{EditorSource, LineSource};
use crate::registry::Registry;
use crate::splitter;
use std::io::Write;
use std::rc::Rc;

/// First tokens that end the session. Always matched case-sensitively.
const EXIT_TOKENS: &[&str] = &["exit", "quit"];

pub(crate) fn is_exit_token(token: &str) -> bool {
    EXIT_TOKENS.contains(&token)
}

/// Only lines that tokenize and do not start with an exit token are recorded.
fn is_history_worthy(line: &str) -> bool {
    match splitter::split_into_tokens(line.trim()) {
        Ok(tokens) => tokens.first().is_some_and(|first| !is_exit_token(first)),
        Err(_) => false,
    }
}

/// What the session should do after a line has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Exit,
}

type Prompter<T> = Box<dyn Fn(&Shell<T>) -> String>;

/// An interactive command shell carrying application data of type `T`.
///
/// The shell owns the command registry and dispatches lines to it. Lines are
/// executed one at a time; a running command blocks the next read.
///
/// Example
/// ```
/// use cmdshell::{LineOutcome, Shell, ShellConfig};
/// let mut sh = Shell::with_builtins(ShellConfig::default(), ());
/// assert_eq!(sh.run_line("exit").unwrap(), LineOutcome::Exit);
/// assert!(sh.complete("he").contains(&"help".to_string()));
/// ```
pub struct Shell<T> {
    config: ShellConfig,
    registry: Rc<Registry<T>>,
    data: T,
    out: Box<dyn Write>,
    prompter: Option<Prompter<T>>,
}

impl<T> Shell<T> {
    /// Create a shell with an empty registry that prints to standard output.
    pub fn new(config: ShellConfig, data: T) -> Self {
        let registry = Registry::new(config.case_insensitive);
        Self {
            config,
            registry: Rc::new(registry),
            data,
            out: Box::new(std::io::stdout()),
            prompter: None,
        }
    }

    /// Create a shell with `help` and `getcompletion` already registered.
    pub fn with_builtins(config: ShellConfig, data: T) -> Self {
        let mut shell = Self::new(config, data);
        shell.add_command(Help::new());
        shell.add_command(GetCompletion::new());
        shell
    }

    /// Register `command` under `name`, replacing any command of that name.
    pub fn register(&mut self, name: impl Into<String>, command: impl Command<T> + 'static) {
        // Completion snapshots handed out earlier keep the old registry.
        Rc::make_mut(&mut self.registry).register(name, command);
    }

    /// Register `command` under its own name.
    pub fn add_command(&mut self, command: impl Command<T> + 'static) {
        Rc::make_mut(&mut self.registry).add(command);
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn set_case_insensitive(&mut self, case_insensitive: bool) {
        self.config.case_insensitive = case_insensitive;
        Rc::make_mut(&mut self.registry).set_case_insensitive(case_insensitive);
    }

    pub fn set_debug_completions(&mut self, debug_completions: bool) {
        self.config.debug_completions = debug_completions;
    }

    /// Redirect everything commands and the session loop print.
    pub fn set_output(&mut self, out: impl Write + 'static) {
        self.out = Box::new(out);
    }

    /// Output sink for command handlers.
    pub fn out(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }

    /// Compute the prompt dynamically instead of using the configured one.
    pub fn set_prompter(&mut self, prompter: impl Fn(&Shell<T>) -> String + 'static) {
        self.prompter = Some(Box::new(prompter));
    }

    pub fn prompt(&self) -> String {
        match &self.prompter {
            Some(prompter) => prompter(self),
            None => self.config.prompt.clone(),
        }
    }

    /// A completion engine over the current registry.
    pub fn completion_engine(&self) -> CompletionEngine<T> {
        CompletionEngine::new(Rc::clone(&self.registry), self.config.debug_completions)
    }

    /// Completions for the whole current input line.
    pub fn complete(&self, line: &str) -> Vec<String> {
        self.completion_engine().complete(line)
    }

    /// Resolve the command named by the first token, map the remaining tokens
    /// onto its arguments and run it.
    ///
    /// An empty token list is a no-op.
    pub fn exec(&mut self, tokens: &[String]) -> Result<(), ShellError> {
        let Some(command) = self.registry.resolve(tokens)? else {
            return Ok(());
        };

        let built = build_args(command.args(), &tokens[1..])?;
        for warning in &built.warnings {
            tracing::warn!(command = command.name(), "{warning}");
        }

        tracing::debug!(command = command.name(), args = ?built.args, "running command");
        command.run(self, &built.args).map_err(ShellError::Handler)
    }

    /// Run one command line.
    ///
    /// Blank lines do nothing. `exit` or `quit` as the first token ends the
    /// session without consulting the registry.
    pub fn run_line(&mut self, line: &str) -> Result<LineOutcome, ShellError> {
        let tokens = splitter::split_into_tokens(line.trim())?;
        match tokens.first() {
            None => return Ok(LineOutcome::Continue),
            Some(first) if is_exit_token(first) => return Ok(LineOutcome::Exit),
            Some(_) => {}
        }

        self.exec(&tokens)?;
        Ok(LineOutcome::Continue)
    }

    /// Run a `;`-separated list of command lines in order.
    ///
    /// Stops at the first segment that fails or asks to exit; the remaining
    /// segments are not run.
    pub fn run_compound_line(&mut self, line: &str) -> Result<LineOutcome, ShellError> {
        for segment in line.split(';') {
            if segment.trim().is_empty() {
                continue;
            }
            if self.run_line(segment)? == LineOutcome::Exit {
                return Ok(LineOutcome::Exit);
            }
        }
        Ok(LineOutcome::Continue)
    }

    /// Read-eval-print loop over an arbitrary line source.
    ///
    /// Errors from a line are printed and the loop goes on. The loop ends on
    /// end of input, on an exit token, or when the source fails; the source is
    /// closed afterwards.
    pub fn run_loop(&mut self, source: &mut dyn LineSource<T>) -> anyhow::Result<()> {
        loop {
            source.set_completion(self.completion_engine());

            let prompt = self.prompt();
            let line = match source.read_line(&prompt) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    writeln!(self.out, "Prompt Error: {err:#}")?;
                    break;
                }
            };

            if is_history_worthy(&line) {
                if let Err(err) = source.add_history(&line) {
                    tracing::warn!("failed to record history: {err:#}");
                }
            }

            match self.run_compound_line(&line) {
                Ok(LineOutcome::Exit) => break,
                Ok(LineOutcome::Continue) => {}
                Err(err) => writeln!(self.out, "Error: {err}")?,
            }
        }

        if let Err(err) = source.close() {
            writeln!(self.out, "Error: {err:#}")?;
        }
        Ok(())
    }

    /// Interactive session on the terminal, with line editing, tab completion
    /// and history persisted at [`ShellConfig::history_path`].
    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut source = EditorSource::new(self.config.history_path())?;
        self.run_loop(&mut source)
    }
}
