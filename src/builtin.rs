use crate::command::{ArgMap, ArgSpec, Command, Completer};
use crate::completion::{CompletionEngine, arg_based_completions};
use crate::error::ShellError;
use crate::registry::Registry;
use crate::shell::Shell;
use anyhow::{Result, anyhow};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Lists the registered commands, or describes one of them.
pub struct Help {
    args: Vec<ArgSpec>,
}

impl Help {
    pub fn new() -> Self {
        Self {
            args: vec![ArgSpec::new("command", "Command to get help for", "")],
        }
    }
}

impl Default for Help {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Command<T> for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Get help for a command"
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn run(&self, shell: &mut Shell<T>, args: &ArgMap) -> Result<()> {
        let text = match args.get("command").filter(|name| !name.is_empty()) {
            Some(name) => describe_command(shell.registry(), name)?,
            None => list_commands(shell.registry()),
        };
        shell.out().write_all(text.as_bytes())?;
        Ok(())
    }

    fn completer(&self) -> Option<&dyn Completer<T>> {
        Some(self)
    }
}

impl<T> Completer<T> for Help {
    fn complete(
        &self,
        engine: &CompletionEngine<T>,
        line: &str,
        args: &ArgMap,
    ) -> Result<Vec<String>> {
        // Suggestions replace the whole line, so keep the command as typed.
        let typed = line.split_whitespace().next().unwrap_or("help");
        let prefix = args.get("command").map(String::as_str).unwrap_or("");
        Ok(engine
            .registry()
            .matching_prefix(prefix)
            .into_iter()
            .map(|name| format!("{typed} {name}"))
            .collect())
    }
}

fn list_commands<T>(registry: &Registry<T>) -> String {
    let mut text = String::from("Commands:\n");
    for (name, command) in registry.iter() {
        let _ = writeln!(text, "  {}: {}", name, command.description());
    }
    text.push_str("Use 'help <command>' to get help for a specific command\n");
    text
}

fn describe_command<T>(registry: &Registry<T>, name: &str) -> Result<String> {
    let command = registry
        .get(name)
        .ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?;

    let mut text = String::new();
    let _ = writeln!(text, "Command: {name}");
    let _ = writeln!(text, "Description: {}", command.description());
    text.push_str("Arguments:\n");
    for spec in command.args() {
        let _ = writeln!(
            text,
            "  {} : {} (default: {})",
            spec.name, spec.description, spec.default
        );
    }
    Ok(text)
}

/// Value of the `line` argument of `getcompletion` that stands for an empty
/// line, which cannot be passed positionally.
pub const EMPTY_LINE_SENTINEL: &str = "@empty";

/// Textual encodings understood by `getcompletion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionFormat {
    /// `<index>) <completion>` on one line each.
    #[default]
    NewlineArray,
    /// `[a b c]`
    Array,
    SpaceSep,
    NewlineSep,
    CommaSep,
    CommaSpaceSep,
}

impl CompletionFormat {
    pub const ALL: [CompletionFormat; 6] = [
        CompletionFormat::NewlineArray,
        CompletionFormat::Array,
        CompletionFormat::SpaceSep,
        CompletionFormat::NewlineSep,
        CompletionFormat::CommaSep,
        CompletionFormat::CommaSpaceSep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CompletionFormat::NewlineArray => "printNewlineArray",
            CompletionFormat::Array => "printArray",
            CompletionFormat::SpaceSep => "strJoinArray_spaceSep",
            CompletionFormat::NewlineSep => "strJoinArray_newlineSep",
            CompletionFormat::CommaSep => "strJoinArray_commaSep",
            CompletionFormat::CommaSpaceSep => "strJoinArray_commaSpaceSep",
        }
    }

    /// Renders `completions`, newline terminated.
    pub fn render(self, completions: &[String]) -> String {
        let joined = |sep: &str| format!("{}\n", completions.join(sep));
        match self {
            CompletionFormat::NewlineArray => {
                let mut text = String::new();
                for (i, completion) in completions.iter().enumerate() {
                    let _ = writeln!(text, "{i}) {completion}");
                }
                text
            }
            CompletionFormat::Array => format!("[{}]\n", completions.join(" ")),
            CompletionFormat::SpaceSep => joined(" "),
            CompletionFormat::NewlineSep => joined("\n"),
            CompletionFormat::CommaSep => joined(","),
            CompletionFormat::CommaSpaceSep => joined(", "),
        }
    }
}

impl FromStr for CompletionFormat {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompletionFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| ShellError::UnknownFormat(s.to_string()))
    }
}

impl fmt::Display for CompletionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prints the completions for a line, for shell completion scripts and other
/// non-interactive callers.
pub struct GetCompletion {
    args: Vec<ArgSpec>,
}

impl GetCompletion {
    pub fn new() -> Self {
        let formats: Vec<&str> = CompletionFormat::ALL.iter().map(|f| f.name()).collect();
        Self {
            args: vec![
                ArgSpec::new(
                    "line",
                    format!("line to get completion for. Use {EMPTY_LINE_SENTINEL} for empty line"),
                    "",
                ),
                ArgSpec::new(
                    "format",
                    format!("format to return completions in ({})", formats.join("/")),
                    CompletionFormat::default().name(),
                ),
            ],
        }
    }
}

impl Default for GetCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Command<T> for GetCompletion {
    fn name(&self) -> &str {
        "getcompletion"
    }

    fn description(&self) -> &str {
        "Get completions for a line"
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn run(&self, shell: &mut Shell<T>, args: &ArgMap) -> Result<()> {
        let line = args
            .get("line")
            .filter(|line| !line.is_empty())
            .ok_or_else(|| anyhow!("no line provided"))?;
        let line = if line == EMPTY_LINE_SENTINEL { "" } else { line.as_str() };

        let format = match args.get("format").filter(|f| !f.is_empty()) {
            Some(name) => name.parse::<CompletionFormat>()?,
            None => CompletionFormat::default(),
        };

        let completions = shell.complete(line);
        shell.out().write_all(format.render(&completions).as_bytes())?;
        Ok(())
    }

    fn completer(&self) -> Option<&dyn Completer<T>> {
        Some(self)
    }
}

impl<T> Completer<T> for GetCompletion {
    fn complete(
        &self,
        engine: &CompletionEngine<T>,
        line: &str,
        args: &ArgMap,
    ) -> Result<Vec<String>> {
        Ok(arg_based_completions(engine, self, line, args))
    }
}
