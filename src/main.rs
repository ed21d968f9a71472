use anyhow::{Context, Result, anyhow};
use argh::FromArgs;
use cmdshell::completion::CompletionEngine;
use cmdshell::line_source::ScriptSource;
use cmdshell::signals::SignalManager;
use cmdshell::{ArgMap, ArgSpec, Command, Completer, Shell, ShellConfig};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Level;

#[derive(FromArgs)]
/// Interactive command shell with a few demo commands.
struct Cli {
    #[argh(switch)]
    /// match command names ignoring case.
    case_insensitive: bool,

    #[argh(switch)]
    /// log why completions come back empty.
    debug_completions: bool,

    #[argh(option)]
    /// history file; relative paths live in the temp directory.
    history: Option<PathBuf>,

    #[argh(switch, short = 'v')]
    /// log command dispatch and signal hooks.
    verbose: bool,

    #[argh(option, short = 'c')]
    /// run one `;`-separated line and exit.
    command: Option<String>,

    #[argh(option)]
    /// run the lines of a file instead of reading the terminal.
    script: Option<PathBuf>,
}

type Vars = Arc<Mutex<BTreeMap<String, String>>>;

fn lock(vars: &Vars) -> MutexGuard<'_, BTreeMap<String, String>> {
    vars.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Data carried by the demo shell.
struct Session {
    vars: Vars,
    signals: Arc<SignalManager>,
}

struct Echo {
    args: Vec<ArgSpec>,
}

impl Command<Session> for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Print the text argument"
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn run(&self, shell: &mut Shell<Session>, args: &ArgMap) -> Result<()> {
        let text = args.get("text").map_or("", String::as_str);
        writeln!(shell.out(), "{text}")?;
        Ok(())
    }
}

/// Suggests known variable names for the `key` argument.
struct KeyCompleter {
    vars: Vars,
}

impl Completer<Session> for KeyCompleter {
    fn complete(
        &self,
        _engine: &CompletionEngine<Session>,
        line: &str,
        args: &ArgMap,
    ) -> Result<Vec<String>> {
        if args.contains_key("value") {
            return Ok(Vec::new());
        }
        let prefix = args.get("key").map_or("", String::as_str);
        if !prefix.is_empty() && line.ends_with(' ') {
            return Ok(Vec::new());
        }

        let command = line.split_whitespace().next().unwrap_or_default();
        Ok(lock(&self.vars)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .map(|key| format!("{command} {key}"))
            .collect())
    }
}

struct Set {
    args: Vec<ArgSpec>,
    keys: KeyCompleter,
}

impl Command<Session> for Set {
    fn name(&self) -> &str {
        "set"
    }

    fn description(&self) -> &str {
        "Set a session variable"
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn run(&self, shell: &mut Shell<Session>, args: &ArgMap) -> Result<()> {
        let key = args
            .get("key")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("no key provided"))?;
        let value = args.get("value").cloned().unwrap_or_default();
        lock(&shell.data().vars).insert(key.clone(), value);
        Ok(())
    }

    fn completer(&self) -> Option<&dyn Completer<Session>> {
        Some(&self.keys)
    }
}

struct Get {
    args: Vec<ArgSpec>,
    keys: KeyCompleter,
}

impl Command<Session> for Get {
    fn name(&self) -> &str {
        "get"
    }

    fn description(&self) -> &str {
        "Print a session variable"
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn run(&self, shell: &mut Shell<Session>, args: &ArgMap) -> Result<()> {
        let key = args
            .get("key")
            .ok_or_else(|| anyhow!("no key provided"))?;
        let value = lock(&shell.data().vars)
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("unknown variable: {key}"))?;
        writeln!(shell.out(), "{value}")?;
        Ok(())
    }

    fn completer(&self) -> Option<&dyn Completer<Session>> {
        Some(&self.keys)
    }
}

struct ListVars;

impl Command<Session> for ListVars {
    fn name(&self) -> &str {
        "vars"
    }

    fn description(&self) -> &str {
        "List all session variables"
    }

    fn run(&self, shell: &mut Shell<Session>, _args: &ArgMap) -> Result<()> {
        let listing: String = lock(&shell.data().vars)
            .iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect();
        shell.out().write_all(listing.as_bytes())?;
        Ok(())
    }
}

struct Reload;

impl Command<Session> for Reload {
    fn name(&self) -> &str {
        "reload"
    }

    fn description(&self) -> &str {
        "Run the reload hooks"
    }

    fn run(&self, shell: &mut Shell<Session>, _args: &ArgMap) -> Result<()> {
        let ran = shell.data().signals.trigger_reload();
        writeln!(shell.out(), "ran {ran} reload hook(s)")?;
        Ok(())
    }
}

fn demo_shell(config: ShellConfig, signals: Arc<SignalManager>) -> Shell<Session> {
    let vars = Vars::default();
    let key_arg = ArgSpec::new("key", "variable name", "");

    let mut shell = Shell::with_builtins(
        config,
        Session {
            vars: Arc::clone(&vars),
            signals,
        },
    );
    shell.add_command(Echo {
        args: vec![ArgSpec::new("text", "text to print", "")],
    });
    shell.add_command(Set {
        args: vec![key_arg.clone(), ArgSpec::new("value", "new value", "")],
        keys: KeyCompleter {
            vars: Arc::clone(&vars),
        },
    });
    shell.add_command(Get {
        args: vec![key_arg],
        keys: KeyCompleter { vars },
    });
    shell.add_command(ListVars);
    shell.add_command(Reload);
    shell
}

fn main() -> Result<ExitCode> {
    let cli: Cli = argh::from_env();

    let level = if cli.verbose || cli.debug_completions {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut config = ShellConfig::default()
        .with_case_insensitive(cli.case_insensitive)
        .with_debug_completions(cli.debug_completions);
    if let Some(history) = cli.history {
        config = config.with_history_file(Some(history));
    }

    let signals = Arc::new(SignalManager::new());
    let mut shell = demo_shell(config, Arc::clone(&signals));

    let vars = Arc::clone(&shell.data().vars);
    signals.on_reload(move || {
        tracing::info!(vars = lock(&vars).len(), "reload requested");
    });
    signals.on_interrupt(|| eprintln!("bye"));
    signals.listen()?;

    if let Some(line) = cli.command {
        return Ok(match shell.run_compound_line(&line) {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        });
    }

    if let Some(path) = cli.script {
        let file = File::open(&path)
            .with_context(|| format!("failed to open script {}", path.display()))?;
        shell.run_loop(&mut ScriptSource::new(BufReader::new(file)))?;
    } else {
        shell.run()?;
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdshell::MemWriter;

    fn shell() -> (Shell<Session>, std::rc::Rc<std::cell::RefCell<Vec<u8>>>) {
        let mut shell = demo_shell(ShellConfig::default(), Arc::new(SignalManager::new()));
        let (writer, handle) = MemWriter::with_handle();
        shell.set_output(writer);
        (shell, handle)
    }

    fn output(handle: &std::rc::Rc<std::cell::RefCell<Vec<u8>>>) -> String {
        String::from_utf8(handle.borrow().clone()).unwrap()
    }

    #[test]
    fn test_set_get_and_list_vars() {
        let (mut shell, handle) = shell();
        shell
            .run_compound_line("set name \"Ada L\"; set lang value=rust; get name; vars")
            .unwrap();
        assert_eq!(output(&handle), "Ada L\nlang=rust\nname=Ada L\n");
    }

    #[test]
    fn test_get_unknown_variable_fails() {
        let (mut shell, _) = shell();
        let err = shell.run_line("get missing").unwrap_err();
        assert_eq!(err.to_string(), "unknown variable: missing");
        assert!(shell.run_line("set").is_err());
    }

    #[test]
    fn test_key_completion_offers_known_variables() {
        let (mut shell, _) = shell();
        shell.run_compound_line("set alpha 1; set alps 2; set beta 3").unwrap();

        assert_eq!(shell.complete("get al"), vec!["get alpha ", "get alps "]);
        assert_eq!(shell.complete("set b"), vec!["set beta "]);
        assert!(shell.complete("set alpha 1").is_empty());
    }

    #[test]
    fn test_reload_runs_hooks() {
        let (mut shell, handle) = shell();
        let signals = Arc::clone(&shell.data().signals);
        signals.on_reload(|| {});
        shell.run_line("reload").unwrap();
        assert_eq!(output(&handle), "ran 1 reload hook(s)\n");
    }
}
