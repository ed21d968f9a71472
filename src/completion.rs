//! Tab completion over the raw, possibly incomplete, input line.
//!
//! Every request re-parses the line from scratch; nothing is carried between
//! keystrokes. Failures anywhere in the pipeline mean "no suggestions" and are
//! only reported (through `tracing`) when debug completions are enabled.

use crate::args::build_args;
use crate::command::{ArgMap, Command};
use crate::registry::Registry;
use crate::shell::is_exit_token;
use crate::splitter;
use std::fmt;
use std::rc::Rc;

/// Computes completions against a snapshot of the command registry.
pub struct CompletionEngine<T> {
    registry: Rc<Registry<T>>,
    debug: bool,
}

impl<T> CompletionEngine<T> {
    pub fn new(registry: Rc<Registry<T>>, debug: bool) -> Self {
        Self { registry, debug }
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Whether completion diagnostics are emitted.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the suggestions for `line`, the whole current input line.
    ///
    /// Command-name suggestions are bare names. Suggestions coming from a
    /// command's completer carry a trailing space.
    pub fn complete(&self, line: &str) -> Vec<String> {
        if line.trim().is_empty() {
            return self.registry.matching_prefix(line.trim());
        }

        // Compound lines are not completed.
        if line.contains(';') {
            return Vec::new();
        }

        let tokens = match splitter::split_into_tokens(line.trim()) {
            Ok(tokens) => tokens,
            Err(err) => {
                self.diagnostic(format_args!("error splitting line: {err}"));
                return Vec::new();
            }
        };

        match tokens.first() {
            None => return Vec::new(),
            Some(first) if is_exit_token(first) => return Vec::new(),
            Some(_) => {}
        }

        let command = match self.registry.resolve(&tokens) {
            Ok(Some(command)) => command,
            Ok(None) => return Vec::new(),
            Err(err) => {
                // Partially typed command names still get suggestions, in
                // debug mode too.
                self.diagnostic(format_args!("error resolving command: {err}"));
                return self.registry.matching_prefix(line.trim_start());
            }
        };

        let Some(completer) = command.completer() else {
            return Vec::new();
        };

        let built = match build_args(command.args(), &tokens[1..]) {
            Ok(built) => built,
            Err(err) => {
                self.diagnostic(format_args!("error creating arg map: {err}"));
                return Vec::new();
            }
        };

        match completer.complete(self, line, &built.args) {
            Ok(completions) => completions.into_iter().map(|c| c + " ").collect(),
            Err(err) => {
                self.diagnostic(format_args!("error running completer: {err:#}"));
                Vec::new()
            }
        }
    }

    fn diagnostic(&self, message: fmt::Arguments<'_>) {
        if self.debug {
            tracing::debug!("{message}");
        }
    }
}

impl<T> Clone for CompletionEngine<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            debug: self.debug,
        }
    }
}

/// Generic completer based on a command's declared arguments.
///
/// While a value is being typed (the line ends in `name=`) nothing is offered.
/// If a bare word is in progress, every declared argument starting with it is
/// offered as `<line without the word> <name>=`. Otherwise every declared
/// argument missing from `args` is offered as `<command> <name>=`.
pub fn arg_based_completions<T>(
    engine: &CompletionEngine<T>,
    command: &dyn Command<T>,
    line: &str,
    args: &ArgMap,
) -> Vec<String> {
    let line = line.trim_start();
    let args_str = line.split_once(' ').map_or("", |(_, rest)| rest);

    let last_arg = find_last_arg(args_str);
    if last_arg.ends_with('=') && args_str.ends_with(last_arg.as_str()) {
        return Vec::new();
    }

    let untyped = find_untyped_arg(args_str);
    if engine.debug() {
        tracing::debug!(untyped = %untyped, last = %last_arg, args = %args_str, "arg completion");
    }

    if !untyped.is_empty() {
        let base = match line.rfind(untyped.as_str()) {
            Some(idx) => format!("{}{}", &line[..idx], &line[idx + untyped.len()..]),
            None => line.to_string(),
        };
        let base = base.trim();
        return command
            .args()
            .iter()
            .filter(|spec| spec.name.starts_with(untyped.as_str()))
            .map(|spec| format!("{} {}=", base, spec.name))
            .collect();
    }

    command
        .args()
        .iter()
        .filter(|spec| !args.contains_key(&spec.name))
        .map(|spec| format!("{} {}=", command.name(), spec.name))
        .collect()
}

/// Returns the last bare word (no `=`) of an argument string, or `""` when the
/// most recent `=`-terminated argument comes after it.
///
/// Quoted spans and bracket pairs are atomic, so `a="x = y"` and
/// `a=(x y)` are one argument each.
pub fn find_untyped_arg(args: &str) -> String {
    let mut untyped = "";
    for piece in split_outside_enclosures(args) {
        if !piece.contains('=') {
            untyped = piece;
        } else if piece.ends_with('=') {
            untyped = "";
        }
    }
    untyped.to_string()
}

/// Returns the last argument containing `=`, or `""` when there is none.
pub fn find_last_arg(args: &str) -> String {
    split_outside_enclosures(args)
        .into_iter()
        .filter(|piece| piece.contains('='))
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Splits on spaces that are not inside a quoted span or a bracket pair.
/// Unterminated quotes and brackets run to the end of the string.
fn split_outside_enclosures(args: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in args.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ' ') if depth == 0 => {
                if idx > start {
                    pieces.push(&args[start..idx]);
                }
                start = idx + 1;
            }
            (None, _) => {}
        }
    }
    if start < args.len() {
        pieces.push(&args[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ArgSpec, Completer};
    use crate::shell::Shell;
    use std::collections::HashSet;

    struct Plain(&'static str);

    impl Command<()> for Plain {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "plain"
        }

        fn run(&self, _shell: &mut Shell<()>, _args: &ArgMap) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Deploy {
        args: Vec<ArgSpec>,
    }

    impl Deploy {
        fn new() -> Self {
            Self {
                args: vec![
                    ArgSpec::new("target", "where to deploy", ""),
                    ArgSpec::new("tag", "image tag", "latest"),
                    ArgSpec::new("force", "skip checks", "false"),
                ],
            }
        }
    }

    impl Command<()> for Deploy {
        fn name(&self) -> &str {
            "deploy"
        }

        fn description(&self) -> &str {
            "deploy things"
        }

        fn args(&self) -> &[ArgSpec] {
            &self.args
        }

        fn run(&self, _shell: &mut Shell<()>, _args: &ArgMap) -> anyhow::Result<()> {
            Ok(())
        }

        fn completer(&self) -> Option<&dyn Completer<()>> {
            Some(self)
        }
    }

    impl Completer<()> for Deploy {
        fn complete(
            &self,
            engine: &CompletionEngine<()>,
            line: &str,
            args: &ArgMap,
        ) -> anyhow::Result<Vec<String>> {
            Ok(arg_based_completions(engine, self, line, args))
        }
    }

    struct Failing;

    impl Command<()> for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "completer always fails"
        }

        fn run(&self, _shell: &mut Shell<()>, _args: &ArgMap) -> anyhow::Result<()> {
            Ok(())
        }

        fn completer(&self) -> Option<&dyn Completer<()>> {
            Some(self)
        }
    }

    impl Completer<()> for Failing {
        fn complete(
            &self,
            _engine: &CompletionEngine<()>,
            _line: &str,
            _args: &ArgMap,
        ) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn engine(debug: bool) -> CompletionEngine<()> {
        let mut registry = Registry::default();
        registry.add(Plain("help"));
        registry.add(Plain("ping"));
        registry.add(Deploy::new());
        registry.add(Failing);
        CompletionEngine::new(Rc::new(registry), debug)
    }

    fn set(items: Vec<String>) -> HashSet<String> {
        items.into_iter().collect()
    }

    #[test]
    fn test_empty_line_lists_every_command() {
        let mut registry = Registry::<()>::default();
        registry.add(Plain("help"));
        registry.add(Plain("ping"));
        let engine = CompletionEngine::new(Rc::new(registry), false);

        let expected = set(vec!["help".into(), "ping".into()]);
        assert_eq!(set(engine.complete("")), expected);
        assert_eq!(set(engine.complete("   ")), expected);
    }

    #[test]
    fn test_partial_command_name_falls_back_to_prefix_listing() {
        assert_eq!(engine(false).complete("pi"), vec!["ping"]);
        assert_eq!(engine(false).complete("PI"), vec!["ping"]);
        assert_eq!(engine(true).complete("pi"), vec!["ping"]);
        assert!(engine(false).complete("zz").is_empty());
    }

    #[test]
    fn test_terminal_states_offer_nothing() {
        let engine = engine(false);
        assert!(engine.complete("ping; dep").is_empty());
        assert!(engine.complete("deploy \"unterminated").is_empty());
        assert!(engine.complete("exit").is_empty());
        assert!(engine.complete("quit now").is_empty());
        // Known command without a completer.
        assert!(engine.complete("ping ").is_empty());
        // Arguments that cannot be parsed.
        assert!(engine.complete("deploy a=b=c").is_empty());
        // Completer errors are swallowed.
        assert!(engine.complete("failing ").is_empty());
    }

    #[test]
    fn test_completer_lists_missing_arguments_with_trailing_space() {
        let got = engine(false).complete("deploy tag=v2 ");
        assert_eq!(got, vec!["deploy target= ", "deploy force= "]);
    }

    #[test]
    fn test_completer_extends_untyped_word() {
        assert_eq!(
            engine(false).complete("deploy ta"),
            vec!["deploy target= ", "deploy tag= "]
        );
        assert_eq!(
            engine(false).complete("deploy target=prod fo"),
            vec!["deploy target=prod force= "]
        );
    }

    #[test]
    fn test_bracketed_values_are_one_argument() {
        assert_eq!(
            engine(false).complete("deploy target=(a b) "),
            vec!["deploy tag= ", "deploy force= "]
        );
        assert_eq!(find_untyped_arg("target=[x y] ta"), "ta");
        assert_eq!(find_untyped_arg("target={x y}"), "");
        assert_eq!(find_last_arg("a=(1 2) b"), "a=(1 2)");
    }

    #[test]
    fn test_completer_is_silent_while_typing_a_value() {
        assert!(engine(false).complete("deploy target=").is_empty());
        assert!(engine(false).complete("deploy tag=v1 target=").is_empty());
    }

    #[test]
    fn test_find_untyped_arg() {
        assert_eq!(find_untyped_arg("abc=def ghi"), "ghi");
        assert_eq!(find_untyped_arg("abc=def ghi="), "");
        assert_eq!(find_untyped_arg(""), "");
        assert_eq!(find_untyped_arg(r#"msg="a b = c""#), "");
        assert_eq!(find_untyped_arg(r#"msg='x = y' ghi"#), "ghi");
        assert_eq!(
            find_untyped_arg(r#"abc=def ghi=d ghi:json='{\"a\":\"b=293d\"==w=1 fhfhf}'"#),
            ""
        );
    }

    #[test]
    fn test_find_last_arg() {
        assert_eq!(find_last_arg("abc=def ghi"), "abc=def");
        assert_eq!(find_last_arg("abc=def ghi=x jkl"), "ghi=x");
        assert_eq!(find_last_arg(r#"k="a=b c""#), r#"k="a=b c""#);
        assert_eq!(find_last_arg("plain words"), "");
    }
}
