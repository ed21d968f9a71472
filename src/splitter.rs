//! Enclosure-aware splitting of command lines and `key=value` arguments.
//!
//! Both the line tokenizer and the argument splitter are instances of the same
//! [`Splitter`] finite state machine; they differ only in the separator and in
//! how finished fields are post-processed.

use crate::error::ParseError;

/// A pair of delimiters inside which the separator is not significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enclosure {
    pub open: char,
    pub close: char,
    /// Inside a quote every other enclosure character is literal and `\` escapes
    /// the next character.
    pub quote: bool,
}

impl Enclosure {
    pub const PARENTHESIS: Enclosure = Enclosure { open: '(', close: ')', quote: false };
    pub const SQUARE_BRACKETS: Enclosure = Enclosure { open: '[', close: ']', quote: false };
    pub const CURLY_BRACKETS: Enclosure = Enclosure { open: '{', close: '}', quote: false };
    pub const DOUBLE_QUOTES: Enclosure = Enclosure { open: '"', close: '"', quote: true };
    pub const SINGLE_QUOTES: Enclosure = Enclosure { open: '\'', close: '\'', quote: true };
}

/// Enclosures recognized by both the tokenizer and the argument splitter.
pub const DEFAULT_ENCLOSURES: &[Enclosure] = &[
    Enclosure::PARENTHESIS,
    Enclosure::SQUARE_BRACKETS,
    Enclosure::CURLY_BRACKETS,
    Enclosure::DOUBLE_QUOTES,
    Enclosure::SINGLE_QUOTES,
];

/// Splits a string on a separator character, ignoring separators that appear
/// inside (possibly nested) enclosures.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    separator: char,
    enclosures: &'static [Enclosure],
    drop_empty: bool,
    unescape_quotes: bool,
}

/// Tokenizer for whole command lines: splits on spaces, drops empty tokens and
/// keeps enclosure characters verbatim.
pub const TOKEN_SPLITTER: Splitter = Splitter {
    separator: ' ',
    enclosures: DEFAULT_ENCLOSURES,
    drop_empty: true,
    unescape_quotes: false,
};

/// Splitter for a single `key=value` token. Quoted fields lose one level of
/// quoting.
pub const ARG_SPLITTER: Splitter = Splitter {
    separator: '=',
    enclosures: DEFAULT_ENCLOSURES,
    drop_empty: false,
    unescape_quotes: true,
};

impl Splitter {
    pub fn new(separator: char, enclosures: &'static [Enclosure]) -> Self {
        Self {
            separator,
            enclosures,
            drop_empty: false,
            unescape_quotes: false,
        }
    }

    /// Discard fields that are empty after trimming.
    pub fn drop_empty(mut self, drop_empty: bool) -> Self {
        self.drop_empty = drop_empty;
        self
    }

    /// Strip surrounding quotes from fields and resolve `\` escapes inside them.
    pub fn unescape_quotes(mut self, unescape_quotes: bool) -> Self {
        self.unescape_quotes = unescape_quotes;
        self
    }

    /// Splits `input` into trimmed fields.
    ///
    /// Fails when an enclosure is left open, closed without being opened, or
    /// closed by the wrong character.
    pub fn split(&self, input: &str) -> Result<Vec<String>, ParseError> {
        SplitFSM::new(self).run(input)
    }

    fn opener(&self, ch: char) -> Option<Enclosure> {
        self.enclosures.iter().copied().find(|e| e.open == ch)
    }

    fn is_closer(&self, ch: char) -> bool {
        self.enclosures.iter().any(|e| !e.quote && e.close == ch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    Plain,
    Quoted(Enclosure),
    Escaped(Enclosure),
}

struct SplitFSM<'a> {
    splitter: &'a Splitter,
    state: SplitState,
    open: Vec<(Enclosure, usize)>,
    buffer: String,
    fields: Vec<String>,
}

impl<'a> SplitFSM<'a> {
    fn new(splitter: &'a Splitter) -> Self {
        SplitFSM {
            splitter,
            state: SplitState::Plain,
            open: Vec::new(),
            buffer: String::new(),
            fields: Vec::new(),
        }
    }

    fn run(mut self, input: &str) -> Result<Vec<String>, ParseError> {
        for (pos, ch) in input.chars().enumerate() {
            match self.state {
                SplitState::Plain => self.handle_plain(ch, pos)?,
                SplitState::Quoted(quote) => self.handle_quoted(ch, quote),
                SplitState::Escaped(quote) => {
                    self.buffer.push(ch);
                    self.state = SplitState::Quoted(quote);
                }
            }
        }

        if let Some((enclosure, pos)) = self.open.last() {
            return Err(ParseError::Unclosed {
                open: enclosure.open,
                pos: *pos,
            });
        }

        self.finish_field();
        Ok(self.fields)
    }

    fn handle_plain(&mut self, ch: char, pos: usize) -> Result<(), ParseError> {
        if ch == self.splitter.separator && self.open.is_empty() {
            self.finish_field();
            return Ok(());
        }

        if let Some(enclosure) = self.splitter.opener(ch) {
            self.open.push((enclosure, pos));
            if enclosure.quote {
                self.state = SplitState::Quoted(enclosure);
            }
        } else if self.splitter.is_closer(ch) {
            match self.open.pop() {
                Some((enclosure, _)) if enclosure.close == ch => {}
                Some((enclosure, _)) => {
                    return Err(ParseError::Mismatched {
                        open: enclosure.open,
                        close: ch,
                        pos,
                    });
                }
                None => return Err(ParseError::Unopened { close: ch, pos }),
            }
        }

        self.buffer.push(ch);
        Ok(())
    }

    fn handle_quoted(&mut self, ch: char, quote: Enclosure) {
        if ch == '\\' {
            self.state = SplitState::Escaped(quote);
        } else if ch == quote.close {
            // A quote is only ever opened from the plain state, so whatever is
            // left on the stack is a bracket or nothing.
            self.open.pop();
            self.state = SplitState::Plain;
        }
        self.buffer.push(ch);
    }

    fn finish_field(&mut self) {
        let raw = std::mem::take(&mut self.buffer);
        let field = raw.trim();
        if field.is_empty() && self.splitter.drop_empty {
            return;
        }

        let field = if self.splitter.unescape_quotes {
            unescape_quotes(field, self.splitter.enclosures)
        } else {
            field.to_string()
        };
        self.fields.push(field);
    }
}

/// Strips one level of surrounding quotes and resolves backslash escapes
/// between them. Fields that are not fully quoted are returned unchanged.
fn unescape_quotes(field: &str, enclosures: &[Enclosure]) -> String {
    let mut chars = field.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return field.to_string();
    };

    let quoted = enclosures
        .iter()
        .any(|e| e.quote && e.open == first && e.close == last);
    if !quoted {
        return field.to_string();
    }

    let mut out = String::with_capacity(field.len());
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// A single post-command token, split into its optional key and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A bare token, assigned to a declared argument by position.
    Positional(String),
    /// An explicit `key=value` token.
    Named { key: String, value: String },
}

/// Tokenizes a raw command line.
///
/// Splits on spaces outside enclosures. Quote and bracket characters are kept
/// in the tokens; empty tokens are dropped.
pub fn split_into_tokens(line: &str) -> Result<Vec<String>, ParseError> {
    TOKEN_SPLITTER.split(line)
}

/// Splits one token on a top-level `=`.
///
/// `a=b` is named, `b` is positional, `a=` is named with an empty value.
/// Anything with more than one top-level `=` or an empty key is rejected.
pub fn split_argument(token: &str) -> Result<Argument, ParseError> {
    let mut fields = ARG_SPLITTER.split(token)?.into_iter();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(value), None, _) => Ok(Argument::Positional(value)),
        (Some(key), Some(value), None) if !key.is_empty() => Ok(Argument::Named { key, value }),
        _ => Err(ParseError::InvalidArgument(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        split_into_tokens(line).unwrap()
    }

    #[test]
    fn test_split_plain_words_and_extra_spaces() {
        assert_eq!(tokens("  echo   hello  world "), vec!["echo", "hello", "world"]);
        assert!(tokens("").is_empty());
        assert!(tokens("    ").is_empty());
    }

    #[test]
    fn test_split_keeps_enclosures_verbatim() {
        let line = r#"run "hello world" (a b) [c d] {e f} 'x y'"#;
        assert_eq!(
            tokens(line),
            vec!["run", r#""hello world""#, "(a b)", "[c d]", "{e f}", "'x y'"]
        );
    }

    #[test]
    fn test_split_nested_enclosures() {
        assert_eq!(
            tokens("call f(a [b c] {d (e f)}) next"),
            vec!["call", "f(a [b c] {d (e f)})", "next"]
        );
    }

    #[test]
    fn test_split_quotes_hide_brackets_and_escapes() {
        assert_eq!(
            tokens(r#"say "he said \"hi there\"" 'a ( b'"#),
            vec!["say", r#""he said \"hi there\"""#, "'a ( b'"]
        );
    }

    #[test]
    fn test_split_unbalanced_input_is_an_error() {
        assert_eq!(
            split_into_tokens(r#"echo "abc"#),
            Err(ParseError::Unclosed { open: '"', pos: 5 })
        );
        assert_eq!(
            split_into_tokens("a)"),
            Err(ParseError::Unopened { close: ')', pos: 1 })
        );
        assert_eq!(
            split_into_tokens("(a]"),
            Err(ParseError::Mismatched { open: '(', close: ']', pos: 2 })
        );
        assert_eq!(
            split_into_tokens("x [a (b]"),
            Err(ParseError::Mismatched { open: '(', close: ']', pos: 7 })
        );
    }

    #[test]
    fn test_rejoined_tokens_parse_to_the_same_boundaries() {
        let lines = [
            r#"getcompletion line="help co" format=printArray"#,
            "a   b(c  d)   {e [f g]}",
            r#"set key='x = y' value="a\"b c""#,
            "  one  ",
        ];
        for line in lines {
            let first = tokens(line);
            let second = tokens(&first.join(" "));
            assert_eq!(first, second, "line: {line}");
        }
    }

    #[test]
    fn test_split_argument_named_and_positional() {
        assert_eq!(
            split_argument("a=b"),
            Ok(Argument::Named { key: "a".into(), value: "b".into() })
        );
        assert_eq!(split_argument("bare"), Ok(Argument::Positional("bare".into())));
        assert_eq!(
            split_argument("key="),
            Ok(Argument::Named { key: "key".into(), value: String::new() })
        );
    }

    #[test]
    fn test_split_argument_rejects_ambiguous_tokens() {
        assert_eq!(
            split_argument("a=b=c"),
            Err(ParseError::InvalidArgument("a=b=c".into()))
        );
        assert_eq!(
            split_argument("=value"),
            Err(ParseError::InvalidArgument("=value".into()))
        );
    }

    #[test]
    fn test_split_argument_respects_enclosures() {
        assert_eq!(
            split_argument("x=(a=b)"),
            Ok(Argument::Named { key: "x".into(), value: "(a=b)".into() })
        );
        assert_eq!(
            split_argument("k='x=y'"),
            Ok(Argument::Named { key: "k".into(), value: "x=y".into() })
        );
        assert_eq!(
            split_argument(r#"msg="a b""#),
            Ok(Argument::Named { key: "msg".into(), value: "a b".into() })
        );
    }

    #[test]
    fn test_split_argument_unescapes_quotes() {
        assert_eq!(split_argument(r#""a\"b""#), Ok(Argument::Positional(r#"a"b"#.into())));
        // Only fully quoted fields are unescaped.
        assert_eq!(
            split_argument(r#"f("a")"#),
            Ok(Argument::Positional(r#"f("a")"#.into()))
        );
    }

    #[test]
    fn test_custom_splitter() {
        let splitter = Splitter::new(',', DEFAULT_ENCLOSURES).drop_empty(true);
        assert_eq!(
            splitter.split("a, (b, c),, d").unwrap(),
            vec!["a", "(b, c)", "d"]
        );
    }
}
