use thiserror::Error;

/// Errors produced while splitting a line into tokens or a token into a
/// `key=value` pair.
///
/// Positions are character offsets into the string being split.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An enclosure was opened and never closed.
    #[error("unclosed '{open}' at position {pos}")]
    Unclosed { open: char, pos: usize },
    /// A closing character appeared with no enclosure open.
    #[error("unexpected '{close}' at position {pos}")]
    Unopened { close: char, pos: usize },
    /// A closing character does not match the innermost open enclosure.
    #[error("mismatched '{close}' at position {pos}, expected closer for '{open}'")]
    Mismatched { open: char, close: char, pos: usize },
    /// A token did not split into one or two fields.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Everything that can abort a line (or one segment of a compound line).
#[derive(Debug, Error)]
pub enum ShellError {
    /// The line or one of its arguments could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// The first token does not name a registered command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// `getcompletion` was asked for an output format it does not know.
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    /// Opaque failure returned by a command's run handler, passed through as-is.
    #[error(transparent)]
    Handler(anyhow::Error),
}
