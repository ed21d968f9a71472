use crate::command::{ArgMap, ArgSpec};
use crate::error::ParseError;
use crate::splitter::{self, Argument};
use std::fmt;

/// Non-fatal problems found while mapping tokens onto declared arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgWarning {
    /// A bare token had no declared argument left to land on; it was dropped.
    ExtraPositional(String),
    /// An argument was given more than once; the later value was kept.
    Overwritten(String),
}

impl fmt::Display for ArgWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgWarning::ExtraPositional(value) => write!(f, "extra argument: {value}"),
            ArgWarning::Overwritten(name) => {
                write!(f, "argument '{name}' given more than once, using the last value")
            }
        }
    }
}

/// Result of [`build_args`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuiltArgs {
    pub args: ArgMap,
    pub warnings: Vec<ArgWarning>,
}

/// Maps the tokens following a command name onto its declared arguments.
///
/// The n-th bare token goes to the n-th declared argument no matter how many
/// `key=value` tokens come before it. Tokens are applied in order, so a later
/// token overwrites an earlier value for the same name.
pub fn build_args(specs: &[ArgSpec], tokens: &[String]) -> Result<BuiltArgs, ParseError> {
    let mut built = BuiltArgs::default();
    let mut positional = specs.iter();

    for token in tokens {
        let (name, value) = match splitter::split_argument(token)? {
            Argument::Named { key, value } => (key, value),
            Argument::Positional(value) => match positional.next() {
                Some(spec) => (spec.name.clone(), value),
                None => {
                    built.warnings.push(ArgWarning::ExtraPositional(value));
                    continue;
                }
            },
        };

        if built.args.contains_key(&name) {
            built.warnings.push(ArgWarning::Overwritten(name.clone()));
        }
        built.args.insert(name, value);
    }

    Ok(built)
}
