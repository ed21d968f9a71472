use crate::command::Command;
use crate::error::ShellError;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Name → command mapping shared by the executor and the completion engine.
///
/// Names are stored exactly as registered. Case-insensitivity only changes how
/// [`Registry::get`] matches them.
pub struct Registry<T> {
    commands: BTreeMap<String, Rc<dyn Command<T>>>,
    case_insensitive: bool,
}

impl<T> Registry<T> {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            commands: BTreeMap::new(),
            case_insensitive,
        }
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn set_case_insensitive(&mut self, case_insensitive: bool) {
        self.case_insensitive = case_insensitive;
    }

    /// Registers `command` under `name`, replacing any previous command with the
    /// same name.
    pub fn register(&mut self, name: impl Into<String>, command: impl Command<T> + 'static) {
        self.commands.insert(name.into(), Rc::new(command));
    }

    /// Registers `command` under its own [`Command::name`].
    pub fn add(&mut self, command: impl Command<T> + 'static) {
        let name = command.name().to_string();
        self.register(name, command);
    }

    /// Looks a command up by name.
    ///
    /// An exact match always wins; when the registry is case-insensitive any
    /// name equal under lowercase folding is accepted as well.
    pub fn get(&self, name: &str) -> Option<Rc<dyn Command<T>>> {
        if let Some(command) = self.commands.get(name) {
            return Some(Rc::clone(command));
        }
        if !self.case_insensitive {
            return None;
        }

        let folded = name.to_lowercase();
        self.commands
            .iter()
            .find(|(key, _)| key.to_lowercase() == folded)
            .map(|(_, command)| Rc::clone(command))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolves the command named by the first token.
    ///
    /// Returns `Ok(None)` for an empty token list.
    pub fn resolve(&self, tokens: &[String]) -> Result<Option<Rc<dyn Command<T>>>, ShellError> {
        let Some(name) = tokens.first() else {
            return Ok(None);
        };
        self.get(name)
            .map(Some)
            .ok_or_else(|| ShellError::UnknownCommand(name.clone()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Command<T>)> {
        self.commands
            .iter()
            .map(|(name, command)| (name.as_str(), command.as_ref()))
    }

    /// Names whose lowercase form starts with the lowercased `prefix`.
    pub fn matching_prefix(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.names()
            .filter(|name| name.to_lowercase().starts_with(&prefix))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

// Commands are shared, so cloning only copies the map of handles.
impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            case_insensitive: self.case_insensitive,
        }
    }
}
