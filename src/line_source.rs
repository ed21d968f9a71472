//! Where session lines come from.
//!
//! The shell only needs three things from its input side: read the next raw
//! line, remember a line in the history, and accept a completion engine for
//! tab completion.

use crate::completion::CompletionEngine;
use anyhow::{Context as _, Result};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};
use std::io::BufRead;
use std::path::PathBuf;

/// Input side of a shell session.
pub trait LineSource<T> {
    /// Reads the next line. `Ok(None)` ends the session.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Appends a line to the session history.
    fn add_history(&mut self, line: &str) -> Result<()>;

    /// Installs the engine used for tab completion. Called before every prompt.
    fn set_completion(&mut self, _engine: CompletionEngine<T>) {}

    /// Called once when the session ends.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// rustyline helper delegating tab completion to a [`CompletionEngine`].
pub struct LineHelper<T> {
    engine: Option<CompletionEngine<T>>,
}

impl<T> Completer for LineHelper<T> {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        // Candidates are whole-line replacements.
        let candidates = match &self.engine {
            Some(engine) => engine.complete(&line[..pos]),
            None => Vec::new(),
        };
        Ok((0, candidates))
    }
}

impl<T> Hinter for LineHelper<T> {
    type Hint = String;
}

impl<T> Highlighter for LineHelper<T> {}

impl<T> Validator for LineHelper<T> {}

impl<T> Helper for LineHelper<T> {}

/// Interactive terminal input: line editing, list-style tab completion and a
/// history file.
pub struct EditorSource<T> {
    editor: Editor<LineHelper<T>, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl<T> EditorSource<T> {
    /// Creates the editor and loads the history file, if any.
    ///
    /// A missing or unreadable history file is ignored.
    pub fn new(history_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();

        let mut editor: Editor<LineHelper<T>, DefaultHistory> =
            Editor::with_config(config).context("failed to create line editor")?;
        editor.set_helper(Some(LineHelper { engine: None }));

        if let Some(path) = &history_path {
            if let Err(err) = editor.load_history(path) {
                tracing::debug!("history not loaded from {}: {err}", path.display());
            }
        }

        Ok(Self {
            editor,
            history_path,
        })
    }
}

impl<T> LineSource<T> for EditorSource<T> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            // Ctrl-C and Ctrl-D both end the session.
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err).context("failed to read line"),
        }
    }

    fn add_history(&mut self, line: &str) -> Result<()> {
        self.editor.add_history_entry(line)?;
        Ok(())
    }

    fn set_completion(&mut self, engine: CompletionEngine<T>) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.engine = Some(engine);
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(path) = &self.history_path {
            self.editor
                .save_history(path)
                .with_context(|| format!("failed to write history file {}", path.display()))?;
        }
        Ok(())
    }
}

/// Non-interactive input from any reader, one command line per input line.
///
/// History is only kept in memory.
pub struct ScriptSource<R> {
    reader: R,
    history: Vec<String>,
}

impl<R: BufRead> ScriptSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

impl<R: BufRead, T> LineSource<T> for ScriptSource<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("failed to read line")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn add_history(&mut self, line: &str) -> Result<()> {
        self.history.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::History;
    use std::io::Cursor;

    fn temp_history(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cmdshell_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_script_source_reads_lines_until_eof() {
        let mut source = ScriptSource::new(Cursor::new("first\r\nsecond\n\nlast"));
        let mut lines = Vec::new();
        while let Some(line) = LineSource::<()>::read_line(&mut source, "> ").unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["first", "second", "", "last"]);
    }

    #[test]
    fn test_script_source_keeps_history_in_memory() {
        let mut source = ScriptSource::new(Cursor::new(""));
        LineSource::<()>::add_history(&mut source, "help").unwrap();
        LineSource::<()>::add_history(&mut source, "ping").unwrap();
        assert_eq!(source.history(), &["help", "ping"]);
        assert!(LineSource::<()>::close(&mut source).is_ok());
    }

    #[test]
    fn test_editor_history_round_trip() {
        let path = temp_history("round_trip");
        let _ = std::fs::remove_file(&path);

        // Nothing to load yet; that is not an error.
        let mut source = EditorSource::<()>::new(Some(path.clone())).unwrap();
        source.add_history("help").unwrap();
        source.add_history("getcompletion line=@empty").unwrap();
        source.close().unwrap();
        assert!(path.exists());

        let reloaded = EditorSource::<()>::new(Some(path.clone())).unwrap();
        assert_eq!(reloaded.editor.history().len(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_editor_save_failure_is_reported() {
        let dir = temp_history("not_a_dir");
        let _ = std::fs::remove_file(&dir);
        std::fs::write(&dir, b"plain file").unwrap();

        let mut source = EditorSource::<()>::new(Some(dir.join("history"))).unwrap();
        source.add_history("help").unwrap();
        assert!(source.close().is_err());

        let _ = std::fs::remove_file(&dir);
    }
}
