use std::path::PathBuf;

/// Session-wide settings of a [`Shell`](crate::Shell).
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Name of the embedding application. Used for the default history file.
    pub project_name: String,
    /// Static prompt, used when no prompter closure is installed.
    pub prompt: String,
    /// Match command names ignoring case. Exit tokens are always case-sensitive.
    pub case_insensitive: bool,
    /// Emit completion diagnostics through `tracing`.
    pub debug_completions: bool,
    /// History file, relative to the OS temp directory unless absolute.
    /// `None` disables history persistence.
    pub history_file: Option<PathBuf>,
}

impl ShellConfig {
    pub fn new(project_name: impl Into<String>) -> Self {
        let project_name = project_name.into();
        let history_file = Some(PathBuf::from(format!(".{project_name}_history")));
        Self {
            project_name,
            prompt: "> ".to_string(),
            case_insensitive: false,
            debug_completions: false,
            history_file,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_debug_completions(mut self, debug_completions: bool) -> Self {
        self.debug_completions = debug_completions;
        self
    }

    pub fn with_history_file(mut self, history_file: Option<PathBuf>) -> Self {
        self.history_file = history_file;
        self
    }

    /// Resolved location of the history file.
    pub fn history_path(&self) -> Option<PathBuf> {
        // Joining an absolute path replaces the base.
        self.history_file
            .as_ref()
            .map(|file| std::env::temp_dir().join(file))
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self::new("cmdshell")
    }
}
