use std::fmt;

use serde::Serialize;

/// Immutable argument vector for one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// First token, i.e. the program to launch.
    pub fn program(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Single string for the platform shell the runner launches through.
    pub fn to_shell_string(&self) -> String {
        self.render(Shell::native())
    }

    /// Single string quoted for `shell`.
    pub fn render(&self, shell: Shell) -> String {
        self.tokens
            .iter()
            .map(|token| shell.quote(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Command interpreter a [`CommandLine`] is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// `sh -c`
    Posix,
    /// `cmd /C`. `%VAR%` references are still expanded inside quotes.
    Cmd,
}

impl Shell {
    pub fn native() -> Self {
        if cfg!(windows) { Shell::Cmd } else { Shell::Posix }
    }

    fn quote(self, token: &str) -> String {
        if is_plain(token) {
            return token.to_string();
        }
        match self {
            Shell::Posix => format!("'{}'", token.replace('\'', r"'\''")),
            Shell::Cmd => format!("\"{}\"", token.replace('"', r#"\""#)),
        }
    }
}

fn is_plain(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@' | '%')
        })
}
