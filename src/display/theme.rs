//! Styling for command output: status lines, file paths, counts and hints.
//!
//! Everything degrades to plain text under `NO_COLOR` or when stdout is not
//! a terminal, so piped `query` and `inspect` output stays parseable.

use console::Style;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::fmt::Display;
use std::path::Path;
use std::sync::LazyLock;

pub static THEME: LazyLock<Theme> = LazyLock::new(Theme::default);

/// Outcome shown at the start of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A container or index was written, or a command finished
    Done,
    /// Skipped corpus rows, empty result sets
    Warning,
    Failed,
}

impl Status {
    fn icon(self) -> &'static str {
        match self {
            Status::Done => "✓",
            Status::Warning => "⚠",
            Status::Failed => "✗",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub done: Style,
    pub warning: Style,
    pub failed: Style,
    pub header: Style,
    pub hint: Style,
    /// Containers, indexes and settings files
    pub path: Style,
    /// Record counts, item ids, distances
    pub count: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            done: Style::new().green().bright(),
            warning: Style::new().yellow().bright(),
            failed: Style::new().red().bright(),
            header: Style::new().cyan().bold(),
            hint: Style::new().dim(),
            path: Style::new().magenta(),
            count: Style::new().cyan(),
        }
    }
}

impl Theme {
    /// `✓ text`, `⚠ text` or `✗ text`, colored by outcome.
    pub fn status(&self, status: Status, text: &str) -> String {
        if Self::colors_disabled() {
            return format!("{} {text}", status.icon());
        }
        match status {
            Status::Done => format!("{} {}", status.icon().green(), self.done.apply_to(text)),
            Status::Warning => {
                format!("{} {}", status.icon().yellow(), self.warning.apply_to(text))
            }
            Status::Failed => format!("{} {}", status.icon().red(), self.failed.apply_to(text)),
        }
    }

    pub fn path(&self, path: &Path) -> String {
        self.paint(&self.path, path.display())
    }

    pub fn count(&self, value: impl Display) -> String {
        self.paint(&self.count, value)
    }

    pub fn header(&self, text: &str) -> String {
        self.paint(&self.header, text)
    }

    pub fn hint(&self, text: &str) -> String {
        self.paint(&self.hint, text)
    }

    /// True under `NO_COLOR` or when stdout is piped.
    pub fn colors_disabled() -> bool {
        std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal()
    }

    fn paint(&self, style: &Style, value: impl Display) -> String {
        if Self::colors_disabled() {
            value.to_string()
        } else {
            style.apply_to(value).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines_keep_icon_and_text() {
        let theme = Theme::default();
        let done = theme.status(Status::Done, "index written");
        assert!(done.contains('✓'));
        assert!(done.contains("index written"));

        let warning = theme.status(Status::Warning, "No results");
        assert!(warning.contains('⚠'));
        assert!(theme.count(42).contains("42"));
        assert!(theme.path(Path::new("data/songs.vec")).contains("data/songs.vec"));
    }
}
