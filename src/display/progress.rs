//! Progress tracking utilities for long-running operations.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use is_terminal::IsTerminal;
use std::time::Duration;

/// Whether progress output should be drawn at all.
fn stderr_is_interactive() -> bool {
    std::io::stderr().is_terminal()
}

/// Create a styled progress bar for records or items.
///
/// The bar is hidden when stderr is not a terminal so logs stay clean.
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    if !stderr_is_interactive() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a spinner for indeterminate progress.
pub fn create_spinner(message: &str) -> ProgressBar {
    if !stderr_is_interactive() {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Helper to display a temporary spinner during an operation.
pub fn with_spinner<F, T>(message: &str, operation: F) -> T
where
    F: FnOnce() -> T,
{
    let spinner = create_spinner(message);
    let result = operation();
    spinner.finish_and_clear();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_spinner_returns_result() {
        let value = with_spinner("building forest", || 41 + 1);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_progress_bar_counts() {
        let pb = create_progress_bar(10, "embedding");
        pb.inc(3);
        // Hidden bars still track position
        assert_eq!(pb.position(), 3);
        pb.finish_and_clear();
    }
}
