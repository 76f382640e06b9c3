//! Terminal display: styled tables, progress bars and the color theme.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use tables::{TableBuilder, create_records_table, create_results_table, create_schema_table};
pub use theme::{Status, THEME, Theme};
