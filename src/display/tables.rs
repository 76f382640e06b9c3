//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::records::{Schema, StoredRecord};
use crate::vector::ItemId;

/// Longest text shown in a table cell before it is cut.
const MAX_TEXT_CHARS: usize = 60;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Shortens text to one line for table cells.
fn preview(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= MAX_TEXT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(MAX_TEXT_CHARS - 1).collect();
        format!("{cut}…")
    }
}

/// Key/value table describing a container schema.
pub fn create_schema_table(schema: &Schema, record_count: usize) -> String {
    let mut builder = TableBuilder::new()
        .set_headers(vec!["Field", "Value"])
        .add_row(vec!["Records".to_string(), record_count.to_string()])
        .add_row(vec![
            "Embedding size".to_string(),
            schema.embedding_size.to_string(),
        ])
        .add_row(vec!["Has text".to_string(), schema.has_text.to_string()]);

    for column in &schema.columns {
        builder = builder.add_row(vec![format!("Column {}", column.name), column.dtype.to_string()]);
    }
    builder.build()
}

/// Table of the first records of a container: id, metadata columns, text.
pub fn create_records_table(schema: &Schema, records: &[StoredRecord]) -> String {
    let mut headers = vec!["Id"];
    headers.extend(schema.column_names());
    if schema.has_text {
        headers.push("Text");
    }

    let mut builder = TableBuilder::new().set_headers(headers);
    for (id, record) in records.iter().enumerate() {
        let mut row = vec![id.to_string()];
        row.extend(record.metadata.values().map(|v| preview(&v.to_string())));
        if schema.has_text {
            row.push(record.text.as_deref().map(preview).unwrap_or_default());
        }
        builder = builder.add_row(row);
    }
    builder.build()
}

/// Ranked query hits.
pub fn create_results_table(hits: &[(ItemId, f32)]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec!["Rank", "Id", "Distance"]);
    for (rank, (id, distance)) in hits.iter().enumerate() {
        builder = builder.add_row(vec![
            (rank + 1).to_string(),
            id.to_string(),
            format!("{distance:.4}"),
        ]);
    }
    builder.build()
}
