//! Normalized document model produced by the parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text and tables extracted from one analyzed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    /// Full document text
    pub content: String,
    pub pages: Vec<ProcessedPage>,
    /// `None` when the document has no tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<Table>>,
    pub metadata: DocumentMetadata,
}

impl ProcessedDocument {
    /// Page by its 1-based number.
    pub fn page(&self, page_number: u32) -> Option<&ProcessedPage> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Tables, empty when none were extracted.
    pub fn tables(&self) -> &[Table] {
        self.tables.as_deref().unwrap_or(&[])
    }

    /// Tables whose first bounding region is on `page_number`.
    pub fn tables_on_page(&self, page_number: u32) -> impl Iterator<Item = &Table> {
        self.tables()
            .iter()
            .filter(move |t| t.page_number == Some(page_number))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedPage {
    pub page_number: u32,
    /// Line texts joined by newline
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// A table as a dense `row_count` x `column_count` grid of cell texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

impl Table {
    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.cells.get(index).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.cells.get(row)?.get(column).map(String::as_str)
    }

    /// Render as a Markdown table, using the first row as the header.
    ///
    /// Returns an empty string for a table without rows or columns.
    pub fn to_markdown(&self) -> String {
        if self.row_count == 0 || self.column_count == 0 {
            return String::new();
        }

        let render = |row: &[String]| {
            let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
            format!("| {} |", cells.join(" | "))
        };

        let mut lines = Vec::with_capacity(self.cells.len() + 1);
        let mut rows = self.cells.iter();
        if let Some(header) = rows.next() {
            lines.push(render(header));
            lines.push(format!("|{}", " --- |".repeat(self.column_count)));
        }
        lines.extend(rows.map(|row| render(row)));
        lines.join("\n")
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub model_id: String,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(cells: Vec<Vec<&str>>) -> Table {
        Table {
            row_count: cells.len(),
            column_count: cells.first().map_or(0, Vec::len),
            cells: cells
                .into_iter()
                .map(|row| row.into_iter().map(String::from).collect())
                .collect(),
            page_number: Some(1),
        }
    }

    #[test]
    fn test_markdown_rendering() {
        let t = table(vec![vec!["Name", "Qty"], vec!["a|b", "2\n3"]]);
        assert_eq!(
            t.to_markdown(),
            "| Name | Qty |\n| --- | --- |\n| a\\|b | 2 3 |"
        );
    }

    #[test]
    fn test_markdown_empty_table() {
        assert_eq!(table(vec![]).to_markdown(), "");
    }

    #[test]
    fn test_row_and_cell_access() {
        let t = table(vec![vec!["A", ""], vec!["", "D"]]);
        assert_eq!(t.row(1), Some(&["".to_string(), "D".to_string()][..]));
        assert_eq!(t.cell(0, 0), Some("A"));
        assert_eq!(t.cell(2, 0), None);
    }

    #[test]
    fn test_tables_omitted_when_absent() {
        let doc = ProcessedDocument {
            content: String::new(),
            pages: vec![],
            tables: None,
            metadata: DocumentMetadata {
                page_count: 0,
                model_id: "prebuilt-layout".to_string(),
                processed_at: Utc::now(),
            },
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("tables").is_none());
        assert_eq!(json["metadata"]["modelId"], "prebuilt-layout");
        assert!(doc.tables().is_empty());
    }
}
