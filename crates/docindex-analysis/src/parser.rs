//! Raw analysis result to [`ProcessedDocument`].
//!
//! Pure and infallible: anything missing in the raw result becomes an empty
//! value, and table cells outside the declared grid are dropped.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::document::{DocumentMetadata, ProcessedDocument, ProcessedPage, Table};
use crate::raw::{AnalyzeResult, DocumentPage, DocumentTable};

/// Largest grid allocated for a single table.
const MAX_TABLE_CELLS: usize = 1 << 20;

/// Normalize a raw analysis result, stamping it with the current time.
pub fn parse(raw: &AnalyzeResult, model_id: &str) -> ProcessedDocument {
    parse_at(raw, model_id, Utc::now())
}

/// [`parse`] with an explicit completion time.
pub fn parse_at(
    raw: &AnalyzeResult,
    model_id: &str,
    processed_at: DateTime<Utc>,
) -> ProcessedDocument {
    let pages: Vec<ProcessedPage> = raw
        .pages
        .iter()
        .enumerate()
        .map(|(index, page)| parse_page(index, page))
        .collect();
    let tables: Vec<Table> = raw.tables.iter().map(parse_table).collect();

    debug!(
        model_id,
        pages = pages.len(),
        tables = tables.len(),
        "Parsed analysis result"
    );

    ProcessedDocument {
        content: raw.content.clone().unwrap_or_default(),
        metadata: DocumentMetadata {
            page_count: pages.len(),
            model_id: model_id.to_string(),
            processed_at,
        },
        pages,
        tables: (!tables.is_empty()).then_some(tables),
    }
}

/// Pages without a number take their 1-based position.
fn parse_page(index: usize, page: &DocumentPage) -> ProcessedPage {
    let content = page
        .lines
        .iter()
        .map(|line| line.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    ProcessedPage {
        page_number: match page.page_number {
            0 => u32::try_from(index + 1).unwrap_or(u32::MAX),
            n => n,
        },
        content,
        width: page.width,
        height: page.height,
    }
}

fn parse_table(table: &DocumentTable) -> Table {
    let (row_count, column_count) = grid_shape(table);
    let mut cells = vec![vec![String::new(); column_count]; row_count];
    let mut dropped = 0usize;

    for cell in &table.cells {
        match cells
            .get_mut(cell.row_index)
            .and_then(|row| row.get_mut(cell.column_index))
        {
            Some(slot) => slot.clone_from(&cell.content),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(
            rows = row_count,
            columns = column_count,
            dropped,
            "Dropped out-of-bounds table cells"
        );
    }

    Table {
        row_count,
        column_count,
        cells,
        page_number: table.bounding_regions.first().map(|r| r.page_number),
    }
}

/// Declared dimensions, or when those exceed [`MAX_TABLE_CELLS`], the
/// smallest grid covering the in-bounds cells, capped to the same limit.
fn grid_shape(table: &DocumentTable) -> (usize, usize) {
    let declared = table
        .row_count
        .checked_mul(table.column_count)
        .is_some_and(|n| n <= MAX_TABLE_CELLS);
    if declared {
        return (table.row_count, table.column_count);
    }

    let in_bounds = table
        .cells
        .iter()
        .filter(|c| c.row_index < table.row_count && c.column_index < table.column_count);
    let rows = in_bounds
        .clone()
        .map(|c| c.row_index + 1)
        .max()
        .unwrap_or(0)
        .min(MAX_TABLE_CELLS);
    let columns = in_bounds
        .map(|c| c.column_index + 1)
        .max()
        .unwrap_or(0)
        .min(MAX_TABLE_CELLS / rows.max(1));

    warn!(
        declared_rows = table.row_count,
        declared_columns = table.column_count,
        rows,
        columns,
        "Table dimensions too large, clamped to populated cells"
    );
    (rows, columns)
}
