//! Analysis result as returned by the document-analysis service.
//!
//! Every field defaults, so a partial or malformed payload still decodes
//! into empty values instead of failing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzeResult {
    pub api_version: Option<String>,
    pub model_id: Option<String>,
    /// Full document text
    pub content: Option<String>,
    pub pages: Vec<DocumentPage>,
    pub tables: Vec<DocumentTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentPage {
    /// 1-based
    pub page_number: u32,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Unit of `width` and `height` ("pixel" or "inch")
    pub unit: Option<String>,
    pub angle: Option<f64>,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentLine {
    pub content: String,
    pub polygon: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<DocumentTableCell>,
    pub bounding_regions: Vec<BoundingRegion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentTableCell {
    /// "content", "columnHeader", "rowHeader", ...
    pub kind: Option<String>,
    pub row_index: usize,
    pub column_index: usize,
    pub row_span: Option<usize>,
    pub column_span: Option<usize>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoundingRegion {
    pub page_number: u32,
    pub polygon: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_service_payload() {
        let raw: AnalyzeResult = serde_json::from_str(
            r#"{
                "apiVersion": "2024-11-30",
                "modelId": "prebuilt-layout",
                "content": "Title\nBody",
                "pages": [{
                    "pageNumber": 1, "width": 8.5, "height": 11, "unit": "inch",
                    "lines": [{"content": "Title", "polygon": [0,0,1,0,1,1,0,1]}],
                    "words": [{"content": "Title"}]
                }],
                "tables": [{
                    "rowCount": 1, "columnCount": 2,
                    "cells": [{"kind": "columnHeader", "rowIndex": 0, "columnIndex": 1, "content": "B"}],
                    "boundingRegions": [{"pageNumber": 1, "polygon": []}]
                }],
                "paragraphs": []
            }"#,
        )
        .unwrap();

        assert_eq!(raw.pages[0].height, Some(11.0));
        assert_eq!(raw.pages[0].lines[0].content, "Title");
        assert_eq!(raw.tables[0].cells[0].column_index, 1);
        assert_eq!(raw.tables[0].cells[0].kind.as_deref(), Some("columnHeader"));
    }

    #[test]
    fn test_missing_fields_default() {
        let raw: AnalyzeResult =
            serde_json::from_str(r#"{"pages": [{}], "tables": [{"cells": [{}]}]}"#).unwrap();
        assert!(raw.content.is_none());
        assert_eq!(raw.pages[0].page_number, 0);
        assert!(raw.pages[0].lines.is_empty());
        assert_eq!(raw.tables[0].row_count, 0);
        assert_eq!(raw.tables[0].cells[0].content, "");
    }
}
