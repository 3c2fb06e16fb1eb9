//! Analyze-then-parse pipeline.

use tracing::info;

use crate::client::{DocumentAnalysisClient, DocumentSource};
use crate::document::ProcessedDocument;
use crate::error::AnalysisError;
use crate::parser::parse;

/// Runs documents through an analysis client and normalizes the result.
pub struct DocumentProcessor<C> {
    client: C,
    model_id: String,
}

impl<C: DocumentAnalysisClient> DocumentProcessor<C> {
    pub fn new(client: C, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn process(&self, source: &DocumentSource) -> Result<ProcessedDocument, AnalysisError> {
        let raw = self.client.analyze(&self.model_id, source).await?;
        let document = parse(&raw, &self.model_id);
        info!(
            model_id = %self.model_id,
            pages = document.metadata.page_count,
            tables = document.tables().len(),
            "Document processed"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAnalysisClient;
    use crate::raw::{AnalyzeResult, DocumentLine, DocumentPage};

    #[tokio::test]
    async fn test_process_uses_model_id() {
        let raw = AnalyzeResult {
            content: Some("only line".to_string()),
            pages: vec![DocumentPage {
                page_number: 1,
                lines: vec![DocumentLine {
                    content: "only line".to_string(),
                    polygon: vec![],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let processor = DocumentProcessor::new(MockAnalysisClient::new(raw), "prebuilt-read");

        let doc = processor
            .process(&DocumentSource::Url("https://example.com/x.pdf".to_string()))
            .await
            .unwrap();
        assert_eq!(doc.metadata.model_id, "prebuilt-read");
        assert_eq!(doc.page(1).map(|p| p.content.as_str()), Some("only line"));
        assert!(doc.page(2).is_none());
    }
}
