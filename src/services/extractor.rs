// src/services/extractor.rs

//! PDF text extraction, delegated to the external pdf2text service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{HttpConfig, UpstreamConfig};
use crate::utils::join_endpoint;

/// Turns a document URL into its text content.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, document_url: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TextPayload {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the pdf2text `api/pdf-text-all` endpoint.
pub struct Pdf2TextExtractor {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl Pdf2TextExtractor {
    pub fn new(client: Client, upstream: &UpstreamConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: join_endpoint(&upstream.pdf2text_base, "api/pdf-text-all")?,
            timeout: Duration::from_secs(http.pdf_timeout_secs),
        })
    }
}

#[async_trait]
impl TextExtractor for Pdf2TextExtractor {
    async fn extract_text(&self, document_url: &str) -> Result<String> {
        log::debug!("Extracting text from {}", document_url);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("pdfUrl", document_url)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::extraction(format!("pdf2text request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::extraction(format!(
                "pdf2text returned {status} for {document_url}"
            )));
        }

        let payload: TextPayload = response
            .json()
            .await
            .map_err(|e| AppError::extraction(format!("pdf2text payload unreadable: {e}")))?;

        let text = payload.text.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(AppError::extraction(format!(
                "pdf2text returned no text for {document_url}"
            )));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};

    use crate::utils::testing::serve;

    async fn extractor_for(app: Router) -> Pdf2TextExtractor {
        let base = serve(app).await;
        let upstream = UpstreamConfig {
            pdf2text_base: base,
            ..UpstreamConfig::default()
        };
        Pdf2TextExtractor::new(Client::new(), &upstream, &HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_returns_trimmed_text() {
        let app = Router::new().route(
            "/api/pdf-text-all",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(serde_json::json!({ "text": format!("  Dahir {}\n", params["pdfUrl"]) }))
            }),
        );
        let extractor = extractor_for(app).await;

        let text = extractor
            .extract_text("https://www.sgg.gov.ma/BO/7270.pdf")
            .await
            .unwrap();
        assert_eq!(text, "Dahir https://www.sgg.gov.ma/BO/7270.pdf");
    }

    #[tokio::test]
    async fn test_empty_text_fails() {
        let app = Router::new().route(
            "/api/pdf-text-all",
            get(|| async { Json(serde_json::json!({ "text": "   " })) }),
        );
        let extractor = extractor_for(app).await;

        let err = extractor.extract_text("https://x/1.pdf").await.unwrap_err();
        assert_eq!(err.kind(), "extraction_failed");
    }

    #[tokio::test]
    async fn test_error_status_fails() {
        let app = Router::new().route(
            "/api/pdf-text-all",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let extractor = extractor_for(app).await;

        let err = extractor.extract_text("https://x/1.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed(_)));
        assert!(err.to_string().contains("500"));
    }
}
