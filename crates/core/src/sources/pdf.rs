use crate::error::IngestError;
use crate::models::{Document, SourceKind};
use lopdf::Document as PdfDocument;
use reqwest::Client;
use tracing::info;

/// Extracts page texts from raw PDF bytes and joins them with paragraph
/// breaks so the chunker can split on them.
pub fn pdf_text_from_bytes(bytes: &[u8], source: &str) -> Result<String, IngestError> {
    let document =
        PdfDocument::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;
        if !text.trim().is_empty() {
            pages.push(text.trim().to_string());
        }
    }

    if pages.is_empty() {
        return Err(IngestError::PdfParse(format!(
            "pdf had no readable page text: {source}"
        )));
    }

    Ok(pages.join("\n\n"))
}

/// Downloads a PDF by URL and extracts its text.
pub async fn fetch_pdf(client: &Client, url: &str) -> Result<Document, IngestError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(IngestError::Fetch {
            url: url.to_string(),
            details: format!("pdf download returned {}", response.status()),
        });
    }

    let bytes = response.bytes().await?;
    let text = pdf_text_from_bytes(&bytes, url)?;
    info!(url, bytes = bytes.len(), "fetched pdf");

    Ok(Document {
        text,
        source: url.to_string(),
        kind: SourceKind::Pdf,
    })
}
