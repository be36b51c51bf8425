use crate::error::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Direct PDF extraction below this many characters is treated as a scanned
/// document and handed to OCR. Quality heuristic, not an error path.
const MIN_DIRECT_CHARS: usize = 100;

const OCR_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    Direct,
    Ocr,
    PlainText,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub method: ExtractionMethod,
    pub pages: Option<usize>,
}

/// File-format boundary: bytes in, ingestable text out. Everything past this
/// trait treats documents as plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<Extraction, IngestError>;
    fn is_supported(&self, filename: &str) -> bool;
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
struct OcrEndpointConfig {
    endpoint: String,
    api_key: Option<String>,
}

/// Extractor shipped with the crate: plain text and markdown decoded as-is,
/// PDF through `lopdf` with a remote multimodal OCR fallback for scanned
/// files when an endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "csv"];

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

impl TextExtractor for DocumentExtractor {
    fn is_supported(&self, filename: &str) -> bool {
        let ext = extension(filename);
        ext == "pdf" || TEXT_EXTENSIONS.contains(&ext.as_str())
    }

    fn extract(&self, bytes: &[u8], filename: &str) -> Result<Extraction, IngestError> {
        let ext = extension(filename);

        let extraction = if ext == "pdf" {
            extract_pdf(bytes, filename)?
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Extraction {
                text: String::from_utf8_lossy(bytes).into_owned(),
                method: ExtractionMethod::PlainText,
                pages: None,
            }
        } else {
            return Err(IngestError::UnsupportedFormat(filename.to_string()));
        };

        if extraction.text.trim().is_empty() {
            return Err(IngestError::EmptyDocument(filename.to_string()));
        }

        Ok(extraction)
    }
}

fn extract_pdf(bytes: &[u8], filename: &str) -> Result<Extraction, IngestError> {
    let direct = extract_pdf_direct(bytes);

    match direct {
        Ok(extraction) if extraction.text.trim().len() >= MIN_DIRECT_CHARS => Ok(extraction),
        Ok(extraction) => {
            debug!(
                filename,
                chars = extraction.text.trim().len(),
                "direct pdf extraction yielded little text, trying OCR"
            );
            match extract_with_ocr(bytes, filename) {
                Ok(Some(ocr)) => Ok(ocr),
                Ok(None) if !extraction.text.trim().is_empty() => Ok(extraction),
                Ok(None) => Err(IngestError::EmptyDocument(filename.to_string())),
                Err(error) => {
                    warn!(filename, %error, "OCR fallback failed");
                    if extraction.text.trim().is_empty() {
                        Err(error)
                    } else {
                        Ok(extraction)
                    }
                }
            }
        }
        Err(parse_error) => match extract_with_ocr(bytes, filename) {
            Ok(Some(ocr)) => Ok(ocr),
            Ok(None) => Err(parse_error),
            Err(ocr_error) => Err(IngestError::PdfParse(format!(
                "{parse_error}; OCR fallback failed: {ocr_error}"
            ))),
        },
    }
}

fn extract_pdf_direct(bytes: &[u8]) -> Result<Extraction, IngestError> {
    let document =
        Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    let mut text = String::new();
    let mut page_count = 0usize;
    for (page_no, _page_id) in document.get_pages() {
        page_count += 1;
        let page_text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        if !page_text.trim().is_empty() {
            text.push_str(page_text.trim());
            text.push_str("\n\n");
        }
    }

    Ok(Extraction {
        text: text.trim().to_string(),
        method: ExtractionMethod::Direct,
        pages: Some(page_count),
    })
}

fn parse_ocr_config() -> Option<OcrEndpointConfig> {
    let endpoint = std::env::var("LLM_OCR_ENDPOINT").ok()?;
    let endpoint = endpoint.trim().to_string();
    if endpoint.is_empty() {
        return None;
    }

    let api_key = std::env::var("LLM_OCR_API_KEY").ok().and_then(|value| {
        let key = value.trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    });

    Some(OcrEndpointConfig { endpoint, api_key })
}

fn extract_with_ocr(bytes: &[u8], filename: &str) -> Result<Option<Extraction>, IngestError> {
    tokio::task::block_in_place(|| extract_with_ocr_blocking(bytes, filename))
}

fn extract_with_ocr_blocking(
    bytes: &[u8],
    filename: &str,
) -> Result<Option<Extraction>, IngestError> {
    let cfg = match parse_ocr_config() {
        Some(cfg) => cfg,
        None => return Ok(None),
    };

    let payload = OcrRequest {
        pdf_base64: STANDARD.encode(bytes),
        source_path: filename.to_string(),
    };

    let client = Client::builder().timeout(OCR_TIMEOUT).build()?;
    let mut request = client
        .post(&cfg.endpoint)
        .header("content-type", "application/json")
        .json(&payload);

    if let Some(api_key) = cfg.api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request.send()?;

    if !response.status().is_success() {
        return Err(IngestError::OcrFailed(format!(
            "OCR request to {} returned {}",
            cfg.endpoint,
            response.status()
        )));
    }

    let payload: OcrResponse = response.json()?;
    let text = ocr_payload_text(&payload);

    if text.trim().is_empty() {
        return Err(IngestError::OcrFailed(format!(
            "OCR response had no readable text for {filename}"
        )));
    }

    Ok(Some(Extraction {
        text,
        method: ExtractionMethod::Ocr,
        pages: payload.pages.as_ref().map(Vec::len),
    }))
}

fn ocr_payload_text(payload: &OcrResponse) -> String {
    if let Some(pages) = &payload.pages {
        let joined = pages
            .iter()
            .filter_map(|page| page.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if !joined.is_empty() {
            return joined;
        }
    }

    payload
        .text
        .as_deref()
        .map(|text| text.replace('\u{000c}', "\n\n").trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_files_are_decoded() {
        let extractor = DocumentExtractor;
        let extraction = extractor
            .extract(b"Alpha risk notes.\n\nBeta security notes.", "notes.txt")
            .expect("txt extraction should work");

        assert_eq!(extraction.method, ExtractionMethod::PlainText);
        assert!(extraction.text.contains("Beta security"));
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        let extractor = DocumentExtractor;
        let result = extractor.extract(b"binary", "slides.pptx");
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
        assert!(!extractor.is_supported("slides.pptx"));
        assert!(extractor.is_supported("Report.PDF"));
    }

    #[test]
    fn empty_text_is_a_precondition_failure() {
        let extractor = DocumentExtractor;
        let result = extractor.extract(b"   \n ", "empty.txt");
        assert!(matches!(result, Err(IngestError::EmptyDocument(_))));
    }

    #[test]
    fn ocr_payload_prefers_listed_pages() {
        let payload = OcrResponse {
            pages: Some(vec![
                OcrPage {
                    text: Some("  ".to_string()),
                },
                OcrPage {
                    text: Some("Page body".to_string()),
                },
            ]),
            text: Some("ignored".to_string()),
        };

        assert_eq!(ocr_payload_text(&payload), "Page body");
    }

    #[test]
    fn ocr_payload_falls_back_to_form_feed_text() {
        let payload = OcrResponse {
            pages: None,
            text: Some("First\u{000C}Second\n".to_string()),
        };

        assert_eq!(ocr_payload_text(&payload), "First\n\nSecond");
    }
}
