//! Source ingestion: files, fetched URLs, and manual text.
//!
//! Produces [`SourceDraft`]s for the store. Binary content is base64-encoded
//! with a MIME type from the supplier or an extension lookup; plain-text
//! files become text-bearing sources directly.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path;
use tracing::debug;

use crate::extract;
use crate::models::{Category, SourceDraft, SourceKind, SourcePayload};

/// Display label for link sources.
pub const LINK_LABEL: &str = "رابط خارجي";
/// Display label for manually entered text.
pub const MANUAL_TEXT_LABEL: &str = "نص مضاف";

/// Extension-based MIME lookup, used when the supplier gives no type.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Source kind from a MIME type.
pub fn kind_for_mime(mime_type: &str) -> SourceKind {
    match mime_type {
        "application/pdf"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            SourceKind::Document
        }
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "text/csv" => SourceKind::Spreadsheet,
        _ => SourceKind::Text,
    }
}

fn is_textual(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
}

/// Build a binary payload, attempting text extraction for fallback grounding.
fn binary_payload(bytes: &[u8], mime_type: &str) -> SourcePayload {
    let extracted_text = if extract::is_extractable(mime_type) {
        match extract::extract_text(bytes, mime_type) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                debug!("text extraction skipped ({}): {}", mime_type, e);
                None
            }
        }
    } else {
        None
    };

    SourcePayload::Binary {
        data: BASE64.encode(bytes),
        mime_type: mime_type.to_string(),
        extracted_text,
    }
}

/// Draft a source from raw file bytes. The display name is the file stem
/// (extension stripped); the MIME type comes from the extension lookup.
pub fn draft_from_bytes(bytes: &[u8], file_name: &str, category: Category) -> SourceDraft {
    let name = Path::new(file_name)
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name)
        .to_string();
    let mime_type = mime_for_name(file_name);

    let payload = if is_textual(mime_type) {
        SourcePayload::Text {
            content: String::from_utf8_lossy(bytes).into_owned(),
        }
    } else {
        binary_payload(bytes, mime_type)
    };

    SourceDraft {
        name,
        kind: kind_for_mime(mime_type),
        category,
        payload,
    }
}

/// Draft a source from a local file.
pub fn draft_from_file(path: &Path, category: Category) -> Result<SourceDraft> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(draft_from_bytes(&bytes, file_name, category))
}

/// Draft a source from a fetched URL resource. The MIME type comes from the
/// `Content-Type` response header, falling back to the URL's extension.
pub async fn draft_from_url(
    client: &reqwest::Client,
    url: &str,
    category: Category,
) -> Result<SourceDraft> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch: {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to fetch {}: HTTP {}", url, response.status());
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| mime_for_name(url).to_string());

    let bytes = response.bytes().await?;

    let payload = if is_textual(&mime_type) {
        SourcePayload::Text {
            content: String::from_utf8_lossy(&bytes).into_owned(),
        }
    } else {
        binary_payload(&bytes, &mime_type)
    };

    Ok(SourceDraft {
        name: LINK_LABEL.to_string(),
        kind: SourceKind::Link,
        category,
        payload,
    })
}

/// Draft a source from manually entered text.
pub fn draft_from_text(content: &str, category: Category, name: Option<String>) -> SourceDraft {
    SourceDraft {
        name: name.unwrap_or_else(|| MANUAL_TEXT_LABEL.to_string()),
        kind: SourceKind::Text,
        category,
        payload: SourcePayload::Text {
            content: content.to_string(),
        },
    }
}
