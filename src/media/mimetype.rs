use std::path::Path;

use anyhow::{Context, Result};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Decides the content type handed to the extractors.
pub trait ContentClassifier {
    fn classify(&self, path: &Path) -> String;
}

/// Magic-number sniffing through `infer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InferClassifier;

impl ContentClassifier for InferClassifier {
    fn classify(&self, path: &Path) -> String {
        detect_mimetype(path).unwrap_or_else(|_| OCTET_STREAM.to_string())
    }
}

pub fn detect_mimetype(path: &Path) -> Result<String> {
    let kind = infer::get_from_path(path)
        .context("Failed to read file for mimetype detection")?;

    match kind {
        Some(k) => Ok(k.mime_type().to_string()),
        None => Ok(OCTET_STREAM.to_string()),
    }
}
