use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;
use crate::extract::{DjvuExtractor, Metadata, MetadataExtractor, PdfExtractor};
use crate::utils::config::ToolPaths;

/// Extractors in priority order. The first one that supports a file handles it.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MetadataExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// DjVu first, then PDF.
    pub fn with_tools(tools: &ToolPaths) -> Self {
        let mut registry = Self::new();
        registry.register(DjvuExtractor::new(tools.djvused.clone()));
        registry.register(PdfExtractor::new(tools.pdftk.clone()));
        registry
    }

    /// Appends at the lowest priority.
    pub fn register<E: MetadataExtractor + 'static>(&mut self, extractor: E) {
        self.extractors.push(Box::new(extractor));
    }

    pub fn get_for_file(&self, path: &Path, mime_type: &str) -> Option<&dyn MetadataExtractor> {
        self.extractors
            .iter()
            .find(|e| e.supports(path, mime_type))
            .map(|e| e.as_ref())
    }

    pub fn extract(&self, path: &Path, mime_type: &str) -> Result<Metadata, ExtractError> {
        let extractor = self
            .get_for_file(path, mime_type)
            .ok_or_else(|| ExtractError::Unsupported(mime_type.to_string()))?;
        debug!("{} extractor handles {:?}", extractor.name(), path);
        extractor.extract(path)
    }

    pub fn apply(&self, path: &Path, mime_type: &str, metadata: &Metadata) -> Result<(), ExtractError> {
        let extractor = self
            .get_for_file(path, mime_type)
            .ok_or_else(|| ExtractError::Unsupported(mime_type.to_string()))?;
        extractor.apply(path, metadata)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_tools(&ToolPaths::default())
    }
}
