//! Metadata extraction collaborators.
//!
//! Each extractor turns one file into a flat `key -> value` mapping, usually by
//! running a format-specific command line tool and parsing what it prints.
//! The index only ever sees the mapping; how it was produced stays in here.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ExtractError;

pub mod djvu;
pub mod pdf;
pub mod process;
pub mod registry;

pub use djvu::DjvuExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;

/// Attribute name to value, as reported by a file's own metadata.
pub type Metadata = BTreeMap<String, String>;

pub trait MetadataExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this extractor understands the file.
    fn supports(&self, path: &Path, mime_type: &str) -> bool;

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError>;

    /// Write `metadata` back into the file, replacing what it carried.
    fn apply(&self, path: &Path, metadata: &Metadata) -> Result<(), ExtractError>;
}
