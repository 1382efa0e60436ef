use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;
use crate::extract::process::{dequote, quote, read_output_lines, run};
use crate::extract::{Metadata, MetadataExtractor};

/// DjVu metadata through `djvused`.
pub struct DjvuExtractor {
    tool: String,
}

impl DjvuExtractor {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

impl Default for DjvuExtractor {
    fn default() -> Self {
        Self::new("djvused")
    }
}

impl MetadataExtractor for DjvuExtractor {
    fn name(&self) -> &'static str {
        "djvu"
    }

    fn supports(&self, path: &Path, mime_type: &str) -> bool {
        mime_type == "image/vnd.djvu"
            || path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("djvu"))
                .unwrap_or(false)
    }

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError> {
        let lines = read_output_lines(
            &self.tool,
            [path.as_os_str(), OsStr::new("-e"), OsStr::new("print-meta")],
        )?;
        Ok(parse_print_meta(&lines))
    }

    fn apply(&self, path: &Path, metadata: &Metadata) -> Result<(), ExtractError> {
        let mut script = tempfile::Builder::new().prefix("metainfo-").tempfile()?;
        script.write_all(render_meta(metadata).as_bytes())?;
        script.flush()?;

        let command = format!("set-meta {}; save", script.path().display());
        debug!("djvused {} -e {:?}", path.display(), command);
        run(&self.tool, [path.as_os_str(), OsStr::new("-e"), OsStr::new(&command)])
    }
}

/// Parses `print-meta` output: one `key<TAB>value` pair per line. Lines with
/// no tab or more than one are ignored.
pub fn parse_print_meta(lines: &[String]) -> Metadata {
    let mut result = Metadata::new();
    for line in lines {
        if let Some((key, value)) = line.split_once('\t') {
            if !value.contains('\t') {
                result.insert(key.to_string(), dequote(value, '"'));
            }
        }
    }
    result
}

fn render_meta(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(key, value)| format!("{}\t{}\n", key, quote(value, '"')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_supports_by_suffix() {
        let djvu = DjvuExtractor::default();
        assert!(djvu.supports(&PathBuf::from("/b/book.djvu"), "application/octet-stream"));
        assert!(djvu.supports(&PathBuf::from("/b/BOOK.DJVU"), "application/octet-stream"));
        assert!(djvu.supports(&PathBuf::from("/b/book"), "image/vnd.djvu"));
        assert!(!djvu.supports(&PathBuf::from("/b/book.pdf"), "application/pdf"));
    }

    #[test]
    fn test_parse_print_meta() {
        let meta = parse_print_meta(&lines(&[
            "Author\t\"Alice, Bob\"",
            "Title\tPlain",
            "broken line",
            "too\tmany\ttabs",
        ]));
        assert_eq!(meta.len(), 2);
        assert_eq!(meta["Author"], "Alice, Bob");
        assert_eq!(meta["Title"], "Plain");
    }

    #[test]
    fn test_render_meta_round_trips_through_parser() {
        let mut meta = Metadata::new();
        meta.insert("Title".into(), "A \"quoted\" title".into());
        meta.insert("Keywords".into(), "x, y".into());
        let rendered: Vec<String> = render_meta(&meta).lines().map(str::to_string).collect();
        assert_eq!(parse_print_meta(&rendered), meta);
    }
}
