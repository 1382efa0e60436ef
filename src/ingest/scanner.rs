use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::database::index::IndexStore;
use crate::database::repo::{IndexWriter, ScannedFile};
use crate::error::{ExtractError, StoreError};
use crate::extract::ExtractorRegistry;
use crate::ingest::metadata::normalize_metadata;
use crate::media::ContentClassifier;
use crate::utils::config::TagFsConfig;

/// Counters reported at the end of a scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub directories: usize,
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub errors: usize,
}

/// Walks a real directory tree and fills the index from file metadata.
///
/// Only regular files and directories are considered; symlinks are not
/// followed. Unreadable directories and files whose metadata cannot be
/// extracted are logged and skipped, never fatal.
pub struct Scanner<'a> {
    classifier: &'a dyn ContentClassifier,
    extractors: &'a ExtractorRegistry,
    config: &'a TagFsConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(
        classifier: &'a dyn ContentClassifier,
        extractors: &'a ExtractorRegistry,
        config: &'a TagFsConfig,
    ) -> Self {
        Self {
            classifier,
            extractors,
            config,
        }
    }

    pub fn scan_directory(&self, root: &Path, store: &mut IndexStore) -> Result<ScanSummary, StoreError> {
        info!("Scanning {:?}", root);
        let mut summary = ScanSummary::default();
        let mut writer = IndexWriter::new(store);

        let skip_hidden = self.config.skip_hidden;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(skip_hidden && e.depth() > 0 && is_hidden(e)));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    summary.errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                summary.directories += 1;
            } else if file_type.is_file() {
                summary.files_seen += 1;
                match self.scan_file(&entry) {
                    Some(file) => {
                        writer.add(file)?;
                        summary.files_indexed += 1;
                    }
                    None => summary.files_skipped += 1,
                }
            }
        }

        writer.finish()?;
        info!(
            "Scan finished: {} directories, {} files seen, {} indexed, {} skipped, {} errors",
            summary.directories,
            summary.files_seen,
            summary.files_indexed,
            summary.files_skipped,
            summary.errors
        );
        Ok(summary)
    }

    fn scan_file(&self, entry: &DirEntry) -> Option<ScannedFile> {
        let path = entry.path();
        // The index and the kernel interface speak UTF-8 only.
        let name = match (path.to_str(), entry.file_name().to_str()) {
            (Some(_), Some(name)) => name.to_string(),
            _ => {
                warn!("Skipping {:?}: path is not valid UTF-8", path);
                return None;
            }
        };

        let mime = self.classifier.classify(path);

        let metadata = match self.extractors.extract(path, &mime) {
            Ok(metadata) => metadata,
            Err(ExtractError::Unsupported(_)) => {
                debug!("No extractor for {:?} ({})", path, mime);
                return None;
            }
            Err(e) => {
                warn!("Metadata extraction failed for {:?}: {}", path, e);
                return None;
            }
        };

        Some(ScannedFile {
            name,
            real_path: path.to_path_buf(),
            attributes: normalize_metadata(&metadata, self.config),
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::model::LinkTriple;
    use crate::extract::{Metadata, MetadataExtractor};
    use crate::media::InferClassifier;
    use anyhow::Result;
    use std::fs;
    use std::path::PathBuf;

    /// Reads `Key: Value` lines from `.pdf` and `.txt` files. A file whose
    /// first line is `!fail` reports an extraction error.
    pub(crate) struct LinesExtractor;

    impl MetadataExtractor for LinesExtractor {
        fn name(&self) -> &'static str {
            "lines"
        }

        fn supports(&self, path: &Path, _mime_type: &str) -> bool {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("pdf") | Some("txt")
            )
        }

        fn extract(&self, path: &Path) -> Result<Metadata, ExtractError> {
            let raw = fs::read_to_string(path)?;
            if raw.starts_with("!fail") {
                return Err(ExtractError::Io(std::io::Error::other("broken file")));
            }
            Ok(raw
                .lines()
                .filter_map(|l| l.split_once(": "))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect())
        }

        fn apply(&self, _path: &Path, _metadata: &Metadata) -> Result<(), ExtractError> {
            Ok(())
        }
    }

    pub(crate) fn registry() -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        registry.register(LinesExtractor);
        registry
    }

    pub(crate) fn scan(root: &Path, config: &TagFsConfig) -> Result<(IndexStore, ScanSummary)> {
        let mut store = IndexStore::open_in_memory()?;
        let registry = registry();
        let summary = Scanner::new(&InferClassifier, &registry, config).scan_directory(root, &mut store)?;
        Ok((store, summary))
    }

    fn triple(path: &Path, attr: &str, value: &str) -> LinkTriple {
        LinkTriple {
            real_path: path.to_path_buf(),
            attr: attr.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_scan_single_document() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let doc = dir.path().join("doc.pdf");
        fs::write(&doc, "Author: Alice, Bob\nTitle: Report\n")?;

        let (store, summary) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(summary.files_indexed, 1);

        let attrs: Vec<String> = store.attributes()?.into_iter().map(|a| a.name).collect();
        assert_eq!(attrs, vec!["author", "title"]);
        let values: Vec<String> = store.values()?.into_iter().map(|v| v.value).collect();
        assert_eq!(values, vec!["Alice", "Bob", "Report"]);
        assert_eq!(
            store.triples()?,
            vec![
                triple(&doc, "author", "Alice"),
                triple(&doc, "author", "Bob"),
                triple(&doc, "title", "Report"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_scan_recurses_and_skips_unsupported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("a/b"))?;
        fs::write(dir.path().join("a/one.txt"), "Title: One\n")?;
        fs::write(dir.path().join("a/b/two.pdf"), "Title: Two\n")?;
        fs::write(dir.path().join("a/b/picture.png"), "not metadata")?;

        let (store, summary) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(summary.directories, 3);
        assert_eq!(summary.files_seen, 3);
        assert_eq!(summary.files_indexed, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(store.file_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_failed_extraction_omits_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("bad.pdf"), "!fail\nTitle: Never\n")?;
        fs::write(dir.path().join("good.pdf"), "Title: Fine\n")?;

        let (store, summary) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(store.file_count()?, 1);
        assert!(store.value_id("Never")?.is_none());
        Ok(())
    }

    #[test]
    fn test_blank_values_keep_their_attribute() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("doc.pdf"), "Title:  \nSubject: x\nKeywords: , \n")?;

        let (store, summary) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(store.attribute_names()?, vec!["keywords", "subject", "title"]);
        // One link for the subject and one for the empty title. The keyword
        // list had no usable parts.
        assert_eq!(store.link_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_non_utf8_names_are_skipped() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(OsStr::from_bytes(b"caf\xe9.pdf")), "Title: Cafe\n")?;
        fs::write(dir.path().join("plain.pdf"), "Title: Plain\n")?;

        let (store, summary) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(summary.files_seen, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(store.file_count()?, 1);
        assert!(store.value_id("Cafe")?.is_none());
        for triple in store.triples()? {
            assert!(triple.real_path.exists(), "{:?} does not exist", triple.real_path);
        }
        Ok(())
    }

    #[test]
    fn test_symlinks_are_not_followed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let real = dir.path().join("real.pdf");
        fs::write(&real, "Title: Real\n")?;
        std::os::unix::fs::symlink(&real, dir.path().join("alias.pdf"))?;
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop"))?;

        let (store, summary) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(summary.files_seen, 1);
        assert_eq!(store.file_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_hidden_entries_follow_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join(".cache"))?;
        fs::write(dir.path().join(".cache/c.pdf"), "Title: Cached\n")?;
        fs::write(dir.path().join("v.pdf"), "Title: Visible\n")?;

        let (store, _) = scan(dir.path(), &TagFsConfig::default())?;
        assert_eq!(store.file_count()?, 2);

        let config = TagFsConfig {
            skip_hidden: true,
            ..TagFsConfig::default()
        };
        let (store, _) = scan(dir.path(), &config)?;
        assert_eq!(store.file_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_rescan_keeps_triples() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("doc.pdf"), "Author: Alice, Bob\nTitle: Report\n")?;
        fs::write(dir.path().join("memo.txt"), "Keywords: x, y\nAuthor: Bob\n")?;

        let config = TagFsConfig::default();
        let registry = registry();
        let scanner = Scanner::new(&InferClassifier, &registry, &config);
        let mut store = IndexStore::open_in_memory()?;

        scanner.scan_directory(dir.path(), &mut store)?;
        let mut first = store.triples()?;
        first.sort();

        scanner.scan_directory(dir.path(), &mut store)?;
        let mut second = store.triples()?;
        second.sort();
        second.dedup();

        assert_eq!(first, second);
        assert_eq!(store.attributes()?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_not_fatal() -> Result<()> {
        let (store, summary) = scan(&PathBuf::from("/nonexistent/tagfs-root"), &TagFsConfig::default())?;
        assert_eq!(summary.errors, 1);
        assert_eq!(store.file_count()?, 0);
        Ok(())
    }
}
