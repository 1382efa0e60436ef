use std::path::PathBuf;

use rusqlite::params;

use crate::database::index::IndexStore;
use crate::error::StoreError;

/// An attribute name and the values recorded under it for one file.
pub type AttributeValues = (String, Vec<String>);

/// One regular file as handed over by the walker: its base name, absolute
/// path, and already-normalised attributes with their values. An attribute
/// with no values still gets its row. `real_path` must be valid UTF-8; the
/// walker skips anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub name: String,
    pub real_path: PathBuf,
    pub attributes: Vec<AttributeValues>,
}

/// Buffers scanned files and writes them to the index in batched transactions.
///
/// Rows are find-or-create: files by real path, attributes by lower-cased
/// name, values by raw string, links by the full triple. Feeding the same
/// tree twice therefore leaves the index unchanged.
pub struct IndexWriter<'a> {
    store: &'a mut IndexStore,
    buffer: Vec<ScannedFile>,
    buffer_limit: usize,
    written: usize,
}

impl<'a> IndexWriter<'a> {
    pub fn new(store: &'a mut IndexStore) -> Self {
        Self::with_buffer_limit(store, 1000)
    }

    pub fn with_buffer_limit(store: &'a mut IndexStore, buffer_limit: usize) -> Self {
        Self {
            store,
            buffer: Vec::new(),
            buffer_limit: buffer_limit.max(1),
            written: 0,
        }
    }

    pub fn add(&mut self, file: ScannedFile) -> Result<(), StoreError> {
        self.buffer.push(file);
        if self.buffer.len() >= self.buffer_limit {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let tx = self.store.connection_mut().transaction()?;

        {
            let mut stmt_file = tx.prepare(
                "INSERT INTO file (name, path) VALUES (?1, ?2)
                 ON CONFLICT(path) DO UPDATE SET name = excluded.name
                 RETURNING id",
            )?;
            let mut stmt_attr = tx.prepare("INSERT OR IGNORE INTO attr (name) VALUES (?1)")?;
            let mut stmt_attr_id = tx.prepare("SELECT id FROM attr WHERE name = ?1")?;
            let mut stmt_value = tx.prepare("INSERT OR IGNORE INTO attr_value (value) VALUES (?1)")?;
            let mut stmt_value_id = tx.prepare("SELECT id FROM attr_value WHERE value = ?1")?;
            let mut stmt_link = tx.prepare(
                "INSERT OR IGNORE INTO link (file_id, attr_id, value_id) VALUES (?1, ?2, ?3)",
            )?;

            for file in &self.buffer {
                let path = file.real_path.to_string_lossy().into_owned();
                let file_id: i64 =
                    stmt_file.query_row(params![file.name, path], |row| row.get(0))?;

                for (attr, values) in &file.attributes {
                    let attr = attr.to_lowercase();
                    stmt_attr.execute(params![attr])?;
                    let attr_id: i64 = stmt_attr_id.query_row(params![attr], |row| row.get(0))?;

                    for value in values {
                        stmt_value.execute(params![value])?;
                        let value_id: i64 =
                            stmt_value_id.query_row(params![value], |row| row.get(0))?;
                        stmt_link.execute(params![file_id, attr_id, value_id])?;
                    }
                }
            }
        }

        tx.commit()?;
        self.written += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }

    /// Flushes what is left and returns how many files were written in total.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        self.flush()?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn doc(path: &str, pairs: &[(&str, &str)]) -> ScannedFile {
        let real_path = PathBuf::from(path);
        ScannedFile {
            name: real_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            real_path,
            attributes: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect(),
        }
    }

    #[test]
    fn test_attribute_names_are_case_folded_and_unique() -> Result<()> {
        let mut store = IndexStore::open_in_memory()?;
        let mut writer = IndexWriter::new(&mut store);
        writer.add(doc("/t/a.pdf", &[("Title", "One")]))?;
        writer.add(doc("/t/b.pdf", &[("TITLE", "Two"), ("title", "Three")]))?;
        writer.finish()?;

        let attrs = store.attributes()?;
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "title");
        assert_eq!(store.link_count()?, 3);
        Ok(())
    }

    #[test]
    fn test_values_are_shared_across_attributes() -> Result<()> {
        let mut store = IndexStore::open_in_memory()?;
        let mut writer = IndexWriter::new(&mut store);
        writer.add(doc("/t/a.pdf", &[("author", "Smith"), ("subject", "Smith")]))?;
        writer.finish()?;

        assert_eq!(store.values()?.len(), 1);
        assert_eq!(store.link_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_attribute_without_values_is_still_recorded() -> Result<()> {
        let mut store = IndexStore::open_in_memory()?;
        let mut writer = IndexWriter::new(&mut store);
        writer.add(ScannedFile {
            name: "a.pdf".to_string(),
            real_path: PathBuf::from("/t/a.pdf"),
            attributes: vec![("Keywords".to_string(), vec![]), ("title".to_string(), vec![String::new()])],
        })?;
        writer.finish()?;

        assert_eq!(store.attribute_names()?, vec!["keywords", "title"]);
        assert_eq!(store.link_count()?, 1);
        assert!(store.value_id("")?.is_some());
        Ok(())
    }

    #[test]
    fn test_small_buffer_flushes_incrementally() -> Result<()> {
        let mut store = IndexStore::open_in_memory()?;
        let mut writer = IndexWriter::with_buffer_limit(&mut store, 2);
        for i in 0..5 {
            writer.add(doc(&format!("/t/{}.pdf", i), &[("n", &i.to_string())]))?;
        }
        assert_eq!(writer.finish()?, 5);
        assert_eq!(store.file_count()?, 5);
        Ok(())
    }

    #[test]
    fn test_rewriting_same_files_is_idempotent() -> Result<()> {
        let mut store = IndexStore::open_in_memory()?;
        let files = vec![
            doc("/t/doc.pdf", &[("author", "Alice"), ("author", "Bob"), ("title", "Report")]),
            doc("/t/other.pdf", &[("title", "Report")]),
        ];

        write_all(&mut store, files.clone())?;
        let first = store.triples()?;

        write_all(&mut store, files)?;
        assert_eq!(store.triples()?, first);
        assert_eq!(store.file_count()?, 2);
        assert_eq!(store.attributes()?.len(), 2);
        assert_eq!(store.values()?.len(), 3);
        Ok(())
    }

    fn write_all(store: &mut IndexStore, files: Vec<ScannedFile>) -> Result<usize> {
        let mut writer = IndexWriter::new(store);
        for file in files {
            writer.add(file)?;
        }
        Ok(writer.finish()?)
    }
}
