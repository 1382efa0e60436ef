use std::path::PathBuf;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::database::model::{AttrId, Facet, FileId, FileRecord, ValueId};
use crate::database::schema::SCHEMA;
use crate::error::StoreError;

/// The relational index behind the virtual tree.
///
/// Built once by the ingestion walker through an [`IndexWriter`](crate::database::repo::IndexWriter)
/// and only queried afterwards. Every query binds its inputs; id lists are
/// expanded to `?` placeholders, never to literal text.
pub struct IndexStore {
    conn: Connection,
}

/// A composed statement together with the values bound to its placeholders,
/// in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl IndexStore {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub(super) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Case-insensitive attribute lookup.
    pub fn attribute_id(&self, name: &str) -> Result<Option<AttrId>, StoreError> {
        let id = self
            .conn
            .prepare_cached("SELECT id FROM attr WHERE name = ?1 ORDER BY id LIMIT 1")?
            .query_row(params![name.to_lowercase()], |row| row.get(0))
            .optional()?;
        Ok(id.map(AttrId))
    }

    /// Exact value lookup. Values are shared by all attributes.
    pub fn value_id(&self, value: &str) -> Result<Option<ValueId>, StoreError> {
        let id = self
            .conn
            .prepare_cached("SELECT id FROM attr_value WHERE value = ?1")?
            .query_row(params![value], |row| row.get(0))
            .optional()?;
        Ok(id.map(ValueId))
    }

    pub fn attribute_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare_cached("SELECT name FROM attr ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// First file called `name` admitted by `facet`.
    pub fn find_file(&self, facet: &Facet, name: &str) -> Result<Option<FileRecord>, StoreError> {
        let query = file_lookup_query(facet, name);
        let file = self
            .conn
            .prepare_cached(&query.sql)?
            .query_row(params_from_iter(query.params), file_from_row)
            .optional()?;
        Ok(file)
    }

    /// Every file admitted by `facet`, one entry per file.
    pub fn files(&self, facet: &Facet) -> Result<Vec<FileRecord>, StoreError> {
        let query = files_query(facet);
        let mut stmt = self.conn.prepare_cached(&query.sql)?;
        let files = stmt
            .query_map(params_from_iter(query.params), file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Values of `facet.attr` still present on the files admitted by `facet`,
    /// minus the ones already selected.
    pub fn facet_values(&self, facet: &Facet) -> Result<Vec<String>, StoreError> {
        let query = facet_values_query(facet);
        let mut stmt = self.conn.prepare_cached(&query.sql)?;
        let values = stmt
            .query_map(params_from_iter(query.params), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }

    pub fn file_count(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM file")
    }

    pub fn link_count(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM link")
    }

    fn count(&self, sql: &str) -> Result<usize, StoreError> {
        let n: i64 = self.conn.prepare_cached(sql)?.query_row([], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Whole-table dumps for inspecting an index in tests.
#[cfg(test)]
impl IndexStore {
    pub fn attributes(&self) -> Result<Vec<crate::database::model::Attribute>, StoreError> {
        let mut stmt = self.conn.prepare_cached("SELECT id, name FROM attr ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(crate::database::model::Attribute {
                    id: AttrId(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn values(&self) -> Result<Vec<crate::database::model::AttributeValue>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, value FROM attr_value ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(crate::database::model::AttributeValue {
                    id: ValueId(row.get(0)?),
                    value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn triples(&self) -> Result<Vec<crate::database::model::LinkTriple>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT file.path, attr.name, attr_value.value
             FROM link
             JOIN file ON file.id = link.file_id
             JOIN attr ON attr.id = link.attr_id
             JOIN attr_value ON attr_value.id = link.value_id
             ORDER BY link.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(crate::database::model::LinkTriple {
                    real_path: PathBuf::from(row.get::<_, String>(0)?),
                    attr: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: FileId(row.get(0)?),
        name: row.get(1)?,
        real_path: PathBuf::from(row.get::<_, String>(2)?),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Ids of the files carrying `facet.attr` with every one of its distinct values.
pub fn file_set_query(facet: &Facet) -> BoundQuery {
    let values = facet.distinct_values();
    if values.is_empty() {
        return BoundQuery {
            sql: "SELECT file_id FROM link WHERE attr_id = ?".to_string(),
            params: vec![Value::Integer(facet.attr.0)],
        };
    }

    let sql = format!(
        "SELECT file_id FROM link \
         WHERE attr_id = ? AND value_id IN ({}) \
         GROUP BY file_id \
         HAVING COUNT(DISTINCT value_id) = ?",
        placeholders(values.len())
    );
    let mut params = Vec::with_capacity(values.len() + 2);
    params.push(Value::Integer(facet.attr.0));
    params.extend(values.iter().map(|v| Value::Integer(v.0)));
    params.push(Value::Integer(values.len() as i64));
    BoundQuery { sql, params }
}

fn file_lookup_query(facet: &Facet, name: &str) -> BoundQuery {
    let set = file_set_query(facet);
    let sql = format!(
        "SELECT id, name, path FROM file WHERE name = ? AND id IN ({}) ORDER BY id LIMIT 1",
        set.sql
    );
    let mut params = vec![Value::Text(name.to_string())];
    params.extend(set.params);
    BoundQuery { sql, params }
}

fn files_query(facet: &Facet) -> BoundQuery {
    let set = file_set_query(facet);
    BoundQuery {
        sql: format!("SELECT id, name, path FROM file WHERE id IN ({}) ORDER BY id", set.sql),
        params: set.params,
    }
}

fn facet_values_query(facet: &Facet) -> BoundQuery {
    let set = file_set_query(facet);
    let selected = facet.distinct_values();

    let mut sql = format!(
        "SELECT attr_value.value FROM attr_value \
         JOIN link ON link.value_id = attr_value.id \
         WHERE link.attr_id = ? AND link.file_id IN ({})",
        set.sql
    );
    if !selected.is_empty() {
        sql.push_str(&format!(" AND link.value_id NOT IN ({})", placeholders(selected.len())));
    }
    sql.push_str(" GROUP BY attr_value.id ORDER BY attr_value.id");

    let mut params = vec![Value::Integer(facet.attr.0)];
    params.extend(set.params);
    params.extend(selected.iter().map(|v| Value::Integer(v.0)));
    BoundQuery { sql, params }
}
