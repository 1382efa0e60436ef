use std::path::PathBuf;

/// Row id of a `file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub i64);

/// Row id of an `attr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(pub i64);

/// Row id of an `attr_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub real_path: PathBuf,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub id: AttrId,
    pub name: String,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub id: ValueId,
    pub value: String,
}

/// "File has Attribute = Value", spelled out with the joined strings.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkTriple {
    pub real_path: PathBuf,
    pub attr: String,
    pub value: String,
}

/// A filter over the file set: one attribute and the values every file must
/// carry under it. An empty value list admits any file linked to the attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub attr: AttrId,
    pub values: Vec<ValueId>,
}

impl Facet {
    pub fn new(attr: AttrId, values: Vec<ValueId>) -> Self {
        Self { attr, values }
    }

    /// Distinct value ids, in first-seen order.
    pub fn distinct_values(&self) -> Vec<ValueId> {
        let mut seen = Vec::with_capacity(self.values.len());
        for id in &self.values {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }
}
