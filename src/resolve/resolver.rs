use std::path::PathBuf;

use crate::database::index::IndexStore;
use crate::database::model::{Facet, FileRecord};
use crate::error::ResolveError;
use crate::resolve::path::{parse, PathState, VirtualPath};

/// What a virtual path denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Root,
    /// An attribute directory, narrowed by the selected values.
    Directory(Facet),
    /// A leaf: a symbolic link to an indexed file.
    Link(FileRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Listed at the root.
    Attribute,
    /// A value that narrows the current file set further.
    Value,
    /// A matching file, shown as a link.
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl VirtualEntry {
    fn new(name: String, kind: EntryKind) -> Self {
        Self { name, kind }
    }
}

/// Faceted query engine over a frozen index.
///
/// Borrowing the store keeps the resolver free of any state of its own, so
/// it can be created per request.
pub struct Resolver<'a> {
    store: &'a IndexStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a IndexStore) -> Self {
        Self { store }
    }

    pub fn parse(&self, path: &str) -> Result<VirtualPath, ResolveError> {
        parse(path, self.store)
    }

    pub fn resolve(&self, path: &str) -> Result<Resolution, ResolveError> {
        match self.parse(path)? {
            VirtualPath::Root => Ok(Resolution::Root),
            VirtualPath::Query(state) => match state.tail() {
                None => Ok(Resolution::Directory(state.facet())),
                Some(name) => self
                    .store
                    .find_file(&state.facet(), name)?
                    .map(Resolution::Link)
                    .ok_or_else(|| ResolveError::NotFound(path.to_string())),
            },
        }
    }

    /// Entries of a directory, without `.` and `..`.
    ///
    /// At the root these are the attribute names. Below it, the files that
    /// carry every selected value come first, then the values that can still
    /// narrow that set.
    pub fn list(&self, path: &str) -> Result<Vec<VirtualEntry>, ResolveError> {
        match self.parse(path)? {
            VirtualPath::Root => Ok(self
                .store
                .attribute_names()?
                .into_iter()
                .map(|name| VirtualEntry::new(name, EntryKind::Attribute))
                .collect()),
            VirtualPath::Query(PathState::Tail { .. }) => {
                Err(ResolveError::NotADirectory(path.to_string()))
            }
            VirtualPath::Query(state) => {
                let facet = state.facet();
                let mut entries: Vec<VirtualEntry> = self
                    .store
                    .files(&facet)?
                    .into_iter()
                    .map(|file| VirtualEntry::new(file.name, EntryKind::File))
                    .collect();
                entries.extend(
                    self.store
                        .facet_values(&facet)?
                        .into_iter()
                        .map(|value| VirtualEntry::new(value, EntryKind::Value)),
                );
                Ok(entries)
            }
        }
    }

    /// The real path behind a leaf. Directories have no link target.
    pub fn read_link(&self, path: &str) -> Result<PathBuf, ResolveError> {
        match self.resolve(path)? {
            Resolution::Link(file) => Ok(file.real_path),
            Resolution::Root | Resolution::Directory(_) => {
                Err(ResolveError::NotFound(path.to_string()))
            }
        }
    }
}
