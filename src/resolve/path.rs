//! Grammar of virtual paths.
//!
//! ```text
//! /                                   root
//! /<attr>                             Filtering { attr, [] }
//! /<attr>/<v1>/../<vk>                Filtering { attr, [v1..vk] }
//! /<attr>/<v1>/../<vk>/<name>[/...]   Tail { attr, [v1..vk], name }
//! ```
//!
//! The first segment must name an attribute. After it, every segment that is
//! a known value is accumulated while in `Filtering`; the first one that is
//! not switches to `Tail`, and everything from there on is the tail, joined
//! with `/`. Empty segments are ignored.

use crate::database::index::IndexStore;
use crate::database::model::{AttrId, Facet, ValueId};
use crate::error::{ResolveError, StoreError};

/// The two lookups the grammar depends on.
pub trait Vocabulary {
    fn attribute(&self, name: &str) -> Result<Option<AttrId>, StoreError>;
    fn value(&self, value: &str) -> Result<Option<ValueId>, StoreError>;
}

impl Vocabulary for IndexStore {
    fn attribute(&self, name: &str) -> Result<Option<AttrId>, StoreError> {
        self.attribute_id(name)
    }

    fn value(&self, value: &str) -> Result<Option<ValueId>, StoreError> {
        self.value_id(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathState {
    Filtering {
        attr: AttrId,
        values: Vec<ValueId>,
    },
    Tail {
        attr: AttrId,
        values: Vec<ValueId>,
        name: String,
    },
}

impl PathState {
    pub fn start(attr: AttrId) -> Self {
        PathState::Filtering {
            attr,
            values: Vec::new(),
        }
    }

    /// Consumes one non-empty segment.
    pub fn push<V: Vocabulary + ?Sized>(self, segment: &str, vocab: &V) -> Result<Self, StoreError> {
        match self {
            PathState::Filtering { attr, mut values } => match vocab.value(segment)? {
                Some(id) => {
                    values.push(id);
                    Ok(PathState::Filtering { attr, values })
                }
                None => Ok(PathState::Tail {
                    attr,
                    values,
                    name: segment.to_string(),
                }),
            },
            PathState::Tail { attr, values, mut name } => {
                name.push('/');
                name.push_str(segment);
                Ok(PathState::Tail { attr, values, name })
            }
        }
    }

    pub fn attr(&self) -> AttrId {
        match self {
            PathState::Filtering { attr, .. } | PathState::Tail { attr, .. } => *attr,
        }
    }

    pub fn values(&self) -> &[ValueId] {
        match self {
            PathState::Filtering { values, .. } | PathState::Tail { values, .. } => values,
        }
    }

    pub fn tail(&self) -> Option<&str> {
        match self {
            PathState::Filtering { .. } => None,
            PathState::Tail { name, .. } => Some(name),
        }
    }

    pub fn facet(&self) -> Facet {
        Facet::new(self.attr(), self.values().to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    Root,
    Query(PathState),
}

pub fn parse<V: Vocabulary + ?Sized>(path: &str, vocab: &V) -> Result<VirtualPath, ResolveError> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    let first = match segments.next() {
        Some(first) => first,
        None => return Ok(VirtualPath::Root),
    };

    let attr = vocab
        .attribute(first)?
        .ok_or_else(|| ResolveError::InvalidPath(path.to_string()))?;

    let mut state = PathState::start(attr);
    for segment in segments {
        state = state.push(segment, vocab)?;
    }
    Ok(VirtualPath::Query(state))
}
